use std::{fs, path::Path};

use anyhow::{Context, Result};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{color::Rgb, format::PixelFormat};

/// Printer and slicing options. Lengths share the unit of the mesh
/// (usually millimeters), angles are radians.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SliceConfig {
    /// Resolution of the mask display in pixels.
    pub platform_resolution: Vector2<u32>,
    /// Physical extents of the print area.
    pub platform_size: Vector2<f32>,
    /// Physical layer thickness, measured along the plane normal.
    pub slice_height: f32,
    /// Number of closely spaced planes blended into every layer.
    pub subsampling: u32,
    /// Rotation of the slicing plane about the X axis.
    pub plane_tilt: f32,
    pub pixel_format: PixelFormat,
    pub slice_color: Rgb<u8>,
}

impl SliceConfig {
    /// Size of one pixel on the print area.
    pub fn pixel_size(&self) -> Vector2<f32> {
        self.platform_size
            .component_div(&self.platform_resolution.map(|x| x as f32))
    }

    /// Checks the options a slicing session can't run without, returning a
    /// description of the first bad one.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.platform_resolution.x == 0 || self.platform_resolution.y == 0 {
            return Err("platform resolution must be positive");
        }

        if !(self.platform_size.x > 0.0 && self.platform_size.y > 0.0) {
            return Err("platform size must be positive");
        }

        if !(self.slice_height > 0.0) {
            return Err("slice height must be positive");
        }

        if self.subsampling == 0 {
            return Err("subsampling must be at least 1");
        }

        if !self.plane_tilt.is_finite() {
            return Err("plane tilt must be finite");
        }

        Ok(())
    }

    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("Failed to load slice config, using defaults: {err:#}");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(if path.exists() {
            let file = fs::read(path)?;
            let string = String::from_utf8_lossy(&file);
            let config = toml::from_str(&string)
                .with_context(|| format!("Invalid slice config `{}`", path.display()))?;
            info!("Loaded slice config from `{}`", path.display());
            config
        } else {
            info!("No slice config at `{}`, using defaults", path.display());
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let string = toml::to_string(self)?;
        fs::write(path, string)?;
        Ok(())
    }
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            platform_resolution: Vector2::new(1920, 1080),
            platform_size: Vector2::new(96.0, 54.0),
            slice_height: 0.05,
            subsampling: 1,
            plane_tilt: 0.0,
            pixel_format: PixelFormat::Rgba,
            slice_color: Rgb::WHITE,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    #[test]
    fn defaults() {
        let config = SliceConfig::default();
        assert_eq!(config.platform_resolution, Vector2::new(1920, 1080));
        assert_eq!(config.subsampling, 1);
        assert_eq!(config.plane_tilt, 0.0);
        assert_eq!(config.slice_color, Rgb::WHITE);
        assert!((config.pixel_size().x - 0.05).abs() < 1e-6);
    }

    #[test]
    fn validate() {
        assert_eq!(SliceConfig::default().validate(), Ok(()));

        let bad = [
            SliceConfig {
                platform_resolution: Vector2::new(0, 1080),
                ..Default::default()
            },
            SliceConfig {
                platform_size: Vector2::new(96.0, -1.0),
                ..Default::default()
            },
            SliceConfig {
                slice_height: 0.0,
                ..Default::default()
            },
            SliceConfig {
                subsampling: 0,
                ..Default::default()
            },
            SliceConfig {
                plane_tilt: f32::NAN,
                ..Default::default()
            },
        ];

        for config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: SliceConfig = toml::from_str("slice_height = 0.1\nsubsampling = 4").unwrap();
        assert_eq!(config.slice_height, 0.1);
        assert_eq!(config.subsampling, 4);
        assert_eq!(config.platform_size, Vector2::new(96.0, 54.0));
    }

    #[test]
    fn save_then_load() {
        let path = env::temp_dir()
            .join(format!("slice-config-{}", std::process::id()))
            .join("config.toml");

        let config = SliceConfig {
            plane_tilt: 0.25,
            slice_color: Rgb::new(255, 0, 0),
            pixel_format: PixelFormat::GrayAlpha,
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(SliceConfig::load(&path).unwrap(), config);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_is_default() {
        let path = env::temp_dir().join("slice-config-that-does-not-exist.toml");
        assert_eq!(SliceConfig::load_or_default(&path), SliceConfig::default());
    }
}
