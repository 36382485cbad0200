use std::{path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use clap::Parser;
use common::{color::Rgb, config::SliceConfig, format::PixelFormat};
use nalgebra::{ArrayStorage, Const, Matrix, Scalar, Vector2, Vector3, U1};
use num_traits::Zero;

#[derive(Debug, Parser)]
/// Cuts a mesh into anti-aliased cross sections and packs them into a ZIP
/// archive of PNG images.
pub struct Args {
    #[arg(long)]
    /// TOML slice config to start from. Flags below override its values.
    pub config: Option<PathBuf>,

    #[arg(long, value_parser = vector_value_parser::<u32, 2>)]
    /// Resolution of the printer mask display in pixels.
    pub platform_resolution: Option<Vector2<u32>>,
    #[arg(long, value_parser = vector_value_parser::<f32, 2>)]
    /// Size of the print area in mm.
    pub platform_size: Option<Vector2<f32>>,
    #[arg(long)]
    /// Layer thickness in mm, measured along the plane normal.
    pub slice_height: Option<f32>,
    #[arg(long)]
    /// Number of sample planes blended into every layer.
    pub subsampling: Option<u32>,
    #[arg(long)]
    /// Tilt of the slicing plane about the X axis, in degrees.
    pub tilt: Option<f32>,
    #[arg(long, value_parser = color_value_parser)]
    /// Color of solid pixels, as `rrggbb` or `r, g, b`.
    pub color: Option<Rgb<u8>>,
    #[arg(long, value_parser = format_value_parser)]
    /// Pixel format of the PNG files, `rgba` or `gray-alpha`.
    pub pixel_format: Option<PixelFormat>,

    #[arg(long)]
    /// Path to a .stl file.
    pub mesh: PathBuf,
    #[arg(long, default_value = "1, 1, 1", value_parser = vector_value_parser::<f32, 3>)]
    /// Scale of the model along the X, Y, and Z axes.
    pub scale: Vector3<f32>,
    #[arg(long, default_value = "0, 0, 0", value_parser = vector_value_parser::<f32, 3>)]
    /// Rotation of the model in degrees, pitch, roll, yaw.
    pub rotation: Vector3<f32>,

    #[arg(long)]
    /// Stop after this many slices.
    pub max_slices: Option<u32>,
    #[arg(long, short)]
    /// Log every slice.
    pub verbose: bool,

    /// File to save the slice archive to.
    pub output: PathBuf,
}

impl Args {
    /// Loads the config file, if any, and applies the overrides.
    pub fn slice_config(&self) -> Result<SliceConfig> {
        let mut config = match &self.config {
            Some(path) => SliceConfig::load(path)?,
            None => SliceConfig::default(),
        };

        if let Some(resolution) = self.platform_resolution {
            config.platform_resolution = resolution;
        }
        if let Some(size) = self.platform_size {
            config.platform_size = size;
        }
        if let Some(height) = self.slice_height {
            config.slice_height = height;
        }
        if let Some(subsampling) = self.subsampling {
            config.subsampling = subsampling;
        }
        if let Some(tilt) = self.tilt {
            config.plane_tilt = tilt.to_radians();
        }
        if let Some(color) = self.color {
            config.slice_color = color;
        }
        if let Some(format) = self.pixel_format {
            config.pixel_format = format;
        }

        Ok(config)
    }
}

fn vector_value_parser<T, const N: usize>(
    raw: &str,
) -> Result<Matrix<T, Const<N>, U1, ArrayStorage<T, N, 1>>>
where
    T: FromStr + Scalar + Zero,
    T::Err: Send + Sync + std::error::Error + 'static,
{
    let mut vec = Matrix::<T, Const<N>, U1, ArrayStorage<T, N, 1>>::zeros();

    let mut parts = raw.splitn(N, ',');
    for i in 0..N {
        let element = parts.next().context("Missing vector element")?.trim();
        vec[i] = element
            .parse()
            .context("Can't convert element from string")?;
    }

    Ok(vec)
}

fn color_value_parser(raw: &str) -> Result<Rgb<u8>> {
    Rgb::parse(raw).with_context(|| format!("Invalid color `{raw}`"))
}

fn format_value_parser(raw: &str) -> Result<PixelFormat> {
    PixelFormat::from_name(raw).with_context(|| format!("Unknown pixel format `{raw}`"))
}
