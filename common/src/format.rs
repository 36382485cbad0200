use serde::{Deserialize, Serialize};

/// Pixel layout of exported slice images. Alpha is always opaque.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    #[default]
    Rgba,
    GrayAlpha,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 2] = [PixelFormat::Rgba, PixelFormat::GrayAlpha];

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_lowercase().as_str() {
            "rgba" => PixelFormat::Rgba,
            "gray" | "grey" | "gray-alpha" | "gray_alpha" => PixelFormat::GrayAlpha,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Rgba => "rgba",
            PixelFormat::GrayAlpha => "gray-alpha",
        }
    }
}
