use serde::{Deserialize, Serialize};

/// A red, green, blue triple. Byte colors (`Rgb<u8>`) are what users
/// configure, unit colors (`Rgb<f32>`, each channel in 0..=1) are what the
/// rasterizer accumulates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb<T> {
    pub r: T,
    pub g: T,
    pub b: T,
}

impl<T> Rgb<T> {
    pub const fn new(r: T, g: T, b: T) -> Self {
        Self { r, g, b }
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> Rgb<U> {
        Rgb {
            r: f(self.r),
            g: f(self.g),
            b: f(self.b),
        }
    }
}

impl<T: Copy> Rgb<T> {
    pub const fn repeat(v: T) -> Self {
        Self { r: v, g: v, b: v }
    }
}

impl Rgb<u8> {
    pub const WHITE: Self = Self::repeat(255);

    /// Scales every channel into 0..=1.
    pub fn to_unit(&self) -> Rgb<f32> {
        self.map(|x| x as f32 / 255.0)
    }

    /// Parses `ffffff`, `#ffffff` or `255, 255, 255`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.contains(',') {
            let mut parts = raw.split(',').map(|x| x.trim().parse::<u8>());
            let color = Self::new(
                parts.next()?.ok()?,
                parts.next()?.ok()?,
                parts.next()?.ok()?,
            );
            return parts.next().is_none().then_some(color);
        }

        let hex = raw.strip_prefix('#').unwrap_or(raw);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Rgb<f32> {
    /// Quantizes a unit color with `round(value * 255)`, clamping anything
    /// outside of 0..=1.
    pub fn quantize(&self) -> Rgb<u8> {
        self.map(quantize)
    }
}

/// Converts one unit channel to a byte.
pub fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl Default for Rgb<u8> {
    fn default() -> Self {
        Self::WHITE
    }
}
