use image::{DynamicImage, GrayAlphaImage, LumaA, Rgba, RgbaImage};
use nalgebra::Vector2;

use crate::{
    color::{quantize, Rgb},
    format::PixelFormat,
};

/// Float coverage image of one slice. Every pixel holds an RGB intensity
/// with channels in 0..=1; quantization to bytes only happens in the `to_*`
/// conversions.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceImage {
    size: Vector2<u32>,
    data: Vec<Rgb<f32>>,
}

impl SliceImage {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            size: Vector2::new(width, height),
            data: vec![Rgb::repeat(0.0); width as usize * height as usize],
        }
    }

    /// Builds an image from per pixel hit counts. A pixel that was inside
    /// the mesh for `hits` of `samples` sample planes gets
    /// `hits / samples * color`.
    pub fn from_hits(width: u32, height: u32, hits: &[u32], samples: u32, color: Rgb<f32>) -> Self {
        debug_assert_eq!(hits.len(), width as usize * height as usize);

        let samples = samples.max(1) as f32;
        let data = hits
            .iter()
            .map(|&hits| {
                let weight = hits as f32 / samples;
                color.map(|channel| channel * weight)
            })
            .collect();

        Self {
            size: Vector2::new(width, height),
            data,
        }
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> Rgb<f32>) -> Self {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();

        Self {
            size: Vector2::new(width, height),
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.size.x
    }

    pub fn height(&self) -> u32 {
        self.size.y
    }

    pub fn size(&self) -> Vector2<u32> {
        self.size
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb<f32> {
        self.data[self.size.x as usize * y as usize + x as usize]
    }

    pub fn pixels(&self) -> &[Rgb<f32>] {
        &self.data
    }

    /// Luminance of a pixel (Rec. 709 weights).
    pub fn intensity(&self, x: u32, y: u32) -> f32 {
        luma(self.pixel(x, y))
    }

    pub fn is_lit(&self, x: u32, y: u32) -> bool {
        let Rgb { r, g, b } = self.pixel(x, y);
        r > 0.0 || g > 0.0 || b > 0.0
    }

    pub fn is_empty(&self) -> bool {
        self.lit_pixels() == 0
    }

    pub fn lit_pixels(&self) -> usize {
        self.data
            .iter()
            .filter(|x| x.r > 0.0 || x.g > 0.0 || x.b > 0.0)
            .count()
    }

    /// Inclusive pixel bounds of every lit pixel, or [`None`] for an empty
    /// image.
    pub fn lit_bounds(&self) -> Option<(Vector2<u32>, Vector2<u32>)> {
        let mut bounds: Option<(Vector2<u32>, Vector2<u32>)> = None;
        for y in 0..self.size.y {
            for x in 0..self.size.x {
                if !self.is_lit(x, y) {
                    continue;
                }

                let point = Vector2::new(x, y);
                bounds = Some(match bounds {
                    Some((min, max)) => (min.inf(&point), max.sup(&point)),
                    None => (point, point),
                });
            }
        }

        bounds
    }

    pub fn to_rgba8(&self) -> RgbaImage {
        RgbaImage::from_fn(self.size.x, self.size.y, |x, y| {
            let Rgb { r, g, b } = self.pixel(x, y).quantize();
            Rgba([r, g, b, u8::MAX])
        })
    }

    pub fn to_gray_alpha8(&self) -> GrayAlphaImage {
        GrayAlphaImage::from_fn(self.size.x, self.size.y, |x, y| {
            LumaA([quantize(self.intensity(x, y)), u8::MAX])
        })
    }

    pub fn to_dynamic(&self, format: PixelFormat) -> DynamicImage {
        match format {
            PixelFormat::Rgba => DynamicImage::ImageRgba8(self.to_rgba8()),
            PixelFormat::GrayAlpha => DynamicImage::ImageLumaA8(self.to_gray_alpha8()),
        }
    }
}

fn luma(Rgb { r, g, b }: Rgb<f32>) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn hits_scale_color() {
        let color = Rgb::new(1.0, 0.5, 0.0);
        let image = SliceImage::from_hits(2, 2, &[0, 1, 2, 4], 4, color);

        assert_eq!(image.pixel(0, 0), Rgb::repeat(0.0));
        assert_eq!(image.pixel(1, 0), Rgb::new(0.25, 0.125, 0.0));
        assert_eq!(image.pixel(0, 1), Rgb::new(0.5, 0.25, 0.0));
        assert_eq!(image.pixel(1, 1), color);
        assert_eq!(image.lit_pixels(), 3);
    }

    #[test]
    fn quantizes_with_opaque_alpha() {
        let image = SliceImage::from_hits(3, 1, &[0, 1, 3], 3, Rgb::repeat(1.0));

        let rgba = image.to_rgba8();
        assert_eq!(rgba.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(rgba.get_pixel(1, 0), &Rgba([85, 85, 85, 255]));
        assert_eq!(rgba.get_pixel(2, 0), &Rgba([255, 255, 255, 255]));

        let gray = image.to_gray_alpha8();
        assert_eq!(gray.get_pixel(0, 0), &LumaA([0, 255]));
        assert_eq!(gray.get_pixel(2, 0), &LumaA([255, 255]));
    }

    #[test]
    fn lit_bounds() {
        let blank = SliceImage::blank(4, 4);
        assert!(blank.is_empty());
        assert_eq!(blank.lit_bounds(), None);

        let image = SliceImage::from_fn(8, 8, |x, y| {
            let lit = (2..5).contains(&x) && (1..7).contains(&y);
            Rgb::repeat(if lit { 1.0 } else { 0.0 })
        });
        assert_eq!(
            image.lit_bounds(),
            Some((Vector2::new(2, 1), Vector2::new(4, 6)))
        );
        assert_eq!(image.lit_pixels(), 18);
    }

    proptest! {
        #[test]
        fn partial_hits_quantize_to_fraction(samples in 1_u32..64, hits in 0_u32..64) {
            let hits = hits.min(samples);
            let image = SliceImage::from_hits(1, 1, &[hits], samples, Rgb::repeat(1.0));

            let expected = (hits as f32 / samples as f32 * 255.0).round() as u8;
            prop_assert_eq!(image.to_rgba8().get_pixel(0, 0).0, [expected, expected, expected, 255]);
            prop_assert_eq!(image.is_lit(0, 0), hits > 0);
        }
    }
}
