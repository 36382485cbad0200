//! Packs slice images into a ZIP archive. Members are PNG files named
//! `slices/<index>.png`, numbered from zero in the order they were added.

use std::{
    fs::File,
    io::{BufWriter, Cursor, Seek, Write},
    path::Path,
};

use anyhow::{Context, Result};
use common::{format::PixelFormat, image::SliceImage};
use image::ImageFormat;
use tracing::info;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// Streams slices into a ZIP archive as they are produced.
pub struct SliceArchive<W: Write + Seek> {
    zip: ZipWriter<W>,
    format: PixelFormat,
    count: u32,
}

impl<W: Write + Seek> SliceArchive<W> {
    pub fn new(writer: W, format: PixelFormat) -> Self {
        Self {
            zip: ZipWriter::new(writer),
            format,
            count: 0,
        }
    }

    /// Name of the archive member holding the slice at `index`.
    pub fn member_name(index: u32) -> String {
        format!("slices/{index}.png")
    }

    /// Encodes `image` as the next slice.
    pub fn add_slice(&mut self, image: &SliceImage) -> Result<()> {
        let png = encode_png(image, self.format)?;

        // PNG data is already deflated, so it's stored as is.
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.zip.start_file(Self::member_name(self.count), options)?;
        self.zip.write_all(&png)?;

        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Writes the central directory, returning the inner writer and the
    /// number of slices written.
    pub fn finish(self) -> Result<(W, u32)> {
        let writer = self.zip.finish()?;
        Ok((writer, self.count))
    }
}

/// Writes every slice into a new archive at `path`.
pub fn write_archive<'a>(
    path: &Path,
    format: PixelFormat,
    slices: impl IntoIterator<Item = &'a SliceImage>,
) -> Result<u32> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create archive `{}`", path.display()))?;

    let mut archive = SliceArchive::new(BufWriter::new(file), format);
    for slice in slices {
        archive.add_slice(slice)?;
    }

    let (mut writer, count) = archive.finish()?;
    writer.flush()?;
    info!("Wrote {count} slices to `{}`", path.display());
    Ok(count)
}

fn encode_png(image: &SliceImage, format: PixelFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .to_dynamic(format)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::{env, fs, io::Read};

    use common::color::Rgb;
    use zip::ZipArchive;

    use super::*;

    fn read_member<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> image::DynamicImage {
        let mut bytes = Vec::new();
        zip.by_name(name).unwrap().read_to_end(&mut bytes).unwrap();
        image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap()
    }

    #[test]
    fn members_are_numbered_in_order() {
        let slices = [0.0, 0.5, 1.0].map(|x| SliceImage::from_fn(4, 2, |_, _| Rgb::repeat(x)));

        let mut archive = SliceArchive::new(Cursor::new(Vec::new()), PixelFormat::Rgba);
        for slice in &slices {
            archive.add_slice(slice).unwrap();
        }
        let (cursor, count) = archive.finish().unwrap();
        assert_eq!(count, 3);

        let mut zip = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        let names = zip.file_names().map(String::from).collect::<Vec<_>>();
        assert_eq!(names.len(), 3);
        for i in 0..3 {
            assert!(names.contains(&format!("slices/{i}.png")));
        }

        let middle = read_member(&mut zip, "slices/1.png").to_rgba8();
        assert_eq!(middle.dimensions(), (4, 2));
        assert_eq!(middle.get_pixel(3, 1).0, [128, 128, 128, 255]);
    }

    #[test]
    fn gray_alpha_members() {
        let slice = SliceImage::from_fn(3, 3, |x, _| Rgb::repeat(if x == 1 { 1.0 } else { 0.0 }));

        let mut archive = SliceArchive::new(Cursor::new(Vec::new()), PixelFormat::GrayAlpha);
        archive.add_slice(&slice).unwrap();
        let (cursor, _) = archive.finish().unwrap();

        let mut zip = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        let image = read_member(&mut zip, "slices/0.png");
        assert!(matches!(image, image::DynamicImage::ImageLumaA8(_)));

        let gray = image.to_luma_alpha8();
        assert_eq!(gray.get_pixel(0, 0).0, [0, 255]);
        assert_eq!(gray.get_pixel(1, 2).0, [255, 255]);
    }

    #[test]
    fn write_to_file() {
        let dir = env::temp_dir().join(format!("slice-archive-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("slices.zip");

        let slices = vec![SliceImage::blank(2, 2); 5];
        assert_eq!(write_archive(&path, PixelFormat::Rgba, &slices).unwrap(), 5);

        let zip = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(zip.len(), 5);
        let _ = fs::remove_dir_all(dir);
    }
}
