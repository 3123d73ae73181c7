use anyhow::{bail, Context, Result};
use image::{imageops, DynamicImage, GenericImageView, ImageError, ImageReader};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::utils::{file_utils, logger};

#[derive(Debug, Default, Serialize)]
pub struct CropSummary {
    pub size: u32,
    pub cropped: usize,
    /// Files that failed to decode.
    pub skipped: usize,
    /// Files in a format with no decoder.
    pub unsupported: usize,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropOutcome {
    Cropped,
    Unsupported,
    Corrupt,
}

/// `(extent - size) / 2` rounded half-to-even, the box rounding PIL applies.
fn centred_offset(extent: u32, size: u32) -> i64 {
    let diff = extent as i64 - size as i64;
    let floor = diff.div_euclid(2);
    if diff.rem_euclid(2) == 0 || floor.rem_euclid(2) == 0 {
        floor
    } else {
        floor + 1
    }
}

/// `size`×`size` window centred on the image; parts falling outside it are black.
pub fn crop_center_square(img: &DynamicImage, size: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let left = centred_offset(w, size);
    let top = centred_offset(h, size);

    if left >= 0 && top >= 0 {
        return img.crop_imm(left as u32, top as u32, size, size);
    }

    let mut canvas = DynamicImage::new(size, size, img.color());
    imageops::replace(&mut canvas, img, -left, -top);
    canvas
}

/// Crop one file, writing over it or into `output_dir`.
pub fn crop_file(path: &Path, size: u32, output_dir: Option<&Path>) -> Result<CropOutcome> {
    let reader = ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let Some(format) = reader.format() else {
        report_unsupported(path, "unrecognised file type");
        return Ok(CropOutcome::Unsupported);
    };
    let img = match reader.decode() {
        Ok(img) => img,
        Err(ImageError::Unsupported(e)) => {
            report_unsupported(path, &e.to_string());
            return Ok(CropOutcome::Unsupported);
        }
        Err(e) => {
            report_unreadable(path, &e.to_string());
            return Ok(CropOutcome::Corrupt);
        }
    };

    let target = match output_dir {
        Some(dir) => dir.join(file_utils::file_name_string(path)),
        None => path.to_path_buf(),
    };

    crop_center_square(&img, size)
        .save_with_format(&target, format)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    logger::debug(&format!("cropped {} -> {}", path.display(), target.display()));
    Ok(CropOutcome::Cropped)
}

fn report_unsupported(path: &Path, reason: &str) {
    let msg = format!("Unsupported image format: {}", path.display());
    logger::warn(&format!("{} ({})", msg, reason));
    println!("{}", msg);
}

fn report_unreadable(path: &Path, reason: &str) {
    let msg = format!(
        "Cannot identify image file {}. It may be corrupted.",
        path.display()
    );
    logger::error(&format!("{} ({})", msg, reason));
    println!("{}", msg);
}

/// Crop every regular file in `dir`.
pub fn crop_directory(dir: &Path, size: u32, output_dir: Option<&Path>) -> Result<CropSummary> {
    if size == 0 {
        bail!("crop size must be at least one pixel");
    }
    if let Some(out) = output_dir {
        file_utils::ensure_dir(out)?;
    }

    let mut summary = CropSummary {
        size,
        output_dir: output_dir.map(Path::to_path_buf),
        ..Default::default()
    };

    for path in file_utils::list_files(dir)? {
        match crop_file(&path, size, output_dir)? {
            CropOutcome::Cropped => summary.cropped += 1,
            CropOutcome::Unsupported => summary.unsupported += 1,
            CropOutcome::Corrupt => summary.skipped += 1,
        }
    }

    logger::info(&format!(
        "cropped {} images in {} to {}px ({} skipped, {} unsupported)",
        summary.cropped,
        dir.display(),
        size,
        summary.skipped,
        summary.unsupported
    ));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;

    /// Pixel value encodes its own coordinates.
    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 7])))
    }

    #[test]
    fn test_landscape_crop_is_centred() {
        let out = crop_center_square(&gradient(200, 100), 60).to_rgb8();
        assert_eq!(out.dimensions(), (60, 60));
        assert_eq!(out.get_pixel(0, 0), &Rgb([70, 20, 7]));
        assert_eq!(out.get_pixel(59, 59), &Rgb([129, 79, 7]));
    }

    #[test]
    fn test_odd_margin_rounds_half_to_even() {
        // 51 / 2 = 25.5 -> 26
        let out = crop_center_square(&gradient(101, 101), 50).to_rgb8();
        assert_eq!(out.dimensions(), (50, 50));
        assert_eq!(out.get_pixel(0, 0), &Rgb([26, 26, 7]));

        // 49 / 2 = 24.5 -> 24, 53 / 2 = 26.5 -> 26
        let out = crop_center_square(&gradient(99, 103), 50).to_rgb8();
        assert_eq!(out.get_pixel(0, 0), &Rgb([24, 26, 7]));
    }

    #[test]
    fn test_centred_offset_negative_margin() {
        assert_eq!(centred_offset(40, 60), -10);
        assert_eq!(centred_offset(39, 60), -10);
        assert_eq!(centred_offset(37, 60), -12);
    }

    #[test]
    fn test_oversized_square_pads_with_black() {
        let out = crop_center_square(&gradient(100, 40), 60).to_rgb8();
        assert_eq!(out.dimensions(), (60, 60));
        // 10 rows of padding above and below, 20 columns cropped away on each side
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(0, 10), &Rgb([20, 0, 7]));
        assert_eq!(out.get_pixel(59, 49), &Rgb([79, 39, 7]));
        assert_eq!(out.get_pixel(30, 55), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_directory_crop_in_place_and_skip_broken() {
        let dir = tempfile::tempdir().unwrap();
        gradient(120, 80).save(dir.path().join("asconema_1.png")).unwrap();
        gradient(90, 150).save(dir.path().join("asconema_2.jpg")).unwrap();
        fs::write(dir.path().join("broken.png"), b"\x89PNG garbage").unwrap();

        let summary = crop_directory(dir.path(), 64, None).unwrap();
        assert_eq!(summary.cropped, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.unsupported, 0);

        assert_eq!(image::open(dir.path().join("asconema_1.png")).unwrap().dimensions(), (64, 64));
        assert_eq!(image::open(dir.path().join("asconema_2.jpg")).unwrap().dimensions(), (64, 64));
    }

    #[test]
    fn test_bmp_gif_webp_are_cropped_and_text_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        gradient(40, 30).save(dir.path().join("a.bmp")).unwrap();
        gradient(40, 30).save(dir.path().join("b.gif")).unwrap();
        gradient(40, 30).to_rgba8().save(dir.path().join("c.webp")).unwrap();
        fs::write(dir.path().join("notes.txt"), b"dive log, not an image").unwrap();

        let summary = crop_directory(dir.path(), 20, None).unwrap();
        assert_eq!(summary.cropped, 3);
        assert_eq!(summary.unsupported, 1);
        assert_eq!(summary.skipped, 0);

        assert_eq!(image::open(dir.path().join("a.bmp")).unwrap().dimensions(), (20, 20));
        assert_eq!(
            crop_file(&dir.path().join("notes.txt"), 20, None).unwrap(),
            CropOutcome::Unsupported
        );
    }

    #[test]
    fn test_output_dir_leaves_originals() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in");
        let out = dir.path().join("out");
        fs::create_dir(&src).unwrap();
        gradient(50, 50).save(src.join("a.png")).unwrap();

        let summary = crop_directory(&src, 20, Some(&out)).unwrap();
        assert_eq!(summary.cropped, 1);
        assert_eq!(image::open(src.join("a.png")).unwrap().dimensions(), (50, 50));
        assert_eq!(image::open(out.join("a.png")).unwrap().dimensions(), (20, 20));
    }
}
