use anyhow::{bail, Context, Result};
use fast_image_resize as fr;
use fr::images::Image;
use image::{imageops, DynamicImage, GrayImage, RgbImage};

use crate::config::Settings;
use crate::shared::constants;

#[derive(Debug, Clone)]
pub struct OverlayPreprocess {
    /// `(x, y, width, height)` of the overlay text.
    pub region: (u32, u32, u32, u32),
    /// Scale applied to the cropped region itself. Frames OCR'd this way can
    /// read differently from a pipeline that stretches the crop to a multiple
    /// of the full frame size.
    pub upscale: u32,
    pub brightness: f32,
    pub threshold: u8,
    pub median_radius: u32,
}

impl OverlayPreprocess {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            region: settings.ocr_crop,
            threshold: settings.ocr_threshold,
            ..Self::default()
        }
    }

    /// Apply command-line flags on top of the configured values.
    pub fn with_overrides(mut self, region: Option<(u32, u32, u32, u32)>, threshold: Option<u8>) -> Self {
        if let Some(region) = region {
            self.region = region;
        }
        if let Some(threshold) = threshold {
            self.threshold = threshold;
        }
        self
    }
}

impl Default for OverlayPreprocess {
    fn default() -> Self {
        Self {
            region: constants::OVERLAY_CROP,
            upscale: constants::OVERLAY_UPSCALE,
            brightness: constants::OVERLAY_BRIGHTNESS,
            threshold: constants::OVERLAY_THRESHOLD,
            median_radius: constants::OVERLAY_MEDIAN_RADIUS,
        }
    }
}

/// Crop, upscale, binarise and denoise the overlay so tesseract sees clean glyphs.
pub fn prepare_overlay(img: &DynamicImage, opts: &OverlayPreprocess) -> Result<GrayImage> {
    let (x, y, w, h) = clamp_region(img.width(), img.height(), opts.region)?;
    let crop = imageops::crop_imm(&img.to_rgb8(), x, y, w, h).to_image();

    let upscaled = upscale_lanczos(crop, opts.upscale.max(1))?;
    let mut gray = DynamicImage::ImageRgb8(upscaled).to_luma8();

    for pixel in gray.pixels_mut() {
        let bright = (pixel.0[0] as f32 * opts.brightness).round().min(255.0) as u8;
        pixel.0[0] = if bright > opts.threshold { 255 } else { 0 };
    }

    Ok(imageproc::filter::median_filter(
        &gray,
        opts.median_radius,
        opts.median_radius,
    ))
}

/// Clip `region` to the image; errors when nothing of it is left.
pub fn clamp_region(
    width: u32,
    height: u32,
    (x, y, w, h): (u32, u32, u32, u32),
) -> Result<(u32, u32, u32, u32)> {
    if x >= width || y >= height {
        bail!(
            "overlay region at ({}, {}) lies outside a {}x{} image",
            x,
            y,
            width,
            height
        );
    }
    let w = w.min(width - x);
    let h = h.min(height - y);
    if w == 0 || h == 0 {
        bail!("overlay region is empty");
    }
    Ok((x, y, w, h))
}

fn upscale_lanczos(src: RgbImage, factor: u32) -> Result<RgbImage> {
    if factor == 1 {
        return Ok(src);
    }
    let (w, h) = src.dimensions();
    let (new_w, new_h) = (w * factor, h * factor);

    let src_image = Image::from_vec_u8(w, h, src.into_raw(), fr::PixelType::U8x3)
        .context("overlay crop has an unexpected buffer size")?;
    let mut dst_image = Image::new(new_w, new_h, fr::PixelType::U8x3);

    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));
    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .context("overlay upscale failed")?;

    RgbImage::from_raw(new_w, new_h, dst_image.into_vec())
        .context("upscaled overlay has an unexpected buffer size")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_flags_beat_config_values() {
        let settings = Settings::parse("ocr.crop = 0,0,100,40\nocr.threshold = 90\n").unwrap();

        let kept = OverlayPreprocess::from_settings(&settings).with_overrides(None, None);
        assert_eq!((kept.region, kept.threshold), ((0, 0, 100, 40), 90));

        let flagged =
            OverlayPreprocess::from_settings(&settings).with_overrides(Some((5, 5, 60, 30)), Some(200));
        assert_eq!((flagged.region, flagged.threshold), ((5, 5, 60, 30), 200));
        assert_eq!(flagged.upscale, constants::OVERLAY_UPSCALE);
    }

    #[test]
    fn test_output_geometry() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(640, 360));
        let out = prepare_overlay(&img, &OverlayPreprocess::default()).unwrap();
        assert_eq!(out.dimensions(), (300, 180));
    }

    #[test]
    fn test_region_is_clamped_to_small_frames() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        let out = prepare_overlay(&img, &OverlayPreprocess::default()).unwrap();
        assert_eq!(out.dimensions(), (160, 100));

        assert!(clamp_region(10, 10, (20, 0, 150, 90)).is_err());
    }

    #[test]
    fn test_bright_text_becomes_white_on_black() {
        // white block inside the overlay area, dark grey elsewhere
        let mut frame = RgbImage::from_pixel(200, 100, Rgb([60, 60, 60]));
        for y in 30..60 {
            for x in 60..120 {
                frame.put_pixel(x, y, Rgb([230, 230, 230]));
            }
        }
        let out = prepare_overlay(&DynamicImage::ImageRgb8(frame), &OverlayPreprocess::default()).unwrap();

        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        // centre of the block: ((90 - 20) * 2, 45 * 2)
        assert_eq!(out.get_pixel(140, 90).0[0], 255);
        assert_eq!(out.get_pixel(5, 5).0[0], 0);
    }
}
