use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::engine::TextRecognizer;
use super::extract::{extract_clock_times, extract_date, extract_time};
use super::preprocess::{prepare_overlay, OverlayPreprocess};
use super::{ClockReading, OverlayReading};
use crate::shared::constants;
use crate::utils::{file_utils, logger};

#[derive(Debug, Serialize)]
pub struct OcrSummary {
    pub images: usize,
    pub with_date: usize,
    pub with_time: usize,
    pub output: PathBuf,
}

/// OCR the overlay of every frame image in `frames_dir`.
///
/// Per-image failures are logged and recorded as empty readings.
pub fn read_overlays(
    frames_dir: &Path,
    processed_dir: &Path,
    opts: &OverlayPreprocess,
    recognizer: &dyn TextRecognizer,
) -> Result<Vec<OverlayReading>> {
    let images = file_utils::list_files_with_extensions(frames_dir, constants::OVERLAY_EXTENSIONS)?;
    file_utils::ensure_dir(processed_dir)?;
    logger::info(&format!("{} frame images in {}", images.len(), frames_dir.display()));

    Ok(images
        .iter()
        .map(|path| read_overlay(path, processed_dir, opts, recognizer))
        .collect())
}

/// Date and time from one frame; `None`s when the image is missing or unreadable.
pub fn read_overlay(
    image_path: &Path,
    processed_dir: &Path,
    opts: &OverlayPreprocess,
    recognizer: &dyn TextRecognizer,
) -> OverlayReading {
    let frame = file_utils::file_name_string(image_path);

    if !image_path.exists() {
        let msg = format!("Not exist: {}", image_path.display());
        logger::error(&msg);
        println!("{}", msg);
        return OverlayReading { date: None, time: None, frame };
    }

    match ocr_overlay(image_path, processed_dir, opts, recognizer) {
        Ok(text) => {
            let date = extract_date(&text);
            let time = extract_time(&text);
            println!(
                "Processing: {} | Date: {} | Time: {}",
                image_path.display(),
                date.as_deref().unwrap_or("None"),
                time.as_deref().unwrap_or("None")
            );
            OverlayReading { date, time, frame }
        }
        Err(e) => {
            let msg = format!("Error processing {}: {:#}", image_path.display(), e);
            logger::error(&msg);
            println!("{}", msg);
            OverlayReading { date: None, time: None, frame }
        }
    }
}

fn ocr_overlay(
    image_path: &Path,
    processed_dir: &Path,
    opts: &OverlayPreprocess,
    recognizer: &dyn TextRecognizer,
) -> Result<String> {
    let image = image::open(image_path)
        .with_context(|| format!("cannot identify image file {}", image_path.display()))?;
    let processed = prepare_overlay(&image, opts)?;

    let processed_path = processed_dir.join(file_utils::file_name_string(image_path));
    processed
        .save(&processed_path)
        .with_context(|| format!("Failed to write {}", processed_path.display()))?;

    recognizer.recognize(&processed_path)
}

pub fn write_readings(readings: &[OverlayReading], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for reading in readings {
        writer.serialize(reading)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_readings(path: &Path) -> Result<Vec<OverlayReading>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open OCR results {}", path.display()))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<OverlayReading>, _>>()
        .with_context(|| format!("malformed OCR results in {}", path.display()))
}

pub fn summarize(readings: &[OverlayReading], output: &Path) -> OcrSummary {
    OcrSummary {
        images: readings.len(),
        with_date: readings.iter().filter(|r| r.date.is_some()).count(),
        with_time: readings.iter().filter(|r| r.time.is_some()).count(),
        output: output.to_path_buf(),
    }
}

/// OCR raw images and collect the clock tokens on their second text line.
///
/// Images whose text has fewer than two lines are left out.
pub fn read_clock_lines(
    dir: &Path,
    extension: &str,
    recognizer: &dyn TextRecognizer,
) -> Result<Vec<ClockReading>> {
    // accept both "tiff" and ".tiff"
    let extension = extension.trim_start_matches('.');
    let images = file_utils::list_files_with_extensions(dir, &[extension])?;
    let mut readings = Vec::new();

    for path in images {
        let text = match recognizer.recognize(&path) {
            Ok(text) => text,
            Err(e) => {
                logger::error(&format!("Error processing {}: {:#}", path.display(), e));
                continue;
            }
        };

        let Some(second_line) = text.split('\n').nth(1) else {
            logger::debug(&format!("{}: fewer than two text lines", path.display()));
            continue;
        };
        readings.push(ClockReading {
            image: path.display().to_string(),
            times: extract_clock_times(second_line),
        });
    }

    Ok(readings)
}

pub fn clock_map(readings: &[ClockReading]) -> BTreeMap<String, Vec<String>> {
    readings
        .iter()
        .map(|r| (r.image.clone(), r.times.clone()))
        .collect()
}
