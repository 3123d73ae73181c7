use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use super::track::{self, format_value, Track, TrackFormat};
use crate::ocr::{self, OverlayReading};
use crate::report::ascii_delimiter;
use crate::utils::{logger, time_utils};

#[derive(Debug, Clone, PartialEq)]
pub struct GeotaggedFrame {
    pub frame: String,
    pub date: Option<String>,
    pub time: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Serialize)]
pub struct GeotagSummary {
    pub readings: usize,
    pub matched: usize,
    pub unmatched: usize,
}

/// Inner join of OCR readings with a (resampled) track on the clock time.
pub fn merge_on_time(track: &Track, readings: &[OverlayReading], time_format: &str) -> Vec<GeotaggedFrame> {
    let by_time: HashMap<u32, usize> = track
        .rows
        .iter()
        .enumerate()
        .rev() // first row wins on duplicates
        .map(|(idx, row)| (row.time, idx))
        .collect();

    readings
        .iter()
        .filter_map(|reading| {
            let time_text = reading.time.as_deref()?;
            let seconds = time_utils::parse_clock(time_text, time_format).ok()?;
            let row = &track.rows[*by_time.get(&seconds)?];
            Some(GeotaggedFrame {
                frame: reading.frame.clone(),
                date: reading.date.clone(),
                time: time_text.trim().to_string(),
                values: row.values.clone(),
            })
        })
        .collect()
}

pub fn write_geotagged(
    track: &Track,
    frames: &[GeotaggedFrame],
    path: &Path,
    delimiter: char,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(ascii_delimiter(delimiter)?)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header = vec!["frame".to_string(), "date".to_string(), track.time_column.clone()];
    header.extend(track.columns.iter().cloned());
    writer.write_record(&header)?;

    for frame in frames {
        let mut record = vec![
            frame.frame.clone(),
            frame.date.clone().unwrap_or_default(),
            frame.time.clone(),
        ];
        record.extend(frame.values.iter().map(|v| format_value(*v)));
        writer.write_record(&record)?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn geotag_files(
    track_path: &Path,
    readings_path: &Path,
    output: &Path,
    format: &TrackFormat,
) -> Result<GeotagSummary> {
    let track = track::read_track(track_path, format)?;
    let readings = ocr::batch::read_readings(readings_path)?;

    let frames = merge_on_time(&track, &readings, &format.time_format);
    write_geotagged(&track, &frames, output, format.delimiter)?;

    let summary = GeotagSummary {
        readings: readings.len(),
        matched: frames.len(),
        unmatched: readings.len() - frames.len(),
    };
    logger::info(&format!(
        "geotagged {} of {} frames into {}",
        summary.matched,
        summary.readings,
        output.display()
    ));
    Ok(summary)
}
