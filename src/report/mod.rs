//! Annotation report (BIIGLE export) reader.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;

use crate::config::Settings;

/// Position of an annotation inside its video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameRef {
    Index(u64),
    Seconds(f64),
}

impl FrameRef {
    /// Frame index for a video running at `fps`.
    pub fn to_index(self, fps: f64) -> Result<u64> {
        match self {
            FrameRef::Index(index) => Ok(index),
            FrameRef::Seconds(seconds) => {
                if !(fps.is_finite() && fps > 0.0) {
                    bail!("cannot convert {}s to a frame index: invalid frame rate {}", seconds, fps);
                }
                Ok((seconds * fps).floor() as u64)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRow {
    pub video_filename: String,
    pub frame: FrameRef,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct ReportFormat {
    pub delimiter: char,
    pub decimal: char,
    pub video_column: String,
    pub frame_column: String,
    pub label_column: String,
    pub frames_are_seconds: bool,
}

impl ReportFormat {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            delimiter: settings.report_delimiter,
            decimal: settings.report_decimal,
            video_column: settings.report_video_column.clone(),
            frame_column: settings.report_frame_column.clone(),
            label_column: settings.report_label_column.clone(),
            frames_are_seconds: false,
        }
    }

    /// Apply command-line flags on top of the configured values.
    pub fn with_overrides(
        mut self,
        delimiter: Option<char>,
        decimal: Option<char>,
        frames_are_seconds: bool,
    ) -> Self {
        if let Some(delimiter) = delimiter {
            self.delimiter = delimiter;
        }
        if let Some(decimal) = decimal {
            self.decimal = decimal;
        }
        self.frames_are_seconds |= frames_are_seconds;
        self
    }
}

pub fn read_report(path: &Path, format: &ReportFormat) -> Result<Vec<AnnotationRow>> {
    let delimiter = ascii_delimiter(format.delimiter)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open annotation report: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| anyhow!("column '{}' not found in {}", name, path.display()))
    };
    let video_idx = column(&format.video_column)?;
    let frame_idx = column(&format.frame_column)?;
    let label_idx = column(&format.label_column)?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed row {} in {}", line + 2, path.display()))?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim();

        let frame_cell = cell(frame_idx);
        let frame = match parse_frame_cell(frame_cell, format.decimal, format.frames_are_seconds) {
            Ok(frame) => frame,
            Err(e) => {
                crate::utils::logger::warn(&format!(
                    "skipping report row {}: {:#}",
                    line + 2,
                    e
                ));
                continue;
            }
        };

        rows.push(AnnotationRow {
            video_filename: cell(video_idx).to_string(),
            frame,
            label: record.get(label_idx).unwrap_or("").to_string(),
        });
    }

    crate::utils::logger::info(&format!("read {} annotation rows from {}", rows.len(), path.display()));
    Ok(rows)
}

/// Rows labelled exactly `label`, in report order.
pub fn filter_by_label(rows: Vec<AnnotationRow>, label: &str) -> Vec<AnnotationRow> {
    rows.into_iter().filter(|row| row.label == label).collect()
}

/// Accepts `12`, `12,5` / `12.5` and BIIGLE's bracketed lists (`[12.5,14.0]`, first entry wins).
pub fn parse_frame_cell(cell: &str, decimal: char, as_seconds: bool) -> Result<FrameRef> {
    let inner = cell.trim().trim_start_matches('[').trim_end_matches(']');
    let first = if inner.contains(',') && (decimal != ',' || inner.contains('.')) {
        // list separator, not a decimal comma
        inner.split(',').next().unwrap_or("")
    } else {
        inner
    };

    let value = parse_decimal(first, decimal)?;
    if as_seconds {
        return Ok(FrameRef::Seconds(value));
    }
    if value < 0.0 {
        bail!("negative frame number '{}'", cell);
    }
    Ok(FrameRef::Index(value.trunc() as u64))
}

/// Parse a number written with `decimal` as its decimal separator.
pub fn parse_decimal(value: &str, decimal: char) -> Result<f64> {
    let trimmed = value.trim();
    let normalized = if decimal == '.' {
        trimmed.to_string()
    } else {
        trimmed.replace(decimal, ".")
    };

    let parsed: f64 = normalized
        .parse()
        .map_err(|_| anyhow!("'{}' is not a number", value))?;
    if !parsed.is_finite() {
        bail!("'{}' is not a finite number", value);
    }
    Ok(parsed)
}

pub fn ascii_delimiter(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() {
        bail!("delimiter '{}' must be a single ASCII character", delimiter);
    }
    Ok(delimiter as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn format() -> ReportFormat {
        ReportFormat::from_settings(&Settings::default())
    }

    #[test]
    fn test_read_and_filter_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation_report.csv");
        fs::write(
            &path,
            "video_annotation_label_id;label_name;video_filename;frames\n\
             1;Eunicella singularis;dive2.mp4;120\n\
             2;Paramuricea clavata;dive2.mp4;130\n\
             3;Eunicella singularis;dive2.mp4;145,7\n\
             4;Eunicella singularis;dive2.mp4;not-a-frame\n",
        )
        .unwrap();

        let rows = read_report(&path, &format()).unwrap();
        assert_eq!(rows.len(), 3);

        let eunicella = filter_by_label(rows, "Eunicella singularis");
        let frames: Vec<FrameRef> = eunicella.iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![FrameRef::Index(120), FrameRef::Index(145)]);
        assert!(eunicella.iter().all(|r| r.video_filename == "dive2.mp4"));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        fs::write(&path, "label_name;frames\nEunicella singularis;1\n").unwrap();

        let err = read_report(&path, &format()).unwrap_err();
        assert!(format!("{:#}", err).contains("video_filename"));
    }

    #[test]
    fn test_label_cell_whitespace_is_significant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        fs::write(
            &path,
            "label_name;video_filename;frames\n\
             Eunicella singularis;a.mp4;1\n\
             \x20Eunicella singularis;a.mp4;2\n\
             Eunicella singularis ;a.mp4;3\n",
        )
        .unwrap();

        let rows = filter_by_label(read_report(&path, &format()).unwrap(), "Eunicella singularis");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].frame, FrameRef::Index(1));
    }

    #[test]
    fn test_label_filter_is_exact() {
        let rows = vec![AnnotationRow {
            video_filename: "a.mp4".into(),
            frame: FrameRef::Index(1),
            label: "eunicella singularis".into(),
        }];
        assert!(filter_by_label(rows, "Eunicella singularis").is_empty());
    }

    #[test]
    fn test_frame_cell_variants() {
        assert_eq!(parse_frame_cell("42", ',', false).unwrap(), FrameRef::Index(42));
        assert_eq!(parse_frame_cell("42,9", ',', false).unwrap(), FrameRef::Index(42));
        assert_eq!(parse_frame_cell("42.9", '.', false).unwrap(), FrameRef::Index(42));
        assert_eq!(parse_frame_cell("[12.5,14.0]", ',', true).unwrap(), FrameRef::Seconds(12.5));
        assert_eq!(parse_frame_cell("[3,4]", '.', false).unwrap(), FrameRef::Index(3));
        assert!(parse_frame_cell("-3", '.', false).is_err());
        assert!(parse_frame_cell("", ',', false).is_err());
    }

    #[test]
    fn test_flags_beat_config_values() {
        let settings = Settings::parse("report.delimiter = ,\nreport.decimal = .\n").unwrap();

        let kept = ReportFormat::from_settings(&settings).with_overrides(None, None, false);
        assert_eq!((kept.delimiter, kept.decimal, kept.frames_are_seconds), (',', '.', false));

        let flagged = ReportFormat::from_settings(&settings).with_overrides(Some('\t'), Some(','), true);
        assert_eq!((flagged.delimiter, flagged.decimal, flagged.frames_are_seconds), ('\t', ',', true));
    }

    #[test]
    fn test_seconds_to_index() {
        assert_eq!(FrameRef::Seconds(2.5).to_index(25.0).unwrap(), 62);
        assert_eq!(FrameRef::Index(7).to_index(0.0).unwrap(), 7);
        assert!(FrameRef::Seconds(1.0).to_index(0.0).is_err());
    }
}
