use anyhow::{Context, Result};
use image::ImageFormat;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::decoder::FrameSource;
use crate::report::{self, AnnotationRow, ReportFormat};
use crate::utils::{file_utils, logger};

/// Which video(s) the report rows are read from.
#[derive(Debug, Clone)]
pub enum VideoInput {
    /// Every matching row is taken from this one video.
    Single(PathBuf),
    /// Each row's `video_filename` is resolved inside this directory.
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub report: PathBuf,
    pub label: String,
    pub output_dir: PathBuf,
    pub video: VideoInput,
    pub format: ReportFormat,
}

#[derive(Debug, Default, Serialize)]
pub struct ExtractSummary {
    pub label: String,
    pub matched: usize,
    pub saved: usize,
    /// Rows whose frame could not be decoded.
    pub missed: usize,
    /// Rows dropped because their video could not be opened.
    pub skipped: usize,
    pub output_dir: PathBuf,
}

pub type OpenSource<'a> = dyn FnMut(&Path) -> Result<Box<dyn FrameSource>> + 'a;

/// Save every frame annotated with `request.label` as a PNG in `request.output_dir`.
pub fn extract_frames(request: &ExtractRequest, open: &mut OpenSource<'_>) -> Result<ExtractSummary> {
    let rows = report::read_report(&request.report, &request.format)?;
    let rows = report::filter_by_label(rows, &request.label);
    logger::info(&format!(
        "{} rows labelled '{}' in {}",
        rows.len(),
        request.label,
        request.report.display()
    ));

    file_utils::ensure_dir(&request.output_dir)?;

    let mut summary = ExtractSummary {
        label: request.label.clone(),
        matched: rows.len(),
        output_dir: request.output_dir.clone(),
        ..Default::default()
    };

    match &request.video {
        VideoInput::Single(video) => {
            let mut source = open(video)?;
            for row in &rows {
                extract_row(source.as_mut(), row, &request.output_dir, &mut summary)?;
            }
        }
        VideoInput::Directory(dir) => {
            let mut sources: HashMap<String, Option<Box<dyn FrameSource>>> = HashMap::new();
            for row in &rows {
                let source = sources.entry(row.video_filename.clone()).or_insert_with(|| {
                    let path = dir.join(&row.video_filename);
                    match open(&path) {
                        Ok(source) => Some(source),
                        Err(e) => {
                            let msg = format!("Skipping video {}: {:#}", path.display(), e);
                            logger::error(&msg);
                            println!("{}", msg);
                            None
                        }
                    }
                });

                match source {
                    Some(source) => {
                        extract_row(source.as_mut(), row, &request.output_dir, &mut summary)?
                    }
                    None => summary.skipped += 1,
                }
            }
        }
    }

    logger::info(&format!(
        "extract finished: {} saved, {} missed, {} skipped",
        summary.saved, summary.missed, summary.skipped
    ));
    Ok(summary)
}

fn extract_row(
    source: &mut dyn FrameSource,
    row: &AnnotationRow,
    output_dir: &Path,
    summary: &mut ExtractSummary,
) -> Result<()> {
    let fps = match row.frame {
        report::FrameRef::Seconds(_) => source.fps()?,
        report::FrameRef::Index(_) => 0.0,
    };
    let frame_number = row.frame.to_index(fps)?;
    println!("Frame: {}", frame_number);

    match source.read_frame(frame_number)? {
        Some(frame) => {
            let path = output_dir.join(frame_file_name(&row.video_filename, frame_number));
            frame
                .save_with_format(&path, ImageFormat::Png)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            summary.saved += 1;
            println!("Done: {}", frame_number);
        }
        None => {
            summary.missed += 1;
            logger::warn(&format!(
                "no frame {} in {}",
                frame_number, row.video_filename
            ));
        }
    }
    Ok(())
}

/// `{video_filename}_frame{N}.png`, keeping only the file-name part of the video.
pub fn frame_file_name(video_filename: &str, frame_number: u64) -> String {
    let base = Path::new(video_filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| video_filename.to_string());
    format!("{}_frame{}.png", base, frame_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use anyhow::bail;
    use image::{Rgb, RgbImage};
    use std::fs;

    /// In-memory video whose frame `n` is filled with grey level `n`.
    struct FakeVideo {
        frames: u64,
        fps: f64,
    }

    impl FrameSource for FakeVideo {
        fn fps(&mut self) -> Result<f64> {
            Ok(self.fps)
        }

        fn read_frame(&mut self, index: u64) -> Result<Option<RgbImage>> {
            if index >= self.frames {
                return Ok(None);
            }
            let level = index as u8;
            Ok(Some(RgbImage::from_pixel(4, 3, Rgb([level, level, level]))))
        }
    }

    fn write_report(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("annotation_report.csv");
        fs::write(&path, format!("label_name;video_filename;frames\n{}", body)).unwrap();
        path
    }

    #[test]
    fn test_single_video_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(
            dir.path(),
            "Eunicella singularis;video.mp4;3\n\
             Paramuricea clavata;video.mp4;4\n\
             Eunicella singularis;video.mp4;9\n\
             Eunicella singularis;video.mp4;500\n",
        );
        let output_dir = dir.path().join("frames").join("eunicella");

        let request = ExtractRequest {
            report,
            label: "Eunicella singularis".into(),
            output_dir: output_dir.clone(),
            video: VideoInput::Single(dir.path().join("video.mp4")),
            format: ReportFormat::from_settings(&Settings::default()),
        };
        let mut open = |_: &Path| -> Result<Box<dyn FrameSource>> {
            Ok(Box::new(FakeVideo { frames: 100, fps: 25.0 }))
        };

        let summary = extract_frames(&request, &mut open).unwrap();
        assert_eq!(summary.matched, 3);
        assert_eq!(summary.saved, 2);
        assert_eq!(summary.missed, 1);

        let saved = image::open(output_dir.join("video.mp4_frame9.png")).unwrap().to_rgb8();
        assert_eq!(saved.dimensions(), (4, 3));
        assert_eq!(saved.get_pixel(0, 0), &Rgb([9, 9, 9]));
        assert!(output_dir.join("video.mp4_frame3.png").exists());
        assert!(!output_dir.join("video.mp4_frame4.png").exists());
    }

    #[test]
    fn test_directory_mode_skips_missing_videos() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(
            dir.path(),
            "Eunicella singularis;dive2.mp4;1,5\n\
             Eunicella singularis;dive8.mp4;2\n\
             Eunicella singularis;dive2.mp4;2\n",
        );
        let mut format = ReportFormat::from_settings(&Settings::default());
        format.frames_are_seconds = true;

        let request = ExtractRequest {
            report,
            label: "Eunicella singularis".into(),
            output_dir: dir.path().join("out"),
            video: VideoInput::Directory(dir.path().to_path_buf()),
            format,
        };

        let mut opened = Vec::new();
        let mut open = |path: &Path| -> Result<Box<dyn FrameSource>> {
            opened.push(path.to_path_buf());
            if path.ends_with("dive8.mp4") {
                bail!("Video file not found: {}", path.display());
            }
            Ok(Box::new(FakeVideo { frames: 100, fps: 10.0 }))
        };

        let summary = extract_frames(&request, &mut open).unwrap();
        assert_eq!(summary.saved, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(opened.len(), 2);
        assert!(dir.path().join("out").join("dive2.mp4_frame15.png").exists());
        assert!(dir.path().join("out").join("dive2.mp4_frame20.png").exists());
    }

    #[test]
    fn test_frame_file_name_strips_directories() {
        assert_eq!(frame_file_name("dive2.mp4", 12), "dive2.mp4_frame12.png");
        assert_eq!(frame_file_name("videos/dive2.mp4", 12), "dive2.mp4_frame12.png");
    }
}
