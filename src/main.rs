mod config;
mod core;
mod decoder;
mod imaging;
mod ocr;
mod report;
mod shared;
mod telemetry;
mod utils;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::core::extractor::{self, ExtractRequest, VideoInput};
use crate::decoder::Backend;
use crate::ocr::{batch, OverlayPreprocess, Tesseract};
use crate::report::ReportFormat;
use crate::shared::constants;
use crate::telemetry::{TrackFormat, TrackOverrides};
use crate::utils::time_utils::Timer;

#[derive(Parser)]
#[command(author, version, about = "Dive video annotation helpers", long_about = None)]
struct Cli {
    /// Settings file (default: ./divekit.config, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for error.log / debug.log
    #[arg(long, global = true, default_value = ".")]
    log_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the video frames annotated with one label as PNGs
    #[command(group(ArgGroup::new("source").required(true).args(["video", "video_dir"])))]
    ExtractFrames {
        #[arg(short, long)]
        report: PathBuf,
        #[arg(short, long)]
        label: String,
        #[arg(short, long)]
        output: PathBuf,
        /// Take every annotated frame from this video
        #[arg(short, long)]
        video: Option<PathBuf>,
        /// Resolve each row's video_filename inside this directory
        #[arg(long)]
        video_dir: Option<PathBuf>,
        /// The frame column holds seconds instead of frame numbers
        #[arg(long, default_value_t = false)]
        frames_are_seconds: bool,
        #[arg(long, value_enum)]
        backend: Option<Backend>,
        #[arg(long)]
        delimiter: Option<char>,
        #[arg(long)]
        decimal: Option<char>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Read the date/time overlay of frame images with tesseract
    OcrOverlay {
        #[arg(short, long, default_value = constants::OVERLAY_FRAMES_DIR)]
        frames: PathBuf,
        #[arg(long, default_value = constants::OVERLAY_PROCESSED_DIR)]
        processed: PathBuf,
        #[arg(short, long, default_value = constants::OVERLAY_RESULTS_FILE)]
        output: PathBuf,
        /// Overlay region as x,y,w,h
        #[arg(long, value_parser = config::parse_region)]
        crop: Option<(u32, u32, u32, u32)>,
        #[arg(long)]
        threshold: Option<u8>,
        #[arg(long)]
        tesseract: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Collect clock times from the second OCR line of raw images
    OcrClock {
        #[arg(short, long)]
        images: PathBuf,
        #[arg(short, long, default_value = constants::CLOCK_EXTENSION)]
        extension: String,
        #[arg(long)]
        tesseract: Option<String>,
    },
    /// Interpolate a dive track onto a one-second grid
    Interpolate {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Comma-separated value columns (default: every numeric column)
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
        #[arg(long)]
        delimiter: Option<char>,
        #[arg(long)]
        decimal: Option<char>,
        #[arg(long)]
        time_column: Option<String>,
        #[arg(long)]
        time_format: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Crop every image in a folder to a centred square
    CropSquare {
        #[arg(short, long)]
        images: PathBuf,
        #[arg(short, long)]
        size: Option<u32>,
        /// Write crops here instead of over the originals
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Join OCR readings with an interpolated track on time
    Geotag {
        #[arg(short, long)]
        track: PathBuf,
        #[arg(short, long)]
        readings: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        delimiter: Option<char>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    crate::utils::logger::init(&cli.log_dir);
    let settings = Settings::load(cli.config.as_deref())?;
    let timer = Timer::new();

    match cli.command {
        Commands::ExtractFrames {
            report,
            label,
            output,
            video,
            video_dir,
            frames_are_seconds,
            backend,
            delimiter,
            decimal,
            json,
        } => {
            let format = ReportFormat::from_settings(&settings).with_overrides(
                delimiter,
                decimal,
                frames_are_seconds,
            );

            let video = match (video, video_dir) {
                (Some(video), _) => VideoInput::Single(video),
                (None, Some(dir)) => VideoInput::Directory(dir),
                (None, None) => anyhow::bail!("either --video or --video-dir is required"),
            };
            let backend = settings.resolve_backend(backend);

            let request = ExtractRequest {
                report,
                label,
                output_dir: output,
                video,
                format,
            };
            let mut open = |path: &Path| decoder::open_source(path, backend);
            let summary = extractor::extract_frames(&request, &mut open)?;
            finish(&summary, json, || {
                format!(
                    "Saved {} of {} '{}' frames to {} ({} missed, {} skipped)",
                    summary.saved,
                    summary.matched,
                    summary.label,
                    summary.output_dir.display(),
                    summary.missed,
                    summary.skipped
                )
            })?;
        }
        Commands::OcrOverlay {
            frames,
            processed,
            output,
            crop,
            threshold,
            tesseract,
            json,
        } => {
            let opts = OverlayPreprocess::from_settings(&settings).with_overrides(crop, threshold);
            let engine = Tesseract::new(settings.resolve_tesseract(tesseract)).with_psm(settings.ocr_psm);

            let readings = batch::read_overlays(&frames, &processed, &opts, &engine)?;
            batch::write_readings(&readings, &output)?;
            let summary = batch::summarize(&readings, &output);
            finish(&summary, json, || {
                format!(
                    "Read {} frames ({} with date, {} with time) into {}",
                    summary.images,
                    summary.with_date,
                    summary.with_time,
                    summary.output.display()
                )
            })?;
        }
        Commands::OcrClock {
            images,
            extension,
            tesseract,
        } => {
            let engine = Tesseract::new(settings.resolve_tesseract(tesseract));
            let readings = batch::read_clock_lines(&images, &extension, &engine)?;
            println!("{}", serde_json::to_string_pretty(&batch::clock_map(&readings))?);
        }
        Commands::Interpolate {
            input,
            output,
            columns,
            delimiter,
            decimal,
            time_column,
            time_format,
            json,
        } => {
            let format = TrackFormat::from_settings(&settings).with_overrides(TrackOverrides {
                delimiter,
                decimal,
                time_column,
                time_format,
                columns,
            });

            let summary = telemetry::resample::interpolate_file(&input, &output, &format)?;
            finish(&summary, json, || {
                format!(
                    "Interpolated {} samples to {} rows ({} - {}) in {}",
                    summary.input_rows,
                    summary.output_rows,
                    summary.start,
                    summary.end,
                    output.display()
                )
            })?;
        }
        Commands::CropSquare {
            images,
            size,
            output,
            json,
        } => {
            let size = settings.resolve_crop_size(size);
            let summary = imaging::crop_directory(&images, size, output.as_deref())?;
            finish(&summary, json, || {
                format!(
                    "Cropped {} images to {}x{} ({} skipped, {} unsupported)",
                    summary.cropped,
                    summary.size,
                    summary.size,
                    summary.skipped,
                    summary.unsupported
                )
            })?;
        }
        Commands::Geotag {
            track,
            readings,
            output,
            delimiter,
            json,
        } => {
            let format = TrackFormat::from_settings(&settings).with_overrides(TrackOverrides {
                delimiter,
                ..Default::default()
            });
            let summary = telemetry::merge::geotag_files(&track, &readings, &output, &format)?;
            finish(&summary, json, || {
                format!(
                    "Geotagged {} of {} frames ({} without a matching time) into {}",
                    summary.matched,
                    summary.readings,
                    summary.unmatched,
                    output.display()
                )
            })?;
        }
    }

    crate::utils::logger::info(&format!("finished in {} ms", timer.elapsed_ms()));
    Ok(())
}

/// Print the job summary as JSON or as one human-readable line.
fn finish<S: Serialize>(summary: &S, json: bool, line: impl FnOnce() -> String) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(summary).context("failed to encode summary")?;
        println!("{}", text);
    } else {
        println!("{}", line());
    }
    Ok(())
}
