//! Optional `divekit.config` settings file.
//!
//! The file holds `key = value` lines; `#` starts a comment. Values found here
//! replace the built-in defaults and are themselves overridden by CLI flags.

use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::decoder::Backend;
use crate::shared::constants;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub report_delimiter: char,
    pub report_decimal: char,
    pub report_video_column: String,
    pub report_frame_column: String,
    pub report_label_column: String,
    pub track_delimiter: char,
    pub track_time_column: String,
    pub track_time_format: String,
    pub tesseract: String,
    pub ocr_crop: (u32, u32, u32, u32),
    pub ocr_threshold: u8,
    pub ocr_psm: u8,
    pub video_backend: Backend,
    pub crop_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            report_delimiter: constants::REPORT_DELIMITER,
            report_decimal: constants::REPORT_DECIMAL,
            report_video_column: constants::REPORT_VIDEO_COLUMN.to_string(),
            report_frame_column: constants::REPORT_FRAME_COLUMN.to_string(),
            report_label_column: constants::REPORT_LABEL_COLUMN.to_string(),
            track_delimiter: constants::TRACK_DELIMITER,
            track_time_column: constants::TRACK_TIME_COLUMN.to_string(),
            track_time_format: constants::TRACK_TIME_FORMAT.to_string(),
            tesseract: constants::TESSERACT_BIN.to_string(),
            ocr_crop: constants::OVERLAY_CROP,
            ocr_threshold: constants::OVERLAY_THRESHOLD,
            ocr_psm: constants::TESSERACT_PSM,
            video_backend: Backend::Auto,
            crop_size: constants::CROP_SIZE,
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, or from the first config file found in the
    /// working directory or the user config directory. No file means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::discover(),
        };

        match path {
            Some(path) => {
                crate::utils::logger::info(&format!("using config {}", path.display()));
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Self::parse(&content)
                    .with_context(|| format!("invalid config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn resolve_backend(&self, flag: Option<Backend>) -> Backend {
        flag.unwrap_or(self.video_backend)
    }

    pub fn resolve_tesseract(&self, flag: Option<String>) -> String {
        flag.unwrap_or_else(|| self.tesseract.clone())
    }

    pub fn resolve_crop_size(&self, flag: Option<u32>) -> u32 {
        flag.unwrap_or(self.crop_size)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(constants::CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }

        let user = dirs::config_dir()?
            .join(constants::APP_NAME)
            .join(constants::CONFIG_FILE);
        user.is_file().then_some(user)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut settings = Self::default();

        for (number, line) in content.lines().enumerate() {
            let trimmed = line.split('#').next().unwrap_or("").trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                bail!("line {}: expected `key = value`, got '{}'", number + 1, trimmed);
            };
            settings
                .apply(key.trim(), value.trim())
                .with_context(|| format!("line {}", number + 1))?;
        }

        Ok(settings)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "report.delimiter" => self.report_delimiter = parse_char(key, value)?,
            "report.decimal" => self.report_decimal = parse_char(key, value)?,
            "report.video_column" => self.report_video_column = value.to_string(),
            "report.frame_column" => self.report_frame_column = value.to_string(),
            "report.label_column" => self.report_label_column = value.to_string(),
            "track.delimiter" => self.track_delimiter = parse_char(key, value)?,
            "track.time_column" => self.track_time_column = value.to_string(),
            "track.time_format" => self.track_time_format = value.to_string(),
            "ocr.tesseract" => self.tesseract = value.to_string(),
            "ocr.crop" => self.ocr_crop = parse_region(value).with_context(|| key.to_string())?,
            "ocr.threshold" => self.ocr_threshold = parse_number(key, value)?,
            "ocr.psm" => self.ocr_psm = parse_number(key, value)?,
            "video.backend" => {
                self.video_backend = value
                    .parse()
                    .map_err(|e: String| anyhow!("{}: {}", key, e))?
            }
            "crop.size" => self.crop_size = parse_number(key, value)?,
            other => crate::utils::logger::warn(&format!("ignoring unknown config key '{}'", other)),
        }
        Ok(())
    }
}

/// Single character, with `tab` accepted as a name for `\t`.
pub fn parse_char(key: &str, value: &str) -> Result<char> {
    if value.eq_ignore_ascii_case("tab") || value == "\\t" {
        return Ok('\t');
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => bail!("{}: expected a single character, got '{}'", key, value),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("{}: '{}' is not a valid number", key, value))
}

/// `x,y,w,h` pixel region.
pub fn parse_region(value: &str) -> Result<(u32, u32, u32, u32)> {
    let parts: Vec<u32> = value
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| anyhow!("'{}' is not an x,y,w,h region", value))?;

    match parts.as_slice() {
        [x, y, w, h] if *w > 0 && *h > 0 => Ok((*x, *y, *w, *h)),
        _ => bail!("'{}' is not an x,y,w,h region with non-zero size", value),
    }
}
