use anyhow::{anyhow, bail, Context, Result};
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::FrameSource;
use crate::shared::constants;

/// Frame source that shells out to the `ffmpeg` / `ffprobe` executables.
pub struct FfmpegSource {
    path: PathBuf,
    fps: Option<f64>,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("Video file not found: {}", path.display());
        }
        Ok(Self {
            path: path.to_path_buf(),
            fps: None,
        })
    }

    fn probe_fps(&self) -> Result<f64> {
        let output = Command::new(constants::FFPROBE_BIN)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=r_frame_rate",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(&self.path)
            .output()
            .with_context(|| format!("failed to run {}", constants::FFPROBE_BIN))?;

        if !output.status.success() {
            bail!(
                "ffprobe failed on {}: {}",
                self.path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        parse_frame_rate(&String::from_utf8_lossy(&output.stdout))
    }
}

impl FrameSource for FfmpegSource {
    fn fps(&mut self) -> Result<f64> {
        if let Some(fps) = self.fps {
            return Ok(fps);
        }
        let fps = self.probe_fps()?;
        self.fps = Some(fps);
        Ok(fps)
    }

    fn read_frame(&mut self, index: u64) -> Result<Option<RgbImage>> {
        let select = format!("select=eq(n\\,{})", index);
        let output = Command::new(constants::FFMPEG_BIN)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&self.path)
            .args([
                "-vf", select.as_str(), "-vsync", "0", "-frames:v", "1", "-f", "image2pipe", "-vcodec",
                "png", "-",
            ])
            .output()
            .with_context(|| format!("failed to run {}", constants::FFMPEG_BIN))?;

        if !output.status.success() {
            bail!(
                "ffmpeg failed on {} frame {}: {}",
                self.path.display(),
                index,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        if output.stdout.is_empty() {
            return Ok(None);
        }

        let frame = image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)
            .with_context(|| format!("ffmpeg returned an undecodable frame {}", index))?;
        Ok(Some(frame.to_rgb8()))
    }
}

/// `30000/1001`, `25/1` or a plain `25`.
pub fn parse_frame_rate(raw: &str) -> Result<f64> {
    let raw = raw.lines().next().unwrap_or("").trim();
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().map_err(|_| anyhow!("bad frame rate '{}'", raw))?;
            let den: f64 = den.trim().parse().map_err(|_| anyhow!("bad frame rate '{}'", raw))?;
            if den == 0.0 {
                bail!("bad frame rate '{}'", raw);
            }
            num / den
        }
        None => raw.parse().map_err(|_| anyhow!("bad frame rate '{}'", raw))?,
    };

    if !(fps.is_finite() && fps > 0.0) {
        bail!("bad frame rate '{}'", raw);
    }
    Ok(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30000/1001\n").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25/1").unwrap(), 25.0);
        assert_eq!(parse_frame_rate("50").unwrap(), 50.0);
        assert!(parse_frame_rate("0/0").is_err());
        assert!(parse_frame_rate("").is_err());
    }
}
