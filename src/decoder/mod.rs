//! Frame sources: random access to decoded video frames.

pub mod ffmpeg;
#[cfg(feature = "opencv")]
pub mod video;

use anyhow::{bail, Result};
use image::RgbImage;
use std::path::Path;
use std::str::FromStr;

pub use ffmpeg::FfmpegSource;
#[cfg(feature = "opencv")]
pub use video::VideoDecoder;

/// A seekable video that hands out RGB frames by index.
pub trait FrameSource {
    fn fps(&mut self) -> Result<f64>;

    /// Decode frame `index`; `None` when the video has no such frame.
    fn read_frame(&mut self, index: u64) -> Result<Option<RgbImage>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// OpenCV when compiled in, ffmpeg otherwise
    Auto,
    #[value(name = "opencv")]
    OpenCv,
    Ffmpeg,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "opencv" => Ok(Backend::OpenCv),
            "ffmpeg" => Ok(Backend::Ffmpeg),
            other => Err(format!("unknown video backend '{}' (auto, opencv, ffmpeg)", other)),
        }
    }
}

pub fn open_source(path: &Path, backend: Backend) -> Result<Box<dyn FrameSource>> {
    if !path.is_file() {
        bail!("Video file not found: {}", path.display());
    }

    match backend {
        #[cfg(feature = "opencv")]
        Backend::Auto | Backend::OpenCv => Ok(Box::new(VideoDecoder::open(path)?)),
        #[cfg(not(feature = "opencv"))]
        Backend::OpenCv => bail!("divekit was built without the `opencv` feature; use --backend ffmpeg"),
        #[cfg(not(feature = "opencv"))]
        Backend::Auto => Ok(Box::new(FfmpegSource::open(path)?)),
        Backend::Ffmpeg => Ok(Box::new(FfmpegSource::open(path)?)),
    }
}
