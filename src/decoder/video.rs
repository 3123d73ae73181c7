use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use opencv::{imgproc, prelude::*, videoio};
use std::path::Path;

use super::FrameSource;

/// OpenCV-backed frame source.
pub struct VideoDecoder {
    capture: videoio::VideoCapture,
    path: String,
}

impl VideoDecoder {
    pub fn open(path: &Path) -> Result<Self> {
        let path = path
            .to_str()
            .ok_or_else(|| anyhow!("video path is not valid UTF-8: {}", path.display()))?
            .to_string();

        // CAP_ANY lets OpenCV choose the platform backend
        let capture = videoio::VideoCapture::from_file(&path, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open video file: {}", path))?;

        if !capture.is_opened()? {
            let err_msg = format!("Failed to open video file: {}", path);
            crate::utils::logger::error(&err_msg);
            bail!(err_msg);
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)?;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?;
        let frames = capture.get(videoio::CAP_PROP_FRAME_COUNT)?;
        crate::utils::logger::debug(&format!(
            "opencv opened {} ({}x{}, {} frames)",
            path, width, height, frames
        ));

        Ok(Self { capture, path })
    }
}

impl FrameSource for VideoDecoder {
    fn fps(&mut self) -> Result<f64> {
        Ok(self.capture.get(videoio::CAP_PROP_FPS)?)
    }

    fn read_frame(&mut self, index: u64) -> Result<Option<RgbImage>> {
        self.capture
            .set(videoio::CAP_PROP_POS_FRAMES, index as f64)
            .with_context(|| format!("seek to frame {} in {}", index, self.path))?;

        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }

        // OpenCV decodes to BGR
        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&frame, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        if !rgb.is_continuous() {
            bail!("Frame {} of {} is not continuous", index, self.path);
        }
        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let bytes = rgb.data_bytes()?.to_vec();

        RgbImage::from_raw(width, height, bytes)
            .map(Some)
            .ok_or_else(|| anyhow!("Frame {} of {} has an unexpected buffer size", index, self.path))
    }
}
