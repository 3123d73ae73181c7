//! OCR of the date/time overlay burned into ROV frames.

pub mod batch;
pub mod engine;
pub mod extract;
pub mod preprocess;

use serde::{Deserialize, Serialize};

pub use engine::Tesseract;
pub use preprocess::OverlayPreprocess;

/// Date and time read from one frame's overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayReading {
    pub date: Option<String>,
    pub time: Option<String>,
    pub frame: String,
}

/// Clock-like tokens found on the second OCR line of an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockReading {
    pub image: String,
    pub times: Vec<String>,
}
