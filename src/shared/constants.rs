pub const APP_NAME: &str = "divekit";

pub const CONFIG_FILE: &str = "divekit.config";
pub const ERROR_LOG_FILE: &str = "error.log";
pub const DEBUG_LOG_FILE: &str = "debug.log";

// Annotation report (BIIGLE export)
pub const REPORT_DELIMITER: char = ';';
pub const REPORT_DECIMAL: char = ',';
pub const REPORT_VIDEO_COLUMN: &str = "video_filename";
pub const REPORT_FRAME_COLUMN: &str = "frames";
pub const REPORT_LABEL_COLUMN: &str = "label_name";

// Dive track telemetry
pub const TRACK_DELIMITER: char = ';';
pub const TRACK_TIME_COLUMN: &str = "time";
pub const TRACK_TIME_FORMAT: &str = "%H:%M:%S";

// Overlay OCR
pub const OVERLAY_FRAMES_DIR: &str = "frames";
pub const OVERLAY_PROCESSED_DIR: &str = "processed_frames";
pub const OVERLAY_RESULTS_FILE: &str = "updated_data.csv";
pub const OVERLAY_CROP: (u32, u32, u32, u32) = (20, 0, 150, 90);
pub const OVERLAY_UPSCALE: u32 = 2;
pub const OVERLAY_BRIGHTNESS: f32 = 1.2;
pub const OVERLAY_THRESHOLD: u8 = 153;
pub const OVERLAY_MEDIAN_RADIUS: u32 = 1;
pub const TESSERACT_BIN: &str = "tesseract";
pub const TESSERACT_PSM: u8 = 6;

pub const DATE_PATTERN: &str = r"\b\d{2}/\d{2}/\d{2}\b";
pub const TIME_PATTERN: &str = r"\b\d{2}:\d{2}:\d{2}\b";
pub const CLOCK_PATTERN: &str = r"(?i)\b\d{1,2}(?::\d{2})?\s*(?:AM|PM)?\b";

pub const OVERLAY_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
pub const CLOCK_EXTENSION: &str = "tiff";

// Video
pub const FFMPEG_BIN: &str = "ffmpeg";
pub const FFPROBE_BIN: &str = "ffprobe";

// Square crop
pub const CROP_SIZE: u32 = 1070;
