use lazy_static::lazy_static;
use regex::Regex;

use crate::shared::constants;

lazy_static! {
    static ref DATE_RE: Regex = Regex::new(constants::DATE_PATTERN).expect("date pattern");
    static ref TIME_RE: Regex = Regex::new(constants::TIME_PATTERN).expect("time pattern");
    static ref CLOCK_RE: Regex = Regex::new(constants::CLOCK_PATTERN).expect("clock pattern");
}

/// First `dd/mm/yy` in the text.
pub fn extract_date(text: &str) -> Option<String> {
    DATE_RE.find(text).map(|m| m.as_str().to_string())
}

/// First `hh:mm:ss` in the text.
pub fn extract_time(text: &str) -> Option<String> {
    TIME_RE.find(text).map(|m| m.as_str().to_string())
}

/// Every clock-like token (`9`, `9:30`, `9:30 PM`, ...) on one line.
pub fn extract_clock_times(line: &str) -> Vec<String> {
    CLOCK_RE
        .find_iter(line)
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
