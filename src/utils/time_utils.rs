use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use std::time::Instant;

pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a wall-clock cell into seconds since midnight.
pub fn parse_clock(value: &str, format: &str) -> Result<u32> {
    let time = NaiveTime::parse_from_str(value.trim(), format)
        .with_context(|| format!("'{}' does not match time format '{}'", value, format))?;
    Ok(time.num_seconds_from_midnight())
}

/// Format seconds since midnight back into `format`.
pub fn format_clock(seconds: u32, format: &str) -> String {
    match NaiveTime::from_num_seconds_from_midnight_opt(seconds % 86_400, 0) {
        Some(time) => time.format(format).to_string(),
        None => seconds.to_string(),
    }
}
