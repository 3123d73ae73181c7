//! Dive-track telemetry: reading, per-second resampling and frame geotagging.

pub mod interp;
pub mod merge;
pub mod resample;
pub mod track;

pub use track::{TrackFormat, TrackOverrides};
