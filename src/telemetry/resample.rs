use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;

use super::interp::Interpolator;
use super::track::{self, Track, TrackFormat, TrackRow};
use crate::utils::{logger, time_utils};

#[derive(Debug, Serialize)]
pub struct InterpolationSummary {
    pub input_rows: usize,
    pub output_rows: usize,
    pub start: String,
    pub end: String,
    pub columns: Vec<String>,
}

/// Every whole second from `start` to `end`, both included.
pub fn per_second_grid(start: u32, end: u32) -> Vec<u32> {
    if end < start {
        return Vec::new();
    }
    (start..=end).collect()
}

/// Interpolate every column of `track` onto a one-second grid spanning its samples.
pub fn resample(track: &Track) -> Result<Track> {
    let (Some(start), Some(end)) = (track.start(), track.end()) else {
        bail!("track has no samples to interpolate");
    };
    let grid = per_second_grid(start, end);

    let interpolators: Vec<Interpolator> = track
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let knots = track.knots(idx);
            if knots.is_empty() {
                bail!("column '{}' has no values", name);
            }
            Interpolator::from_points(&knots).with_context(|| format!("column '{}'", name))
        })
        .collect::<Result<_>>()?;

    let rows = grid
        .into_iter()
        .map(|time| TrackRow {
            time,
            values: interpolators
                .iter()
                .map(|f| Some(f.at(time as f64)))
                .collect(),
        })
        .collect();

    Ok(Track {
        time_column: track.time_column.clone(),
        columns: track.columns.clone(),
        rows,
    })
}

/// Read `input`, resample it per second, print a preview and write `output`.
pub fn interpolate_file(input: &Path, output: &Path, format: &TrackFormat) -> Result<InterpolationSummary> {
    let sparse = track::read_track(input, format)?;
    let dense = resample(&sparse).with_context(|| format!("Error interpolating {}", input.display()))?;

    println!("{}", dense.preview(5, &format.time_format));

    track::write_track(&dense, output, format.delimiter, &format.time_format)?;
    logger::info(&format!(
        "wrote {} interpolated rows to {}",
        dense.rows.len(),
        output.display()
    ));

    let clock = |t: Option<u32>| {
        t.map(|t| time_utils::format_clock(t, &format.time_format))
            .unwrap_or_default()
    };
    Ok(InterpolationSummary {
        input_rows: sparse.rows.len(),
        output_rows: dense.rows.len(),
        start: clock(dense.start()),
        end: clock(dense.end()),
        columns: dense.columns.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(rows: Vec<(u32, Vec<Option<f64>>)>) -> Track {
        Track {
            time_column: "time".into(),
            columns: vec!["depth".into(), "lat".into()],
            rows: rows
                .into_iter()
                .map(|(time, values)| TrackRow { time, values })
                .collect(),
        }
    }

    #[test]
    fn test_grid_is_inclusive() {
        assert_eq!(per_second_grid(5, 8), vec![5, 6, 7, 8]);
        assert_eq!(per_second_grid(5, 5), vec![5]);
        assert!(per_second_grid(6, 5).is_empty());
    }

    #[test]
    fn test_irregular_samples_fill_every_second() {
        let input = track(vec![
            (100, vec![Some(-10.0), Some(42.0)]),
            (104, vec![Some(-18.0), Some(42.4)]),
            (105, vec![Some(-20.0), None]),
        ]);

        let out = resample(&input).unwrap();
        let times: Vec<u32> = out.rows.iter().map(|r| r.time).collect();
        assert_eq!(times, vec![100, 101, 102, 103, 104, 105]);

        let depth: Vec<f64> = out.rows.iter().map(|r| r.values[0].unwrap()).collect();
        assert_eq!(depth, vec![-10.0, -12.0, -14.0, -16.0, -18.0, -20.0]);

        // lat has no sample at 105, so it holds its last value
        assert_eq!(out.rows[5].values[1], Some(42.4));
        assert!((out.rows[2].values[1].unwrap() - 42.2).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample_gives_one_row() {
        let out = resample(&track(vec![(7, vec![Some(1.0), Some(2.0)])])).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].values, vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_interpolate_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("DIVE8.csv");
        let output = dir.path().join("dive8_interpols.csv");
        std::fs::write(
            &input,
            "time;y;x;depth;lat;lon\n\
             12:00:00;0;10;-5;42;3\n\
             12:00:02;2;10;-7;42;3\n",
        )
        .unwrap();

        let format = TrackFormat::from_settings(&crate::config::Settings::default());
        let summary = interpolate_file(&input, &output, &format).unwrap();
        assert_eq!(summary.input_rows, 2);
        assert_eq!(summary.output_rows, 3);
        assert_eq!(summary.start, "12:00:00");
        assert_eq!(summary.end, "12:00:02");

        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "time;y;x;depth;lat;lon");
        assert_eq!(lines[2], "12:00:01;1.0;10.0;-6.0;42.0;3.0");
    }

    #[test]
    fn test_empty_inputs_are_errors() {
        assert!(resample(&track(vec![])).is_err());
        assert!(resample(&track(vec![(1, vec![Some(1.0), None])])).is_err());
    }
}
