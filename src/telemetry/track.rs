use anyhow::{anyhow, bail, Context, Result};
use std::fmt::Write as _;
use std::path::Path;

use crate::config::Settings;
use crate::report::{ascii_delimiter, parse_decimal};
use crate::utils::{logger, time_utils};

#[derive(Debug, Clone)]
pub struct TrackFormat {
    pub delimiter: char,
    pub decimal: char,
    pub time_column: String,
    pub time_format: String,
    /// Value columns to keep; `None` keeps every numeric column.
    pub columns: Option<Vec<String>>,
}

impl TrackFormat {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            delimiter: settings.track_delimiter,
            decimal: '.',
            time_column: settings.track_time_column.clone(),
            time_format: settings.track_time_format.clone(),
            columns: None,
        }
    }

    /// Apply command-line flags on top of the configured values.
    pub fn with_overrides(mut self, flags: TrackOverrides) -> Self {
        if let Some(delimiter) = flags.delimiter {
            self.delimiter = delimiter;
        }
        if let Some(decimal) = flags.decimal {
            self.decimal = decimal;
        }
        if let Some(time_column) = flags.time_column {
            self.time_column = time_column;
        }
        if let Some(time_format) = flags.time_format {
            self.time_format = time_format;
        }
        if flags.columns.is_some() {
            self.columns = flags.columns;
        }
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackOverrides {
    pub delimiter: Option<char>,
    pub decimal: Option<char>,
    pub time_column: Option<String>,
    pub time_format: Option<String>,
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackRow {
    /// Seconds since midnight.
    pub time: u32,
    /// One entry per value column; `None` for a blank cell.
    pub values: Vec<Option<f64>>,
}

/// A dive-track table, sorted by time.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub time_column: String,
    pub columns: Vec<String>,
    pub rows: Vec<TrackRow>,
}

impl Track {
    pub fn start(&self) -> Option<u32> {
        self.rows.first().map(|row| row.time)
    }

    pub fn end(&self) -> Option<u32> {
        self.rows.last().map(|row| row.time)
    }

    /// `(time, value)` knots of one column, skipping blank cells.
    ///
    /// Rows have unique times once read, so a blank in the row kept for a
    /// timestamp leaves that column without a knot there.
    pub fn knots(&self, column: usize) -> Vec<(f64, f64)> {
        self.rows
            .iter()
            .filter_map(|row| {
                let value = row.values.get(column).copied().flatten()?;
                Some((row.time as f64, value))
            })
            .collect()
    }

    /// Table dump in the spirit of a dataframe print: head, tail and shape.
    pub fn preview(&self, edge_rows: usize, time_format: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\t{}", self.time_column, self.columns.join("\t"));

        let n = self.rows.len();
        let render = |out: &mut String, row: &TrackRow| {
            let values: Vec<String> = row.values.iter().map(|v| format_value(*v)).collect();
            let _ = writeln!(
                out,
                "{}\t{}",
                time_utils::format_clock(row.time, time_format),
                values.join("\t")
            );
        };

        if n <= edge_rows * 2 {
            self.rows.iter().for_each(|row| render(&mut out, row));
        } else {
            self.rows[..edge_rows].iter().for_each(|row| render(&mut out, row));
            let _ = writeln!(out, "...");
            self.rows[n - edge_rows..].iter().for_each(|row| render(&mut out, row));
        }

        let _ = write!(out, "[{} rows x {} columns]", n, self.columns.len() + 1);
        out
    }
}

pub fn read_track(path: &Path, format: &TrackFormat) -> Result<Track> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(ascii_delimiter(format.delimiter)?)
        .from_path(path)
        .with_context(|| format!("Error reading {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Error reading header of {}", path.display()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let time_idx = headers
        .iter()
        .position(|h| *h == format.time_column)
        .ok_or_else(|| anyhow!("time column '{}' not found in {}", format.time_column, path.display()))?;

    let explicit = format.columns.is_some();
    let mut selected: Vec<usize> = match &format.columns {
        Some(columns) => columns
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| anyhow!("column '{}' not found in {}", name, path.display()))
            })
            .collect::<Result<_>>()?,
        None => (0..headers.len()).filter(|&i| i != time_idx).collect(),
    };

    let mut raw_rows: Vec<(u32, Vec<Option<f64>>)> = Vec::new();
    let mut non_numeric = vec![false; selected.len()];

    for (line, record) in reader.records().enumerate() {
        let row_number = line + 2;
        let record = record.with_context(|| format!("malformed row {} in {}", row_number, path.display()))?;

        let time_cell = record.get(time_idx).unwrap_or("");
        let time = time_utils::parse_clock(time_cell, &format.time_format)
            .with_context(|| format!("row {} of {}", row_number, path.display()))?;

        let mut values = Vec::with_capacity(selected.len());
        for (slot, &col) in selected.iter().enumerate() {
            let cell = record.get(col).unwrap_or("").trim();
            if cell.is_empty() {
                values.push(None);
                continue;
            }
            match parse_decimal(cell, format.decimal) {
                Ok(value) => values.push(Some(value)),
                Err(e) if explicit => {
                    return Err(e).with_context(|| {
                        format!("column '{}' row {} of {}", headers[col], row_number, path.display())
                    });
                }
                Err(_) => {
                    non_numeric[slot] = true;
                    values.push(None);
                }
            }
        }
        raw_rows.push((time, values));
    }

    // drop columns that turned out not to be numbers
    let keep: Vec<bool> = non_numeric.iter().map(|bad| !bad).collect();
    for (slot, &col) in selected.iter().enumerate() {
        if !keep[slot] {
            logger::warn(&format!("dropping non-numeric column '{}' from {}", headers[col], path.display()));
        }
    }
    let mut slot = 0;
    selected.retain(|_| {
        let kept = keep[slot];
        slot += 1;
        kept
    });

    let mut rows: Vec<TrackRow> = raw_rows
        .into_iter()
        .map(|(time, values)| TrackRow {
            time,
            values: values
                .into_iter()
                .zip(&keep)
                .filter_map(|(value, &kept)| kept.then_some(value))
                .collect(),
        })
        .collect();

    // stable, so the first of several equal timestamps stays first
    rows.sort_by_key(|row| row.time);

    let duplicates = rows.windows(2).filter(|w| w[0].time == w[1].time).count();
    if duplicates > 0 {
        logger::warn(&format!(
            "{} duplicate timestamps in {}; keeping the first row of each",
            duplicates,
            path.display()
        ));
    }
    // the first row owns its timestamp, blanks included
    rows.dedup_by_key(|row| row.time);

    let columns: Vec<String> = selected.iter().map(|&i| headers[i].clone()).collect();
    if columns.is_empty() {
        bail!("{} has no numeric columns besides '{}'", path.display(), format.time_column);
    }

    logger::info(&format!(
        "read {} samples x {} columns from {}",
        rows.len(),
        columns.len(),
        path.display()
    ));

    Ok(Track {
        time_column: format.time_column.clone(),
        columns,
        rows,
    })
}

pub fn write_track(track: &Track, path: &Path, delimiter: char, time_format: &str) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(ascii_delimiter(delimiter)?)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header = vec![track.time_column.clone()];
    header.extend(track.columns.iter().cloned());
    writer.write_record(&header)?;

    for row in &track.rows {
        let mut record = vec![time_utils::format_clock(row.time, time_format)];
        record.extend(row.values.iter().map(|v| format_value(*v)));
        writer.write_record(&record)?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Shortest round-trip float, keeping a `.0` on whole numbers; blank for missing.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{:.1}", v),
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}
