// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Measurement record output
//!
//! Writes one tab-separated line per valid averaged reading:
//!
//! ```text
//! epoch_seconds  pm1.0  pm2.5  pm4.0  pm10.0  nc0.5  nc1.0  nc2.5  nc4.5  nc10.0  tps_x1000
//! ```
//!
//! Concentrations are rounded to integers. The typical particle size is
//! sub-micrometer, so it is scaled by [`PARTICLE_SIZE_SCALE`] before rounding
//! to keep three fractional digits. Readings without valid data produce no
//! line at all; diagnostics never go to this stream.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use log::{debug, trace};

use crate::measurement::{AveragedReading, CHANNEL_NAMES, TYPICAL_PARTICLE_SIZE_INDEX};

/// Output scale of the typical particle size column
pub const PARTICLE_SIZE_SCALE: f64 = 1000.0;

/// Round half away from zero to an integer
pub fn round_half_away_from_zero(value: f64) -> i64 {
    // f64::round already rounds halfway cases away from zero
    value.round() as i64
}

/// Column header matching [`format_record`]
pub fn header_line() -> String {
    let mut columns = vec!["epoch_seconds".to_string()];
    columns.extend(
        CHANNEL_NAMES[..TYPICAL_PARTICLE_SIZE_INDEX]
            .iter()
            .map(|name| name.to_string()),
    );
    columns.push("tps_x1000".to_string());
    format!("# {}", columns.join("\t"))
}

/// Integer values of the ten reported channels
pub fn reported_values(reading: &AveragedReading) -> [i64; 10] {
    let mut values = [0i64; 10];
    for (index, (slot, value)) in values.iter_mut().zip(reading.channels()).enumerate() {
        let scaled = if index == TYPICAL_PARTICLE_SIZE_INDEX {
            value * PARTICLE_SIZE_SCALE
        } else {
            *value
        };
        *slot = round_half_away_from_zero(scaled);
    }
    values
}

/// Format the record line (without newline), or `None` for a no-data reading
pub fn format_record(reading: &AveragedReading, timestamp: DateTime<Utc>) -> Option<String> {
    if !reading.is_valid() {
        return None;
    }
    let mut line = timestamp.timestamp().to_string();
    for value in reported_values(reading) {
        line.push('\t');
        line.push_str(&value.to_string());
    }
    Some(line)
}

/// Writes measurement records to the primary output
pub struct Reporter<W: Write> {
    out: W,
    header: bool,
    header_written: bool,
    records: u64,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header: false,
            header_written: false,
            records: 0,
        }
    }

    /// Write [`header_line`] once before the first record
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    /// Emit one record for `reading`.
    ///
    /// Returns `Ok(false)` without writing anything when the reading carries no
    /// valid data. Each record is flushed immediately.
    pub fn report(
        &mut self,
        reading: &AveragedReading,
        timestamp: DateTime<Utc>,
    ) -> io::Result<bool> {
        let Some(line) = format_record(reading, timestamp) else {
            debug!("No valid samples in batch, nothing reported");
            return Ok(false);
        };

        if self.header && !self.header_written {
            writeln!(self.out, "{}", header_line())?;
            self.header_written = true;
        }
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;

        self.records += 1;
        trace!("Record {} written: {}", self.records, line);
        Ok(true)
    }

    /// Number of records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
