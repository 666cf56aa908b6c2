// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Data acquisition configuration
//!
//! This module defines the structures for configuring the measurement cycle:
//! how many samples make a batch, how fast they are taken and how long the
//! sensor rests between batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the acquisition cycle.
///
/// One cycle is: start measurement, read `samples_per_batch` samples spaced by
/// `sample_interval_ms`, report the average, stop measurement, then rest for
/// `rest_period_secs` before the next cycle.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Number of samples averaged into one reported reading.
    ///
    /// Must be at least 1.
    pub samples_per_batch: usize,

    /// Delay in milliseconds between the start of two successive sample reads.
    pub sample_interval_ms: u64,

    /// Time in seconds the sensor rests (and sleeps, when supported) between batches.
    ///
    /// The rest starts once sampling is over, so the cycle period is roughly
    /// `samples_per_batch * sample_interval_ms + rest_period_secs`.
    pub rest_period_secs: u64,

    /// Stop after this many cycles. Unbounded when absent.
    pub max_cycles: Option<u64>,

    /// Re-establish the sensor session when starting a measurement fails,
    /// instead of stopping the agent.
    pub restart_on_start_failure: bool,
}

impl AcquisitionConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn rest_period(&self) -> Duration {
        Duration::from_secs(self.rest_period_secs)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            samples_per_batch: 60,
            sample_interval_ms: 1000,
            rest_period_secs: 60,
            max_cycles: None,
            restart_on_start_failure: false,
        }
    }
}
