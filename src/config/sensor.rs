// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor connection and identification configuration

use serde::{Deserialize, Serialize};

/// Driver implementation used to talk to the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Simulated sensor producing plausible readings
    Simulated,
    /// Scripted sensor answering every command successfully
    Mock,
}

/// Retry settings for operations that wait for the hardware
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay between two attempts in milliseconds
    pub delay_ms: u64,
    /// Give up after this many attempts. Retries forever when absent.
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            max_attempts: None,
        }
    }
}

/// Configuration of the sensor link and the one-time session setup.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub driver: DriverKind,

    /// Serial device the sensor is attached to
    pub port: String,

    /// Fan auto-cleaning interval written to the sensor at startup, in days.
    pub auto_clean_interval_days: u8,

    /// Retry settings for opening the link
    pub connect_retry: RetryConfig,

    /// Retry settings for probing the sensor
    pub probe_retry: RetryConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Simulated,
            port: "/dev/ttyUSB0".to_string(),
            auto_clean_interval_days: 4,
            connect_retry: RetryConfig::default(),
            probe_retry: RetryConfig::default(),
        }
    }
}
