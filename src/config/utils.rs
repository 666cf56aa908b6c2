// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::{Config, RetryConfig};

/// Embedded JSON schema the YAML configuration is validated against
pub(crate) const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line. It outputs the full JSON schema for the configuration
/// to stdout, formatted for readability.
///
/// # Example
///
/// ```bash
/// ./sps30_agent --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

fn validate_retry(name: &str, retry: &RetryConfig) -> Result<()> {
    if retry.max_attempts == Some(0) {
        anyhow::bail!("{}.max_attempts must be at least 1 when set", name);
    }
    if retry.delay_ms == 0 && retry.max_attempts.is_none() {
        warn!(
            "{} retries forever without delay, this will spin while the sensor is absent",
            name
        );
    }
    Ok(())
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Batch size**: at least one sample per batch
/// - **Retry limits**: `max_attempts`, when present, allows at least one attempt
/// - **Port**: the sensor port is not empty
///
/// Suspicious but legal settings (a zero sampling interval, a zero-delay
/// unbounded retry) are only reported as warnings.
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.acquisition.samples_per_batch == 0 {
        anyhow::bail!("acquisition.samples_per_batch must be at least 1");
    }

    validate_retry("sensor.connect_retry", &config.sensor.connect_retry)?;
    validate_retry("sensor.probe_retry", &config.sensor.probe_retry)?;

    if config.sensor.port.trim().is_empty() {
        anyhow::bail!("sensor.port must not be empty");
    }

    if config.acquisition.sample_interval_ms == 0 {
        warn!("acquisition.sample_interval_ms is 0, samples will be read back to back");
    }

    if config.sensor.auto_clean_interval_days == 0 {
        debug!("Fan auto-cleaning will be disabled on the sensor");
    }

    Ok(())
}
