// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the acquisition agent
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! - `sensor`: driver selection, serial port, auto-clean interval and retry settings
//! - `acquisition`: batch size, sampling cadence and rest period
//! - `output`: debug traces and record header
//!
//! ## Usage
//!
//! ```no_run
//! use sps30_agent::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(10),   // Samples per batch
//!     None,       // Sample interval
//!     Some(50),   // Rest period
//!     None,       // Cycles
//!     None,       // Auto-clean interval
//!     None,       // Driver
//!     false,      // Header
//!     true,       // Debug
//! );
//!
//! println!("Samples per batch: {}", config.acquisition.samples_per_batch);
//! ```

pub mod acquisition;
pub mod output;
pub mod sensor;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use acquisition::AcquisitionConfig;
pub use output::OutputConfig;
pub use sensor::{DriverKind, RetryConfig, SensorConfig};
pub use utils::output_config_schema;

/// Root configuration structure for the acquisition agent.
///
/// The configuration is deserialized from and serialized to YAML using serde.
/// Each section uses default values when not explicitly specified, so an empty
/// file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// Sensor link, identification and startup settings.
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Measurement cycle settings.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Record stream and diagnostic settings.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file that fails schema
    /// validation, deserialization or the additional rules produces an error and
    /// a `<name>.sample.yaml` file with defaults next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        Self::from_yaml_str(&contents).map_err(|err| {
            error!("Configuration error in {}: {:#}", path.display(), err);
            if let Err(e) = Self::create_sample_config(path) {
                error!("Failed to create sample config: {}", e);
            }
            err.context(format!("Invalid configuration file {}", path.display()))
        })
    }

    /// Parse, validate and deserialize a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // An empty document is null for serde_yml, treat it as an empty mapping
        let yaml_value: serde_yml::Value = match serde_yml::from_str(contents)
            .context("Failed to parse YAML configuration")?
        {
            serde_yml::Value::Null => serde_yml::Value::Mapping(serde_yml::Mapping::new()),
            value => value,
        };

        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let schema: serde_json::Value = serde_json::from_str(utils::CONFIG_SCHEMA)
            .context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)
            .map_err(|e| anyhow::anyhow!("Failed to compile JSON schema: {}", e))?;

        debug!("Validating configuration against schema");
        if let Err(error) = validator.validate(&json_value) {
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = serde_json::from_value(json_value)
            .context("Failed to deserialize configuration")?;

        utils::validate_specific_rules(&config)?;

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided override the existing
    /// configuration. `header` and `debug` can only switch their option on.
    ///
    /// # Parameters
    ///
    /// * `samples_per_batch` - Number of samples averaged per reported reading
    /// * `sample_interval_ms` - Delay between two sample reads
    /// * `rest_period_secs` - Rest period between batches
    /// * `max_cycles` - Stop after this many cycles
    /// * `auto_clean_days` - Fan auto-cleaning interval written at startup
    /// * `driver` - Driver implementation
    /// * `header` - Write a column header before the first record
    /// * `debug` - Emit per-sample traces
    #[allow(clippy::too_many_arguments)]
    pub fn apply_args(
        &mut self,
        samples_per_batch: Option<usize>,
        sample_interval_ms: Option<u64>,
        rest_period_secs: Option<u64>,
        max_cycles: Option<u64>,
        auto_clean_days: Option<u8>,
        driver: Option<DriverKind>,
        header: bool,
        debug: bool,
    ) {
        if let Some(samples) = samples_per_batch {
            debug!("Overriding samples per batch from command line: {}", samples);
            self.acquisition.samples_per_batch = samples;
        }
        if let Some(interval) = sample_interval_ms {
            debug!("Overriding sample interval from command line: {} ms", interval);
            self.acquisition.sample_interval_ms = interval;
        }
        if let Some(rest) = rest_period_secs {
            debug!("Overriding rest period from command line: {} s", rest);
            self.acquisition.rest_period_secs = rest;
        }
        if let Some(cycles) = max_cycles {
            debug!("Overriding cycle limit from command line: {}", cycles);
            self.acquisition.max_cycles = Some(cycles);
        }
        if let Some(days) = auto_clean_days {
            debug!("Overriding auto-clean interval from command line: {} days", days);
            self.sensor.auto_clean_interval_days = days;
        }
        if let Some(driver) = driver {
            debug!("Overriding driver from command line: {:?}", driver);
            self.sensor.driver = driver;
        }
        if header {
            self.output.header = true;
        }
        if debug {
            self.output.debug = true;
        }
    }
}
