// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use sps30_agent::config::{AcquisitionConfig, Config, DriverKind, RetryConfig, SensorConfig};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_and_save() -> Result<()> {
    // Create a temporary directory
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Create a custom config
    let config = Config {
        sensor: SensorConfig {
            driver: DriverKind::Mock,
            port: "/dev/ttyAMA0".to_string(),
            auto_clean_interval_days: 7,
            connect_retry: RetryConfig {
                delay_ms: 500,
                max_attempts: Some(10),
            },
            ..SensorConfig::default()
        },
        acquisition: AcquisitionConfig {
            samples_per_batch: 10,
            rest_period_secs: 50,
            max_cycles: Some(3),
            ..AcquisitionConfig::default()
        },
        ..Config::default()
    };

    // Save config to file
    config.save_to_file(&config_path)?;

    // Load config from file
    let loaded_config = Config::from_file(&config_path)?;

    // Verify loaded config matches original
    assert_eq!(loaded_config, config);
    assert_eq!(loaded_config.sensor.port, "/dev/ttyAMA0");
    assert_eq!(loaded_config.sensor.connect_retry.max_attempts, Some(10));
    assert_eq!(loaded_config.acquisition.samples_per_batch, 10);

    // Test loading default config for non-existent file
    let non_existent_path = temp_dir.path().join("non_existent.yaml");
    let default_config = Config::from_file(&non_existent_path)?;

    // Verify default config was created
    assert!(non_existent_path.exists());
    assert_eq!(default_config, Config::default());
    assert_eq!(default_config.acquisition.samples_per_batch, 60);
    assert_eq!(default_config.sensor.auto_clean_interval_days, 4);

    // The created file loads back to the same values
    assert_eq!(Config::from_file(&non_existent_path)?, default_config);

    Ok(())
}

#[test]
fn test_config_defaults_for_missing_sections() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("partial.yaml");

    fs::write(
        &config_path,
        r#"
sensor:
  driver: simulated
  probe_retry:
    delay_ms: 250
output:
  header: true
"#,
    )?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.sensor.driver, DriverKind::Simulated);
    assert_eq!(config.sensor.probe_retry.delay_ms, 250);
    assert_eq!(config.sensor.probe_retry.max_attempts, None);
    assert_eq!(config.sensor.connect_retry, RetryConfig::default());
    assert_eq!(config.acquisition, AcquisitionConfig::default());
    assert!(config.output.header);
    assert!(!config.output.debug);

    Ok(())
}

#[test]
fn test_auto_clean_zero_is_accepted() -> Result<()> {
    let config = Config::from_yaml_str("sensor:\n  auto_clean_interval_days: 0\n")?;
    assert_eq!(config.sensor.auto_clean_interval_days, 0);
    Ok(())
}

#[test]
fn test_apply_args() {
    let mut config = Config::default();
    assert_eq!(config.acquisition.samples_per_batch, 60);
    assert_eq!(config.acquisition.max_cycles, None);

    // Apply command-line arguments
    config.apply_args(
        None,
        Some(250),
        None,
        Some(2),
        Some(1),
        None,
        true,
        false,
    );

    // Verify values were overridden
    assert_eq!(config.acquisition.samples_per_batch, 60);
    assert_eq!(config.acquisition.sample_interval_ms, 250);
    assert_eq!(config.acquisition.max_cycles, Some(2));
    assert_eq!(config.sensor.auto_clean_interval_days, 1);
    assert_eq!(config.sensor.driver, DriverKind::Simulated);
    assert!(config.output.header);
    assert!(!config.output.debug);
}
