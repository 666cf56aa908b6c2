// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the SPS30 acquisition agent

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use sps30_agent::config::utils::validate_specific_rules;
use sps30_agent::config::{self, Config, DriverKind};
use sps30_agent::daemon::Daemon;
use sps30_agent::driver::create_driver;
use sps30_agent::utility::CancellationToken;
use sps30_agent::AgentError;

/// Particulate matter acquisition agent for the Sensirion SPS30
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Number of samples averaged into one record
    #[arg(long)]
    samples: Option<usize>,

    /// Delay between two sample reads in milliseconds
    #[arg(long)]
    sample_interval_ms: Option<u64>,

    /// Rest period between batches in seconds
    #[arg(long)]
    rest_secs: Option<u64>,

    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Fan auto-cleaning interval in days (0 disables it)
    #[arg(long)]
    auto_clean_days: Option<u8>,

    /// Sensor driver
    #[arg(long, value_enum)]
    driver: Option<DriverKind>,

    /// Print a column header before the first record
    #[arg(long)]
    header: bool,

    /// Enable per-sample diagnostics (debug level)
    #[arg(short = 'd', long, env = "SPS30_DEBUG")]
    debug: bool,
}

/// Diagnostic level for the debug switch, `None` when `RUST_LOG` decides
fn diagnostic_level(debug: bool, rust_log_set: bool) -> Option<log::LevelFilter> {
    if rust_log_set {
        None
    } else if debug {
        Some(log::LevelFilter::Debug)
    } else {
        Some(log::LevelFilter::Info)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The logger accepts debug records; the global max level does the
    // filtering so the configuration file can still raise it after loading.
    // RUST_LOG, when set, overrides both.
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .parse_default_env()
        .init();
    if let Some(level) = diagnostic_level(args.debug, rust_log_set) {
        log::set_max_level(level);
    }

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }
        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let mut config = Config::from_file(&args.config)?;
    config.apply_args(
        args.samples,
        args.sample_interval_ms,
        args.rest_secs,
        args.cycles,
        args.auto_clean_days,
        args.driver,
        args.header,
        args.debug,
    );
    validate_specific_rules(&config).context("Invalid command line overrides")?;

    if let Some(level) = diagnostic_level(config.output.debug, rust_log_set) {
        log::set_max_level(level);
    }

    info!(
        "Starting SPS30 agent v{} with {:?} driver on {}",
        env!("CARGO_PKG_VERSION"),
        config.sensor.driver,
        config.sensor.port
    );

    let token = CancellationToken::new();
    token.cancel_on_signal()?;

    let (transport, driver) = create_driver(&config.sensor);
    let daemon = Daemon::new(config, token);

    match daemon.run(transport, driver, std::io::stdout()) {
        Ok(_) => {}
        Err(e @ AgentError::Cancelled { .. }) => info!("{}", e),
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }

    Ok(())
}
