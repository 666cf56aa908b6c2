// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Load a configuration file and print what the agent would run with
use anyhow::{Context, Result};
use sps30_agent::config::Config;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: debug_config <config.yaml>")?;

    println!("Testing file: {:?}", path);
    println!("File exists: {}", path.exists());

    match Config::from_file(&path) {
        Ok(config) => {
            println!("Configuration is valid, resolved settings:");
            print!("{}", serde_yml::to_string(&config)?);
        }
        Err(e) => println!("Validation failed: {:#}", e),
    }

    Ok(())
}
