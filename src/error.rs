// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error types for the acquisition agent
//!
//! Failures at the driver boundary are reported as [`DriverError`](crate::driver::DriverError).
//! The errors below are the ones that leave the library: everything else is
//! logged and absorbed according to the agent's failure policy.

use thiserror::Error;

use crate::driver::DriverError;

/// Result type alias used across the library
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors surfaced by the agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{operation} cancelled after {attempts} attempt(s)")]
    Cancelled {
        operation: &'static str,
        attempts: u32,
    },

    #[error("{operation} gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: DriverError,
    },

    #[error("error starting measurement: {0}")]
    StartMeasurement(#[source] DriverError),

    #[error("failed to write measurement record: {0}")]
    Output(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AgentError {
    /// Process exit code for the binary
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentError::Cancelled { .. } => 0,
            AgentError::RetriesExhausted { .. } => 2,
            AgentError::StartMeasurement(_) => 3,
            AgentError::Output(_) => 4,
            AgentError::Config(_) => 5,
        }
    }
}
