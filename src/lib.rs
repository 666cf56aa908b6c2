// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! SPS30 acquisition agent library
//!
//! This library drives a Sensirion SPS30 particulate-matter sensor through
//! repeated measurement cycles and reports one averaged reading per batch of
//! samples.
//!
//! The byte-level protocol lives behind the [`driver`] traits; everything
//! above it (link retry, sensor session, acquisition state machine,
//! aggregation and record formatting) is implemented here.

pub mod acquisition;
pub mod aggregation;
pub mod config;
pub mod connection;
pub mod daemon;
pub mod driver;
pub mod error;
pub mod measurement;
pub mod reporter;
pub mod session;
pub mod utility;

pub use error::{AgentError, Result};
