// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Output configuration

use serde::{Deserialize, Serialize};

/// Settings for the primary record stream and the diagnostic channel
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Emit per-sample traces on the diagnostic channel
    pub debug: bool,

    /// Write a `#`-prefixed column header before the first record
    pub header: bool,
}
