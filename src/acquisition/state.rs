// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::fmt;

/// Phase of the acquisition cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Between cycles, measurement not started
    Idle,
    /// Measurement running, batch being collected
    Measuring,
    /// Batch complete, reducing and reporting
    Averaging,
    /// Measurement stopped, waiting for the next cycle
    Resting {
        /// The sensor accepted the sleep command
        asleep: bool,
    },
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionState::Idle => write!(f, "idle"),
            AcquisitionState::Measuring => write!(f, "measuring"),
            AcquisitionState::Averaging => write!(f, "averaging"),
            AcquisitionState::Resting { asleep: true } => write!(f, "resting (asleep)"),
            AcquisitionState::Resting { asleep: false } => write!(f, "resting"),
        }
    }
}

/// How the acquisition loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The cancellation token was triggered
    Cancelled { cycles: u64 },
    /// The configured number of cycles ran
    CyclesCompleted(u64),
}

impl LoopExit {
    pub fn cycles(&self) -> u64 {
        match self {
            LoopExit::Cancelled { cycles } => *cycles,
            LoopExit::CyclesCompleted(cycles) => *cycles,
        }
    }
}

/// Outcome of one acquisition cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// 1-based cycle number
    pub cycle: u64,
    /// Samples that entered the batch
    pub collected: usize,
    /// Samples used by the average
    pub valid: usize,
    /// Reads that failed with an error code
    pub failed: usize,
    /// Reads the device flagged with an error state
    pub flagged: usize,
    /// A record was written for this cycle
    pub reported: bool,
    /// The batch was complete (not interrupted by cancellation)
    pub complete: bool,
}

impl CycleStats {
    /// Samples excluded from the average
    pub fn invalid(&self) -> usize {
        self.collected - self.valid
    }
}
