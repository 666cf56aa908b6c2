// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Batch aggregation
//!
//! Reduces the samples of one measuring phase to a single representative
//! reading. Invalid samples are excluded from both the sums and the divisor;
//! a batch without any valid sample yields the explicit no-data reading.

use crate::measurement::{AveragedReading, Batch, Sample, CHANNEL_COUNT};

/// Trait for reducing a batch to one reading
pub trait Aggregator: Send + Sync {
    /// Aggregate the valid samples of `samples`
    fn aggregate(&self, samples: &[Sample]) -> AveragedReading;

    fn aggregate_batch(&self, batch: &Batch) -> AveragedReading {
        self.aggregate(batch.samples())
    }
}

/// Arithmetic mean per channel over the valid samples
///
/// Sums are accumulated in `f64` and in sample order, so aggregating the same
/// batch twice gives bit-identical results. No rounding happens here.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAggregator;

impl MeanAggregator {
    pub fn new() -> Self {
        Self
    }
}

impl Aggregator for MeanAggregator {
    fn aggregate(&self, samples: &[Sample]) -> AveragedReading {
        let mut sums = [0.0f64; CHANNEL_COUNT];
        let mut count = 0usize;

        for sample in samples.iter().filter(|s| s.is_valid()) {
            for (sum, value) in sums.iter_mut().zip(sample.channels()) {
                *sum += f64::from(value);
            }
            count += 1;
        }

        if count == 0 {
            return AveragedReading::no_data();
        }

        let divisor = count as f64;
        let means = sums.map(|sum| sum / divisor);
        AveragedReading::new(means, count)
    }
}

/// Create the aggregator used by the acquisition loop
pub fn create_aggregator() -> Box<dyn Aggregator> {
    Box::new(MeanAggregator::new())
}
