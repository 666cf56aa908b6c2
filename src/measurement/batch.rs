// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use super::Sample;

/// Ordered, fixed-capacity sequence of samples collected during one cycle.
///
/// Slots are filled strictly in index order and never overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    samples: Vec<Sample>,
    capacity: usize,
}

impl Batch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Fill the next slot. Returns the slot index, or `None` once the batch is full.
    pub fn push(&mut self, sample: Sample) -> Option<usize> {
        if self.is_complete() {
            return None;
        }
        self.samples.push(sample);
        Some(self.samples.len() - 1)
    }

    pub fn is_complete(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn valid_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_valid()).count()
    }
}

impl FromIterator<Sample> for Batch {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        let samples: Vec<Sample> = iter.into_iter().collect();
        let capacity = samples.len();
        Self { samples, capacity }
    }
}
