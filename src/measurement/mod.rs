// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Measurement data model
//!
//! A [`Sample`] is one raw ten-channel reading from the sensor. Samples of one
//! measuring phase are collected into a [`Batch`], which the aggregation stage
//! reduces to an [`AveragedReading`].
//!
//! Validity is carried in-band by the typical particle size channel: a value
//! that is not strictly positive marks the whole record as unusable.

mod batch;

pub use batch::Batch;

use serde::{Deserialize, Serialize};

/// Number of channels carried by a sample or an averaged reading
pub const CHANNEL_COUNT: usize = 10;

/// Index of the typical particle size channel in [`Sample::channels`]
pub const TYPICAL_PARTICLE_SIZE_INDEX: usize = 9;

/// Conventional typical particle size written into records that carry no data.
///
/// Any value `<= 0.0` is treated as invalid; this is the one the agent writes.
pub const INVALID_PARTICLE_SIZE: f32 = -1.0;

/// Column names in channel order, as they appear in the output record header
pub const CHANNEL_NAMES: [&str; CHANNEL_COUNT] = [
    "pm1.0", "pm2.5", "pm4.0", "pm10.0", "nc0.5", "nc1.0", "nc2.5", "nc4.5", "nc10.0", "tps",
];

/// One raw reading of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Mass concentration PM1.0 [μg/m³]
    pub mc_1p0: f32,
    /// Mass concentration PM2.5 [μg/m³]
    pub mc_2p5: f32,
    /// Mass concentration PM4.0 [μg/m³]
    pub mc_4p0: f32,
    /// Mass concentration PM10 [μg/m³]
    pub mc_10p0: f32,
    /// Number concentration PM0.5 [#/cm³]
    pub nc_0p5: f32,
    /// Number concentration PM1.0 [#/cm³]
    pub nc_1p0: f32,
    /// Number concentration PM2.5 [#/cm³]
    pub nc_2p5: f32,
    /// Number concentration PM4.5 [#/cm³]
    pub nc_4p5: f32,
    /// Number concentration PM10 [#/cm³]
    pub nc_10p0: f32,
    /// Typical particle size [μm]
    pub typical_particle_size: f32,
}

impl Sample {
    /// A sample that carries no data
    pub fn invalid() -> Self {
        let mut channels = [0.0; CHANNEL_COUNT];
        channels[TYPICAL_PARTICLE_SIZE_INDEX] = INVALID_PARTICLE_SIZE;
        Self::from_channels(channels)
    }

    /// Build a sample from values in [`CHANNEL_NAMES`] order
    pub fn from_channels(c: [f32; CHANNEL_COUNT]) -> Self {
        Self {
            mc_1p0: c[0],
            mc_2p5: c[1],
            mc_4p0: c[2],
            mc_10p0: c[3],
            nc_0p5: c[4],
            nc_1p0: c[5],
            nc_2p5: c[6],
            nc_4p5: c[7],
            nc_10p0: c[8],
            typical_particle_size: c[9],
        }
    }

    /// Values in [`CHANNEL_NAMES`] order
    pub fn channels(&self) -> [f32; CHANNEL_COUNT] {
        [
            self.mc_1p0,
            self.mc_2p5,
            self.mc_4p0,
            self.mc_10p0,
            self.nc_0p5,
            self.nc_1p0,
            self.nc_2p5,
            self.nc_4p5,
            self.nc_10p0,
            self.typical_particle_size,
        ]
    }

    /// `true` when the typical particle size is strictly positive
    pub fn is_valid(&self) -> bool {
        self.typical_particle_size > 0.0
    }

    /// Copy of this sample with the invalid sentinel applied.
    ///
    /// The other channels are kept for diagnostics but must not be used.
    pub fn invalidated(mut self) -> Self {
        self.typical_particle_size = INVALID_PARTICLE_SIZE;
        self
    }
}

/// Per-channel mean of the valid samples of a batch.
///
/// Carries the same validity semantics as [`Sample`]: when no sample of the
/// batch was valid the typical particle size is `-1` and every other channel
/// is zero and meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedReading {
    channels: [f64; CHANNEL_COUNT],
    /// Number of samples that contributed to the mean
    pub contributing: usize,
}

impl AveragedReading {
    /// Reading built from already averaged channel values
    pub fn new(channels: [f64; CHANNEL_COUNT], contributing: usize) -> Self {
        Self {
            channels,
            contributing,
        }
    }

    /// The explicit "no valid data" reading
    pub fn no_data() -> Self {
        let mut channels = [0.0; CHANNEL_COUNT];
        channels[TYPICAL_PARTICLE_SIZE_INDEX] = f64::from(INVALID_PARTICLE_SIZE);
        Self {
            channels,
            contributing: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.typical_particle_size() > 0.0
    }

    /// Values in [`CHANNEL_NAMES`] order
    pub fn channels(&self) -> &[f64; CHANNEL_COUNT] {
        &self.channels
    }

    pub fn mc_1p0(&self) -> f64 {
        self.channels[0]
    }

    pub fn mc_2p5(&self) -> f64 {
        self.channels[1]
    }

    pub fn mc_4p0(&self) -> f64 {
        self.channels[2]
    }

    pub fn mc_10p0(&self) -> f64 {
        self.channels[3]
    }

    pub fn nc_0p5(&self) -> f64 {
        self.channels[4]
    }

    pub fn nc_1p0(&self) -> f64 {
        self.channels[5]
    }

    pub fn nc_2p5(&self) -> f64 {
        self.channels[6]
    }

    pub fn nc_4p5(&self) -> f64 {
        self.channels[7]
    }

    pub fn nc_10p0(&self) -> f64 {
        self.channels[8]
    }

    pub fn typical_particle_size(&self) -> f64 {
        self.channels[TYPICAL_PARTICLE_SIZE_INDEX]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_validity_follows_particle_size() {
        let mut channels = [1.0; CHANNEL_COUNT];
        assert!(Sample::from_channels(channels).is_valid());

        channels[TYPICAL_PARTICLE_SIZE_INDEX] = 0.0;
        assert!(!Sample::from_channels(channels).is_valid());

        assert!(!Sample::invalid().is_valid());
        assert!(!Sample::from_channels([1.0; CHANNEL_COUNT])
            .invalidated()
            .is_valid());
    }

    #[test]
    fn test_channel_order() {
        let channels = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let sample = Sample::from_channels(channels);
        assert_eq!(sample.mc_10p0, 3.0);
        assert_eq!(sample.nc_4p5, 7.0);
        assert_eq!(sample.typical_particle_size, 9.0);
        assert_eq!(sample.channels(), channels);
    }

    #[test]
    fn test_no_data_reading() {
        let reading = AveragedReading::no_data();
        assert!(!reading.is_valid());
        assert_eq!(reading.typical_particle_size(), -1.0);
        assert_eq!(reading.mc_2p5(), 0.0);
        assert_eq!(reading.contributing, 0);
    }
}
