// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated SPS30 sensor
//!
//! Produces plausible particulate matter readings so the agent can run end to
//! end without hardware. The simulation keeps a slowly drifting PM2.5 level and
//! derives the other channels from it with Gaussian-like noise. It also honors
//! the device state machine: samples can only be read while a measurement is
//! running and the sensor is awake.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DriverError, DriverResult, Reading, SensorDriver, Transport, VersionInfo};
use crate::measurement::Sample;

/// Error code answered when a command is not valid in the current device state
const ERR_WRONG_STATE: i16 = -67;

/// Probability that a reading comes back with the device error state set
const FLAGGED_PROBABILITY: f64 = 0.01;

/// Probability that the device has no new data for a read
const NO_DATA_PROBABILITY: f64 = 0.005;

/// Clean-room to urban-smog range of the simulated PM2.5 level [μg/m³]
const PM2_5_RANGE: (f32, f32) = (1.0, 150.0);

/// Simulated byte link
pub struct SimulatedTransport {
    port: String,
    open: bool,
}

impl SimulatedTransport {
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Transport for SimulatedTransport {
    fn open(&mut self) -> DriverResult<()> {
        info!("Opening simulated link on {}", self.port);
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        if !self.open {
            return Err(DriverError::Unavailable(format!(
                "link {} is not open",
                self.port
            )));
        }
        self.open = false;
        Ok(())
    }
}

/// Simulated sensor
pub struct SimulatedSensor {
    rng: StdRng,
    version: VersionInfo,
    serial: String,
    auto_clean_days: u8,
    measuring: bool,
    asleep: bool,
    pm2_5: f32,
}

impl SimulatedSensor {
    /// Simulated firmware 2.2 sensor seeded from the thread RNG
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Deterministic simulation for a given seed
    pub fn with_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let serial = format!("{:016X}", rng.random::<u64>());
        let pm2_5 = rng.random_range(5.0..25.0);
        Self {
            rng,
            version: VersionInfo {
                firmware_major: 2,
                firmware_minor: 2,
                hardware_revision: 7,
                protocol_major: 2,
                protocol_minor: 0,
            },
            serial,
            auto_clean_days: 4,
            measuring: false,
            asleep: false,
            pm2_5,
        }
    }

    pub fn with_firmware(mut self, major: u8, minor: u8) -> Self {
        self.version.firmware_major = major;
        self.version.firmware_minor = minor;
        self
    }

    pub fn auto_clean_days(&self) -> u8 {
        self.auto_clean_days
    }

    /// Symmetric noise in `[-amplitude, amplitude]`, approximately Gaussian
    fn noise(&mut self, amplitude: f32) -> f32 {
        let sum: f32 = (0..4).map(|_| self.rng.random_range(-1.0f32..1.0)).sum();
        sum / 4.0 * amplitude
    }

    fn next_sample(&mut self) -> Sample {
        let drift = self.noise(1.5);
        self.pm2_5 = (self.pm2_5 + drift).clamp(PM2_5_RANGE.0, PM2_5_RANGE.1);
        let pm = self.pm2_5;

        let mut channel = |factor: f32, spread: f32| (pm * factor + self.noise(spread)).max(0.0);
        let mc_1p0 = channel(0.85, 0.3);
        let mc_2p5 = channel(1.0, 0.3);
        let mc_4p0 = channel(1.04, 0.3);
        let mc_10p0 = channel(1.07, 0.4);
        let nc_0p5 = channel(5.6, 2.0);
        let nc_1p0 = channel(6.6, 2.0);
        let nc_2p5 = channel(6.7, 2.0);
        let nc_4p5 = channel(6.75, 2.0);
        let nc_10p0 = channel(6.76, 2.0);
        let typical_particle_size = (0.55 + self.noise(0.1)).max(0.3);

        Sample {
            mc_1p0,
            mc_2p5,
            mc_4p0,
            mc_10p0,
            nc_0p5,
            nc_1p0,
            nc_2p5,
            nc_4p5,
            nc_10p0,
            typical_particle_size,
        }
    }

    fn require_awake(&self) -> DriverResult<()> {
        if self.asleep {
            return Err(DriverError::Code(ERR_WRONG_STATE));
        }
        Ok(())
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDriver for SimulatedSensor {
    fn probe(&mut self) -> DriverResult<()> {
        self.require_awake()
    }

    fn read_version(&mut self) -> DriverResult<VersionInfo> {
        self.require_awake()?;
        Ok(self.version)
    }

    fn read_serial(&mut self) -> DriverResult<String> {
        self.require_awake()?;
        Ok(self.serial.clone())
    }

    fn set_auto_clean_days(&mut self, days: u8) -> DriverResult<()> {
        self.require_awake()?;
        self.auto_clean_days = days;
        Ok(())
    }

    fn start_measurement(&mut self) -> DriverResult<()> {
        self.require_awake()?;
        self.measuring = true;
        Ok(())
    }

    fn stop_measurement(&mut self) -> DriverResult<()> {
        self.require_awake()?;
        self.measuring = false;
        Ok(())
    }

    fn read_sample(&mut self) -> DriverResult<Reading> {
        self.require_awake()?;
        if !self.measuring {
            return Err(DriverError::Code(ERR_WRONG_STATE));
        }
        if self.rng.random_bool(NO_DATA_PROBABILITY) {
            return Err(DriverError::Code(-1));
        }

        let sample = self.next_sample();
        if self.rng.random_bool(FLAGGED_PROBABILITY) {
            let state: u8 = 1 << self.rng.random_range(0u8..3);
            debug!("Simulated sensor raising device state {}", state);
            return Ok(Reading::flagged(sample, state));
        }
        Ok(Reading::ok(sample))
    }

    fn sleep(&mut self) -> DriverResult<()> {
        if self.version.firmware_major < 2 || self.measuring {
            return Err(DriverError::Code(ERR_WRONG_STATE));
        }
        self.asleep = true;
        Ok(())
    }

    fn wake_up(&mut self) -> DriverResult<()> {
        if self.version.firmware_major < 2 {
            return Err(DriverError::Code(ERR_WRONG_STATE));
        }
        self.asleep = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_requires_running_measurement() {
        let mut sensor = SimulatedSensor::with_seed(7);
        assert_eq!(sensor.read_sample().unwrap_err().code(), ERR_WRONG_STATE);

        sensor.start_measurement().unwrap();
        let mut valid = 0;
        for _ in 0..50 {
            if let Ok(reading) = sensor.read_sample() {
                assert!(reading.sample.mc_2p5 >= 0.0);
                if reading.sample.is_valid() {
                    valid += 1;
                }
            }
        }
        assert!(valid > 0);
    }

    #[test]
    fn test_sleep_cycle() {
        let mut sensor = SimulatedSensor::with_seed(1);
        sensor.start_measurement().unwrap();
        assert!(sensor.sleep().is_err(), "cannot sleep while measuring");

        sensor.stop_measurement().unwrap();
        sensor.sleep().unwrap();
        assert!(sensor.start_measurement().is_err());
        sensor.wake_up().unwrap();
        assert!(sensor.start_measurement().is_ok());
    }

    #[test]
    fn test_old_firmware_cannot_sleep() {
        let mut sensor = SimulatedSensor::with_seed(1).with_firmware(1, 0);
        assert_eq!(sensor.read_version().unwrap().firmware_major, 1);
        assert!(sensor.sleep().is_err());
        assert!(sensor.wake_up().is_err());
    }

    #[test]
    fn test_transport_close_requires_open() {
        let mut transport = SimulatedTransport::new("/dev/ttyUSB0");
        assert!(transport.close().is_err());
        transport.open().unwrap();
        assert!(transport.is_open());
        transport.close().unwrap();
        assert!(!transport.is_open());
    }
}
