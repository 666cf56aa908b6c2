// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor driver boundary
//!
//! The agent does not speak the SHDLC wire protocol itself. It drives two
//! collaborators through blocking request/response calls:
//! - [`Transport`]: opens and closes the byte link to the sensor
//! - [`SensorDriver`]: the sensor command set (probe, identify, configure, measure, sleep)
//!
//! Available implementations:
//! - Simulated: plausible readings with noise, for running the agent without hardware
//! - Mock: scripted responses with a call log, for tests and dry runs

pub mod mock;
pub mod simulated;

pub use mock::{MockSensor, MockTransport, SensorCall};
pub use simulated::{SimulatedSensor, SimulatedTransport};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DriverKind, SensorConfig};
use crate::measurement::Sample;

/// Result type alias for driver calls
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Failure reported by a driver or transport call
#[derive(Error, Debug)]
pub enum DriverError {
    /// Negative error code returned by the device or its protocol layer
    #[error("error code {0}")]
    Code(i16),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

impl DriverError {
    /// Signed error code, `-1` when the failure did not carry one
    pub fn code(&self) -> i16 {
        match self {
            DriverError::Code(code) => *code,
            _ => -1,
        }
    }
}

/// Firmware, hardware and protocol revisions of the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub hardware_revision: u8,
    pub protocol_major: u8,
    pub protocol_minor: u8,
}

/// Result of a successful "read one sample" call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub sample: Sample,
    /// Device error state reported alongside the data, if any.
    ///
    /// A flagged reading is a successful transfer whose values the device
    /// itself considers potentially inaccurate.
    pub device_status: Option<u8>,
}

impl Reading {
    pub fn ok(sample: Sample) -> Self {
        Self {
            sample,
            device_status: None,
        }
    }

    pub fn flagged(sample: Sample, state: u8) -> Self {
        Self {
            sample,
            device_status: Some(state),
        }
    }
}

/// Byte link to the sensor
pub trait Transport {
    fn open(&mut self) -> DriverResult<()>;

    fn close(&mut self) -> DriverResult<()>;
}

/// Sensor command set
///
/// Every call blocks until the device answers or the driver gives up.
pub trait SensorDriver {
    /// Check that a sensor answers on the link
    fn probe(&mut self) -> DriverResult<()>;

    fn read_version(&mut self) -> DriverResult<VersionInfo>;

    fn read_serial(&mut self) -> DriverResult<String>;

    /// Configure the fan auto-cleaning interval
    fn set_auto_clean_days(&mut self, days: u8) -> DriverResult<()>;

    fn start_measurement(&mut self) -> DriverResult<()>;

    fn stop_measurement(&mut self) -> DriverResult<()>;

    /// Read one sample from the running measurement
    fn read_sample(&mut self) -> DriverResult<Reading>;

    /// Enter low power mode (firmware 2.0 and later)
    fn sleep(&mut self) -> DriverResult<()>;

    /// Leave low power mode (firmware 2.0 and later)
    fn wake_up(&mut self) -> DriverResult<()>;
}

impl<D: SensorDriver + ?Sized> SensorDriver for Box<D> {
    fn probe(&mut self) -> DriverResult<()> {
        (**self).probe()
    }

    fn read_version(&mut self) -> DriverResult<VersionInfo> {
        (**self).read_version()
    }

    fn read_serial(&mut self) -> DriverResult<String> {
        (**self).read_serial()
    }

    fn set_auto_clean_days(&mut self, days: u8) -> DriverResult<()> {
        (**self).set_auto_clean_days(days)
    }

    fn start_measurement(&mut self) -> DriverResult<()> {
        (**self).start_measurement()
    }

    fn stop_measurement(&mut self) -> DriverResult<()> {
        (**self).stop_measurement()
    }

    fn read_sample(&mut self) -> DriverResult<Reading> {
        (**self).read_sample()
    }

    fn sleep(&mut self) -> DriverResult<()> {
        (**self).sleep()
    }

    fn wake_up(&mut self) -> DriverResult<()> {
        (**self).wake_up()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> DriverResult<()> {
        (**self).open()
    }

    fn close(&mut self) -> DriverResult<()> {
        (**self).close()
    }
}

/// Create the transport and driver pair selected in the configuration
pub fn create_driver(config: &SensorConfig) -> (Box<dyn Transport>, Box<dyn SensorDriver>) {
    match config.driver {
        DriverKind::Simulated => (
            Box::new(SimulatedTransport::new(&config.port)),
            Box::new(SimulatedSensor::new()),
        ),
        DriverKind::Mock => (Box::new(MockTransport::new()), Box::new(MockSensor::new())),
    }
}
