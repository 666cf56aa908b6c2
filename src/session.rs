// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor session setup
//!
//! Once the link is open, the sensor is probed (retried until it answers) and
//! then identified and configured on a best-effort basis: version, serial and
//! the fan auto-cleaning interval. Failures in that second phase only degrade
//! the session. A missing version in particular disables sleep/wake for the
//! whole session, since only firmware 2.0 and later supports it.
//!
//! The result is a [`SensorHandle`], borrowed from the open [`Link`] so the link
//! cannot be closed while the handle is alive, and a read-only
//! [`SessionContext`].

use std::marker::PhantomData;

use log::{error, info, warn};

use crate::config::SensorConfig;
use crate::connection::Link;
use crate::driver::{SensorDriver, Transport, VersionInfo};
use crate::error::Result;
use crate::utility::{CancellationToken, RetryPolicy};

/// First firmware major version with sleep/wake support
pub const SLEEP_MIN_FIRMWARE_MAJOR: u8 = 2;

/// What the session learned about the sensor. Read-only after setup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    version: Option<VersionInfo>,
    serial: Option<String>,
}

impl SessionContext {
    pub fn new(version: Option<VersionInfo>, serial: Option<String>) -> Self {
        Self { version, serial }
    }

    pub fn version(&self) -> Option<&VersionInfo> {
        self.version.as_ref()
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn firmware_major(&self) -> Option<u8> {
        self.version.map(|v| v.firmware_major)
    }

    /// Whether sleep/wake may be used. `false` when the version is unknown.
    pub fn supports_sleep(&self) -> bool {
        self.firmware_major()
            .is_some_and(|major| major >= SLEEP_MIN_FIRMWARE_MAJOR)
    }
}

/// A probed sensor, ready to take commands, valid while its link is open
pub struct SensorHandle<'link, D: SensorDriver> {
    driver: D,
    _link: PhantomData<&'link ()>,
}

impl<'link, D: SensorDriver> SensorHandle<'link, D> {
    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Give the driver back, e.g. to set up a new session
    pub fn into_driver(self) -> D {
        self.driver
    }
}

/// One-time identification and configuration of the sensor
#[derive(Debug, Clone, Copy)]
pub struct SensorSession {
    probe_policy: RetryPolicy,
    auto_clean_days: u8,
}

impl SensorSession {
    pub fn new(probe_policy: RetryPolicy, auto_clean_days: u8) -> Self {
        Self {
            probe_policy,
            auto_clean_days,
        }
    }

    pub fn from_config(config: &SensorConfig) -> Self {
        Self::new(
            RetryPolicy::from(&config.probe_retry),
            config.auto_clean_interval_days,
        )
    }

    /// Probe, identify and configure the sensor behind `link`.
    ///
    /// Only the probe can fail this call (cancellation or an exhausted bounded
    /// policy); everything after it is best effort.
    pub fn establish<'link, T, D>(
        &self,
        _link: &'link Link<T>,
        mut driver: D,
        token: &CancellationToken,
    ) -> Result<(SensorHandle<'link, D>, SessionContext)>
    where
        T: Transport,
        D: SensorDriver,
    {
        let probed = self
            .probe_policy
            .run("sensor probe", token, || driver.probe())?;
        info!("Sensor probing successful ({} attempt(s))", probed.attempts);

        let version = match driver.read_version() {
            Ok(version) => {
                info!(
                    "FW: {}.{} HW: {}, SHDLC: {}.{}",
                    version.firmware_major,
                    version.firmware_minor,
                    version.hardware_revision,
                    version.protocol_major,
                    version.protocol_minor
                );
                Some(version)
            }
            Err(e) => {
                error!(
                    "error {} reading version information, sleep/wake disabled",
                    e.code()
                );
                None
            }
        };

        let serial = match driver.read_serial() {
            Ok(serial) => {
                info!("Sensor serial: {}", serial);
                Some(serial)
            }
            Err(e) => {
                warn!("error {} reading serial", e.code());
                None
            }
        };

        if let Err(e) = driver.set_auto_clean_days(self.auto_clean_days) {
            warn!(
                "error {} setting the auto-clean interval to {} days",
                e.code(),
                self.auto_clean_days
            );
        }

        let context = SessionContext::new(version, serial);
        if !context.supports_sleep() {
            info!("Sensor sleep mode unavailable, the fan stays idle between batches");
        }

        Ok((
            SensorHandle {
                driver,
                _link: PhantomData,
            },
            context,
        ))
    }
}

impl Default for SensorSession {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), 4)
    }
}
