// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! Wires the agent together for one run:
//!
//! 1. open the link through the [`ConnectionManager`]
//! 2. probe and identify the sensor with a [`SensorSession`]
//! 3. run the [`AcquisitionLoop`] until it is cancelled or done
//! 4. close the link
//!
//! When starting a measurement fails the run stops with
//! [`AgentError::StartMeasurement`], unless `restart_on_start_failure` is set:
//! the session is then established again from the probe step and acquisition
//! resumes on the same link and output.
//!
//! ## Usage
//!
//! ```no_run
//! use sps30_agent::config::Config;
//! use sps30_agent::daemon::Daemon;
//! use sps30_agent::driver::create_driver;
//! use sps30_agent::utility::CancellationToken;
//!
//! fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!     let token = CancellationToken::new();
//!     token.cancel_on_signal()?;
//!
//!     let (transport, driver) = create_driver(&config.sensor);
//!     let daemon = Daemon::new(config, token);
//!     daemon.run(transport, driver, std::io::stdout())?;
//!     Ok(())
//! }
//! ```

use std::io::Write;
use std::time::Duration;

use log::{info, warn};

use crate::acquisition::{AcquisitionLoop, LoopExit};
use crate::config::Config;
use crate::connection::{ConnectionManager, Link};
use crate::driver::{SensorDriver, Transport};
use crate::error::{AgentError, Result};
use crate::reporter::Reporter;
use crate::session::SensorSession;
use crate::utility::{CancellationToken, RetryPolicy};

/// Runs the acquisition agent against one transport and driver
pub struct Daemon {
    config: Config,
    token: CancellationToken,
}

impl Daemon {
    pub fn new(config: Config, token: CancellationToken) -> Self {
        Self { config, token }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that stops the run when cancelled
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Run the agent, writing measurement records to `sink`.
    ///
    /// The link is always closed before returning; a failure to close it is
    /// only logged.
    pub fn run<T, D, W>(&self, transport: T, driver: D, sink: W) -> Result<LoopExit>
    where
        T: Transport,
        D: SensorDriver,
        W: Write,
    {
        if self.config.acquisition.samples_per_batch == 0 {
            return Err(AgentError::Config(
                "acquisition.samples_per_batch must be at least 1".to_string(),
            ));
        }

        let manager = ConnectionManager::new(RetryPolicy::from(&self.config.sensor.connect_retry));
        let link = manager.open(transport, &self.token)?;

        let mut reporter = Reporter::new(sink).with_header(self.config.output.header);
        let result = self.acquire(&link, driver, &mut reporter);

        // close failures are logged by the manager
        manager.close(link).ok();

        match &result {
            Ok(exit) => info!(
                "Daemon stopped after {} cycle(s), {} record(s) written",
                exit.cycles(),
                reporter.records()
            ),
            Err(e) => warn!("Daemon stopped: {}", e),
        }
        result
    }

    fn acquire<T, D, W>(
        &self,
        link: &Link<T>,
        mut driver: D,
        reporter: &mut Reporter<W>,
    ) -> Result<LoopExit>
    where
        T: Transport,
        D: SensorDriver,
        W: Write,
    {
        let session = SensorSession::from_config(&self.config.sensor);
        let restart_delay = Duration::from_millis(self.config.sensor.probe_retry.delay_ms);
        let mut completed = 0u64;
        let mut restarts = 0u32;

        loop {
            let (handle, context) = session.establish(link, driver, &self.token)?;

            let mut acquisition_config = self.config.acquisition.clone();
            acquisition_config.max_cycles = acquisition_config
                .max_cycles
                .map(|max| max.saturating_sub(completed));

            let mut acquisition = AcquisitionLoop::new(
                handle,
                context,
                &acquisition_config,
                reporter,
                self.token.clone(),
            );

            match acquisition.run() {
                Ok(exit) => return Ok(offset_exit(exit, completed)),
                Err(AgentError::StartMeasurement(e))
                    if self.config.acquisition.restart_on_start_failure =>
                {
                    completed += acquisition.cycles();
                    restarts += 1;
                    warn!(
                        "Start measurement failed ({}), restarting the sensor session (restart {})",
                        e, restarts
                    );
                    driver = acquisition.into_handle().into_driver();
                    if !self.token.sleep(restart_delay) {
                        return Ok(LoopExit::Cancelled { cycles: completed });
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Count cycles of earlier sessions in the exit of the current one
fn offset_exit(exit: LoopExit, completed: u64) -> LoopExit {
    match exit {
        LoopExit::Cancelled { cycles } => LoopExit::Cancelled {
            cycles: cycles + completed,
        },
        LoopExit::CyclesCompleted(cycles) => LoopExit::CyclesCompleted(cycles + completed),
    }
}
