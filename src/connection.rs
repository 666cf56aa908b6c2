// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Link lifetime management
//!
//! The [`ConnectionManager`] owns the policy for bringing the transport up:
//! opening is retried with a fixed delay until it succeeds. The open transport
//! is handed out as a [`Link`], which must be closed explicitly.

use log::{info, warn};

use crate::driver::{DriverResult, Transport};
use crate::error::Result;
use crate::utility::{CancellationToken, RetryPolicy};

/// An open transport
pub struct Link<T: Transport> {
    transport: T,
    open_attempts: u32,
}

impl<T: Transport> Link<T> {
    /// Number of attempts it took to open the link
    pub fn open_attempts(&self) -> u32 {
        self.open_attempts
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the link, returning the transport's verdict
    pub fn close(mut self) -> DriverResult<()> {
        self.transport.close()
    }
}

/// Opens and closes the transport
#[derive(Debug, Clone, Copy)]
pub struct ConnectionManager {
    policy: RetryPolicy,
}

impl ConnectionManager {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Open `transport`, retrying on failure according to the policy.
    ///
    /// With the default unbounded policy this only returns an error when
    /// `token` is cancelled.
    pub fn open<T: Transport>(
        &self,
        mut transport: T,
        token: &CancellationToken,
    ) -> Result<Link<T>> {
        let retried = self.policy.run("open link", token, || transport.open())?;
        info!("Link open after {} attempt(s)", retried.attempts);
        Ok(Link {
            transport,
            open_attempts: retried.attempts,
        })
    }

    /// Close `link`. A failure is reported as a warning and returned.
    pub fn close<T: Transport>(&self, link: Link<T>) -> DriverResult<()> {
        let result = link.close();
        match &result {
            Ok(()) => info!("Link closed"),
            Err(e) => warn!("failed to close link: {}", e),
        }
        result
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
