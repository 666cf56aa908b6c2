// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fixed-delay retry policy
//!
//! Opening the link and probing the sensor are retried with a fixed delay
//! between attempts. By default there is no attempt limit: the agent has no
//! useful work to do without a sensor, so it waits until one shows up or the
//! operator stops it.

use std::time::Duration;

use log::warn;

use super::CancellationToken;
use crate::config::RetryConfig;
use crate::driver::DriverResult;
use crate::error::{AgentError, Result};

/// Value produced by a retried operation, with the attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Fixed-delay retry policy with an optional attempt limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry forever with `delay` between attempts
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts),
        }
    }

    /// Run `op` until it succeeds, the attempt limit is reached, or `token` is cancelled.
    ///
    /// Each failure is reported with one warning before the delay. The token
    /// is checked before every attempt and during every delay.
    pub fn run<T, F>(
        &self,
        operation: &'static str,
        token: &CancellationToken,
        mut op: F,
    ) -> Result<Retried<T>>
    where
        F: FnMut() -> DriverResult<T>,
    {
        let mut attempts = 0u32;
        loop {
            if token.is_cancelled() {
                return Err(AgentError::Cancelled {
                    operation,
                    attempts,
                });
            }

            attempts += 1;
            let error = match op() {
                Ok(value) => return Ok(Retried { value, attempts }),
                Err(error) => error,
            };

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(AgentError::RetriesExhausted {
                    operation,
                    attempts,
                    source: error,
                });
            }

            warn!(
                "{} failed ({}), retrying in {:?} (attempt {})",
                operation, error, self.delay, attempts
            );
            if !token.sleep(self.delay) {
                return Err(AgentError::Cancelled {
                    operation,
                    attempts,
                });
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms),
            max_attempts: config.max_attempts,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverError;

    fn failing_then_ok(failures: u32) -> impl FnMut() -> DriverResult<u32> {
        let mut calls = 0;
        move || {
            calls += 1;
            if calls <= failures {
                Err(DriverError::Code(-1))
            } else {
                Ok(calls)
            }
        }
    }

    #[test]
    fn test_unbounded_retries_until_success() {
        let policy = RetryPolicy::unbounded(Duration::ZERO);
        let token = CancellationToken::new();
        let retried = policy.run("probe", &token, failing_then_ok(5)).unwrap();
        assert_eq!(retried.attempts, 6);
        assert_eq!(retried.value, 6);
    }

    #[test]
    fn test_bounded_policy_gives_up() {
        let policy = RetryPolicy::bounded(Duration::ZERO, 3);
        let token = CancellationToken::new();
        match policy.run("open link", &token, failing_then_ok(10)) {
            Err(AgentError::RetriesExhausted {
                operation,
                attempts,
                source,
            }) => {
                assert_eq!(operation, "open link");
                assert_eq!(attempts, 3);
                assert_eq!(source.code(), -1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_token_stops_before_first_attempt() {
        let policy = RetryPolicy::default();
        let token = CancellationToken::new();
        token.cancel();
        let mut called = false;
        let result = policy.run("probe", &token, || {
            called = true;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(AgentError::Cancelled { attempts: 0, .. })
        ));
        assert!(!called);
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetryConfig {
            delay_ms: 250,
            max_attempts: Some(4),
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy, RetryPolicy::bounded(Duration::from_millis(250), 4));
    }
}
