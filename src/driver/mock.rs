// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Scripted mock driver
//!
//! Every call is answered from a script prepared up front and recorded in a
//! shared call log, so a test can hand the driver to the agent and inspect
//! afterwards which commands were issued and in which order. Once a script
//! queue runs dry the mock answers with a successful default.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use log::trace;

use super::{DriverError, DriverResult, Reading, SensorDriver, Transport, VersionInfo};
use crate::measurement::Sample;

/// Command issued to a [`MockSensor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCall {
    Probe,
    ReadVersion,
    ReadSerial,
    SetAutoCleanDays(u8),
    StartMeasurement,
    StopMeasurement,
    ReadSample,
    Sleep,
    WakeUp,
}

/// Scripted answer to a "read sample" call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptedRead {
    Ok(Sample),
    Flagged(Sample, u8),
    Fail(i16),
}

/// Shared, cloneable view on the commands a mock received
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<SensorCall>>>);

impl CallLog {
    fn record(&self, call: SensorCall) {
        trace!("mock sensor call: {:?}", call);
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }

    /// Snapshot of all calls so far
    pub fn calls(&self) -> Vec<SensorCall> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, call: SensorCall) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }
}

/// Default sample served once the reading script is exhausted
pub fn default_sample() -> Sample {
    Sample::from_channels([5.0, 6.0, 7.0, 8.0, 30.0, 36.0, 38.0, 39.0, 40.0, 0.5])
}

/// Scripted sensor driver
pub struct MockSensor {
    log: CallLog,
    version: Option<VersionInfo>,
    serial: Option<String>,
    probe_failures: u32,
    auto_clean_error: Option<i16>,
    start_script: VecDeque<Result<(), i16>>,
    reads: VecDeque<ScriptedRead>,
    stop_error: Option<i16>,
    sleep_error: Option<i16>,
    wake_error: Option<i16>,
}

impl MockSensor {
    /// Mock of a healthy firmware 2.2 sensor
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            version: Some(VersionInfo {
                firmware_major: 2,
                firmware_minor: 2,
                hardware_revision: 7,
                protocol_major: 2,
                protocol_minor: 0,
            }),
            serial: Some("MOCK0123456789ABCDEF".to_string()),
            probe_failures: 0,
            auto_clean_error: None,
            start_script: VecDeque::new(),
            reads: VecDeque::new(),
            stop_error: None,
            sleep_error: None,
            wake_error: None,
        }
    }

    /// Version answered by `read_version`; `None` makes the call fail
    pub fn with_version(mut self, version: Option<VersionInfo>) -> Self {
        self.version = version;
        self
    }

    /// Shortcut for a sensor with the given firmware major version
    pub fn with_firmware_major(self, major: u8) -> Self {
        self.with_version(Some(VersionInfo {
            firmware_major: major,
            firmware_minor: 0,
            hardware_revision: 7,
            protocol_major: 2,
            protocol_minor: 0,
        }))
    }

    /// Serial answered by `read_serial`; `None` makes the call fail
    pub fn with_serial(mut self, serial: Option<&str>) -> Self {
        self.serial = serial.map(str::to_string);
        self
    }

    /// Fail the first `count` probes
    pub fn failing_probes(mut self, count: u32) -> Self {
        self.probe_failures = count;
        self
    }

    pub fn failing_auto_clean(mut self, code: i16) -> Self {
        self.auto_clean_error = Some(code);
        self
    }

    /// Queue the outcomes of successive `start_measurement` calls
    pub fn with_start_results<I>(mut self, results: I) -> Self
    where
        I: IntoIterator<Item = Result<(), i16>>,
    {
        self.start_script.extend(results);
        self
    }

    /// Queue the answers of successive `read_sample` calls
    pub fn with_reads<I>(mut self, reads: I) -> Self
    where
        I: IntoIterator<Item = ScriptedRead>,
    {
        self.reads.extend(reads);
        self
    }

    pub fn failing_stop(mut self, code: i16) -> Self {
        self.stop_error = Some(code);
        self
    }

    pub fn failing_sleep(mut self, code: i16) -> Self {
        self.sleep_error = Some(code);
        self
    }

    pub fn failing_wake(mut self, code: i16) -> Self {
        self.wake_error = Some(code);
        self
    }

    /// Handle on the call log that stays valid after the mock is moved
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new()
    }
}

fn outcome(error: Option<i16>) -> DriverResult<()> {
    match error {
        Some(code) => Err(DriverError::Code(code)),
        None => Ok(()),
    }
}

impl SensorDriver for MockSensor {
    fn probe(&mut self) -> DriverResult<()> {
        self.log.record(SensorCall::Probe);
        if self.probe_failures > 0 {
            self.probe_failures -= 1;
            return Err(DriverError::Code(-1));
        }
        Ok(())
    }

    fn read_version(&mut self) -> DriverResult<VersionInfo> {
        self.log.record(SensorCall::ReadVersion);
        self.version.ok_or(DriverError::Code(-2))
    }

    fn read_serial(&mut self) -> DriverResult<String> {
        self.log.record(SensorCall::ReadSerial);
        self.serial.clone().ok_or(DriverError::Code(-3))
    }

    fn set_auto_clean_days(&mut self, days: u8) -> DriverResult<()> {
        self.log.record(SensorCall::SetAutoCleanDays(days));
        outcome(self.auto_clean_error)
    }

    fn start_measurement(&mut self) -> DriverResult<()> {
        self.log.record(SensorCall::StartMeasurement);
        match self.start_script.pop_front() {
            Some(Err(code)) => Err(DriverError::Code(code)),
            _ => Ok(()),
        }
    }

    fn stop_measurement(&mut self) -> DriverResult<()> {
        self.log.record(SensorCall::StopMeasurement);
        outcome(self.stop_error)
    }

    fn read_sample(&mut self) -> DriverResult<Reading> {
        self.log.record(SensorCall::ReadSample);
        match self.reads.pop_front() {
            Some(ScriptedRead::Ok(sample)) => Ok(Reading::ok(sample)),
            Some(ScriptedRead::Flagged(sample, state)) => Ok(Reading::flagged(sample, state)),
            Some(ScriptedRead::Fail(code)) => Err(DriverError::Code(code)),
            None => Ok(Reading::ok(default_sample())),
        }
    }

    fn sleep(&mut self) -> DriverResult<()> {
        self.log.record(SensorCall::Sleep);
        outcome(self.sleep_error)
    }

    fn wake_up(&mut self) -> DriverResult<()> {
        self.log.record(SensorCall::WakeUp);
        outcome(self.wake_error)
    }
}

/// Counters shared between a [`MockTransport`] and the test observing it
#[derive(Debug, Clone, Default)]
pub struct TransportCounters {
    opens: Arc<AtomicU32>,
    closes: Arc<AtomicU32>,
}

impl TransportCounters {
    /// Number of `open` attempts, failed ones included
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Scripted transport
pub struct MockTransport {
    counters: TransportCounters,
    open_failures: u32,
    close_error: Option<i16>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            counters: TransportCounters::default(),
            open_failures: 0,
            close_error: None,
        }
    }

    /// Fail the first `count` open attempts
    pub fn failing_opens(mut self, count: u32) -> Self {
        self.open_failures = count;
        self
    }

    pub fn failing_close(mut self, code: i16) -> Self {
        self.close_error = Some(code);
        self
    }

    pub fn counters(&self) -> TransportCounters {
        self.counters.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> DriverResult<()> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        if self.open_failures > 0 {
            self.open_failures -= 1;
            return Err(DriverError::Unavailable("mock link not ready".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        outcome(self.close_error)
    }
}
