// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition loop
//!
//! Drives the sensor through its measurement cycle:
//!
//! ```text
//! Idle -> Measuring -> Averaging -> Resting { asleep } -> Idle
//! ```
//!
//! - **Measuring**: a batch of samples is read at a fixed cadence. Failed and
//!   device-flagged reads are kept in their slot as invalid samples.
//! - **Averaging**: the batch is reduced and, when at least one sample was
//!   valid, one record is written by the [`Reporter`].
//! - **Resting**: measurement is stopped and, on firmware supporting it, the
//!   sensor is put to sleep until the next cycle.
//!
//! Failing to start a measurement is the only fatal condition. Every other
//! device failure is logged and the cycle goes on.

mod state;

pub use state::{AcquisitionState, CycleStats, LoopExit};

use std::io::Write;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, error, info, warn};

use crate::aggregation::{create_aggregator, Aggregator};
use crate::config::AcquisitionConfig;
use crate::driver::SensorDriver;
use crate::error::{AgentError, Result};
use crate::measurement::{Batch, Sample};
use crate::reporter::Reporter;
use crate::session::{SensorHandle, SessionContext};
use crate::utility::CancellationToken;

/// Measurement cycle state machine
///
/// Owns the sensor handle for its whole lifetime; records go to a reporter
/// borrowed from the caller so the output survives a session restart.
pub struct AcquisitionLoop<'link, 'out, D: SensorDriver, W: Write> {
    handle: SensorHandle<'link, D>,
    context: SessionContext,
    samples_per_batch: usize,
    sample_interval: Duration,
    rest_period: Duration,
    max_cycles: Option<u64>,
    aggregator: Box<dyn Aggregator>,
    reporter: &'out mut Reporter<W>,
    token: CancellationToken,
    state: AcquisitionState,
    cycles: u64,
}

impl<'link, 'out, D: SensorDriver, W: Write> AcquisitionLoop<'link, 'out, D, W> {
    pub fn new(
        handle: SensorHandle<'link, D>,
        context: SessionContext,
        config: &AcquisitionConfig,
        reporter: &'out mut Reporter<W>,
        token: CancellationToken,
    ) -> Self {
        Self {
            handle,
            context,
            samples_per_batch: config.samples_per_batch,
            sample_interval: config.sample_interval(),
            rest_period: config.rest_period(),
            max_cycles: config.max_cycles,
            aggregator: create_aggregator(),
            reporter,
            token,
            state: AcquisitionState::Idle,
            cycles: 0,
        }
    }

    /// Replace the default mean aggregator
    pub fn with_aggregator(mut self, aggregator: Box<dyn Aggregator>) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Number of cycles that went through averaging
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Give the sensor handle back once the loop is over
    pub fn into_handle(self) -> SensorHandle<'link, D> {
        self.handle
    }

    /// Run cycles until cancelled, until `max_cycles` is reached, or until a
    /// measurement cannot be started.
    pub fn run(&mut self) -> Result<LoopExit> {
        info!(
            "Acquisition started: {} samples every {:?}, rest {:?}",
            self.samples_per_batch, self.sample_interval, self.rest_period
        );

        loop {
            if let Some(max) = self.max_cycles {
                if self.cycles >= max {
                    info!("Acquisition finished after {} cycle(s)", self.cycles);
                    return Ok(LoopExit::CyclesCompleted(self.cycles));
                }
            }
            if self.token.is_cancelled() {
                info!("Acquisition cancelled after {} cycle(s)", self.cycles);
                return Ok(LoopExit::Cancelled {
                    cycles: self.cycles,
                });
            }
            self.run_cycle()?;
        }
    }

    /// Run one full cycle starting from [`AcquisitionState::Idle`]
    pub fn run_cycle(&mut self) -> Result<CycleStats> {
        let mut stats = CycleStats {
            cycle: self.cycles + 1,
            ..CycleStats::default()
        };

        if let Err(e) = self.handle.driver_mut().start_measurement() {
            error!("error {} starting measurement", e.code());
            return Err(AgentError::StartMeasurement(e));
        }
        info!("measurements started");
        self.transition(AcquisitionState::Measuring);

        let batch = self.collect_batch(&mut stats);
        stats.collected = batch.len();
        stats.valid = batch.valid_count();
        stats.complete = batch.is_complete();

        if !stats.complete {
            info!(
                "Cycle {} interrupted after {} of {} samples, nothing reported",
                stats.cycle, stats.collected, self.samples_per_batch
            );
            self.stop_measurement();
            self.transition(AcquisitionState::Idle);
            return Ok(stats);
        }

        self.transition(AcquisitionState::Averaging);
        let reading = self.aggregator.aggregate_batch(&batch);
        match self.reporter.report(&reading, Utc::now()) {
            Ok(reported) => stats.reported = reported,
            Err(e) => {
                error!("failed to write measurement record: {}", e);
                self.stop_measurement();
                self.transition(AcquisitionState::Idle);
                return Err(AgentError::Output(e));
            }
        }
        self.cycles += 1;

        info!(
            "Cycle {}: {} valid, {} invalid ({} read errors, {} flagged), {}",
            stats.cycle,
            stats.valid,
            stats.invalid(),
            stats.failed,
            stats.flagged,
            if stats.reported {
                "reported"
            } else {
                "nothing reported"
            }
        );

        self.stop_measurement();

        if self.max_cycles.is_some_and(|max| self.cycles >= max) {
            self.transition(AcquisitionState::Idle);
            return Ok(stats);
        }

        self.rest();
        Ok(stats)
    }

    fn transition(&mut self, next: AcquisitionState) {
        if self.state != next {
            debug!("Acquisition state: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Read up to one batch. Stops early, leaving the batch incomplete, when
    /// the token is cancelled.
    fn collect_batch(&mut self, stats: &mut CycleStats) -> Batch {
        let mut batch = Batch::with_capacity(self.samples_per_batch);
        let mut read_started = Instant::now();

        for index in 0..self.samples_per_batch {
            if index > 0 {
                let wait = self.sample_interval.saturating_sub(read_started.elapsed());
                if !self.token.sleep(wait) {
                    break;
                }
            } else if self.token.is_cancelled() {
                break;
            }

            read_started = Instant::now();
            let sample = self.read_slot(index, stats);
            batch.push(sample);
        }

        batch
    }

    fn read_slot(&mut self, index: usize, stats: &mut CycleStats) -> Sample {
        match self.handle.driver_mut().read_sample() {
            Err(e) => {
                warn!("error {} reading sample {}", e.code(), index);
                stats.failed += 1;
                Sample::invalid()
            }
            Ok(reading) => {
                let sample = reading.sample;
                debug!(
                    "sample {}: pm1.0 {:.2} pm2.5 {:.2} pm4.0 {:.2} pm10.0 {:.2} \
                     nc0.5 {:.2} nc1.0 {:.2} nc2.5 {:.2} nc4.5 {:.2} nc10.0 {:.2} tps {:.3}",
                    index,
                    sample.mc_1p0,
                    sample.mc_2p5,
                    sample.mc_4p0,
                    sample.mc_10p0,
                    sample.nc_0p5,
                    sample.nc_1p0,
                    sample.nc_2p5,
                    sample.nc_4p5,
                    sample.nc_10p0,
                    sample.typical_particle_size
                );
                match reading.device_status {
                    Some(state) => {
                        warn!(
                            "chip state {} on sample {}, measurement may not be accurate",
                            state, index
                        );
                        stats.flagged += 1;
                        sample.invalidated()
                    }
                    None => sample,
                }
            }
        }
    }

    fn stop_measurement(&mut self) {
        match self.handle.driver_mut().stop_measurement() {
            Ok(()) => debug!("measurements stopped"),
            Err(e) => warn!("error {} stopping measurement", e.code()),
        }
    }

    fn rest(&mut self) {
        let sleep_supported = self.context.supports_sleep();
        let mut asleep = false;
        if sleep_supported {
            match self.handle.driver_mut().sleep() {
                Ok(()) => asleep = true,
                Err(e) => warn!("error {} putting the sensor to sleep", e.code()),
            }
        }
        self.transition(AcquisitionState::Resting { asleep });

        info!("No measurements for {:?}", self.rest_period);
        if !self.token.sleep(self.rest_period) {
            debug!("Rest interrupted by cancellation");
        }

        if sleep_supported {
            if let Err(e) = self.handle.driver_mut().wake_up() {
                warn!("error {} waking up the sensor", e.code());
            }
        }
        self.transition(AcquisitionState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionManager, Link};
    use crate::driver::mock::{default_sample, CallLog, MockSensor, MockTransport, ScriptedRead};
    use crate::driver::SensorCall;
    use crate::session::SensorSession;
    use crate::utility::RetryPolicy;

    fn open_link() -> Link<MockTransport> {
        ConnectionManager::new(RetryPolicy::unbounded(Duration::ZERO))
            .open(MockTransport::new(), &CancellationToken::new())
            .unwrap()
    }

    fn config(samples: usize, cycles: u64) -> AcquisitionConfig {
        AcquisitionConfig {
            samples_per_batch: samples,
            sample_interval_ms: 0,
            rest_period_secs: 0,
            max_cycles: Some(cycles),
            restart_on_start_failure: false,
        }
    }

    fn sample(pm1: f32, tps: f32) -> Sample {
        let mut channels = [pm1; 10];
        channels[9] = tps;
        Sample::from_channels(channels)
    }

    /// Run `cycles` cycles of `samples` samples against `sensor` and return
    /// the primary output along with the call log.
    fn run_loop(
        sensor: MockSensor,
        samples: usize,
        cycles: u64,
    ) -> (Result<LoopExit>, String, CallLog) {
        let log = sensor.call_log();
        let link = open_link();
        let token = CancellationToken::new();
        let session = SensorSession::new(RetryPolicy::unbounded(Duration::ZERO), 4);
        let (handle, context) = session.establish(&link, sensor, &token).unwrap();

        let mut reporter = Reporter::new(Vec::new());
        let result = AcquisitionLoop::new(
            handle,
            context,
            &config(samples, cycles),
            &mut reporter,
            token,
        )
        .run();

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        (result, out, log)
    }

    #[test]
    fn test_invalid_samples_excluded_from_record() {
        let sensor = MockSensor::new().with_reads([
            ScriptedRead::Ok(sample(2.0, 1.5)),
            ScriptedRead::Ok(sample(50.0, -1.0)),
            ScriptedRead::Ok(sample(4.0, 2.5)),
        ]);
        let (result, out, _) = run_loop(sensor, 3, 1);

        assert_eq!(result.unwrap(), LoopExit::CyclesCompleted(1));
        let fields: Vec<&str> = out.trim_end().split('\t').collect();
        assert_eq!(fields.len(), 11);
        assert_eq!(fields[1], "3");
        assert_eq!(fields[10], "2000");
    }

    #[test]
    fn test_all_invalid_batch_emits_nothing() {
        let sensor = MockSensor::new().with_reads([
            ScriptedRead::Ok(sample(1.0, -1.0)),
            ScriptedRead::Fail(-2),
        ]);
        let (result, out, log) = run_loop(sensor, 2, 1);

        assert_eq!(result.unwrap(), LoopExit::CyclesCompleted(1));
        assert!(out.is_empty());
        assert_eq!(log.count(SensorCall::StopMeasurement), 1);
    }

    #[test]
    fn test_flagged_reads_are_discarded() {
        let sensor = MockSensor::new().with_reads([
            ScriptedRead::Flagged(sample(100.0, 0.9), 4),
            ScriptedRead::Ok(sample(10.0, 0.5)),
        ]);
        let (_, out, _) = run_loop(sensor, 2, 1);

        let fields: Vec<&str> = out.trim_end().split('\t').collect();
        assert_eq!(fields[1], "10");
        assert_eq!(fields[10], "500");
    }

    #[test]
    fn test_cycle_stats() {
        let sensor = MockSensor::new().with_reads([
            ScriptedRead::Fail(-1),
            ScriptedRead::Flagged(default_sample(), 2),
            ScriptedRead::Ok(sample(1.0, -1.0)),
            ScriptedRead::Ok(default_sample()),
        ]);
        let link = open_link();
        let token = CancellationToken::new();
        let (handle, context) = SensorSession::default()
            .establish(&link, sensor, &token)
            .unwrap();
        let mut reporter = Reporter::new(Vec::new());
        let mut acquisition =
            AcquisitionLoop::new(handle, context, &config(4, 1), &mut reporter, token);

        let stats = acquisition.run_cycle().unwrap();
        assert_eq!(stats.cycle, 1);
        assert_eq!(stats.collected, 4);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.invalid(), 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.flagged, 1);
        assert!(stats.reported);
        assert!(stats.complete);
        assert_eq!(acquisition.state(), AcquisitionState::Idle);
        assert_eq!(acquisition.cycles(), 1);
    }

    #[test]
    fn test_sleep_and_wake_between_cycles() {
        let (result, out, log) = run_loop(MockSensor::new(), 2, 3);

        assert_eq!(result.unwrap(), LoopExit::CyclesCompleted(3));
        assert_eq!(out.lines().count(), 3);
        assert_eq!(log.count(SensorCall::StartMeasurement), 3);
        assert_eq!(log.count(SensorCall::StopMeasurement), 3);
        // no rest after the last cycle
        assert_eq!(log.count(SensorCall::Sleep), 2);
        assert_eq!(log.count(SensorCall::WakeUp), 2);
    }

    #[test]
    fn test_no_sleep_on_old_or_unknown_firmware() {
        for sensor in [
            MockSensor::new().with_firmware_major(1),
            MockSensor::new().with_version(None),
        ] {
            let (result, _, log) = run_loop(sensor, 1, 5);
            assert_eq!(result.unwrap(), LoopExit::CyclesCompleted(5));
            assert_eq!(log.count(SensorCall::Sleep), 0);
            assert_eq!(log.count(SensorCall::WakeUp), 0);
        }
    }

    #[test]
    fn test_device_command_failures_are_not_fatal() {
        let sensor = MockSensor::new()
            .failing_stop(-3)
            .failing_sleep(-4)
            .failing_wake(-5);
        let (result, out, log) = run_loop(sensor, 2, 2);

        assert_eq!(result.unwrap(), LoopExit::CyclesCompleted(2));
        assert_eq!(out.lines().count(), 2);
        assert_eq!(log.count(SensorCall::WakeUp), 1);
    }

    #[test]
    fn test_start_failure_is_fatal() {
        let sensor = MockSensor::new().with_start_results([Ok(()), Err(-16)]);
        let (result, out, log) = run_loop(sensor, 2, 5);

        match result {
            Err(AgentError::StartMeasurement(e)) => assert_eq!(e.code(), -16),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(out.lines().count(), 1);
        assert_eq!(log.count(SensorCall::StartMeasurement), 2);
        assert_eq!(log.count(SensorCall::ReadSample), 2);
    }

    #[test]
    fn test_cadence_kept_after_failed_reads() {
        let sensor = MockSensor::new().with_reads([ScriptedRead::Fail(-1); 4]);
        let log = sensor.call_log();
        let link = open_link();
        let token = CancellationToken::new();
        let (handle, context) = SensorSession::default()
            .establish(&link, sensor, &token)
            .unwrap();

        let mut config = config(4, 1);
        config.sample_interval_ms = 40;
        let mut reporter = Reporter::new(Vec::new());
        let mut acquisition = AcquisitionLoop::new(handle, context, &config, &mut reporter, token);

        let started = Instant::now();
        let stats = acquisition.run_cycle().unwrap();
        let elapsed = started.elapsed();

        assert_eq!(stats.failed, 4);
        assert!(!stats.reported);
        assert_eq!(log.count(SensorCall::ReadSample), 4);
        // one delay between each pair of reads, none after the last
        assert!(elapsed >= Duration::from_millis(3 * 40), "{:?}", elapsed);
    }

    #[test]
    fn test_cancelled_before_first_cycle() {
        let link = open_link();
        let token = CancellationToken::new();
        let sensor = MockSensor::new();
        let log = sensor.call_log();
        let (handle, context) = SensorSession::default()
            .establish(&link, sensor, &token)
            .unwrap();

        token.cancel();
        let mut reporter = Reporter::new(Vec::new());
        let exit = AcquisitionLoop::new(
            handle,
            context,
            &AcquisitionConfig::default(),
            &mut reporter,
            token,
        )
        .run()
        .unwrap();

        assert_eq!(exit, LoopExit::Cancelled { cycles: 0 });
        assert_eq!(log.count(SensorCall::StartMeasurement), 0);
    }

    #[test]
    fn test_cancelled_mid_batch_stops_measurement() {
        let link = open_link();
        let token = CancellationToken::new();
        let sensor = MockSensor::new();
        let log = sensor.call_log();
        let (handle, context) = SensorSession::default()
            .establish(&link, sensor, &token)
            .unwrap();

        let mut config = config(1000, 1);
        config.sample_interval_ms = 10;
        let canceller = token.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let mut reporter = Reporter::new(Vec::new());
        let mut acquisition = AcquisitionLoop::new(handle, context, &config, &mut reporter, token);
        let exit = acquisition.run().unwrap();
        stopper.join().unwrap();

        assert_eq!(exit, LoopExit::Cancelled { cycles: 0 });
        assert!(log.count(SensorCall::ReadSample) < 1000);
        assert_eq!(log.count(SensorCall::StopMeasurement), 1);
        drop(acquisition);
        assert_eq!(reporter.records(), 0);
    }
}
