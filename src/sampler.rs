//! The measurement loop.
//!
//! A [`Sampler`] owns both converters and the sink. It runs on the calling thread, one blocking
//! cycle after another, until its [`StopSignal`] is raised or something fails that the
//! configured policies do not absorb:
//!
//! ```text
//! Running --stop raised--> Stopping --sink flushed--> Stopped
//!    |                                                   ^
//!    '--------------- unrecoverable error ---------------'
//! ```

use std::mem;
use std::slice;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use embedded_hal::spi::SpiDevice;
use mcp3201::{Mcp3201, RawSample};
use tracing::{debug, info, warn};

use crate::config::{Settings, SinkPolicy};
use crate::error::{SamplerError, TransportError};
use crate::power::PowerReading;
use crate::record::{MeasurementRecord, Sink};
use crate::Channel;

#[derive(Debug, Default)]
struct StopState {
    raised: Mutex<bool>,
    wake: Condvar,
}

/// Cooperative stop request, shared between the loop and whoever wants it to end.
///
/// Raising it also wakes a loop that is waiting out its sample interval.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<StopState>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Returns `true` if it was already raised.
    pub fn raise(&self) -> bool {
        let mut raised = self.lock();
        let already = mem::replace(&mut *raised, true);
        self.0.wake.notify_all();

        already
    }

    pub fn is_raised(&self) -> bool {
        *self.lock()
    }

    /// Blocks for up to `timeout`, returning as soon as the signal is raised. Returns whether
    /// it is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let raised = self.lock();
        let (raised, _) = self
            .0
            .wake
            .wait_timeout_while(raised, timeout, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);

        *raised
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0.raised.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Stopping,
    Stopped,
}

/// Loop parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub vref: f64,
    pub sample_interval: Duration,
    /// Extra attempts per read. Zero makes any bus error fatal.
    pub retries: u32,
    pub sink_policy: SinkPolicy,
    pub measurement: String,
    /// Log every reading at INFO instead of DEBUG.
    pub echo: bool,
}

impl From<&Settings> for Options {
    fn from(settings: &Settings) -> Self {
        Self {
            vref: settings.vref,
            sample_interval: settings.sample_interval,
            retries: settings.retries,
            sink_policy: settings.sink_policy,
            measurement: settings.measurement.clone(),
            echo: settings.echo,
        }
    }
}

/// Counters reported when the loop ends cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    /// Cycles in which both channels were read.
    pub cycles: u64,
    pub records: u64,
    pub dropped: u64,
}

pub struct Sampler<V, C, K> {
    voltage: Mcp3201<V>,
    current: Mcp3201<C>,
    sink: K,
    options: Options,
    stop: StopSignal,
    state: State,
    summary: Summary,
}

impl<V, C, K> Sampler<V, C, K>
where
    V: SpiDevice,
    C: SpiDevice,
    K: Sink,
{
    pub fn new(
        voltage: Mcp3201<V>,
        current: Mcp3201<C>,
        sink: K,
        options: Options,
        stop: StopSignal,
    ) -> Self {
        Self {
            voltage,
            current,
            sink,
            options,
            stop,
            state: State::Running,
            summary: Summary::default(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Samples until stopped. Both converters are released when this returns, whatever the
    /// outcome.
    pub fn run(mut self) -> Result<Summary, SamplerError> {
        info!(
            vref = self.options.vref,
            interval_ms = self.options.sample_interval.as_millis() as u64,
            retries = self.options.retries,
            "Sampling started"
        );

        while self.state != State::Stopped {
            self.step()?;
        }

        info!(
            cycles = self.summary.cycles,
            records = self.summary.records,
            dropped = self.summary.dropped,
            "Sampling stopped"
        );

        Ok(self.summary)
    }

    fn step(&mut self) -> Result<(), SamplerError> {
        match self.state {
            State::Running => {
                if self.stop.is_raised() {
                    self.state = State::Stopping;
                    return Ok(());
                }

                if let Err(err) = self.cycle() {
                    self.state = State::Stopped;

                    if let Err(flush_err) = self.sink.flush() {
                        warn!(error = %flush_err, "Failed to flush sink while aborting");
                    }

                    return Err(err);
                }

                if !self.options.sample_interval.is_zero() {
                    self.stop.wait_timeout(self.options.sample_interval);
                }
            }
            State::Stopping => {
                debug!("Stop requested, flushing sink");
                self.state = State::Stopped;
                self.sink.flush()?;
            }
            State::Stopped => {}
        }

        Ok(())
    }

    fn cycle(&mut self) -> Result<(), SamplerError> {
        let retries = self.options.retries;
        let voltage = read_channel(&mut self.voltage, Channel::Voltage, retries)?;
        let current = read_channel(&mut self.current, Channel::Current, retries)?;

        self.summary.cycles += 1;

        if self.stop.is_raised() {
            debug!("Stop requested mid-cycle, discarding reading");
            return Ok(());
        }

        let reading = PowerReading::from_samples(voltage, current, self.options.vref);

        if self.options.echo {
            info!("{reading}");
        } else {
            debug!(
                voltage = reading.voltage,
                current = reading.current,
                power = reading.power,
                "Sampled"
            );
        }

        let record = MeasurementRecord::new(&*self.options.measurement, Utc::now(), reading.power);

        match self.sink.write_points(slice::from_ref(&record)) {
            Ok(()) => self.summary.records += 1,
            Err(err) => match self.options.sink_policy {
                SinkPolicy::Abort => return Err(err.into()),
                SinkPolicy::Drop => {
                    warn!(error = %err, "Dropping record");
                    self.summary.dropped += 1;
                }
            },
        }

        Ok(())
    }
}

/// Reads one converter, trying up to `retries` more times before giving up on it.
fn read_channel<S: SpiDevice>(
    adc: &mut Mcp3201<S>,
    channel: Channel,
    retries: u32,
) -> Result<RawSample, TransportError> {
    let mut attempts = 0;

    loop {
        attempts += 1;

        match adc.read() {
            Ok(sample) => return Ok(sample),
            Err(err) if attempts <= retries => {
                warn!(%channel, attempts, error = ?err, "Read failed, retrying");
            }
            Err(err) => return Err(TransportError::exchange(channel, attempts, &err)),
        }
    }
}
