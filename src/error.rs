//! Error types for configuration, bus transport and record output.

use embedded_hal::spi::ErrorKind;
use thiserror::Error;

use crate::Channel;

/// Rejected settings. Raised before any device is opened.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid SPI bus: {0} (use 0 or 1)")]
    Bus(u8),

    #[error("Invalid chip select: {0} (use 0 for CE0 or 1 for CE1)")]
    ChipSelect(u8),

    #[error("Voltage and current channels both use chip select {0}")]
    SharedChipSelect(u8),

    #[error("Invalid reference voltage: {0} V (must be a positive number)")]
    ReferenceVoltage(f64),

    #[error("Invalid SPI clock: {hz} Hz (must be between 1 and {max} Hz)")]
    ClockRate { hz: u32, max: u32 },

    #[error("Too many retries: {retries} (at most {max})")]
    Retries { retries: u32, max: u32 },

    #[error("Invalid measurement name: {0:?} (must not be blank)")]
    Measurement(String),

    #[error("Invalid InfluxDB URL: {0:?} (must start with http:// or https://)")]
    InfluxUrl(String),

    #[error("Invalid InfluxDB database name: {0:?} (must not be blank)")]
    Database(String),
}

/// The serial link could not be opened or a transaction did not complete.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open SPI{bus} CE{chip_select} for the {channel} channel")]
    Open {
        channel: Channel,
        bus: u8,
        chip_select: u8,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{channel} channel read failed after {attempts} attempt(s): {kind:?}: {detail}")]
    Exchange {
        channel: Channel,
        attempts: u32,
        kind: ErrorKind,
        detail: String,
    },
}

impl TransportError {
    /// Wraps a failed transaction from any `embedded-hal` SPI device.
    pub fn exchange<E: embedded_hal::spi::Error>(channel: Channel, attempts: u32, err: &E) -> Self {
        Self::Exchange {
            channel,
            attempts,
            kind: err.kind(),
            detail: format!("{err:?}"),
        }
    }

    /// The channel that failed.
    pub fn channel(&self) -> Channel {
        match self {
            Self::Open { channel, .. } | Self::Exchange { channel, .. } => *channel,
        }
    }
}

/// A record could not be handed to the time-series sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Field {field:?} of {measurement:?} is not a finite number")]
    NonFinite { measurement: String, field: String },

    #[error("Record {0:?} has no fields")]
    NoFields(String),

    #[error("InfluxDB answered {status}: {body}")]
    Http { status: u16, body: String },

    #[error("InfluxDB unreachable: {0}")]
    Transport(#[source] Box<ureq::Transport>),
}

/// Why the sampling loop stopped early.
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Sink rejected a record: {0}")]
    Sink(#[from] SinkError),
}
