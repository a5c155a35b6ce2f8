//! Samples a voltage and a current channel through two MCP3201 converters and logs the
//! resulting power as time-series records.

use std::fmt;

pub mod config;
pub mod error;
pub mod influx;
pub mod logging;
pub mod power;
pub mod record;
pub mod sampler;

#[cfg(feature = "raspberry_pi")]
pub mod raspberry_pi;

/// The quantity a converter is wired to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Voltage,
    Current,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voltage => f.write_str("voltage"),
            Self::Current => f.write_str("current"),
        }
    }
}
