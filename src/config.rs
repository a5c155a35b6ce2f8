//! Command-line configuration and its validation.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::ConfigError;

/// The clock the converters are driven at unless told otherwise.
pub const DEFAULT_CLOCK_HZ: u32 = 1_500_000;

/// Fastest clock the MCP3201 accepts, at a 5 V supply.
pub const MAX_CLOCK_HZ: u32 = 1_600_000;

/// Upper bound on `--retries`.
pub const MAX_RETRIES: u32 = 1_000;

/// One of the two SPI controllers exposed on the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusId(u8);

impl BusId {
    pub fn new(bus: u8) -> Result<Self, ConfigError> {
        match bus {
            0 | 1 => Ok(Self(bus)),
            _ => Err(ConfigError::Bus(bus)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Chip-select line CE0 or CE1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChipSelect(u8);

impl ChipSelect {
    pub fn new(chip_select: u8) -> Result<Self, ConfigError> {
        match chip_select {
            0 | 1 => Ok(Self(chip_select)),
            _ => Err(ConfigError::ChipSelect(chip_select)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Where one converter sits: a bus and the chip-select line that addresses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    pub bus: BusId,
    pub chip_select: ChipSelect,
}

impl DeviceAddress {
    pub fn new(bus: u8, chip_select: u8) -> Result<Self, ConfigError> {
        Ok(Self {
            bus: BusId::new(bus)?,
            chip_select: ChipSelect::new(chip_select)?,
        })
    }
}

/// What to do when the sink refuses a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SinkPolicy {
    /// Stop sampling and exit with an error.
    #[default]
    Abort,
    /// Log the failure, discard the record and keep sampling.
    Drop,
}

/// Sample a voltage/current pair from two MCP3201 converters and log the power.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// SPI controller both converters are attached to (0 or 1)
    #[arg(long, env = "POWERLOG_BUS", default_value_t = 0)]
    pub bus: u8,

    /// Chip-select line of the voltage converter (0 or 1)
    #[arg(long, env = "POWERLOG_VOLTAGE_CS", default_value_t = 0)]
    pub voltage_chip_select: u8,

    /// Chip-select line of the current converter (0 or 1)
    #[arg(long, env = "POWERLOG_CURRENT_CS", default_value_t = 1)]
    pub current_chip_select: u8,

    /// Voltage on the converters' VREF pin, in volts
    #[arg(long, env = "POWERLOG_VREF")]
    pub vref: f64,

    /// Delay between measurement cycles, in milliseconds
    #[arg(long, env = "POWERLOG_SAMPLE_INTERVAL_MS", default_value_t = 10)]
    pub sample_interval_ms: u64,

    /// SPI clock rate, in hertz
    #[arg(long, env = "POWERLOG_CLOCK_HZ", default_value_t = DEFAULT_CLOCK_HZ)]
    pub clock_hz: u32,

    /// Extra attempts for a failed read before the channel is treated as down
    #[arg(long, env = "POWERLOG_RETRIES", default_value_t = 0)]
    pub retries: u32,

    /// What to do when a record cannot be written
    #[arg(
        long,
        value_enum,
        env = "POWERLOG_ON_SINK_ERROR",
        default_value_t = SinkPolicy::Abort
    )]
    pub on_sink_error: SinkPolicy,

    /// Append records to this file instead of writing them to stdout
    #[arg(long, env = "POWERLOG_OUTPUT", conflicts_with = "influx_url")]
    pub output: Option<PathBuf>,

    /// Write records to this InfluxDB server, e.g. http://localhost:8086
    #[arg(long, env = "POWERLOG_INFLUX_URL", requires = "database")]
    pub influx_url: Option<String>,

    /// InfluxDB database to write into
    #[arg(long, env = "POWERLOG_DATABASE", requires = "influx_url")]
    pub database: Option<String>,

    /// InfluxDB user name
    #[arg(long, env = "POWERLOG_INFLUX_USERNAME", requires = "influx_password")]
    pub influx_username: Option<String>,

    /// InfluxDB password
    #[arg(
        long,
        env = "POWERLOG_INFLUX_PASSWORD",
        hide_env_values = true,
        requires = "influx_username"
    )]
    pub influx_password: Option<String>,

    /// Metric name of the emitted records
    #[arg(long, env = "POWERLOG_MEASUREMENT", default_value = "power")]
    pub measurement: String,

    /// Log every reading as `voltage V & current A = power W`
    #[arg(long, env = "POWERLOG_ECHO")]
    pub echo: bool,
}

/// An InfluxDB 1.x database reachable over HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxTarget {
    pub url: String,
    pub database: String,
    /// User name and password.
    pub credentials: Option<(String, String)>,
}

/// Where records go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SinkTarget {
    #[default]
    Stdout,
    File(PathBuf),
    Influx(InfluxTarget),
}

/// Checked settings, ready to open devices with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub voltage: DeviceAddress,
    pub current: DeviceAddress,
    pub vref: f64,
    pub sample_interval: Duration,
    pub clock_hz: u32,
    pub retries: u32,
    pub sink_policy: SinkPolicy,
    pub sink: SinkTarget,
    pub measurement: String,
    pub echo: bool,
}

impl Args {
    /// Checks every value without touching any hardware.
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let voltage = DeviceAddress::new(self.bus, self.voltage_chip_select)?;
        let current = DeviceAddress::new(self.bus, self.current_chip_select)?;

        if voltage == current {
            return Err(ConfigError::SharedChipSelect(self.voltage_chip_select));
        }

        if !self.vref.is_finite() || self.vref <= 0.0 {
            return Err(ConfigError::ReferenceVoltage(self.vref));
        }

        if self.clock_hz == 0 || self.clock_hz > MAX_CLOCK_HZ {
            return Err(ConfigError::ClockRate {
                hz: self.clock_hz,
                max: MAX_CLOCK_HZ,
            });
        }

        if self.retries > MAX_RETRIES {
            return Err(ConfigError::Retries {
                retries: self.retries,
                max: MAX_RETRIES,
            });
        }

        if self.measurement.trim().is_empty() {
            return Err(ConfigError::Measurement(self.measurement));
        }

        let sink = match (self.output, self.influx_url, self.database) {
            (_, Some(url), Some(database)) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InfluxUrl(url));
                }

                if database.trim().is_empty() {
                    return Err(ConfigError::Database(database));
                }

                SinkTarget::Influx(InfluxTarget {
                    url,
                    database,
                    credentials: self.influx_username.zip(self.influx_password),
                })
            }
            (Some(path), _, _) => SinkTarget::File(path),
            _ => SinkTarget::Stdout,
        };

        Ok(Settings {
            voltage,
            current,
            vref: self.vref,
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            clock_hz: self.clock_hz,
            retries: self.retries,
            sink_policy: self.on_sink_error,
            sink,
            measurement: self.measurement,
            echo: self.echo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Settings, ConfigError> {
        let argv = std::iter::once("powerlog").chain(args.iter().copied());
        Args::try_parse_from(argv).unwrap().validate()
    }

    #[test]
    fn defaults_match_reference_wiring() {
        let settings = parse(&["--vref", "5.0"]).unwrap();

        assert_eq!(settings.voltage, DeviceAddress::new(0, 0).unwrap());
        assert_eq!(settings.current, DeviceAddress::new(0, 1).unwrap());
        assert_eq!(settings.vref, 5.0);
        assert_eq!(settings.sample_interval, Duration::from_millis(10));
        assert_eq!(settings.clock_hz, 1_500_000);
        assert_eq!(settings.retries, 0);
        assert_eq!(settings.sink_policy, SinkPolicy::Abort);
        assert_eq!(settings.sink, SinkTarget::Stdout);
        assert_eq!(settings.measurement, "power");
        assert!(!settings.echo);
    }

    #[test]
    fn vref_has_no_default() {
        assert!(Args::try_parse_from(["powerlog"]).is_err());
    }

    #[test]
    fn rejects_out_of_range_addresses() {
        assert_eq!(DeviceAddress::new(2, 0), Err(ConfigError::Bus(2)));
        assert_eq!(DeviceAddress::new(0, 5), Err(ConfigError::ChipSelect(5)));

        assert_eq!(parse(&["--vref", "5", "--bus", "2"]), Err(ConfigError::Bus(2)));
        assert_eq!(
            parse(&["--vref", "5", "--current-chip-select", "5"]),
            Err(ConfigError::ChipSelect(5))
        );
    }

    #[test]
    fn rejects_shared_chip_select() {
        assert_eq!(
            parse(&["--vref", "5", "--current-chip-select", "0"]),
            Err(ConfigError::SharedChipSelect(0))
        );
    }

    #[test]
    fn rejects_bad_reference_voltage() {
        assert_eq!(
            parse(&["--vref", "0"]),
            Err(ConfigError::ReferenceVoltage(0.0))
        );
        assert_eq!(
            parse(&["--vref=-3.3"]),
            Err(ConfigError::ReferenceVoltage(-3.3))
        );
        assert!(matches!(
            parse(&["--vref", "inf"]),
            Err(ConfigError::ReferenceVoltage(_))
        ));
    }

    #[test]
    fn rejects_clock_outside_converter_limits() {
        assert_eq!(
            parse(&["--vref", "3.3", "--clock-hz", "0"]),
            Err(ConfigError::ClockRate {
                hz: 0,
                max: MAX_CLOCK_HZ
            })
        );
        assert!(parse(&["--vref", "3.3", "--clock-hz", "2000000"]).is_err());
        assert!(parse(&["--vref", "3.3", "--clock-hz", "1600000"]).is_ok());
    }

    #[test]
    fn sink_policy_and_output_are_parsed() {
        let settings = parse(&[
            "--vref",
            "3.3",
            "--on-sink-error",
            "drop",
            "--output",
            "/tmp/power.jsonl",
            "--retries",
            "3",
        ])
        .unwrap();

        assert_eq!(settings.sink_policy, SinkPolicy::Drop);
        assert_eq!(
            settings.sink,
            SinkTarget::File(PathBuf::from("/tmp/power.jsonl"))
        );
        assert_eq!(settings.retries, 3);
    }

    #[test]
    fn retries_are_capped() {
        assert!(parse(&["--vref", "5", "--retries", "1000"]).is_ok());
        assert_eq!(
            parse(&["--vref", "5", "--retries", "4294967295"]),
            Err(ConfigError::Retries {
                retries: u32::MAX,
                max: MAX_RETRIES
            })
        );
    }

    #[test]
    fn rejects_blank_measurement() {
        assert_eq!(
            parse(&["--vref", "5", "--measurement", ""]),
            Err(ConfigError::Measurement(String::new()))
        );
        assert!(parse(&["--vref", "5", "--measurement", "  "]).is_err());
    }

    #[test]
    fn influx_target_is_parsed() {
        let settings = parse(&[
            "--vref",
            "5",
            "--influx-url",
            "http://localhost:8086",
            "--database",
            "pi2",
            "--influx-username",
            "root",
            "--influx-password",
            "root",
            "--echo",
        ])
        .unwrap();

        assert_eq!(
            settings.sink,
            SinkTarget::Influx(InfluxTarget {
                url: "http://localhost:8086".to_string(),
                database: "pi2".to_string(),
                credentials: Some(("root".to_string(), "root".to_string())),
            })
        );
        assert!(settings.echo);
    }

    #[test]
    fn influx_options_are_checked() {
        let argv = ["powerlog", "--vref", "5", "--influx-url", "http://db:8086"];
        assert!(Args::try_parse_from(argv).is_err(), "database is required");

        let argv = [
            "powerlog",
            "--vref",
            "5",
            "--influx-url",
            "http://db:8086",
            "--database",
            "pi2",
            "--output",
            "/tmp/power.jsonl",
        ];
        assert!(Args::try_parse_from(argv).is_err(), "output conflicts");

        assert_eq!(
            parse(&["--vref", "5", "--influx-url", "db:8086", "--database", "pi2"]),
            Err(ConfigError::InfluxUrl("db:8086".to_string()))
        );
        assert_eq!(
            parse(&["--vref", "5", "--influx-url", "http://db", "--database", ""]),
            Err(ConfigError::Database(String::new()))
        );
    }
}
