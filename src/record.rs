//! Time-series records and the sinks that accept them.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::SinkError;

/// Field every record carries its value under.
pub const VALUE_FIELD: &str = "value";

/// Timestamps are written at second resolution.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One point for the time-series store.
///
/// `time` is when the value was computed, not when the converters sampled; the two differ by
/// the length of the read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    pub measurement: String,
    #[serde(serialize_with = "serialize_time")]
    pub time: DateTime<Utc>,
    pub fields: BTreeMap<String, f64>,
}

impl MeasurementRecord {
    /// A record with a single `value` field.
    pub fn new(measurement: impl Into<String>, time: DateTime<Utc>, value: f64) -> Self {
        Self {
            measurement: measurement.into(),
            time,
            fields: BTreeMap::from([(VALUE_FIELD.to_string(), value)]),
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.fields.get(VALUE_FIELD).copied()
    }
}

fn serialize_time<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&time.format(TIME_FORMAT))
}

/// Somewhere to send records.
pub trait Sink {
    /// Accepts a batch of records.
    fn write_points(&mut self, records: &[MeasurementRecord]) -> Result<(), SinkError>;

    /// Pushes out anything buffered.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write_points(&mut self, records: &[MeasurementRecord]) -> Result<(), SinkError> {
        (**self).write_points(records)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

/// Writes each record as one line of JSON.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn write_points(&mut self, records: &[MeasurementRecord]) -> Result<(), SinkError> {
        for record in records {
            let mut line = serde_json::to_vec(record)?;
            line.push(b'\n');

            self.writer.write_all(&line)?;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
