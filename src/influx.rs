//! InfluxDB 1.x sink, writing line protocol over HTTP.

use std::fmt::Write as _;
use std::time::Duration;

use crate::config::InfluxTarget;
use crate::error::SinkError;
use crate::record::{MeasurementRecord, Sink};

/// How long one write may take, connect included.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Encodes one record as a line, with a timestamp in whole seconds.
pub fn encode_line(record: &MeasurementRecord) -> Result<String, SinkError> {
    if record.fields.is_empty() {
        return Err(SinkError::NoFields(record.measurement.clone()));
    }

    let mut line = escape(&record.measurement, &[',', ' ']);

    for (index, (field, value)) in record.fields.iter().enumerate() {
        if !value.is_finite() {
            return Err(SinkError::NonFinite {
                measurement: record.measurement.clone(),
                field: field.clone(),
            });
        }

        line.push(if index == 0 { ' ' } else { ',' });
        line.push_str(&escape(field, &[',', '=', ' ']));
        // Display never uses exponent notation and omits `.0`; both parse as floats.
        let _ = write!(line, "={value}");
    }

    let _ = write!(line, " {}", record.time.timestamp());

    Ok(line)
}

fn escape(name: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(name.len());

    for c in name.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

/// Posts each batch to `<url>/write?db=<database>&precision=s`.
pub struct InfluxSink {
    agent: ureq::Agent,
    write_url: String,
    database: String,
    credentials: Option<(String, String)>,
}

impl InfluxSink {
    pub fn new(target: &InfluxTarget) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(WRITE_TIMEOUT).build(),
            write_url: format!("{}/write", target.url.trim_end_matches('/')),
            database: target.database.clone(),
            credentials: target.credentials.clone(),
        }
    }
}

impl Sink for InfluxSink {
    fn write_points(&mut self, records: &[MeasurementRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let body = records
            .iter()
            .map(encode_line)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");

        let mut request = self
            .agent
            .post(&self.write_url)
            .query("db", &self.database)
            .query("precision", "s");

        if let Some((username, password)) = &self.credentials {
            request = request.query("u", username).query("p", password);
        }

        match request.send_string(&body) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(status, response)) => Err(SinkError::Http {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(SinkError::Transport(Box::new(transport))),
        }
    }
}
