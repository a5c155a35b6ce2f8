//! Turns the two channel readings into voltage, current and power.
//!
//! The current sensor is wired inverting: its output falls as current rises. That is a property
//! of the sensor on this board, not of the converter, so the flip happens here rather than in
//! the driver.

use std::fmt;

use mcp3201::RawSample;

/// Mirrors a code about mid-scale, `4095 - raw`.
pub fn invert(raw: RawSample) -> RawSample {
    raw.inverted()
}

/// Converts a code from an inverting sensor, so that code 0 reads as `vref`.
pub fn inverted_to_voltage(raw: RawSample, vref: f64) -> f64 {
    invert(raw).to_voltage(vref)
}

/// One derived measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
}

impl PowerReading {
    /// Scales both codes against `vref`, inverting the current channel.
    pub fn from_samples(voltage: RawSample, current: RawSample, vref: f64) -> Self {
        let voltage = voltage.to_voltage(vref);
        let current = inverted_to_voltage(current, vref);

        Self {
            voltage,
            current,
            power: voltage * current,
        }
    }
}

impl fmt::Display for PowerReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4} V & {:.4} A = {:.4} W",
            self.voltage, self.current, self.power
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp3201::MAX_CODE;

    fn sample(code: u16) -> RawSample {
        RawSample::new(code).unwrap()
    }

    #[test]
    fn invert_mirrors_the_scale() {
        assert_eq!(invert(RawSample::MIN), RawSample::MAX);
        assert_eq!(invert(RawSample::MAX), RawSample::MIN);
        assert_eq!(invert(sample(2112)), sample(1983));
    }

    #[test]
    fn inverted_conversion_hits_both_ends() {
        for vref in [5.0, 3.3] {
            assert_eq!(inverted_to_voltage(RawSample::MIN, vref), vref);
            assert_eq!(inverted_to_voltage(RawSample::MAX, vref), 0.0);
        }
    }

    #[test]
    fn inverted_conversion_composes_with_plain_conversion() {
        for code in (0..=MAX_CODE).step_by(13) {
            let raw = sample(code);

            assert_eq!(
                inverted_to_voltage(raw, 5.0),
                sample(MAX_CODE - code).to_voltage(5.0)
            );
        }
    }

    #[test]
    fn reading_multiplies_voltage_by_inverted_current() {
        let reading = PowerReading::from_samples(RawSample::MAX, RawSample::MIN, 5.0);
        assert_eq!(reading.voltage, 5.0);
        assert_eq!(reading.current, 5.0);
        assert_eq!(reading.power, 25.0);

        let reading = PowerReading::from_samples(RawSample::MAX, RawSample::MAX, 5.0);
        assert_eq!(reading.current, 0.0);
        assert_eq!(reading.power, 0.0);

        let reading = PowerReading::from_samples(sample(2112), sample(2112), 5.0);
        let expected = (2112.0 * 5.0 / 4095.0) * (1983.0 * 5.0 / 4095.0);
        assert!((reading.power - expected).abs() < 1e-9);
    }

    #[test]
    fn reading_displays_as_console_line() {
        let reading = PowerReading::from_samples(RawSample::MAX, RawSample::MIN, 5.0);

        assert_eq!(reading.to_string(), "5.0000 V & 5.0000 A = 25.0000 W");
    }
}
