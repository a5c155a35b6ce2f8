//! Provides a driver for a Microchip MCP3201 12-bit ADC via the `embedded-hal` ecosystem.
//!
//! The MCP3201 is a read-only converter: every transaction clocks a conversion out on MISO no
//! matter what the host sends. In MSB-first mode two received bytes carry, in order, two
//! undefined bits, the null bit, data bits B11..B0, and then B1 again as the first bit of the
//! LSB-first frame that the chip starts emitting straight afterwards.
//!
//! ```text
//!          b0                        b1
//! | ? | ? | 0 |B11|B10|B9 |B8 |B7 | |B6 |B5 |B4 |B3 |B2 |B1 |B0 |B1 |
//! '------ mask ----'                '----------- >> 1 ---------'
//! ```

#![no_std]
#![forbid(unsafe_code)]

pub mod mcp3201;

pub use mcp3201::Mcp3201;

/// Width of one conversion result.
pub const RESOLUTION_BITS: u32 = 12;

/// Highest output code, `2^12 - 1`. Full scale, i.e. the reference voltage.
pub const MAX_CODE: u16 = (1 << RESOLUTION_BITS) - 1;

/// Bytes exchanged per conversion.
pub const FRAME_LEN: usize = 2;

/// Keeps B11..B7 of the first byte, dropping the two undefined bits and the null bit.
pub const HIGH_BYTE_MASK: u8 = 0b0001_1111;

/// Moves B11..B7 into place above the 7 bits carried by the second byte.
pub const HIGH_BITS_SHIFT: u32 = 7;

/// Drops the trailing bit of the second byte, which already belongs to the LSB-first frame.
pub const LOW_BYTE_SHIFT: u32 = 1;

// 5 bits from the first byte plus 7 from the second must make exactly one sample.
const _: () = assert!(HIGH_BYTE_MASK.count_ones() + HIGH_BITS_SHIFT == RESOLUTION_BITS);
const _: () = assert!(u8::BITS - LOW_BYTE_SHIFT == HIGH_BITS_SHIFT);

/// A 12-bit output code in `0..=4095`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RawSample(u16);

impl RawSample {
    /// Zero scale.
    pub const MIN: Self = Self(0);

    /// Full scale.
    pub const MAX: Self = Self(MAX_CODE);

    /// Returns `None` if `code` does not fit in 12 bits.
    pub const fn new(code: u16) -> Option<Self> {
        if code <= MAX_CODE {
            Some(Self(code))
        } else {
            None
        }
    }

    /// The output code as a [`u16`].
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Mirrors the code about mid-scale, `4095 - code`. For sensors wired so that their output
    /// falls as the measured quantity rises.
    pub const fn inverted(self) -> Self {
        Self(MAX_CODE - self.0)
    }

    /// Maps the code linearly onto `0.0..=vref`.
    ///
    /// The divisor is [`MAX_CODE`], not `2^12`, so the top code reads back as exactly `vref`.
    pub fn to_voltage(self, vref: f64) -> f64 {
        match self.0 {
            MAX_CODE => vref,
            code => f64::from(code) * vref / f64::from(MAX_CODE),
        }
    }
}

impl From<RawSample> for u16 {
    fn from(sample: RawSample) -> Self {
        sample.0
    }
}

/// Extracts the sample from one MSB-first frame as received on MISO.
pub const fn decode(frame: [u8; FRAME_LEN]) -> RawSample {
    let high = ((frame[0] & HIGH_BYTE_MASK) as u16) << HIGH_BITS_SHIFT;
    let low = (frame[1] >> LOW_BYTE_SHIFT) as u16;

    RawSample(high | low)
}
