use embedded_hal::spi::SpiDevice;

use crate::{decode, RawSample, FRAME_LEN};

/// MCP3201 driver
pub struct Mcp3201<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Mcp3201<SPI> {
    /// Creates a new driver from an SPI peripheral.
    /// Please ensure the SPI bus is in SPI mode 0 or 3, aka (0, 0) or (1, 1), clocked no faster
    /// than the converter allows for its supply (1.6 MHz at 5 V).
    pub fn new(spi: SPI) -> Self {
        spi.into()
    }

    /// Runs one conversion and returns the 12 bit code.
    ///
    /// Any error from the SPI device is returned as-is; there is no retry at this level.
    pub fn read(&mut self) -> Result<RawSample, SPI::Error> {
        // The chip ignores MOSI, so the outgoing bytes are don't-care.
        let mut frame = [0u8; FRAME_LEN];

        self.spi.transfer_in_place(&mut frame)?;

        Ok(decode(frame))
    }

    /// Runs one conversion and scales it against `vref`, in volts.
    pub fn read_voltage(&mut self, vref: f64) -> Result<f64, SPI::Error> {
        Ok(self.read()?.to_voltage(vref))
    }

    /// Gives back the SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> From<SPI> for Mcp3201<SPI> {
    fn from(spi: SPI) -> Self {
        Self { spi }
    }
}
