//! SPI transport on a Raspberry Pi, through the kernel spidev driver.

use mcp3201::Mcp3201;
use rppal::spi::{Bus, Mode, SimpleHalSpiDevice, SlaveSelect, Spi};
use tracing::info;

use crate::config::{BusId, ChipSelect, DeviceAddress};
use crate::error::TransportError;
use crate::Channel;

/// One hardware chip-select line on one bus. The kernel drives CE, so no GPIO or bus sharing
/// is involved.
pub type SpiLink = SimpleHalSpiDevice<Spi>;

fn bus(id: BusId) -> Bus {
    match id.get() {
        0 => Bus::Spi0,
        _ => Bus::Spi1,
    }
}

fn slave_select(id: ChipSelect) -> SlaveSelect {
    match id.get() {
        0 => SlaveSelect::Ss0,
        _ => SlaveSelect::Ss1,
    }
}

/// Opens the converter at `address` in SPI mode 0 with 8-bit words.
pub fn open(
    channel: Channel,
    address: DeviceAddress,
    clock_hz: u32,
) -> Result<Mcp3201<SpiLink>, TransportError> {
    let open_error = |err: rppal::spi::Error| TransportError::Open {
        channel,
        bus: address.bus.get(),
        chip_select: address.chip_select.get(),
        source: Box::new(err),
    };

    let spi = Spi::new(
        bus(address.bus),
        slave_select(address.chip_select),
        clock_hz,
        Mode::Mode0,
    )
    .map_err(open_error)?;

    spi.set_bits_per_word(8).map_err(open_error)?;

    info!(
        %channel,
        bus = address.bus.get(),
        chip_select = address.chip_select.get(),
        clock_hz,
        "Opened converter"
    );

    Ok(Mcp3201::new(SimpleHalSpiDevice::new(spi)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_map_to_spidev_nodes() {
        let address = DeviceAddress::new(0, 1).unwrap();
        assert_eq!(bus(address.bus), Bus::Spi0);
        assert_eq!(slave_select(address.chip_select), SlaveSelect::Ss1);

        let address = DeviceAddress::new(1, 0).unwrap();
        assert_eq!(bus(address.bus), Bus::Spi1);
        assert_eq!(slave_select(address.chip_select), SlaveSelect::Ss0);
    }
}
