//! Bind the drivers to Linux `/dev/i2c-*` and `/dev/spidev*` devices.
//!
//! Enabled by the `linux` feature.

use linux_embedded_hal::spidev::{SpiModeFlags, Spidev, SpidevOptions};
use linux_embedded_hal::{Delay, I2cdev, SpidevBus};
use tracing::info;

use crate::config::{PwmBusConfig, RobotConfig};
use crate::led_strip::{LedStrip, StripConfig};
use crate::pca9685::Pca9685;
use crate::servo::ServoController;
use crate::Result;

/// A PCA9685 on a Linux I²C bus.
pub type LinuxPca9685 = Pca9685<I2cdev, Delay>;

/// Servos on a Linux I²C bus.
pub type LinuxServoController = ServoController<I2cdev, Delay>;

/// An LED strip on a Linux SPI device.
pub type LinuxLedStrip = LedStrip<SpidevBus>;

/// Open `/dev/i2c-{bus_number}`, reset the PCA9685 and program its frequency.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the device cannot be opened, or
/// [`Error::Bus`](crate::Error::Bus) if the chip does not answer.
pub fn open_pca9685(pwm_bus: &PwmBusConfig) -> Result<LinuxPca9685> {
    let path = format!("/dev/i2c-{}", pwm_bus.bus_number);
    let i2c = I2cdev::new(&path).map_err(std::io::Error::from)?;
    let pca9685 = pwm_bus.driver_builder().build(i2c, Delay)?;
    info!(
        "{path}: pca9685@{:#04x} at {} Hz",
        pca9685.address(),
        pca9685.frequency_hz()
    );
    Ok(pca9685)
}

/// Bring up every servo in `config`.
///
/// # Errors
///
/// As [`open_pca9685`].
pub fn open_servos(config: &RobotConfig) -> Result<LinuxServoController> {
    let pca9685 = open_pca9685(config.pwm_bus())?;
    Ok(ServoController::new(pca9685, config.calibration().clone()))
}

/// Open `/dev/spidev{bus}.{device}` in mode 0 at the clock the strip's packing needs.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the device cannot be opened or configured.
pub fn open_strip(strip: &StripConfig) -> Result<LinuxLedStrip> {
    let path = format!("/dev/spidev{}.{}", strip.bus_id(), strip.device_id());
    let mut spi = SpidevBus(Spidev::open(&path)?);
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(strip.spi_clock_hz())
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&options)?;
    info!(
        "{path}: {} pixels, {} order, {:?} packing at {} Hz",
        strip.pixel_count(),
        strip.channel_order(),
        strip.packing(),
        strip.spi_clock_hz()
    );
    Ok(LedStrip::new(spi, *strip))
}
