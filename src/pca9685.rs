//! Register-level driver for the PCA9685 16-channel, 12-bit PWM expander.
//!
//! The driver speaks plain `embedded-hal` I²C, so it runs against `/dev/i2c-*`
//! (see the `linux` feature) or any recording bus in tests. Every call is one or
//! more blocking register transactions; nothing is buffered.
//!
//! Only the ON-time registers of a channel are programmed. All channels share
//! phase 0, so the duty value is the one number that describes a channel.
//!
//! # Example
//!
//! ```no_run
//! # fn example<I2C: embedded_hal::i2c::I2c>(i2c: I2C) -> robot_actuators::Result<()> {
//! use robot_actuators::pca9685::Pca9685;
//!
//! let mut pwm = Pca9685::builder()
//!     .address(0x40)
//!     .frequency_hz(50.0)
//!     .build(i2c, embassy_time::Delay)?;
//!
//! let duty = pwm.pulse_to_duty(1_500.0); // 1.5 ms at 50 Hz
//! pwm.set_channel(0, duty)?;
//! # Ok(())
//! # }
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::debug;

use crate::{Error, Result};

/// Number of PWM outputs on one PCA9685.
pub const CHANNEL_COUNT: usize = 16;

/// Largest 12-bit duty value.
pub const DUTY_MAX: u16 = 4_095;

/// Ticks in one PWM period.
pub const TICKS_PER_PERIOD: u16 = 4_096;

/// Factory-default 7-bit I²C address.
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Internal oscillator frequency from the datasheet.
pub const OSCILLATOR_HZ_DEFAULT: u32 = 25_000_000;

/// Smallest prescale the chip accepts.
pub const PRESCALE_MIN: u8 = 3;

/// Largest prescale (slowest output frequency).
pub const PRESCALE_MAX: u8 = 255;

// Oscillator start-up time after leaving sleep.
const OSCILLATOR_SETTLE_US: u32 = 500;

mod register {
    pub const MODE1: u8 = 0x00;
    pub const LED0_ON_L: u8 = 0x06;
    pub const PRESCALE: u8 = 0xFE;
}

mod mode1 {
    pub const RESTART: u8 = 0x80;
    pub const SLEEP: u8 = 0x10;
}

/// Prescale register value for `frequency_hz`, clamped to `PRESCALE_MIN..=PRESCALE_MAX`.
///
/// `prescale = round(oscillator_hz / (4096 * frequency_hz) - 1)`.
/// Zero, negative, and NaN frequencies select the slowest setting.
#[must_use]
pub fn prescale_for(oscillator_hz: u32, frequency_hz: f32) -> u8 {
    let raw = (oscillator_hz as f32 / (f32::from(TICKS_PER_PERIOD) * frequency_hz) - 1.0).round();
    if raw.is_nan() || (raw < 0.0 && frequency_hz <= 0.0) {
        return PRESCALE_MAX;
    }
    raw.clamp(f32::from(PRESCALE_MIN), f32::from(PRESCALE_MAX)) as u8
}

/// Output frequency produced by `prescale`.
#[must_use]
pub fn frequency_for(oscillator_hz: u32, prescale: u8) -> f32 {
    oscillator_hz as f32 / (f32::from(TICKS_PER_PERIOD) * (f32::from(prescale) + 1.0))
}

/// Configuration collected before the chip is reset.
///
/// See the [module documentation](mod@crate::pca9685) for usage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pca9685Builder {
    address: u8,
    oscillator_hz: u32,
    frequency_hz: Option<f32>,
}

impl Default for Pca9685Builder {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            oscillator_hz: OSCILLATOR_HZ_DEFAULT,
            frequency_hz: None,
        }
    }
}

impl Pca9685Builder {
    /// 7-bit I²C address (default [`DEFAULT_ADDRESS`]).
    #[must_use]
    pub const fn address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Oscillator frequency used for prescale and duty math (default [`OSCILLATOR_HZ_DEFAULT`]).
    #[must_use]
    pub const fn oscillator_hz(mut self, oscillator_hz: u32) -> Self {
        self.oscillator_hz = oscillator_hz;
        self
    }

    /// Program this output frequency right after the reset.
    #[must_use]
    pub const fn frequency_hz(mut self, frequency_hz: f32) -> Self {
        self.frequency_hz = Some(frequency_hz);
        self
    }

    /// Reset the chip and, if requested, program the output frequency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if any register access fails.
    pub fn build<I2C: I2c, D: DelayNs>(self, i2c: I2C, delay: D) -> Result<Pca9685<I2C, D>> {
        let mut pca9685 = Pca9685 {
            i2c,
            delay,
            address: self.address,
            oscillator_hz: self.oscillator_hz,
            frequency_hz: frequency_for(self.oscillator_hz, PRESCALE_MAX),
            duty: [None; CHANNEL_COUNT],
        };
        pca9685.soft_reset()?;
        if let Some(frequency_hz) = self.frequency_hz {
            pca9685.set_frequency(frequency_hz)?;
        }
        Ok(pca9685)
    }
}

/// A PCA9685 on an I²C bus.
///
/// Owns the bus handle for its lifetime; [`release`](Self::release) hands it back.
pub struct Pca9685<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    oscillator_hz: u32,
    frequency_hz: f32,
    duty: [Option<u16>; CHANNEL_COUNT],
}

impl Pca9685<(), ()> {
    /// Start configuring a driver.
    #[must_use]
    pub fn builder() -> Pca9685Builder {
        Pca9685Builder::default()
    }
}

impl<I2C: I2c, D: DelayNs> Pca9685<I2C, D> {
    /// Reset the chip at `address` with the default oscillator and no frequency change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if any register access fails.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Result<Self> {
        Pca9685::builder().address(address).build(i2c, delay)
    }

    /// Put the chip in a known state: sleep, wait for the oscillator, load the
    /// slowest prescale, and wake up again.
    fn soft_reset(&mut self) -> Result<()> {
        debug!("pca9685@{:#04x}: soft reset", self.address);
        self.write_register(register::MODE1, mode1::SLEEP)?;
        self.delay.delay_us(OSCILLATOR_SETTLE_US);
        self.write_register(register::PRESCALE, PRESCALE_MAX)?;
        let mode = self.read_register(register::MODE1)?;
        self.write_register(register::MODE1, mode & !mode1::SLEEP)?;
        self.frequency_hz = frequency_for(self.oscillator_hz, PRESCALE_MAX);
        Ok(())
    }

    /// Program the output frequency shared by all 16 channels.
    ///
    /// The prescale can only change while the oscillator sleeps, so the chip is
    /// put to sleep, reprogrammed, and woken. Returns the frequency actually
    /// produced after clamping the prescale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if any register access fails.
    pub fn set_frequency(&mut self, frequency_hz: f32) -> Result<f32> {
        let prescale = prescale_for(self.oscillator_hz, frequency_hz);
        let mode = self.read_register(register::MODE1)?;
        let asleep = (mode & !mode1::RESTART) | mode1::SLEEP;
        self.write_register(register::MODE1, asleep)?;
        self.write_register(register::PRESCALE, prescale)?;
        self.write_register(register::MODE1, asleep & !mode1::SLEEP)?;
        self.delay.delay_us(OSCILLATOR_SETTLE_US);

        self.frequency_hz = frequency_for(self.oscillator_hz, prescale);
        debug!(
            "pca9685@{:#04x}: prescale={} requested={}Hz actual={}Hz",
            self.address, prescale, frequency_hz, self.frequency_hz
        );
        Ok(self.frequency_hz)
    }

    /// Write the 12-bit on-time of `channel`. Duty values above [`DUTY_MAX`] are clamped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChannel`] (with no bus traffic) for channels past 15,
    /// or [`Error::Bus`] if a register write fails.
    pub fn set_channel(&mut self, channel: u8, duty: u16) -> Result<()> {
        if usize::from(channel) >= CHANNEL_COUNT {
            return Err(Error::InvalidChannel(channel));
        }
        let duty = duty.min(DUTY_MAX);
        let [low, high] = duty.to_le_bytes();
        let on_l = register::LED0_ON_L + 4 * channel;
        self.write_register(on_l, low)?;
        self.write_register(on_l + 1, high)?;
        self.duty[usize::from(channel)] = Some(duty);
        debug!("pca9685@{:#04x}: channel {} duty={}", self.address, channel, duty);
        Ok(())
    }

    /// Convert a pulse width (µs) to a duty value at the current frequency.
    #[must_use]
    pub fn pulse_to_duty(&self, pulse_us: f32) -> u16 {
        let ticks = pulse_us * f32::from(TICKS_PER_PERIOD) * self.frequency_hz / 1_000_000.0;
        if ticks.is_nan() {
            return 0;
        }
        ticks.round().clamp(0.0, f32::from(DUTY_MAX)) as u16
    }

    /// Output frequency currently programmed.
    #[must_use]
    pub const fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }

    /// 7-bit I²C address.
    #[must_use]
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Last duty value written to `channel` by this driver, if any.
    ///
    /// This is a software shadow; the chip is never read back.
    #[must_use]
    pub fn last_duty(&self, channel: u8) -> Option<u16> {
        self.duty.get(usize::from(channel)).copied().flatten()
    }

    /// Give back the bus and delay handles.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|err| Error::i2c(&err))
    }

    fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut value)
            .map_err(|err| Error::i2c(&err))?;
        Ok(value[0])
    }
}
