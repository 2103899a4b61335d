//! Named, calibrated servos on a shared PCA9685.
//!
//! [`ServoController`] maps logical servo names to PWM channels through a
//! [`CalibrationTable`] and turns angle or pulse requests into duty writes.
//! Out-of-range requests are clamped silently to the servo's limits.
//!
//! All methods take `&self`: the controller can be shared between caller threads
//! (for example behind an `Arc`). Each request holds the bus for the whole of its
//! register sequence, so writes to one channel land in call order and two
//! servos never interleave register writes.
//!
//! # Example
//!
//! ```no_run
//! # fn example<I2C: embedded_hal::i2c::I2c>(i2c: I2C) -> robot_actuators::Result<()> {
//! use robot_actuators::calibration::{ActuatorSpec, CalibrationTable};
//! use robot_actuators::pca9685::Pca9685;
//! use robot_actuators::servo::ServoController;
//!
//! let calibration = CalibrationTable::new([
//!     ActuatorSpec::new("wrist", 3, 500.0, 2_500.0).with_default_angle(90.0),
//!     ActuatorSpec::new("claw", 4, 500.0, 2_500.0).with_angles(10.0, 170.0),
//! ])?;
//! let pwm = Pca9685::builder().frequency_hz(50.0).build(i2c, embassy_time::Delay)?;
//! let servos = ServoController::new(pwm, calibration);
//!
//! servos.move_to_angle("wrist", 45.0)?;   // Move to 45 degrees
//! servos.move_to_pulse("claw", 1_200.0)?; // Raw pulse, clamped to the claw's limits
//! servos.home_all()?;                     // Every servo back to its default angle
//! # Ok(())
//! # }
//! ```

use std::sync::{Mutex, PoisonError};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::{debug, info};

use crate::calibration::{ActuatorSpec, CalibrationTable};
use crate::pca9685::Pca9685;
use crate::{Error, Result};

/// Calibrated servos sharing one PCA9685.
///
/// See the [module documentation](mod@crate::servo) for usage.
pub struct ServoController<I2C, D> {
    calibration: CalibrationTable,
    driver: Mutex<Pca9685<I2C, D>>,
}

impl<I2C: I2c, D: DelayNs> ServoController<I2C, D> {
    /// Wrap an initialized driver. The driver's current frequency is used for
    /// every pulse-to-duty conversion.
    #[must_use]
    pub fn new(driver: Pca9685<I2C, D>, calibration: CalibrationTable) -> Self {
        Self {
            calibration,
            driver: Mutex::new(driver),
        }
    }

    /// Move `name` to `degrees`, clamped to its angle limits. Returns the pulse (µs) commanded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActuator`] without touching the bus if `name` is not
    /// calibrated, or [`Error::Bus`] if the register write fails.
    pub fn move_to_angle(&self, name: &str, degrees: f32) -> Result<f32> {
        let spec = self.calibration.get(name)?;
        let pulse_us = spec.pulse_for_angle(degrees);
        debug!("servo {name}: {degrees}° -> {pulse_us}µs");
        self.write_pulse(spec, pulse_us)?;
        Ok(pulse_us)
    }

    /// Move the servo wired to `channel` to `degrees`, as [`move_to_angle`](Self::move_to_angle).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActuator`] without touching the bus if no servo is
    /// calibrated on `channel`, or [`Error::Bus`] if the register write fails.
    pub fn move_channel_to_angle(&self, channel: u8, degrees: f32) -> Result<f32> {
        let spec = self
            .calibration
            .by_channel(channel)
            .ok_or_else(|| Error::UnknownActuator(format!("channel {channel}")))?;
        let pulse_us = spec.pulse_for_angle(degrees);
        debug!("servo {} (channel {channel}): {degrees}° -> {pulse_us}µs", spec.name());
        self.write_pulse(spec, pulse_us)?;
        Ok(pulse_us)
    }

    /// Move `name` to a raw pulse width, clamped to its pulse limits. Returns the pulse (µs) commanded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActuator`] without touching the bus if `name` is not
    /// calibrated, or [`Error::Bus`] if the register write fails.
    pub fn move_to_pulse(&self, name: &str, pulse_us: f32) -> Result<f32> {
        let spec = self.calibration.get(name)?;
        let pulse_us = spec.clamp_pulse(pulse_us);
        self.write_pulse(spec, pulse_us)?;
        Ok(pulse_us)
    }

    /// Move every servo to its default angle, in declaration order.
    ///
    /// A failure on one servo does not stop the rest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Home`] listing every servo that failed.
    pub fn home_all(&self) -> Result<()> {
        info!("homing {} servo(s)", self.calibration.len());
        self.move_each(self.calibration.iter().map(|spec| (spec, spec.default_angle())))
    }

    /// Move every servo at once; `angles[i]` belongs to the `i`th declared servo.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AngleCountMismatch`] (with no bus traffic) if the lengths differ,
    /// or [`Error::Home`] listing every servo that failed.
    pub fn move_all(&self, angles: &[f32]) -> Result<()> {
        if angles.len() != self.calibration.len() {
            return Err(Error::AngleCountMismatch {
                expected: self.calibration.len(),
                actual: angles.len(),
            });
        }
        self.move_each(self.calibration.iter().zip(angles.iter().copied()))
    }

    /// Stop driving `name` (duty 0) so it can move freely.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActuator`] or [`Error::Bus`].
    pub fn relax(&self, name: &str) -> Result<()> {
        let spec = self.calibration.get(name)?;
        self.with_driver(|driver| driver.set_channel(spec.channel(), 0))
    }

    /// Pulse width (µs) `move_to_angle(name, degrees)` would command. No bus traffic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActuator`] if `name` is not calibrated.
    pub fn pulse_for_angle(&self, name: &str, degrees: f32) -> Result<f32> {
        Ok(self.calibration.get(name)?.pulse_for_angle(degrees))
    }

    /// PCA9685 channel wired to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActuator`] if `name` is not calibrated.
    pub fn channel(&self, name: &str) -> Result<u8> {
        Ok(self.calibration.get(name)?.channel())
    }

    /// Last duty value written to `name`'s channel, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActuator`] if `name` is not calibrated.
    pub fn last_duty(&self, name: &str) -> Result<Option<u16>> {
        let channel = self.channel(name)?;
        self.with_driver(|driver| Ok(driver.last_duty(channel)))
    }

    /// Reprogram the shared PWM frequency. Returns the frequency actually produced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if a register access fails.
    pub fn set_frequency(&self, frequency_hz: f32) -> Result<f32> {
        self.with_driver(|driver| driver.set_frequency(frequency_hz))
    }

    /// The calibration this controller was built with.
    #[must_use]
    pub const fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    /// Give back the driver (and through it, the bus).
    pub fn release(self) -> Pca9685<I2C, D> {
        self.driver.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn move_each<'a>(&self, targets: impl Iterator<Item = (&'a ActuatorSpec, f32)>) -> Result<()> {
        let failures: Vec<(String, Error)> = targets
            .filter_map(|(spec, degrees)| {
                self.write_pulse(spec, spec.pulse_for_angle(degrees))
                    .err()
                    .map(|err| (spec.name().to_owned(), err))
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            for (name, err) in &failures {
                debug!("servo {name}: {err}");
            }
            Err(Error::Home(failures))
        }
    }

    fn write_pulse(&self, spec: &ActuatorSpec, pulse_us: f32) -> Result<()> {
        self.with_driver(|driver| {
            let duty = driver.pulse_to_duty(pulse_us);
            driver.set_channel(spec.channel(), duty)
        })
    }

    /// Run `f` with exclusive access to the driver. A panic in another caller
    /// leaves the bus usable; its state is reported by the next transaction.
    fn with_driver<R>(&self, f: impl FnOnce(&mut Pca9685<I2C, D>) -> Result<R>) -> Result<R> {
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut driver)
    }
}
