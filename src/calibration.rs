//! Per-servo calibration: channel, pulse limits, and angle limits.
//!
//! A [`CalibrationTable`] is built once at startup (usually from
//! [`RobotConfig`](crate::config::RobotConfig)) and never changes afterwards.
//! [`ServoController`](crate::servo::ServoController) consults it on every request.
//!
//! # Example
//!
//! ```
//! use robot_actuators::calibration::{ActuatorSpec, CalibrationTable};
//!
//! let table = CalibrationTable::new([
//!     ActuatorSpec::new("wrist", 3, 150.0, 600.0),
//!     ActuatorSpec::new("claw", 4, 500.0, 2_500.0).with_angles(10.0, 170.0),
//! ])?;
//!
//! let wrist = table.get("wrist")?;
//! assert_eq!(wrist.pulse_for_angle(90.0), 375.0);
//! # Ok::<(), robot_actuators::Error>(())
//! ```

use crate::pca9685::CHANNEL_COUNT;
use crate::{Error, Result};

/// Default lower angle limit (degrees) when the configuration omits `min_angle`.
pub const MIN_ANGLE_DEFAULT: f32 = 0.0;

/// Default upper angle limit (degrees) when the configuration omits `max_angle`.
pub const MAX_ANGLE_DEFAULT: f32 = 180.0;

/// Calibration for one servo on the PWM expander.
#[derive(Clone, Debug, PartialEq)]
pub struct ActuatorSpec {
    name: String,
    channel: u8,
    min_pulse_us: f32,
    max_pulse_us: f32,
    min_angle: f32,
    max_angle: f32,
    default_angle: f32,
}

impl ActuatorSpec {
    /// Describe a servo on `channel` with the given pulse limits (µs).
    ///
    /// Angle limits default to `0..=180` and the default angle to the midpoint.
    #[must_use]
    pub fn new(name: impl Into<String>, channel: u8, min_pulse_us: f32, max_pulse_us: f32) -> Self {
        Self {
            name: name.into(),
            channel,
            min_pulse_us,
            max_pulse_us,
            min_angle: MIN_ANGLE_DEFAULT,
            max_angle: MAX_ANGLE_DEFAULT,
            default_angle: (MIN_ANGLE_DEFAULT + MAX_ANGLE_DEFAULT) / 2.0,
        }
    }

    /// Override the angle limits.
    #[must_use]
    pub const fn with_angles(mut self, min_angle: f32, max_angle: f32) -> Self {
        self.min_angle = min_angle;
        self.max_angle = max_angle;
        self
    }

    /// Override the angle used by [`ServoController::home_all`](crate::servo::ServoController::home_all).
    #[must_use]
    pub const fn with_default_angle(mut self, default_angle: f32) -> Self {
        self.default_angle = default_angle;
        self
    }

    /// Logical servo name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// PCA9685 channel (0..=15).
    #[must_use]
    pub const fn channel(&self) -> u8 {
        self.channel
    }

    /// Pulse width (µs) at `min_angle`.
    #[must_use]
    pub const fn min_pulse_us(&self) -> f32 {
        self.min_pulse_us
    }

    /// Pulse width (µs) at `max_angle`.
    #[must_use]
    pub const fn max_pulse_us(&self) -> f32 {
        self.max_pulse_us
    }

    /// Lowest reachable angle (degrees).
    #[must_use]
    pub const fn min_angle(&self) -> f32 {
        self.min_angle
    }

    /// Highest reachable angle (degrees).
    #[must_use]
    pub const fn max_angle(&self) -> f32 {
        self.max_angle
    }

    /// Angle the servo returns to on homing.
    #[must_use]
    pub const fn default_angle(&self) -> f32 {
        self.default_angle
    }

    /// Clamp `degrees` into `[min_angle, max_angle]`. NaN maps to `min_angle`.
    #[must_use]
    pub fn clamp_angle(&self, degrees: f32) -> f32 {
        if degrees.is_nan() {
            return self.min_angle;
        }
        degrees.clamp(self.min_angle, self.max_angle)
    }

    /// Clamp `pulse_us` into `[min_pulse_us, max_pulse_us]`. NaN maps to `min_pulse_us`.
    #[must_use]
    pub fn clamp_pulse(&self, pulse_us: f32) -> f32 {
        if pulse_us.is_nan() {
            return self.min_pulse_us;
        }
        pulse_us.clamp(self.min_pulse_us, self.max_pulse_us)
    }

    /// Pulse width (µs) for `degrees`, clamping the angle first.
    #[must_use]
    pub fn pulse_for_angle(&self, degrees: f32) -> f32 {
        let degrees = self.clamp_angle(degrees);
        let fraction = (degrees - self.min_angle) / (self.max_angle - self.min_angle);
        fraction.mul_add(self.max_pulse_us - self.min_pulse_us, self.min_pulse_us)
    }

    fn validate(&self) -> Result<()> {
        let name = &self.name;
        if usize::from(self.channel) >= CHANNEL_COUNT {
            return Err(Error::config(format!(
                "servo {name:?}: channel {} is outside 0..={}",
                self.channel,
                CHANNEL_COUNT - 1
            )));
        }
        let values = [
            self.min_pulse_us,
            self.max_pulse_us,
            self.min_angle,
            self.max_angle,
            self.default_angle,
        ];
        if values.iter().any(|value| !value.is_finite()) {
            return Err(Error::config(format!("servo {name:?}: limits must be finite")));
        }
        if self.min_pulse_us < 0.0 || self.min_pulse_us >= self.max_pulse_us {
            return Err(Error::config(format!(
                "servo {name:?}: need 0 <= min_pulse < max_pulse, got {}..{}",
                self.min_pulse_us, self.max_pulse_us
            )));
        }
        if self.min_angle >= self.max_angle {
            return Err(Error::config(format!(
                "servo {name:?}: need min_angle < max_angle, got {}..{}",
                self.min_angle, self.max_angle
            )));
        }
        Ok(())
    }
}

/// Immutable set of servo calibrations, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationTable {
    specs: Vec<ActuatorSpec>,
}

impl CalibrationTable {
    /// Validate and collect `specs`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if any spec has inverted or non-finite limits,
    /// a channel outside `0..=15`, or shares a name or channel with an earlier spec.
    pub fn new(specs: impl IntoIterator<Item = ActuatorSpec>) -> Result<Self> {
        let specs: Vec<ActuatorSpec> = specs.into_iter().collect();
        let mut channels_used = [false; CHANNEL_COUNT];
        for (index, spec) in specs.iter().enumerate() {
            spec.validate()?;
            let used = &mut channels_used[usize::from(spec.channel)];
            if *used {
                return Err(Error::config(format!(
                    "servo {:?}: channel {} is already assigned",
                    spec.name, spec.channel
                )));
            }
            *used = true;
            if specs[..index].iter().any(|earlier| earlier.name == spec.name) {
                return Err(Error::config(format!("servo {:?} is declared twice", spec.name)));
            }
        }
        Ok(Self { specs })
    }

    /// Look up a servo by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActuator`] if no servo has this name.
    pub fn get(&self, name: &str) -> Result<&ActuatorSpec> {
        self.specs
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| Error::UnknownActuator(name.to_owned()))
    }

    /// Look up the servo wired to `channel`, if any.
    #[must_use]
    pub fn by_channel(&self, channel: u8) -> Option<&ActuatorSpec> {
        self.specs.iter().find(|spec| spec.channel == channel)
    }

    /// Servos in declaration order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ActuatorSpec> {
        self.specs.iter()
    }

    /// Number of servos.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// `true` when no servos are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl<'a> IntoIterator for &'a CalibrationTable {
    type Item = &'a ActuatorSpec;
    type IntoIter = core::slice::Iter<'a, ActuatorSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}
