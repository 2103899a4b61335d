//! Declarative robot configuration loaded from TOML.
//!
//! ```toml
//! [i2c]
//! bus_number = 1
//! [i2c.device_address]
//! pwm_driver = 0x40
//!
//! [pwm]
//! default_freq = 50
//!
//! [pwm.servos.wrist]
//! channel = 3
//! min_pulse = 150
//! max_pulse = 600
//! default_angle = 90
//!
//! [leds.body]
//! count = 16
//! bus = 0
//! device = 0
//! rgb_type = "GRB"
//! ```
//!
//! `i2c.bus_number`, `i2c.device_address.pwm_driver`, `pwm.default_freq` and each
//! servo's `channel`, `min_pulse`, `max_pulse` and `default_angle` are required.
//! Servos and LED groups keep the order they are written in.
//!
//! # Example
//!
//! ```
//! use robot_actuators::config::RobotConfig;
//!
//! let config = RobotConfig::from_toml_str(
//!     r#"
//!     [i2c]
//!     bus_number = 1
//!     device_address = { pwm_driver = 0x40 }
//!     [pwm]
//!     default_freq = 50
//!     [pwm.servos.wrist]
//!     channel = 3
//!     min_pulse = 150
//!     max_pulse = 600
//!     default_angle = 90
//!     "#,
//! )?;
//! assert_eq!(config.calibration().get("wrist")?.channel(), 3);
//! # Ok::<(), robot_actuators::Error>(())
//! ```

use std::path::Path;

use embassy_time::Duration;
use serde::Deserialize;
use tracing::debug;

use crate::calibration::{ActuatorSpec, CalibrationTable, MAX_ANGLE_DEFAULT, MIN_ANGLE_DEFAULT};
use crate::led_strip::bit_encoder::LED_HZ_MAX;
use crate::led_strip::{ChannelOrder, PIXEL_COUNT_MAX, StripConfig};
use crate::pca9685::{OSCILLATOR_HZ_DEFAULT, Pca9685, Pca9685Builder};
use crate::{Error, Result};

// ============================================================================
// File Layout
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    i2c: Option<I2cSection>,
    pwm: Option<PwmSection>,
    #[serde(default)]
    leds: toml::Table,
}

#[derive(Debug, Deserialize)]
struct I2cSection {
    bus_number: Option<u8>,
    device_address: Option<DeviceAddressSection>,
}

#[derive(Debug, Deserialize)]
struct DeviceAddressSection {
    pwm_driver: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct PwmSection {
    default_freq: Option<f32>,
    oscillator_hz: Option<u32>,
    #[serde(default)]
    servos: toml::Table,
}

#[derive(Debug, Deserialize)]
struct ServoSection {
    channel: Option<u8>,
    min_pulse: Option<f32>,
    max_pulse: Option<f32>,
    default_angle: Option<f32>,
    min_angle: Option<f32>,
    max_angle: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct LedSection {
    count: Option<usize>,
    bus: Option<u8>,
    device: Option<u8>,
    frequency: Option<u32>,
    dma: Option<u8>,
    brightness: Option<u8>,
    rgb_type: Option<String>,
    frame_interval_ms: Option<u64>,
    compact_max_bytes: Option<usize>,
    demo: Option<bool>,
}

fn required<T>(value: Option<T>, what: impl FnOnce() -> String) -> Result<T> {
    value.ok_or_else(|| Error::config(format!("missing required key {}", what())))
}

// ============================================================================
// Validated Configuration
// ============================================================================

/// The PWM expander's bus settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PwmBusConfig {
    /// Linux I²C bus number (`/dev/i2c-N`).
    pub bus_number: u8,
    /// 7-bit address of the PCA9685.
    pub address: u8,
    /// PWM frequency programmed at startup.
    pub frequency_hz: f32,
    /// Oscillator frequency used for prescale and duty math.
    pub oscillator_hz: u32,
}

impl PwmBusConfig {
    /// A driver builder with this address, oscillator and frequency.
    #[must_use]
    pub fn driver_builder(&self) -> Pca9685Builder {
        Pca9685::builder()
            .address(self.address)
            .oscillator_hz(self.oscillator_hz)
            .frequency_hz(self.frequency_hz)
    }
}

/// Everything needed to bring up the servos and LED strips.
///
/// See the [module documentation](mod@crate::config) for the file format.
#[derive(Clone, Debug, PartialEq)]
pub struct RobotConfig {
    pwm_bus: PwmBusConfig,
    calibration: CalibrationTable,
    strips: Vec<(String, StripConfig)>,
}

impl RobotConfig {
    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] for malformed TOML or mistyped values and
    /// [`Error::Configuration`] for missing keys or inconsistent calibration.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        Self::from_file(file)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// I²C settings of the PWM expander.
    #[must_use]
    pub const fn pwm_bus(&self) -> &PwmBusConfig {
        &self.pwm_bus
    }

    /// Servo calibrations in file order.
    #[must_use]
    pub const fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    /// LED groups in file order.
    pub fn strips(&self) -> impl ExactSizeIterator<Item = (&str, &StripConfig)> {
        self.strips.iter().map(|(name, strip)| (name.as_str(), strip))
    }

    /// The LED group called `group`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActuator`] if no group has this name.
    pub fn strip(&self, group: &str) -> Result<&StripConfig> {
        self.strips
            .iter()
            .find(|(name, _)| name == group)
            .map(|(_, strip)| strip)
            .ok_or_else(|| Error::UnknownActuator(group.to_owned()))
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let i2c = required(file.i2c, || "i2c".into())?;
        let bus_number = required(i2c.bus_number, || "i2c.bus_number".into())?;
        let address = required(
            i2c.device_address.and_then(|section| section.pwm_driver),
            || "i2c.device_address.pwm_driver".into(),
        )?;
        let pwm = required(file.pwm, || "pwm".into())?;
        let frequency_hz = required(pwm.default_freq, || "pwm.default_freq".into())?;
        if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
            return Err(Error::config(format!(
                "pwm.default_freq must be positive, got {frequency_hz}"
            )));
        }

        let specs = pwm
            .servos
            .into_iter()
            .map(|(name, value)| servo_spec(name, value))
            .collect::<Result<Vec<_>>>()?;
        let calibration = CalibrationTable::new(specs)?;

        let strips = file
            .leds
            .into_iter()
            .map(|(name, value)| strip_config(&name, value).map(|strip| (name, strip)))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "configuration: {} servo(s), {} led group(s)",
            calibration.len(),
            strips.len()
        );
        Ok(Self {
            pwm_bus: PwmBusConfig {
                bus_number,
                address,
                frequency_hz,
                oscillator_hz: pwm.oscillator_hz.unwrap_or(OSCILLATOR_HZ_DEFAULT),
            },
            calibration,
            strips,
        })
    }
}

fn servo_spec(name: String, value: toml::Value) -> Result<ActuatorSpec> {
    let section = value
        .try_into::<ServoSection>()
        .map_err(|err| Error::config(format!("servo {name:?}: {err}")))?;
    let key = |key: &str| format!("{key:?} for servo {name:?}");
    let channel = required(section.channel, || key("channel"))?;
    let min_pulse = required(section.min_pulse, || key("min_pulse"))?;
    let max_pulse = required(section.max_pulse, || key("max_pulse"))?;
    let default_angle = required(section.default_angle, || key("default_angle"))?;
    Ok(ActuatorSpec::new(name, channel, min_pulse, max_pulse)
        .with_angles(
            section.min_angle.unwrap_or(MIN_ANGLE_DEFAULT),
            section.max_angle.unwrap_or(MAX_ANGLE_DEFAULT),
        )
        .with_default_angle(default_angle))
}

fn strip_config(name: &str, value: toml::Value) -> Result<StripConfig> {
    let section = value
        .try_into::<LedSection>()
        .map_err(|err| Error::config(format!("led group {name:?}: {err}")))?;
    let key = |key: &str| format!("{key:?} for led group {name:?}");
    let count = required(section.count, || key("count"))?;
    let bus = required(section.bus, || key("bus"))?;
    let device = required(section.device, || key("device"))?;

    if count > PIXEL_COUNT_MAX {
        return Err(Error::config(format!(
            "led group {name:?}: count {count} exceeds {PIXEL_COUNT_MAX}"
        )));
    }

    let mut strip = StripConfig::new(count, bus, device);
    if let Some(frequency) = section.frequency {
        if !(1..=LED_HZ_MAX).contains(&frequency) {
            return Err(Error::config(format!(
                "led group {name:?}: frequency must be in 1..={}, got {frequency}",
                LED_HZ_MAX
            )));
        }
        strip = strip.with_clock_hz(frequency);
    }
    if let Some(dma) = section.dma {
        strip = strip.with_dma(dma);
    }
    if let Some(brightness) = section.brightness {
        strip = strip.with_brightness(brightness);
    }
    if let Some(rgb_type) = section.rgb_type {
        let order: ChannelOrder = rgb_type
            .parse()
            .map_err(|err| Error::config(format!("led group {name:?}: {err}")))?;
        strip = strip.with_channel_order(order);
    }
    if let Some(frame_interval_ms) = section.frame_interval_ms {
        strip = strip.with_frame_interval(Duration::from_millis(frame_interval_ms));
    }
    if let Some(compact_max_bytes) = section.compact_max_bytes {
        strip = strip.with_compact_max_bytes(compact_max_bytes);
    }
    Ok(strip.with_demo(section.demo.unwrap_or(false)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r"
        [i2c]
        bus_number = 1
        [i2c.device_address]
        pwm_driver = 0x40
        [pwm]
        default_freq = 50
    ";

    fn parse(extra: &str) -> Result<RobotConfig> {
        RobotConfig::from_toml_str(&format!("{HEADER}\n{extra}"))
    }

    #[test]
    fn optional_servo_keys_take_defaults() {
        let config = parse(
            r"
            [pwm.servos.wrist]
            channel = 3
            min_pulse = 150
            max_pulse = 600
            default_angle = 45
            ",
        )
        .expect("valid");
        let wrist = config.calibration().get("wrist").expect("declared");
        assert_eq!(wrist.min_angle(), MIN_ANGLE_DEFAULT);
        assert_eq!(wrist.max_angle(), MAX_ANGLE_DEFAULT);
        assert_eq!(wrist.default_angle(), 45.0);
        assert_eq!(config.pwm_bus().oscillator_hz, OSCILLATOR_HZ_DEFAULT);
        assert_eq!(config.pwm_bus().address, 0x40);
    }

    #[test]
    fn missing_servo_key_names_the_servo() {
        let err = parse(
            r"
            [pwm.servos.claw]
            channel = 4
            min_pulse = 150
            default_angle = 90
            ",
        )
        .expect_err("max_pulse missing");
        let text = err.to_string();
        assert!(text.contains("max_pulse"), "{text}");
        assert!(text.contains("claw"), "{text}");
    }

    #[test]
    fn missing_header_keys_are_reported() {
        let err = RobotConfig::from_toml_str("[i2c]\nbus_number = 1\n[pwm]\ndefault_freq = 50\n")
            .expect_err("address missing");
        assert!(err.to_string().contains("i2c.device_address.pwm_driver"));

        let err = RobotConfig::from_toml_str("[i2c]\nbus_number = 1\ndevice_address = { pwm_driver = 64 }\n")
            .expect_err("pwm missing");
        assert!(err.to_string().contains("pwm"));
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        assert!(matches!(
            RobotConfig::from_toml_str("[i2c\nbus_number = 1"),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn led_groups_keep_file_order_and_defaults() {
        let config = parse(
            r#"
            [leds.body]
            count = 16
            bus = 0
            device = 0
            [leds.eyes]
            count = 2
            bus = 1
            device = 2
            brightness = 64
            rgb_type = "rgb"
            frame_interval_ms = 40
            demo = true
            "#,
        )
        .expect("valid");
        let names: Vec<&str> = config.strips().map(|(name, _)| name).collect();
        assert_eq!(names, ["body", "eyes"]);

        let body = config.strip("body").expect("declared");
        assert_eq!(body.channel_order(), ChannelOrder::Grb);
        assert_eq!(body.brightness(), 255);
        assert_eq!(body.clock_hz(), 800_000);

        let eyes = config.strip("eyes").expect("declared");
        assert_eq!(eyes.channel_order(), ChannelOrder::Rgb);
        assert_eq!(eyes.brightness(), 64);
        assert_eq!(eyes.frame_interval(), Duration::from_millis(40));
        assert!(eyes.demo());
        assert!(matches!(config.strip("tail"), Err(Error::UnknownActuator(_))));
    }

    #[test]
    fn bad_rgb_type_names_the_group() {
        let err = parse(
            r#"
            [leds.body]
            count = 16
            bus = 0
            device = 0
            rgb_type = "XYZ"
            "#,
        )
        .expect_err("unknown order");
        assert!(err.to_string().contains("body"));
    }
}
