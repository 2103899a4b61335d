#![allow(missing_docs)]
mod common;

use common::{NoDelay, RecordingI2c};
use robot_actuators::Error;
use robot_actuators::config::RobotConfig;
use robot_actuators::led_strip::ChannelOrder;
use robot_actuators::led_strip::bit_encoder::Packing;
use robot_actuators::servo::ServoController;

const ROBOT_TOML: &str = r#"
[i2c]
bus_number = 1

[i2c.device_address]
pwm_driver = 0x41

[pwm]
default_freq = 50
oscillator_hz = 25000000

[pwm.servos.base_joint]
channel = 0
min_pulse = 500
max_pulse = 2500
default_angle = 90

[pwm.servos.wrist]
channel = 3
min_pulse = 150
max_pulse = 600
default_angle = 90

[pwm.servos.claw]
channel = 4
min_pulse = 500
max_pulse = 2500
default_angle = 30
min_angle = 20
max_angle = 160

[leds.body]
count = 16
bus = 0
device = 0
frequency = 800000
dma = 10
brightness = 255
rgb_type = "GRB"

[leds.eyes]
count = 2
bus = 0
device = 1
rgb_type = "BGR"
compact_max_bytes = 0
"#;

#[test]
fn full_file_drives_a_controller() {
    let config = RobotConfig::from_toml_str(ROBOT_TOML).expect("valid configuration");

    assert_eq!(config.pwm_bus().bus_number, 1);
    assert_eq!(config.pwm_bus().address, 0x41);

    let names: Vec<&str> = config.calibration().iter().map(|spec| spec.name()).collect();
    assert_eq!(names, ["base_joint", "wrist", "claw"]);

    let bus = RecordingI2c::default();
    let pwm = config
        .pwm_bus()
        .driver_builder()
        .build(bus.clone(), NoDelay)
        .expect("mock bus never fails");
    assert!(bus.writes().iter().all(|(address, _)| *address == 0x41));

    let servos = ServoController::new(pwm, config.calibration().clone());
    assert_eq!(servos.move_to_angle("wrist", 90.0).expect("calibrated"), 375.0);
    assert_eq!(servos.move_to_angle("claw", 0.0).expect("calibrated"), 500.0);
    servos.home_all().expect("mock bus never fails");
}

#[test]
fn led_groups_are_validated() {
    let config = RobotConfig::from_toml_str(ROBOT_TOML).expect("valid configuration");

    let body = config.strip("body").expect("declared");
    assert_eq!(body.pixel_count(), 16);
    assert_eq!(body.dma(), Some(10));
    assert_eq!(body.packing(), Packing::EightBit);
    assert_eq!(body.spi_clock_hz(), 6_400_000);

    let eyes = config.strip("eyes").expect("declared");
    assert_eq!(eyes.channel_order(), ChannelOrder::Bgr);
    assert_eq!(eyes.device_id(), 1);
    assert_eq!(eyes.packing(), Packing::EightBit, "compact packing disabled");
}

#[test]
fn duplicate_channels_are_a_configuration_error() {
    let text = ROBOT_TOML.replace("channel = 4", "channel = 3");
    assert!(matches!(
        RobotConfig::from_toml_str(&text),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn mistyped_value_is_reported() {
    let text = ROBOT_TOML.replace("bus_number = 1", "bus_number = \"one\"");
    assert!(matches!(
        RobotConfig::from_toml_str(&text),
        Err(Error::ConfigParse(_))
    ));
}

#[test]
fn config_file_round_trip_through_disk() {
    let path = std::env::temp_dir().join(format!("robot-actuators-{}.toml", std::process::id()));
    std::fs::write(&path, ROBOT_TOML).expect("temp dir is writable");

    let loaded = RobotConfig::from_path(&path);
    std::fs::remove_file(&path).expect("temp file exists");

    assert_eq!(
        loaded.expect("valid configuration"),
        RobotConfig::from_toml_str(ROBOT_TOML).expect("valid configuration")
    );
    assert!(matches!(RobotConfig::from_path(&path), Err(Error::Io(_))));
}

#[test]
fn oversized_led_values_fail_at_load() {
    let text = ROBOT_TOML.replace("frequency = 800000", "frequency = 4000000000");
    assert!(matches!(
        RobotConfig::from_toml_str(&text),
        Err(Error::Configuration(ref message)) if message.contains("frequency")
    ));

    let text = ROBOT_TOML.replace("count = 16", "count = 9000000000000000000");
    assert!(matches!(
        RobotConfig::from_toml_str(&text),
        Err(Error::Configuration(ref message)) if message.contains("count")
    ));

    let text = ROBOT_TOML.replace("frequency = 800000", "frequency = 0");
    assert!(matches!(
        RobotConfig::from_toml_str(&text),
        Err(Error::Configuration(_))
    ));
}
