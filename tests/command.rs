#![allow(missing_docs)]
mod common;

use std::thread;

use common::{NoDelay, RecordingI2c, RecordingSpi};
use embassy_futures::block_on;
use robot_actuators::Error;
use robot_actuators::calibration::{ActuatorSpec, CalibrationTable};
use robot_actuators::command::{Command, Dispatcher, LedCommand, Reply, ServoCommand};
use robot_actuators::led_player::{self, AnimationPhase, LedPlayer, LedPlayerStatic};
use robot_actuators::led_strip::bit_encoder::Packing;
use robot_actuators::led_strip::{LedStrip, StripConfig, colors};
use robot_actuators::pca9685::Pca9685;
use robot_actuators::servo::ServoController;

fn servos() -> (ServoController<RecordingI2c, NoDelay>, RecordingI2c) {
    let bus = RecordingI2c::default();
    let pwm = Pca9685::builder()
        .frequency_hz(50.0)
        .build(bus.clone(), NoDelay)
        .expect("mock bus never fails");
    bus.clear();
    let calibration = CalibrationTable::new([
        ActuatorSpec::new("wrist", 3, 150.0, 600.0),
        ActuatorSpec::new("claw", 4, 500.0, 2_500.0),
    ])
    .expect("valid calibration");
    (ServoController::new(pwm, calibration), bus)
}

#[test]
fn servo_commands_reach_the_controller() {
    let (servos, bus) = servos();
    let dispatcher = Dispatcher::new(&servos);

    let reply = block_on(dispatcher.dispatch(Command::Servo(ServoCommand::MoveToAngle {
        name: "wrist".into(),
        degrees: 90.0,
    })))
    .expect("calibrated");
    assert_eq!(reply, Reply::Pulse(375.0));

    let reply = block_on(dispatcher.dispatch(Command::Servo(ServoCommand::MoveToPulse {
        name: "claw".into(),
        pulse_us: 9_999.0,
    })))
    .expect("calibrated");
    assert_eq!(reply, Reply::Pulse(2_500.0));

    let reply = block_on(dispatcher.dispatch(Command::Servo(ServoCommand::MoveChannelToAngle {
        channel: 3,
        degrees: 0.0,
    })))
    .expect("wrist is on channel 3");
    assert_eq!(reply, Reply::Pulse(150.0));

    assert_eq!(
        block_on(dispatcher.dispatch(Command::Servo(ServoCommand::HomeAll))).expect("mock bus never fails"),
        Reply::Done
    );
    assert!(matches!(
        block_on(dispatcher.dispatch(Command::Servo(ServoCommand::MoveAll(vec![0.0])))),
        Err(Error::AngleCountMismatch { expected: 2, actual: 1 })
    ));

    let writes_before = bus.write_count();
    assert!(matches!(
        block_on(dispatcher.dispatch(Command::Servo(ServoCommand::Relax {
            name: "elbow".into()
        }))),
        Err(Error::UnknownActuator(_))
    ));
    assert_eq!(bus.write_count(), writes_before);
}

#[test]
fn led_commands_reach_the_named_group() {
    static BODY_STATIC: LedPlayerStatic = LedPlayer::new_static();
    let spi = RecordingSpi::default();
    let led_strip = LedStrip::new(spi.clone(), StripConfig::new(2, 0, 0));
    thread::spawn(move || {
        block_on(led_player::device_loop(&BODY_STATIC, led_strip));
    });

    let (servos, _bus) = servos();
    let body = LedPlayer::new(&BODY_STATIC);
    let dispatcher = Dispatcher::new(&servos).with_led_group("body", body);

    let led = |command| Command::Led {
        group: "body".into(),
        command,
    };
    block_on(dispatcher.dispatch(led(LedCommand::Fill(colors::WHITE)))).expect("never fails");
    block_on(dispatcher.dispatch(led(LedCommand::Show))).expect("mock bus never fails");
    assert_eq!(spi.last_decoded(Packing::FourBit), [255; 6]);

    block_on(dispatcher.dispatch(led(LedCommand::Start { demo: false }))).expect("mock bus never fails");
    assert_eq!(body.state().phase, AnimationPhase::Running);
    block_on(dispatcher.dispatch(led(LedCommand::Pause))).expect("mock bus never fails");
    assert_eq!(body.state().phase, AnimationPhase::Paused);
    assert_eq!(spi.last_decoded(Packing::FourBit), [0; 6]);

    assert!(matches!(
        block_on(dispatcher.dispatch(Command::Led {
            group: "tail".into(),
            command: LedCommand::Stop,
        })),
        Err(Error::UnknownActuator(ref group)) if group == "tail"
    ));
}
