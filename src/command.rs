//! One command type for every actuator, and a dispatcher that routes it.
//!
//! Front-ends (a WebSocket handler, a CLI, a test) build a [`Command`] and hand it
//! to a [`Dispatcher`], which calls the matching [`ServoController`] or
//! [`LedPlayer`] operation and returns its outcome.
//!
//! # Example
//!
//! ```no_run
//! # async fn example<I2C: embedded_hal::i2c::I2c, D: embedded_hal::delay::DelayNs>(
//! #     servos: robot_actuators::servo::ServoController<I2C, D>,
//! #     body: robot_actuators::led_player::LedPlayer,
//! # ) -> robot_actuators::Result<()> {
//! use robot_actuators::command::{Command, Dispatcher, LedCommand, Reply, ServoCommand};
//!
//! let dispatcher = Dispatcher::new(&servos).with_led_group("body", body);
//!
//! let reply = dispatcher
//!     .dispatch(Command::Servo(ServoCommand::MoveToAngle { name: "wrist".into(), degrees: 45.0 }))
//!     .await?;
//! assert!(matches!(reply, Reply::Pulse(_)));
//!
//! dispatcher
//!     .dispatch(Command::Led { group: "body".into(), command: LedCommand::Pause })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::debug;

use crate::led_player::LedPlayer;
use crate::led_strip::Rgb;
use crate::servo::ServoController;
use crate::{Error, Result};

/// A request for the servos.
#[derive(Clone, Debug, PartialEq)]
pub enum ServoCommand {
    /// Move one servo to an angle (degrees).
    MoveToAngle {
        /// Logical servo name.
        name: String,
        /// Target angle, clamped to the servo's limits.
        degrees: f32,
    },
    /// Move the servo on a PWM channel to an angle (degrees).
    MoveChannelToAngle {
        /// PCA9685 channel.
        channel: u8,
        /// Target angle, clamped to the servo's limits.
        degrees: f32,
    },
    /// Move one servo to a raw pulse width (µs).
    MoveToPulse {
        /// Logical servo name.
        name: String,
        /// Target pulse, clamped to the servo's limits.
        pulse_us: f32,
    },
    /// Every servo to its default angle.
    HomeAll,
    /// Every servo at once, in declaration order.
    MoveAll(Vec<f32>),
    /// Stop driving one servo.
    Relax {
        /// Logical servo name.
        name: String,
    },
}

/// A request for one LED group's animation loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LedCommand {
    /// Start the rainbow, optionally after the startup demo.
    Start {
        /// Play the startup demo first.
        demo: bool,
    },
    /// Blank the strip and suspend the animation.
    Pause,
    /// Continue a paused animation.
    Resume,
    /// Blank the strip and reset the animation.
    Stop,
    /// Set one pixel of the pending frame.
    SetPixel {
        /// Pixel index.
        index: usize,
        /// Color before brightness scaling.
        color: Rgb,
    },
    /// Set every pixel of the pending frame.
    Fill(Rgb),
    /// Blank the pending frame.
    Clear,
    /// Transmit the pending frame.
    Show,
}

/// Any actuator request.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Routed to the servo controller.
    Servo(ServoCommand),
    /// Routed to the LED group called `group`.
    Led {
        /// LED group name from the configuration.
        group: String,
        /// What to do.
        command: LedCommand,
    },
}

/// Successful outcome of a [`Command`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Reply {
    /// The command was carried out.
    Done,
    /// A servo was moved; the pulse (µs) actually commanded.
    Pulse(f32),
}

/// Routes [`Command`]s to the servos and LED groups.
///
/// See the [module documentation](mod@crate::command) for usage.
pub struct Dispatcher<'a, I2C, D> {
    servos: &'a ServoController<I2C, D>,
    led_groups: Vec<(String, LedPlayer)>,
}

impl<'a, I2C: I2c, D: DelayNs> Dispatcher<'a, I2C, D> {
    /// A dispatcher for `servos` with no LED groups yet.
    #[must_use]
    pub const fn new(servos: &'a ServoController<I2C, D>) -> Self {
        Self {
            servos,
            led_groups: Vec::new(),
        }
    }

    /// Route [`Command::Led`] for `group` to `led_player`. A later entry with the same name wins.
    #[must_use]
    pub fn with_led_group(mut self, group: impl Into<String>, led_player: LedPlayer) -> Self {
        let group = group.into();
        self.led_groups.retain(|(name, _)| *name != group);
        self.led_groups.push((group, led_player));
        self
    }

    /// The player for `group`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActuator`] if no group has this name.
    pub fn led_group(&self, group: &str) -> Result<LedPlayer> {
        self.led_groups
            .iter()
            .find(|(name, _)| name == group)
            .map(|(_, led_player)| *led_player)
            .ok_or_else(|| Error::UnknownActuator(group.to_owned()))
    }

    /// Carry out `command`.
    ///
    /// # Errors
    ///
    /// Returns whatever the routed operation returns, or
    /// [`Error::UnknownActuator`] for an unknown LED group.
    pub async fn dispatch(&self, command: Command) -> Result<Reply> {
        debug!("dispatch {command:?}");
        match command {
            Command::Servo(command) => self.dispatch_servo(command),
            Command::Led { group, command } => {
                let led_player = self.led_group(&group)?;
                match command {
                    LedCommand::Start { demo } => led_player.start(demo).await,
                    LedCommand::Pause => led_player.pause().await,
                    LedCommand::Resume => led_player.resume().await,
                    LedCommand::Stop => led_player.stop().await,
                    LedCommand::SetPixel { index, color } => led_player.set_pixel(index, color).await,
                    LedCommand::Fill(color) => led_player.fill(color).await,
                    LedCommand::Clear => led_player.clear().await,
                    LedCommand::Show => led_player.show().await,
                }?;
                Ok(Reply::Done)
            }
        }
    }

    fn dispatch_servo(&self, command: ServoCommand) -> Result<Reply> {
        match command {
            ServoCommand::MoveToAngle { name, degrees } => {
                self.servos.move_to_angle(&name, degrees).map(Reply::Pulse)
            }
            ServoCommand::MoveChannelToAngle { channel, degrees } => self
                .servos
                .move_channel_to_angle(channel, degrees)
                .map(Reply::Pulse),
            ServoCommand::MoveToPulse { name, pulse_us } => {
                self.servos.move_to_pulse(&name, pulse_us).map(Reply::Pulse)
            }
            ServoCommand::HomeAll => self.servos.home_all().map(|()| Reply::Done),
            ServoCommand::MoveAll(angles) => self.servos.move_all(&angles).map(|()| Reply::Done),
            ServoCommand::Relax { name } => self.servos.relax(&name).map(|()| Reply::Done),
        }
    }
}
