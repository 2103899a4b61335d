//! Device abstractions for hobby-robot actuators on a Linux single-board computer.
//!
//! - [`servo`]: named, calibrated servos on a PCA9685 I²C PWM expander
//!   ([`pca9685`], [`calibration`]).
//! - [`led_strip`] and [`led_player`]: WS2812 strips driven over SPI, with a
//!   continuous rainbow animation that can be paused and resumed.
//! - [`config`]: the TOML file that describes both; [`command`]: one command
//!   type routed to either.
//!
//! Drivers are generic over `embedded-hal` 1.0 buses. The `linux` feature binds
//! them to `/dev/i2c-*` and `/dev/spidev*`.
//!
//! # Glossary
//!
//! - **Duty value:** the 12-bit (0–4095) on-time a PCA9685 channel holds each period.
//! - **Prescale:** the PCA9685 register that divides its oscillator down to the output frequency.
//! - **Packing:** how each WS2812 bit is stretched into SPI bytes (see [`led_strip::bit_encoder`]).
//! - **Channel order:** the byte order (GRB, RGB, ...) a strip expects per pixel.

pub mod calibration;
pub mod command;
pub mod config;
mod error;
pub mod led_player;
pub mod led_strip;
#[cfg(feature = "linux")]
pub mod linux;
pub mod pca9685;
pub mod servo;

// Re-export error types and result (used throughout)
pub use crate::error::{BusError, Error, Result};
