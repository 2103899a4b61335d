//! Error type shared by every driver in the crate.

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The bus a failed transaction was issued on, with the `embedded-hal` error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum BusError {
    /// I²C transaction to the PWM expander failed.
    #[display("I2C bus error: {_0:?}")]
    I2c(embedded_hal::i2c::ErrorKind),
    /// SPI transfer to an LED strip failed.
    #[display("SPI bus error: {_0:?}")]
    Spi(embedded_hal::spi::ErrorKind),
}

/// Errors returned by the actuation layer.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum Error {
    /// A calibration or strip entry is missing or inconsistent.
    #[display("configuration error: {_0}")]
    #[from(ignore)]
    Configuration(#[error(not(source))] String),

    /// The configuration text could not be parsed.
    #[display("could not parse configuration: {_0}")]
    ConfigParse(toml::de::Error),

    /// The configuration file could not be read.
    #[display("could not read configuration: {_0}")]
    Io(std::io::Error),

    /// No actuator with this name exists in the calibration table.
    #[display("unknown actuator {_0:?}")]
    #[from(ignore)]
    UnknownActuator(#[error(not(source))] String),

    /// A pixel index at or past the end of the strip.
    #[display("pixel index {index} out of range for strip of {len}")]
    #[from(ignore)]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of pixels on the strip.
        len: usize,
    },

    /// A PWM channel outside `0..=15`.
    #[display("PWM channel {_0} is outside 0..=15")]
    #[from(ignore)]
    InvalidChannel(#[error(not(source))] u8),

    /// The bus reported a failure; hardware state is unknown.
    #[display("{_0}")]
    Bus(#[error(not(source))] BusError),

    /// One or more actuators failed while moving a group.
    #[display("{} actuator(s) failed: {}", _0.len(), join_failures(_0))]
    #[from(ignore)]
    Home(#[error(not(source))] Vec<(String, Error)>),

    /// `move_all` was given a different number of angles than there are actuators.
    #[display("expected {expected} angles, got {actual}")]
    #[from(ignore)]
    AngleCountMismatch {
        /// Number of configured actuators.
        expected: usize,
        /// Number of angles supplied.
        actual: usize,
    },

    /// A byte that is not a symbol of the selected packing.
    #[display("byte {_0:#04x} is not a WS2812 wire symbol")]
    #[from(ignore)]
    InvalidSymbol(#[error(not(source))] u8),

    /// A background task could not be spawned (the task pool is full).
    #[cfg(feature = "linux")]
    #[display("could not spawn task: {_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),
}

fn join_failures(failures: &[(String, Error)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Wrap an `embedded-hal` I²C error.
    pub(crate) fn i2c(err: &impl embedded_hal::i2c::Error) -> Self {
        Self::Bus(BusError::I2c(err.kind()))
    }

    /// Wrap an `embedded-hal` SPI error.
    pub(crate) fn spi(err: &impl embedded_hal::spi::Error) -> Self {
        Self::Bus(BusError::Spi(err.kind()))
    }

    /// Shorthand for [`Error::Configuration`].
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
