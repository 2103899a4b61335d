//! A device abstraction that runs a continuous rainbow animation on an [`LedStrip`].
//!
//! One async [`device_loop`] owns the strip. Callers talk to it through an
//! [`LedPlayer`] handle: every command is sent to the loop and the call resolves
//! once the loop has acted on it, so effects are observed in call order.
//!
//! ```text
//!            start             pause
//! Stopped ──────────► Running ──────► Paused
//!    ▲                   ▲               │
//!    │ stop (any state)  └───── resume ──┘
//! ```
//!
//! While running, each frame pixel `i` shows [`wheel`]`(i * 256 / len + offset)`,
//! the frame is transmitted, and `offset` advances by one. The wait between
//! frames is interrupted by the next command; a frame already being sent is
//! never cut short. [`pause`](LedPlayer::pause) and [`stop`](LedPlayer::stop)
//! always leave the strip showing an all-black frame.
//!
//! # Example
//!
//! ```no_run
//! # async fn example<SPI: embedded_hal::spi::SpiBus + Send + 'static>(spi: SPI) -> robot_actuators::Result<()> {
//! use robot_actuators::led_player::{self, LedPlayer, LedPlayerStatic};
//! use robot_actuators::led_strip::{LedStrip, StripConfig, colors};
//!
//! static LED_PLAYER_STATIC: LedPlayerStatic = LedPlayer::new_static();
//!
//! let led_strip = LedStrip::new(spi, StripConfig::new(16, 0, 0));
//! std::thread::spawn(move || {
//!     embassy_futures::block_on(led_player::device_loop(&LED_PLAYER_STATIC, led_strip));
//! });
//!
//! let led_player = LedPlayer::new(&LED_PLAYER_STATIC);
//! led_player.start(true).await?;  // Startup demo, then the rainbow
//! led_player.pause().await?;      // Strip goes dark
//! led_player.resume().await?;     // Rainbow continues where it left off
//! led_player.stop().await?;
//!
//! led_player.fill(colors::ORANGE).await?;  // Static frame
//! led_player.show().await?;
//! # Ok(())
//! # }
//! ```

use core::cell::Cell;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use embedded_hal::spi::SpiBus;
use tracing::{debug, info, warn};

use crate::Result;
use crate::led_strip::{LedStrip, PixelBuffer, Rgb, colors};

/// Step between white levels in the startup demo.
const DEMO_RAMP_STEP: usize = 15;
/// Delay between white levels in the startup demo.
const DEMO_RAMP_DELAY: Duration = Duration::from_millis(20);
/// Step between rainbow offsets in the startup demo.
const DEMO_SWEEP_STEP: usize = 16;
/// Delay between rainbow offsets in the startup demo.
const DEMO_SWEEP_DELAY: Duration = Duration::from_millis(10);

// ============================================================================
// Color Wheel
// ============================================================================

/// Classic 256-step rainbow: red → green → blue → red.
#[must_use]
pub const fn wheel(position: u8) -> Rgb {
    match position {
        0..85 => Rgb::new(255 - position * 3, position * 3, 0),
        85..170 => {
            let position = position - 85;
            Rgb::new(0, 255 - position * 3, position * 3)
        }
        _ => {
            let position = position - 170;
            Rgb::new(position * 3, 0, 255 - position * 3)
        }
    }
}

/// Write one rainbow frame at `offset` into `buffer`.
pub fn render_rainbow(buffer: &mut PixelBuffer, offset: u8) {
    let len = buffer.len();
    buffer.fill_with(|index| wheel(((index * 256 / len + usize::from(offset)) % 256) as u8));
}

// ============================================================================
// State
// ============================================================================

/// Lifecycle phase of the animation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnimationPhase {
    /// No animation; the strip shows whatever was last sent.
    #[default]
    Stopped,
    /// Frames are being sent every frame interval.
    Running,
    /// Animation suspended with the strip dark; resumes at the same offset.
    Paused,
}

/// Snapshot of the animation, as last published by the device loop.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnimationState {
    /// Current phase.
    pub phase: AnimationPhase,
    /// Rainbow frames sent since the last stop.
    pub frame_index: u32,
}

impl AnimationState {
    /// Rainbow offset of the next frame.
    #[must_use]
    pub const fn frame_offset(&self) -> u8 {
        (self.frame_index % 256) as u8
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
enum PlayerCommand {
    Start { demo: bool },
    Pause,
    Resume,
    Stop,
    SetPixel { index: usize, color: Rgb },
    Fill(Rgb),
    Clear,
    Show,
}

/// Static resources for [`LedPlayer`].
pub struct LedPlayerStatic {
    command: Signal<CriticalSectionRawMutex, PlayerCommand>,
    completion: Signal<CriticalSectionRawMutex, Result<()>>,
    state: BlockingMutex<CriticalSectionRawMutex, Cell<AnimationState>>,
    callers: Mutex<CriticalSectionRawMutex, ()>,
}

impl LedPlayerStatic {
    /// Create static resources for the LED player device.
    #[must_use]
    pub const fn new_static() -> Self {
        Self {
            command: Signal::new(),
            completion: Signal::new(),
            state: BlockingMutex::new(Cell::new(AnimationState {
                phase: AnimationPhase::Stopped,
                frame_index: 0,
            })),
            callers: Mutex::new(()),
        }
    }

    async fn wait(&self) -> PlayerCommand {
        self.command.wait().await
    }

    fn state(&self) -> AnimationState {
        self.state.lock(Cell::get)
    }

    fn publish(&self, state: AnimationState) {
        self.state.lock(|cell| cell.set(state));
    }
}

// ============================================================================
// Player Handle
// ============================================================================

/// Handle for controlling a running [`device_loop`].
///
/// See the [module documentation](mod@crate::led_player) for usage.
#[derive(Clone, Copy)]
pub struct LedPlayer {
    led_player_static: &'static LedPlayerStatic,
}

impl LedPlayer {
    /// Create static resources for an LED player.
    #[must_use]
    pub const fn new_static() -> LedPlayerStatic {
        LedPlayerStatic::new_static()
    }

    /// Create a handle. Commands wait until [`device_loop`] is running.
    #[must_use]
    pub const fn new(led_player_static: &'static LedPlayerStatic) -> Self {
        Self { led_player_static }
    }

    /// Start the rainbow. With `demo`, the startup demo plays to completion first.
    ///
    /// Does nothing if already running; resumes at the same offset if paused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`](crate::Error::Bus) if a demo frame cannot be sent.
    pub async fn start(&self, demo: bool) -> Result<()> {
        self.request(PlayerCommand::Start { demo }).await
    }

    /// Stop scheduling frames and blank the strip. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`](crate::Error::Bus) if the black frame cannot be sent.
    pub async fn pause(&self) -> Result<()> {
        self.request(PlayerCommand::Pause).await
    }

    /// Continue a paused animation from its pre-pause offset. No effect otherwise.
    ///
    /// # Errors
    ///
    /// Never fails today; the result keeps the command surface uniform.
    pub async fn resume(&self) -> Result<()> {
        self.request(PlayerCommand::Resume).await
    }

    /// Stop from any phase, blank the strip, and reset the offset to 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`](crate::Error::Bus) if the black frame cannot be sent.
    pub async fn stop(&self) -> Result<()> {
        self.request(PlayerCommand::Stop).await
    }

    /// Set one pixel of the pending frame. Overwritten by the next animation frame while running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`](crate::Error::IndexOutOfRange) for an index past the strip.
    pub async fn set_pixel(&self, index: usize, color: Rgb) -> Result<()> {
        self.request(PlayerCommand::SetPixel { index, color }).await
    }

    /// Set every pixel of the pending frame.
    ///
    /// # Errors
    ///
    /// Never fails today; the result keeps the command surface uniform.
    pub async fn fill(&self, color: Rgb) -> Result<()> {
        self.request(PlayerCommand::Fill(color)).await
    }

    /// Blank the pending frame.
    ///
    /// # Errors
    ///
    /// Never fails today; the result keeps the command surface uniform.
    pub async fn clear(&self) -> Result<()> {
        self.request(PlayerCommand::Clear).await
    }

    /// Transmit the pending frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`](crate::Error::Bus) if the SPI transfer fails.
    pub async fn show(&self) -> Result<()> {
        self.request(PlayerCommand::Show).await
    }

    /// Latest state published by the device loop.
    #[must_use]
    pub fn state(&self) -> AnimationState {
        self.led_player_static.state()
    }

    async fn request(&self, command: PlayerCommand) -> Result<()> {
        let led_player_static = self.led_player_static;
        // One request in flight at a time, so each completion matches its command.
        let _caller = led_player_static.callers.lock().await;
        led_player_static.completion.reset();
        led_player_static.command.signal(command);
        led_player_static.completion.wait().await
    }
}

// ============================================================================
// Device Loop
// ============================================================================

/// Own `led_strip` and serve [`LedPlayer`] commands forever.
///
/// Run it on an embassy executor task or with `embassy_futures::block_on` in a
/// dedicated thread.
pub async fn device_loop<SPI: SpiBus>(
    led_player_static: &'static LedPlayerStatic,
    mut led_strip: LedStrip<SPI>,
) -> ! {
    let mut state = AnimationState::default();
    led_player_static.publish(state);
    info!(
        "led player: {} pixels, {:?} packing, {} ms frames",
        led_strip.len(),
        led_strip.packing(),
        led_strip.config().frame_interval().as_millis()
    );

    loop {
        let command = if state.phase == AnimationPhase::Running {
            run_animation(led_player_static, &mut led_strip, &mut state).await
        } else {
            led_player_static.wait().await
        };
        debug!("led player: {command:?} while {:?}", state.phase);
        let reply = apply(command, &mut led_strip, &mut state).await;
        led_player_static.publish(state);
        led_player_static.completion.signal(reply);
    }
}

async fn apply<SPI: SpiBus>(
    command: PlayerCommand,
    led_strip: &mut LedStrip<SPI>,
    state: &mut AnimationState,
) -> Result<()> {
    match command {
        PlayerCommand::Start { demo } => match state.phase {
            AnimationPhase::Running => Ok(()),
            AnimationPhase::Paused => {
                state.phase = AnimationPhase::Running;
                Ok(())
            }
            AnimationPhase::Stopped => {
                if demo {
                    startup_demo(led_strip).await?;
                }
                state.phase = AnimationPhase::Running;
                Ok(())
            }
        },
        PlayerCommand::Pause => {
            if state.phase != AnimationPhase::Running {
                return Ok(());
            }
            state.phase = AnimationPhase::Paused;
            blank(led_strip)
        }
        PlayerCommand::Resume => {
            if state.phase == AnimationPhase::Paused {
                state.phase = AnimationPhase::Running;
            }
            Ok(())
        }
        PlayerCommand::Stop => {
            *state = AnimationState::default();
            blank(led_strip)
        }
        PlayerCommand::SetPixel { index, color } => led_strip.set_pixel(index, color),
        PlayerCommand::Fill(color) => {
            led_strip.fill(color);
            Ok(())
        }
        PlayerCommand::Clear => {
            led_strip.clear();
            Ok(())
        }
        PlayerCommand::Show => led_strip.show(),
    }
}

/// Send rainbow frames until a command arrives, then return it.
async fn run_animation<SPI: SpiBus>(
    led_player_static: &'static LedPlayerStatic,
    led_strip: &mut LedStrip<SPI>,
    state: &mut AnimationState,
) -> PlayerCommand {
    let frame_interval = led_strip.config().frame_interval();
    loop {
        render_rainbow(led_strip.buffer_mut(), state.frame_offset());
        if let Err(err) = led_strip.show() {
            warn!("led player: frame {} not sent: {err}", state.frame_index);
        }
        state.frame_index = state.frame_index.wrapping_add(1);
        led_player_static.publish(*state);

        match select(Timer::after(frame_interval), led_player_static.wait()).await {
            Either::First(()) => {}
            Either::Second(command) => return command,
        }
    }
}

/// White ramp up and down, a quick rainbow sweep, then black.
async fn startup_demo<SPI: SpiBus>(led_strip: &mut LedStrip<SPI>) -> Result<()> {
    info!("led player: startup demo");
    for level in (0..=255u8).step_by(DEMO_RAMP_STEP) {
        show_for(led_strip, Rgb::new(level, level, level), DEMO_RAMP_DELAY).await?;
    }
    for level in (0..=255u8).rev().step_by(DEMO_RAMP_STEP) {
        show_for(led_strip, Rgb::new(level, level, level), DEMO_RAMP_DELAY).await?;
    }
    for offset in (0..=255u8).step_by(DEMO_SWEEP_STEP) {
        render_rainbow(led_strip.buffer_mut(), offset);
        led_strip.show()?;
        Timer::after(DEMO_SWEEP_DELAY).await;
    }
    blank(led_strip)
}

async fn show_for<SPI: SpiBus>(led_strip: &mut LedStrip<SPI>, color: Rgb, delay: Duration) -> Result<()> {
    led_strip.fill(color);
    led_strip.show()?;
    Timer::after(delay).await;
    Ok(())
}

fn blank<SPI: SpiBus>(led_strip: &mut LedStrip<SPI>) -> Result<()> {
    led_strip.fill(colors::BLACK);
    led_strip.show()
}
