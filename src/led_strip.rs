//! A device abstraction for NeoPixel-style (WS2812) LED strips driven over SPI.
//!
//! [`PixelBuffer`] holds one frame in wire form: brightness already applied and
//! each pixel's bytes already in the strip's [`ChannelOrder`]. [`LedStrip`] owns
//! the SPI bus and a buffer, and [`show`](LedStrip::show) encodes the buffer with
//! [`bit_encoder`] and transmits it.
//!
//! For continuous animation, hand the strip to
//! [`led_player::device_loop`](crate::led_player::device_loop).
//!
//! # Example: Write a Single Frame
//!
//! ```no_run
//! # fn example<SPI: embedded_hal::spi::SpiBus>(spi: SPI) -> robot_actuators::Result<()> {
//! use robot_actuators::led_strip::{ChannelOrder, LedStrip, StripConfig, colors};
//!
//! let config = StripConfig::new(16, 0, 0)
//!     .with_channel_order(ChannelOrder::Grb)
//!     .with_brightness(64);
//! let mut led_strip = LedStrip::new(spi, config);
//!
//! for pixel_index in 0..led_strip.len() {
//!     led_strip.set_pixel(pixel_index, [colors::BLUE, colors::GRAY][pixel_index % 2])?;
//! }
//! led_strip.show()?;
//! # Ok(())
//! # }
//! ```

pub mod bit_encoder;

/// Predefined RGB color constants from the `smart_leds` crate.
///
/// Common colors include `RED`, `GREEN`, `BLUE`, `YELLOW`, `WHITE`, `BLACK`, `CYAN`, `MAGENTA`, `ORANGE`, `PURPLE`.
#[doc(inline)]
pub use smart_leds::colors;

use core::str::FromStr;

use embassy_time::Duration;
use embedded_hal::spi::SpiBus;
use smart_leds::{RGB8, SmartLedsWrite};
use tracing::trace;

use crate::{Error, Result};
use bit_encoder::{FOUR_BIT_MAX_BYTES_DEFAULT, Packing};

/// RGB color type used by the strips (alias of `smart_leds::RGB8`).
pub type Rgb = RGB8;

/// Bytes per pixel on the wire.
pub const BYTES_PER_PIXEL: usize = 3;

/// Longest strip accepted from configuration.
pub const PIXEL_COUNT_MAX: usize = 4_096;

/// Default WS2812 bit rate.
pub const LED_CLOCK_HZ_DEFAULT: u32 = 800_000;

/// Default brightness (no scaling).
pub const BRIGHTNESS_DEFAULT: u8 = 255;

/// Default time between animation frames.
pub const FRAME_INTERVAL_DEFAULT: Duration = Duration::from_millis(20);

// ============================================================================
// Channel Order
// ============================================================================

/// Order in which a strip expects the three color bytes of each pixel.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelOrder {
    /// Red, green, blue.
    Rgb,
    /// Red, blue, green.
    Rbg,
    /// Green, red, blue (most WS2812 parts).
    #[default]
    Grb,
    /// Green, blue, red.
    Gbr,
    /// Blue, red, green.
    Brg,
    /// Blue, green, red.
    Bgr,
}

impl ChannelOrder {
    /// Every order, in the order listed above.
    pub const ALL: [Self; 6] = [Self::Rgb, Self::Rbg, Self::Grb, Self::Gbr, Self::Brg, Self::Bgr];

    /// Name as written in configuration (`"GRB"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => "RGB",
            Self::Rbg => "RBG",
            Self::Grb => "GRB",
            Self::Gbr => "GBR",
            Self::Brg => "BRG",
            Self::Bgr => "BGR",
        }
    }

    /// Wire position of the red, green and blue bytes.
    const fn offsets(self) -> [usize; 3] {
        match self {
            Self::Rgb => [0, 1, 2],
            Self::Rbg => [0, 2, 1],
            Self::Grb => [1, 0, 2],
            Self::Gbr => [2, 0, 1],
            Self::Brg => [1, 2, 0],
            Self::Bgr => [2, 1, 0],
        }
    }

    /// Lay `color` out in wire order.
    #[must_use]
    pub const fn permute(self, color: Rgb) -> [u8; 3] {
        let [r, g, b] = self.offsets();
        let mut wire = [0u8; 3];
        wire[r] = color.r;
        wire[g] = color.g;
        wire[b] = color.b;
        wire
    }

    /// Inverse of [`permute`](Self::permute).
    #[must_use]
    pub const fn unpermute(self, wire: [u8; 3]) -> Rgb {
        let [r, g, b] = self.offsets();
        Rgb::new(wire[r], wire[g], wire[b])
    }
}

impl core::fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelOrder {
    type Err = Error;

    /// Parse `"RGB"`, `"grb"`, ... (case-insensitive).
    fn from_str(text: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|order| order.as_str().eq_ignore_ascii_case(text.trim()))
            .ok_or_else(|| Error::config(format!("unknown rgb_type {text:?}")))
    }
}

// ============================================================================
// Brightness
// ============================================================================

/// Lookup table mapping a color value to `value * brightness / 255`.
#[must_use]
pub const fn brightness_table(brightness: u8) -> [u8; 256] {
    let mut result = [0u8; 256];
    let mut index = 0;
    while index < 256 {
        result[index] = ((index as u32 * brightness as u32) / 255) as u8;
        index += 1;
    }
    result
}

// ============================================================================
// Strip Configuration
// ============================================================================

/// Static description of one strip. Immutable once built.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StripConfig {
    pixel_count: usize,
    bus_id: u8,
    device_id: u8,
    clock_hz: u32,
    channel_order: ChannelOrder,
    brightness: u8,
    dma: Option<u8>,
    frame_interval: Duration,
    compact_max_bytes: usize,
    demo: bool,
}

impl StripConfig {
    /// `pixel_count` LEDs on `/dev/spidev{bus_id}.{device_id}`, everything else default.
    #[must_use]
    pub const fn new(pixel_count: usize, bus_id: u8, device_id: u8) -> Self {
        Self {
            pixel_count,
            bus_id,
            device_id,
            clock_hz: LED_CLOCK_HZ_DEFAULT,
            channel_order: ChannelOrder::Grb,
            brightness: BRIGHTNESS_DEFAULT,
            dma: None,
            frame_interval: FRAME_INTERVAL_DEFAULT,
            compact_max_bytes: FOUR_BIT_MAX_BYTES_DEFAULT,
            demo: false,
        }
    }

    /// LED bit rate in Hz (default [`LED_CLOCK_HZ_DEFAULT`]).
    #[must_use]
    pub const fn with_clock_hz(mut self, clock_hz: u32) -> Self {
        self.clock_hz = clock_hz;
        self
    }

    /// Byte order the strip expects (default GRB).
    #[must_use]
    pub const fn with_channel_order(mut self, channel_order: ChannelOrder) -> Self {
        self.channel_order = channel_order;
        self
    }

    /// Scale applied to every color value (default [`BRIGHTNESS_DEFAULT`]).
    #[must_use]
    pub const fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }

    /// DMA channel hint. Recorded only; the kernel SPI driver picks its own.
    #[must_use]
    pub const fn with_dma(mut self, dma: u8) -> Self {
        self.dma = Some(dma);
        self
    }

    /// Time between animation frames (default [`FRAME_INTERVAL_DEFAULT`]).
    #[must_use]
    pub const fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    /// Largest frame, in bytes, sent with the compact 4-bit packing.
    #[must_use]
    pub const fn with_compact_max_bytes(mut self, compact_max_bytes: usize) -> Self {
        self.compact_max_bytes = compact_max_bytes;
        self
    }

    /// Run the startup demo when the animation starts.
    #[must_use]
    pub const fn with_demo(mut self, demo: bool) -> Self {
        self.demo = demo;
        self
    }

    /// Number of LEDs.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// SPI bus number.
    #[must_use]
    pub const fn bus_id(&self) -> u8 {
        self.bus_id
    }

    /// SPI chip-select number.
    #[must_use]
    pub const fn device_id(&self) -> u8 {
        self.device_id
    }

    /// LED bit rate in Hz.
    #[must_use]
    pub const fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Byte order on the wire.
    #[must_use]
    pub const fn channel_order(&self) -> ChannelOrder {
        self.channel_order
    }

    /// Brightness scale (255 = full).
    #[must_use]
    pub const fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Configured DMA channel, if any.
    #[must_use]
    pub const fn dma(&self) -> Option<u8> {
        self.dma
    }

    /// Time between animation frames.
    #[must_use]
    pub const fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Largest frame sent with the compact packing.
    #[must_use]
    pub const fn compact_max_bytes(&self) -> usize {
        self.compact_max_bytes
    }

    /// Whether the startup demo runs.
    #[must_use]
    pub const fn demo(&self) -> bool {
        self.demo
    }

    /// Packing used for every frame of this strip.
    #[must_use]
    pub const fn packing(&self) -> Packing {
        Packing::select(self.pixel_count.saturating_mul(BYTES_PER_PIXEL), self.compact_max_bytes)
    }

    /// SPI clock the bus must run at for [`packing`](Self::packing).
    #[must_use]
    pub const fn spi_clock_hz(&self) -> u32 {
        self.packing().spi_clock_hz(self.clock_hz)
    }
}

// ============================================================================
// Pixel Buffer
// ============================================================================

/// One frame of pixels, stored in wire form.
///
/// Colors are scaled by brightness and permuted into the channel order as they
/// are written, so [`as_bytes`](Self::as_bytes) is ready to encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    bytes: Vec<u8>,
    channel_order: ChannelOrder,
    brightness: u8,
    scale: [u8; 256],
}

impl PixelBuffer {
    /// A black frame of `pixel_count` pixels.
    #[must_use]
    pub fn new(pixel_count: usize, channel_order: ChannelOrder, brightness: u8) -> Self {
        Self {
            bytes: vec![0; pixel_count * BYTES_PER_PIXEL],
            channel_order,
            brightness,
            scale: brightness_table(brightness),
        }
    }

    /// A black frame sized and ordered for `config`.
    #[must_use]
    pub fn for_strip(config: &StripConfig) -> Self {
        Self::new(config.pixel_count(), config.channel_order(), config.brightness())
    }

    /// Number of pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / BYTES_PER_PIXEL
    }

    /// `true` for a zero-length strip.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Byte order used on the wire.
    #[must_use]
    pub const fn channel_order(&self) -> ChannelOrder {
        self.channel_order
    }

    /// Brightness applied on write.
    #[must_use]
    pub const fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Store `color` at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`.
    pub fn set_pixel(&mut self, index: usize, color: Rgb) -> Result<()> {
        let wire = self.wire_color(color);
        self.slot_mut(index)?.copy_from_slice(&wire);
        Ok(())
    }

    /// Set every pixel to `color`.
    pub fn fill(&mut self, color: Rgb) {
        let wire = self.wire_color(color);
        for slot in self.bytes.chunks_exact_mut(BYTES_PER_PIXEL) {
            slot.copy_from_slice(&wire);
        }
    }

    /// Set pixel `index` to `color_at(index)` for every pixel.
    pub fn fill_with(&mut self, mut color_at: impl FnMut(usize) -> Rgb) {
        let Self {
            bytes,
            channel_order,
            scale,
            ..
        } = self;
        for (index, slot) in bytes.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            slot.copy_from_slice(&wire_color(scale, *channel_order, color_at(index)));
        }
    }

    /// Set every pixel to black.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Stored wire bytes of pixel `index`: scaled and in channel order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`.
    pub fn pixel(&self, index: usize) -> Result<[u8; 3]> {
        let start = self.start_of(index)?;
        let mut wire = [0u8; 3];
        wire.copy_from_slice(&self.bytes[start..start + BYTES_PER_PIXEL]);
        Ok(wire)
    }

    /// Scaled color of pixel `index` in logical RGB order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`.
    pub fn color(&self, index: usize) -> Result<Rgb> {
        Ok(self.channel_order.unpermute(self.pixel(index)?))
    }

    /// `true` when every byte is zero.
    #[must_use]
    pub fn is_black(&self) -> bool {
        self.bytes.iter().all(|&byte| byte == 0)
    }

    /// Flat wire bytes, pixel 0 first.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encode the frame for transmission.
    #[must_use]
    pub fn encode(&self, packing: Packing) -> Vec<u8> {
        bit_encoder::encode(&self.bytes, packing)
    }

    fn wire_color(&self, color: Rgb) -> [u8; 3] {
        wire_color(&self.scale, self.channel_order, color)
    }

    fn start_of(&self, index: usize) -> Result<usize> {
        if index < self.len() {
            Ok(index * BYTES_PER_PIXEL)
        } else {
            Err(Error::IndexOutOfRange {
                index,
                len: self.len(),
            })
        }
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        let start = self.start_of(index)?;
        Ok(&mut self.bytes[start..start + BYTES_PER_PIXEL])
    }
}

fn wire_color(scale: &[u8; 256], channel_order: ChannelOrder, color: Rgb) -> [u8; 3] {
    let scaled = Rgb::new(
        scale[usize::from(color.r)],
        scale[usize::from(color.g)],
        scale[usize::from(color.b)],
    );
    channel_order.permute(scaled)
}

// ============================================================================
// LED Strip
// ============================================================================

/// A WS2812 strip on an SPI bus.
///
/// See the [module documentation](mod@crate::led_strip) for usage.
pub struct LedStrip<SPI> {
    spi: SPI,
    config: StripConfig,
    buffer: PixelBuffer,
    packing: Packing,
}

impl<SPI: SpiBus> LedStrip<SPI> {
    /// Wrap a bus already clocked at [`StripConfig::spi_clock_hz`]. Starts black; nothing is sent.
    #[must_use]
    pub fn new(spi: SPI, config: StripConfig) -> Self {
        Self {
            spi,
            buffer: PixelBuffer::for_strip(&config),
            packing: config.packing(),
            config,
        }
    }

    /// Number of LEDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// `true` for a zero-length strip.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The configuration this strip was built with.
    #[must_use]
    pub const fn config(&self) -> &StripConfig {
        &self.config
    }

    /// Packing used by [`show`](Self::show).
    #[must_use]
    pub const fn packing(&self) -> Packing {
        self.packing
    }

    /// The frame that the next [`show`](Self::show) sends.
    #[must_use]
    pub const fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Mutable access to the pending frame.
    pub fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buffer
    }

    /// Store `color` at `index` in the pending frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`.
    pub fn set_pixel(&mut self, index: usize, color: Rgb) -> Result<()> {
        self.buffer.set_pixel(index, color)
    }

    /// Set every pixel of the pending frame to `color`.
    pub fn fill(&mut self, color: Rgb) {
        self.buffer.fill(color);
    }

    /// Set every pixel of the pending frame to black.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Encode the pending frame and send it, waiting for the bus to finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the SPI transfer fails.
    pub fn show(&mut self) -> Result<()> {
        let symbols = self.buffer.encode(self.packing);
        trace!(
            "led strip spidev{}.{}: {} bytes ({:?})",
            self.config.bus_id(),
            self.config.device_id(),
            symbols.len(),
            self.packing
        );
        self.spi.write(&symbols).map_err(|err| Error::spi(&err))?;
        self.spi.flush().map_err(|err| Error::spi(&err))
    }

    /// Give back the bus.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiBus> SmartLedsWrite for LedStrip<SPI> {
    type Error = Error;
    type Color = Rgb;

    /// Replace the frame with `iterator` (missing pixels become black) and show it.
    fn write<T, I>(&mut self, iterator: T) -> Result<()>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        self.buffer.clear();
        for (index, color) in iterator.into_iter().enumerate() {
            self.buffer.set_pixel(index, color.into())?;
        }
        self.show()
    }
}
