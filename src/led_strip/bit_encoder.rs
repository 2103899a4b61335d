//! WS2812 wire encoding over SPI.
//!
//! A WS2812 bit is a high pulse whose width tells 0 from 1. Clocking the SPI bus
//! at a multiple of the LED bit rate lets each SPI byte stand in for one or two
//! LED bits:
//!
//! | Packing              | SPI clock | LED bits per SPI byte | Symbols                                 |
//! |----------------------|-----------|-----------------------|-----------------------------------------|
//! | [`Packing::EightBit`] | 8×        | 1                     | `0 → 0x80`, `1 → 0xF8`                  |
//! | [`Packing::FourBit`]  | 4×        | 2                     | `00 → 0x88`, `01 → 0x8E`, `10 → 0xE8`, `11 → 0xEE` |
//!
//! Bits go out most significant first. Short strips use the compact 4-bit form
//! (see [`Packing::select`]).

use crate::{Error, Result};

/// Byte count at or below which [`Packing::select`] picks [`Packing::FourBit`] (7 pixels).
pub const FOUR_BIT_MAX_BYTES_DEFAULT: usize = 21;

/// Largest LED bit rate every packing can be clocked for.
pub const LED_HZ_MAX: u32 = u32::MAX / 8;

const EIGHT_BIT_ZERO: u8 = 0x80;
const EIGHT_BIT_ONE: u8 = 0xF8;

const FOUR_BIT_BASE: u8 = 0x88;
const FOUR_BIT_HIGH: u8 = 0x60;
const FOUR_BIT_LOW: u8 = 0x06;

/// How LED bits map onto SPI bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Packing {
    /// One SPI byte per LED bit, SPI clock at 8× the LED rate.
    EightBit,
    /// One SPI byte per two LED bits, SPI clock at 4× the LED rate.
    FourBit,
}

impl Packing {
    /// Pick the packing for a frame of `len` color bytes.
    ///
    /// Frames of at most `compact_max_bytes` use [`Packing::FourBit`].
    #[must_use]
    pub const fn select(len: usize, compact_max_bytes: usize) -> Self {
        if len <= compact_max_bytes {
            Self::FourBit
        } else {
            Self::EightBit
        }
    }

    /// SPI bytes produced per color byte.
    #[must_use]
    pub const fn symbols_per_byte(self) -> usize {
        match self {
            Self::EightBit => 8,
            Self::FourBit => 4,
        }
    }

    /// SPI clock needed to send LED bits at `led_hz`. Saturates at `u32::MAX`.
    #[must_use]
    pub const fn spi_clock_hz(self, led_hz: u32) -> u32 {
        led_hz.saturating_mul(self.symbols_per_byte() as u32)
    }
}

/// Encode color bytes into SPI wire symbols.
///
/// The output is `bytes.len() * packing.symbols_per_byte()` long.
#[must_use]
pub fn encode(bytes: &[u8], packing: Packing) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * packing.symbols_per_byte());
    match packing {
        Packing::EightBit => {
            for &byte in bytes {
                out.extend((0..8).rev().map(|bit| {
                    if (byte >> bit) & 1 == 1 { EIGHT_BIT_ONE } else { EIGHT_BIT_ZERO }
                }));
            }
        }
        Packing::FourBit => {
            for &byte in bytes {
                out.extend((0..4).rev().map(|pair| four_bit_symbol(byte >> (2 * pair))));
            }
        }
    }
    out
}

/// Recover color bytes from SPI wire symbols.
///
/// Trailing symbols that do not fill a whole byte are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidSymbol`] for any byte that is not a symbol of `packing`.
pub fn decode(symbols: &[u8], packing: Packing) -> Result<Vec<u8>> {
    symbols
        .chunks_exact(packing.symbols_per_byte())
        .map(|chunk| {
            chunk.iter().try_fold(0u8, |byte, &symbol| match packing {
                Packing::EightBit => match symbol {
                    EIGHT_BIT_ZERO => Ok(byte << 1),
                    EIGHT_BIT_ONE => Ok((byte << 1) | 1),
                    _ => Err(Error::InvalidSymbol(symbol)),
                },
                Packing::FourBit => four_bit_pair(symbol).map(|pair| (byte << 2) | pair),
            })
        })
        .collect()
}

// Low two bits of `bits`, high bit first.
const fn four_bit_symbol(bits: u8) -> u8 {
    let high = (bits >> 1) & 1;
    let low = bits & 1;
    FOUR_BIT_BASE | (high * FOUR_BIT_HIGH) | (low * FOUR_BIT_LOW)
}

fn four_bit_pair(symbol: u8) -> Result<u8> {
    (0..4)
        .find(|&pair| four_bit_symbol(pair) == symbol)
        .ok_or(Error::InvalidSymbol(symbol))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_bit_symbols_are_msb_first() {
        assert_eq!(
            encode(&[0b1010_0001], Packing::EightBit),
            [0xF8, 0x80, 0xF8, 0x80, 0x80, 0x80, 0x80, 0xF8]
        );
    }

    #[test]
    fn four_bit_symbol_table() {
        assert_eq!(encode(&[0b00_01_10_11], Packing::FourBit), [0x88, 0x8E, 0xE8, 0xEE]);
        assert_eq!(encode(&[0xFF], Packing::FourBit), [0xEE; 4]);
        assert_eq!(encode(&[0x00], Packing::FourBit), [0x88; 4]);
    }

    #[test]
    fn decode_inverts_encode() {
        let bytes = [0x00, 0x12, 0x7F, 0x80, 0xA5, 0xFF];
        for packing in [Packing::EightBit, Packing::FourBit] {
            let symbols = encode(&bytes, packing);
            assert_eq!(symbols.len(), bytes.len() * packing.symbols_per_byte());
            assert_eq!(decode(&symbols, packing).expect("valid symbols"), bytes);
        }
    }

    #[test]
    fn decode_rejects_foreign_symbols() {
        assert!(matches!(
            decode(&[0x88, 0x8E, 0xFF, 0xEE], Packing::FourBit),
            Err(Error::InvalidSymbol(0xFF))
        ));
        assert!(matches!(
            decode(&[0x88; 8], Packing::EightBit),
            Err(Error::InvalidSymbol(0x88))
        ));
    }

    #[test]
    fn selection_threshold_is_inclusive() {
        assert_eq!(Packing::select(21, FOUR_BIT_MAX_BYTES_DEFAULT), Packing::FourBit);
        assert_eq!(Packing::select(24, FOUR_BIT_MAX_BYTES_DEFAULT), Packing::EightBit);
        assert_eq!(Packing::select(0, 0), Packing::FourBit);
    }

    #[test]
    fn spi_clock_scales_with_packing() {
        assert_eq!(Packing::EightBit.spi_clock_hz(800_000), 6_400_000);
        assert_eq!(Packing::FourBit.spi_clock_hz(800_000), 3_200_000);
        assert_eq!(Packing::EightBit.spi_clock_hz(LED_HZ_MAX), LED_HZ_MAX * 8);
        assert_eq!(Packing::EightBit.spi_clock_hz(4_000_000_000), u32::MAX);
    }
}
