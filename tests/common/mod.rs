//! Recording buses for host tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, I2c, Operation};
use embedded_hal::spi::{self, SpiBus};
use robot_actuators::led_strip::bit_encoder::{self, Packing};

// ============================================================================
// I2C
// ============================================================================

/// A PCA9685 stand-in: a 256-byte register file that records every write.
///
/// Clones share state, so a test keeps one handle while the driver owns another.
#[derive(Clone)]
pub struct RecordingI2c {
    state: Arc<Mutex<I2cState>>,
}

struct I2cState {
    registers: [u8; 256],
    pointer: u8,
    writes: Vec<(u8, Vec<u8>)>,
    failing_registers: Vec<u8>,
}

impl Default for RecordingI2c {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(I2cState {
                registers: [0; 256],
                pointer: 0,
                writes: Vec::new(),
                failing_registers: Vec::new(),
            })),
        }
    }
}

impl RecordingI2c {
    fn state(&self) -> MutexGuard<'_, I2cState> {
        self.state.lock().expect("mock bus lock")
    }

    /// Every successful write, as `(address, bytes)`.
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.state().writes.clone()
    }

    /// Successful two-byte register writes, as `(register, value)`.
    pub fn register_writes(&self) -> Vec<(u8, u8)> {
        self.state()
            .writes
            .iter()
            .filter_map(|(_, bytes)| match bytes.as_slice() {
                [register, value] => Some((*register, *value)),
                _ => None,
            })
            .collect()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.state().writes.len()
    }

    /// Current value of `register`.
    pub fn register(&self, register: u8) -> u8 {
        self.state().registers[usize::from(register)]
    }

    /// ON-time held by PCA9685 `channel`.
    pub fn channel_duty(&self, channel: u8) -> u16 {
        let on_l = 0x06 + 4 * channel;
        u16::from_le_bytes([self.register(on_l), self.register(on_l + 1)])
    }

    /// Fail every later write to `register`.
    pub fn fail_register(&self, register: u8) {
        self.state().failing_registers.push(register);
    }

    /// Forget recorded writes (registers keep their values).
    pub fn clear(&self) {
        self.state().writes.clear();
    }
}

impl i2c::ErrorType for RecordingI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for RecordingI2c {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        let mut state = self.state();
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    let Some((&register, values)) = bytes.split_first() else {
                        continue;
                    };
                    if state.failing_registers.contains(&register) {
                        return Err(i2c::ErrorKind::Bus);
                    }
                    state.writes.push((address, bytes.to_vec()));
                    state.pointer = register;
                    for &value in values {
                        let pointer = state.pointer;
                        state.registers[usize::from(pointer)] = value;
                        state.pointer = pointer.wrapping_add(1);
                    }
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = state.registers[usize::from(state.pointer)];
                        state.pointer = state.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

/// A delay that returns immediately.
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

// ============================================================================
// SPI
// ============================================================================

/// An SPI bus that keeps every transmitted frame.
#[derive(Clone, Default)]
pub struct RecordingSpi {
    state: Arc<Mutex<SpiState>>,
}

#[derive(Default)]
struct SpiState {
    frames: Vec<Vec<u8>>,
    failing: bool,
}

impl RecordingSpi {
    fn state(&self) -> MutexGuard<'_, SpiState> {
        self.state.lock().expect("mock bus lock")
    }

    /// Raw SPI bytes of every frame sent.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state().frames.clone()
    }

    /// Number of frames sent.
    pub fn frame_count(&self) -> usize {
        self.state().frames.len()
    }

    /// Color bytes of frame `index`.
    pub fn decoded(&self, index: usize, packing: Packing) -> Vec<u8> {
        let frame = self.state().frames[index].clone();
        bit_encoder::decode(&frame, packing).expect("frame holds valid symbols")
    }

    /// Color bytes of the most recent frame.
    pub fn last_decoded(&self, packing: Packing) -> Vec<u8> {
        let count = self.frame_count();
        assert!(count > 0, "no frame sent yet");
        self.decoded(count - 1, packing)
    }

    /// Make every later write fail.
    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }
}

impl spi::ErrorType for RecordingSpi {
    type Error = spi::ErrorKind;
}

impl SpiBus for RecordingSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        words.fill(0);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.state();
        if state.failing {
            return Err(spi::ErrorKind::Other);
        }
        state.frames.push(words.to_vec());
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        read.fill(0);
        self.write(write)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.write(words)?;
        words.fill(0);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Poll `condition` until it holds, panicking after five seconds.
pub fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}
