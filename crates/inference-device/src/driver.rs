//! Driver-side client that programs the device purely through guest-physical MMIO.
//!
//! This mirrors what a guest driver does after mapping the three BARs: reset the device, stage
//! input in BAR1, set `CONTROL.START`, poll `STATUS.DONE` and read the result from BAR2.

use std::time::{Duration, Instant};

use memory::MmioBus;
use thiserror::Error;

use crate::data_window::DATA_WINDOW_SIZE;
use crate::regs::{ControlBits, StatusBits, CONTROL, STATUS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("input of {len} bytes does not fit the {max}-byte input window")]
    InputTooLarge { len: usize, max: usize },

    #[error("requested {len} output bytes but the output window is {max} bytes")]
    OutputTooLarge { len: usize, max: usize },

    #[error("device did not report completion within {0:?}")]
    Timeout(Duration),

    #[error("device reported error code {0}")]
    DeviceError(u8),
}

/// Guest-physical base addresses of the device BARs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceBars {
    pub registers: u64,
    pub input: u64,
    pub output: u64,
}

pub struct InferenceDriver<'a> {
    bus: &'a mut MmioBus,
    bars: InferenceBars,
}

impl<'a> InferenceDriver<'a> {
    pub fn new(bus: &'a mut MmioBus, bars: InferenceBars) -> Self {
        Self { bus, bars }
    }

    fn write_control(&mut self, bits: ControlBits) {
        self.bus
            .write_u32(self.bars.registers + CONTROL as u64, bits.encode());
    }

    pub fn reset(&mut self) {
        self.write_control(ControlBits::RESET);
    }

    pub fn start(&mut self) {
        self.write_control(ControlBits::START);
    }

    pub fn stop(&mut self) {
        self.write_control(ControlBits::STOP);
    }

    pub fn status(&mut self) -> StatusBits {
        StatusBits::decode(self.bus.read_u32(self.bars.registers + STATUS as u64))
    }

    pub fn is_done(&mut self) -> bool {
        self.status().done
    }

    /// Copies `input` into the start of the input window using 8-byte stores and a byte tail.
    pub fn write_input(&mut self, input: &[u8]) -> Result<(), DriverError> {
        if input.len() > DATA_WINDOW_SIZE {
            return Err(DriverError::InputTooLarge {
                len: input.len(),
                max: DATA_WINDOW_SIZE,
            });
        }

        let mut chunks = input.chunks_exact(8);
        let mut offset = 0u64;
        for chunk in &mut chunks {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            self.bus
                .write_u64(self.bars.input + offset, u64::from_le_bytes(buf));
            offset += 8;
        }
        for &byte in chunks.remainder() {
            self.bus.write_u8(self.bars.input + offset, byte);
            offset += 1;
        }
        Ok(())
    }

    pub fn read_output(&mut self, len: usize) -> Result<Vec<u8>, DriverError> {
        if len > DATA_WINDOW_SIZE {
            return Err(DriverError::OutputTooLarge {
                len,
                max: DATA_WINDOW_SIZE,
            });
        }

        let mut out = Vec::with_capacity(len);
        let mut offset = 0u64;
        while out.len() + 8 <= len {
            let value = self.bus.read_u64(self.bars.output + offset);
            out.extend_from_slice(&value.to_le_bytes());
            offset += 8;
        }
        while out.len() < len {
            out.push(self.bus.read_u8(self.bars.output + offset));
            offset += 1;
        }
        Ok(out)
    }

    /// Polls `STATUS` until `DONE` is set.
    ///
    /// A non-zero `STATUS.ERROR` ends the wait early with [`DriverError::DeviceError`].
    pub fn wait_done(&mut self, timeout: Duration) -> Result<StatusBits, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.status();
            if status.done {
                return Ok(status);
            }
            if status.error != 0 {
                return Err(DriverError::DeviceError(status.error));
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(timeout));
            }
            std::hint::spin_loop();
        }
    }

    /// Stages `input`, runs one command and returns the full output window.
    pub fn run(&mut self, input: &[u8], timeout: Duration) -> Result<Vec<u8>, DriverError> {
        self.write_input(input)?;
        self.start();
        self.wait_done(timeout)?;
        self.read_output(DATA_WINDOW_SIZE)
    }
}
