//! Command engine: reacts to command bits in `CONTROL` and advances `STATUS`.
//!
//! The engine runs synchronously inside the BAR0 store that set a command bit. Commands are
//! evaluated in fixed priority order, `RESET` > `START` > `STOP`; at most one runs per store.
//!
//! ```text
//!            START ok                      STOP
//!   Idle ──────────────▶ Done      any ──────────▶ Idle
//!     │                             any ──────────▶ Idle (RESET, clears everything)
//!     └─ START err ──▶ Busy + STATUS.ERROR
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::config::InferenceDeviceConfig;
use crate::data_window::{DataWindow, DATA_WINDOW_SIZE};
use crate::regs::{RegisterFile, StatusBits, STATUS_ERROR_MAX};

/// Failure reported by a [`ComputeBackend`]. Each variant maps to a non-zero `STATUS.ERROR` code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    #[error("compute backend failed: {0}")]
    Backend(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation not supported by the compute backend")]
    Unsupported,

    #[error("compute backend reported error code {0}")]
    Code(u8),
}

impl ComputeError {
    /// `STATUS.ERROR` code for this failure, always in `1..=15`.
    pub fn code(&self) -> u8 {
        match self {
            ComputeError::Backend(_) => 1,
            ComputeError::InvalidInput(_) => 2,
            ComputeError::Unsupported => 3,
            ComputeError::Code(code) => (*code).clamp(1, STATUS_ERROR_MAX),
        }
    }
}

/// Pluggable compute strategy invoked by `START`/`STOP`.
///
/// `start` blocks the calling MMIO store until it returns. On success the engine copies `output`
/// into the BAR2 window; on failure the BAR2 window is left untouched. `output` is zeroed before
/// each call.
pub trait ComputeBackend {
    fn start(&mut self, input: &[u8], output: &mut [u8]) -> Result<(), ComputeError>;

    fn stop(&mut self) -> Result<(), ComputeError> {
        Ok(())
    }
}

impl<F> ComputeBackend for F
where
    F: FnMut(&[u8], &mut [u8]) -> Result<(), ComputeError>,
{
    fn start(&mut self, input: &[u8], output: &mut [u8]) -> Result<(), ComputeError> {
        self(input, output)
    }
}

/// Default backend: sleeps for a fixed latency, then fills the output with a constant byte.
#[derive(Debug, Clone)]
pub struct FillComputeBackend {
    pub fill: u8,
    pub latency: Duration,
}

impl FillComputeBackend {
    pub fn new(fill: u8, latency: Duration) -> Self {
        Self { fill, latency }
    }

    pub fn from_config(config: &InferenceDeviceConfig) -> Self {
        Self::new(config.output_fill, config.compute_latency())
    }
}

impl ComputeBackend for FillComputeBackend {
    fn start(&mut self, _input: &[u8], output: &mut [u8]) -> Result<(), ComputeError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        output.fill(self.fill);
        Ok(())
    }
}

/// What a single engine step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Reset,
    Completed,
    /// `START` failed; carries the `STATUS.ERROR` code.
    Failed(u8),
    Stopped,
    /// `STOP` ran but the backend reported an error; carries the `STATUS.ERROR` code.
    StopFailed(u8),
}

pub struct CommandEngine {
    backend: Box<dyn ComputeBackend>,
    scratch: Box<[u8; DATA_WINDOW_SIZE]>,
}

impl CommandEngine {
    pub fn new(backend: Box<dyn ComputeBackend>) -> Self {
        Self {
            backend,
            scratch: Box::new([0; DATA_WINDOW_SIZE]),
        }
    }

    pub fn set_backend(&mut self, backend: Box<dyn ComputeBackend>) {
        self.backend = backend;
    }

    /// Runs the highest-priority pending command, if any.
    ///
    /// Returns `None` when no command bit is set in `CONTROL`; the register file is then left
    /// untouched.
    pub fn step(
        &mut self,
        regs: &mut RegisterFile,
        input: &mut DataWindow,
        output: &mut DataWindow,
    ) -> Option<CommandOutcome> {
        let control = regs.control();
        if control.reset {
            Some(self.reset(regs, input, output))
        } else if control.start {
            Some(self.start(regs, input, output))
        } else if control.stop {
            Some(self.stop(regs))
        } else {
            None
        }
    }

    fn reset(
        &mut self,
        regs: &mut RegisterFile,
        input: &mut DataWindow,
        output: &mut DataWindow,
    ) -> CommandOutcome {
        regs.clear();
        input.clear();
        output.clear();
        tracing::debug!("inference device reset");
        CommandOutcome::Reset
    }

    fn start(
        &mut self,
        regs: &mut RegisterFile,
        input: &mut DataWindow,
        output: &mut DataWindow,
    ) -> CommandOutcome {
        regs.set_status(StatusBits {
            busy: true,
            done: false,
            error: 0,
        });
        let mut control = regs.control();
        control.stop = false;
        regs.set_control(control);

        tracing::debug!("inference started");
        self.scratch.fill(0);
        let result = self
            .backend
            .start(input.as_bytes(), &mut self.scratch[..]);

        let outcome = match result {
            Ok(()) => {
                output.as_bytes_mut().copy_from_slice(&self.scratch[..]);
                input.clear();
                regs.set_status(StatusBits {
                    busy: false,
                    done: true,
                    error: 0,
                });
                tracing::debug!("inference finished");
                CommandOutcome::Completed
            }
            Err(err) => {
                let code = err.code();
                // BUSY stays asserted with DONE clear so a failed run is never mistaken for a
                // completed one.
                regs.set_status(StatusBits {
                    busy: true,
                    done: false,
                    error: code,
                });
                tracing::warn!(code, error = %err, "inference failed");
                CommandOutcome::Failed(code)
            }
        };

        let mut control = regs.control();
        control.start = false;
        regs.set_control(control);
        outcome
    }

    fn stop(&mut self, regs: &mut RegisterFile) -> CommandOutcome {
        regs.set_status(StatusBits::default());
        let mut control = regs.control();
        control.start = false;
        regs.set_control(control);

        let outcome = match self.backend.stop() {
            Ok(()) => {
                tracing::debug!("inference stopped");
                CommandOutcome::Stopped
            }
            Err(err) => {
                let code = err.code();
                regs.set_status(StatusBits {
                    error: code,
                    ..StatusBits::default()
                });
                tracing::warn!(code, error = %err, "stop request failed");
                CommandOutcome::StopFailed(code)
            }
        };

        let mut control = regs.control();
        control.stop = false;
        regs.set_control(control);
        outcome
    }
}
