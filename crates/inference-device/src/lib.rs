//! PCI inference accelerator device model.
//!
//! The device exposes three memory windows:
//! - BAR0 (64 bytes): register file with `CONTROL`, two reserved alias registers, read-only
//!   `STATUS`, and padding. See [`regs`].
//! - BAR1 (4 KiB): input staging window, read/write.
//! - BAR2 (4 KiB): output window, read-only to the guest.
//!
//! Setting a command bit in `CONTROL` runs the [`CommandEngine`] synchronously inside the store,
//! so a driver observes `STATUS.DONE` on its very next read. There is no DMA, no interrupt
//! delivery and no background thread.
//!
//! The compute step is pluggable through [`ComputeBackend`]; the default
//! [`FillComputeBackend`] blocks for a configured latency and fills the output with a constant
//! byte.

#![forbid(unsafe_code)]

mod config;
mod data_window;
mod device;
mod driver;
mod engine;
mod mmio;
mod pci;
pub mod regs;

pub use config::{ConfigError, InferenceDeviceConfig, MAX_COMPUTE_LATENCY_MS};
pub use data_window::{DataWindow, DATA_WINDOW_SIZE};
pub use device::{DeviceStats, InferenceDevice};
pub use driver::{DriverError, InferenceBars, InferenceDriver};
pub use engine::{
    CommandEngine, CommandOutcome, ComputeBackend, ComputeError, FillComputeBackend,
};
pub use mmio::{InferenceBar, InferenceBarMmio};
pub use pci::{
    bar_layout, BarLayout, MemoryWindowRegistrar, MmioBusRegistrar, RegisterWindowError,
    BAR_LAYOUT, INFERENCE_DEVICE_NAME, INFERENCE_PCI_CLASS_CODE, INFERENCE_PCI_DEVICE_ID,
    INFERENCE_PCI_INTERRUPT_PIN, INFERENCE_PCI_REVISION, INFERENCE_PCI_VENDOR_ID,
};
pub use regs::{ControlBits, DeviceState, RegisterFile, StatusBits, REGISTER_FILE_SIZE};
