//! Guest-physical MMIO plumbing shared by the device models.
//!
//! This crate is the narrow seam between a device model and the host runtime: device windows are
//! exposed as [`MmioHandler`]s and the runtime routes guest loads/stores to them through an
//! [`MmioBus`].

#![forbid(unsafe_code)]

mod bus;
mod mmio;

pub use bus::{MapError, MmioBus, MmioRegionId};
pub use mmio::{all_ones, MmioAccessRange, MmioHandler, ReadOnlyMmio};
