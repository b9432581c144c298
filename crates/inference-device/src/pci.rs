//! PCI identity of the inference device and registration of its memory windows with the host.

use std::cell::RefCell;
use std::rc::Rc;

use memory::{MapError, MmioAccessRange, MmioBus, MmioHandler, MmioRegionId, ReadOnlyMmio};
use thiserror::Error;

use crate::data_window::DATA_WINDOW_SIZE;
use crate::device::InferenceDevice;
use crate::mmio::{InferenceBar, InferenceBarMmio};
use crate::regs::REGISTER_FILE_SIZE;

pub const INFERENCE_PCI_VENDOR_ID: u16 = 0x1234;
pub const INFERENCE_PCI_DEVICE_ID: u16 = 0xCAFE;
pub const INFERENCE_PCI_REVISION: u8 = 0x00;
/// Base class `0x0B` (processor).
pub const INFERENCE_PCI_CLASS_CODE: u8 = 0x0B;
/// INTA#. Advertised only; the device never raises an interrupt.
pub const INFERENCE_PCI_INTERRUPT_PIN: u8 = 1;
pub const INFERENCE_DEVICE_NAME: &str = "pci-inference-device";

/// Static description of one memory BAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarLayout {
    pub bar: InferenceBar,
    pub size: u64,
    pub access: MmioAccessRange,
    pub read_only: bool,
}

impl BarLayout {
    pub const fn index(&self) -> u8 {
        self.bar.index()
    }
}

pub const BAR_LAYOUT: [BarLayout; 3] = [
    BarLayout {
        bar: InferenceBar::Registers,
        size: REGISTER_FILE_SIZE as u64,
        access: MmioAccessRange::new(1, 4),
        read_only: false,
    },
    BarLayout {
        bar: InferenceBar::Input,
        size: DATA_WINDOW_SIZE as u64,
        access: MmioAccessRange::new(1, 8),
        read_only: false,
    },
    BarLayout {
        bar: InferenceBar::Output,
        size: DATA_WINDOW_SIZE as u64,
        access: MmioAccessRange::new(1, 8),
        read_only: true,
    },
];

pub fn bar_layout(bar: InferenceBar) -> BarLayout {
    BAR_LAYOUT[usize::from(bar.index())]
}

/// Host-side service that exposes a device window to the guest.
///
/// `handler` receives byte offsets relative to the window start. The host must serialize calls
/// and refuse access widths outside `access`. Read-only windows are registered with a handler
/// that has no write path.
pub trait MemoryWindowRegistrar {
    type Handle;
    type Error;

    fn register_memory_window(
        &mut self,
        bar: u8,
        length: u64,
        access: MmioAccessRange,
        handler: Box<dyn MmioHandler>,
    ) -> Result<Self::Handle, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterWindowError {
    #[error("no guest-physical base configured for BAR{0}")]
    UnknownBar(u8),

    #[error("failed to map BAR{bar}: {source}")]
    Map {
        bar: u8,
        #[source]
        source: MapError,
    },
}

/// [`MemoryWindowRegistrar`] that maps windows on an [`MmioBus`] at fixed guest-physical bases.
pub struct MmioBusRegistrar<'a> {
    bus: &'a mut MmioBus,
    bases: [Option<u64>; 6],
}

impl<'a> MmioBusRegistrar<'a> {
    pub fn new(bus: &'a mut MmioBus) -> Self {
        Self {
            bus,
            bases: [None; 6],
        }
    }

    pub fn with_base(mut self, bar: u8, base: u64) -> Self {
        if let Some(slot) = self.bases.get_mut(usize::from(bar)) {
            *slot = Some(base);
        }
        self
    }
}

impl MemoryWindowRegistrar for MmioBusRegistrar<'_> {
    type Handle = MmioRegionId;
    type Error = RegisterWindowError;

    fn register_memory_window(
        &mut self,
        bar: u8,
        length: u64,
        access: MmioAccessRange,
        handler: Box<dyn MmioHandler>,
    ) -> Result<MmioRegionId, RegisterWindowError> {
        let base = self
            .bases
            .get(usize::from(bar))
            .copied()
            .flatten()
            .ok_or(RegisterWindowError::UnknownBar(bar))?;
        self.bus
            .map_mmio(base, length, access, handler)
            .map_err(|source| RegisterWindowError::Map { bar, source })
    }
}

impl InferenceDevice {
    /// Registers BAR0..BAR2 of a shared device with the host, in BAR order.
    ///
    /// Called once per device instance at creation time.
    pub fn register_windows<R: MemoryWindowRegistrar>(
        dev: &Rc<RefCell<InferenceDevice>>,
        registrar: &mut R,
    ) -> Result<Vec<R::Handle>, R::Error> {
        let mut handles = Vec::with_capacity(BAR_LAYOUT.len());
        for layout in BAR_LAYOUT {
            let mmio = InferenceBarMmio::new(Rc::clone(dev), layout.bar);
            let handler: Box<dyn MmioHandler> = if layout.read_only {
                Box::new(ReadOnlyMmio::new(mmio))
            } else {
                Box::new(mmio)
            };
            handles.push(registrar.register_memory_window(
                layout.index(),
                layout.size,
                layout.access,
                handler,
            )?);
        }
        Ok(handles)
    }
}
