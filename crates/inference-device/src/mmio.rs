use std::cell::RefCell;
use std::rc::Rc;

use memory::MmioHandler;

use crate::device::InferenceDevice;

/// The three memory windows exposed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferenceBar {
    /// BAR0: register file.
    Registers,
    /// BAR1: input staging window.
    Input,
    /// BAR2: output window.
    Output,
}

impl InferenceBar {
    pub const fn index(self) -> u8 {
        match self {
            Self::Registers => 0,
            Self::Input => 1,
            Self::Output => 2,
        }
    }
}

/// [`MmioHandler`] for one BAR of a shared [`InferenceDevice`].
///
/// The output window has no write path: stores through an `Output` handler are discarded here,
/// before they reach the device.
pub struct InferenceBarMmio {
    dev: Rc<RefCell<InferenceDevice>>,
    bar: InferenceBar,
}

impl InferenceBarMmio {
    pub fn new(dev: Rc<RefCell<InferenceDevice>>, bar: InferenceBar) -> Self {
        Self { dev, bar }
    }
}

impl MmioHandler for InferenceBarMmio {
    fn read(&mut self, offset: u64, size: usize) -> u64 {
        let mut dev = self.dev.borrow_mut();
        match self.bar {
            InferenceBar::Registers => dev.bar0_read(offset, size),
            InferenceBar::Input => dev.bar1_read(offset, size),
            InferenceBar::Output => dev.bar2_read(offset, size),
        }
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        let mut dev = self.dev.borrow_mut();
        match self.bar {
            InferenceBar::Registers => dev.bar0_write(offset, size, value),
            InferenceBar::Input => dev.bar1_write(offset, size, value),
            InferenceBar::Output => {
                tracing::debug!(
                    offset = format_args!("0x{offset:x}"),
                    size,
                    "ignoring store to read-only output window"
                );
            }
        }
    }
}
