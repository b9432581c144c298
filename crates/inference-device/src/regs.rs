//! BAR0 register file.
//!
//! Layout (byte offsets, little-endian, LSB-first bit numbering):
//!
//! | Offset      | Register      | Access              |
//! |-------------|---------------|---------------------|
//! | `0x00`      | `CONTROL`     | RW                  |
//! | `0x04`      | `CONTROL_W1S` | RW (reserved alias) |
//! | `0x08`      | `CONTROL_W1C` | RW (reserved alias) |
//! | `0x0C`      | `STATUS`      | RO                  |
//! | `0x10-0x3F` | padding       | RW, no effect       |
//!
//! The W1S/W1C aliases are plain storage: writing them does not touch `CONTROL`. They are kept
//! in the map so the window size and offsets stay stable if alias semantics are ever wired up.

use bitflags::bitflags;
use memory::all_ones;

pub const CONTROL: usize = 0x00;
pub const CONTROL_W1S: usize = 0x04;
pub const CONTROL_W1C: usize = 0x08;
pub const STATUS: usize = 0x0C;
pub const PADDING: usize = 0x10;

/// Size of the register file and of the BAR0 window.
pub const REGISTER_FILE_SIZE: usize = 64;

const STATUS_ERROR_SHIFT: u32 = 2;
const STATUS_ERROR_MASK: u32 = 0xF << STATUS_ERROR_SHIFT;

/// Largest value representable by the 4-bit `STATUS.ERROR` field.
pub const STATUS_ERROR_MAX: u8 = 0xF;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ControlFlags: u32 {
        const START = 1 << 0;
        const STOP = 1 << 1;
        const RESET = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u32 {
        const BUSY = 1 << 0;
        const DONE = 1 << 1;
    }
}

/// Decoded `CONTROL` command bits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControlBits {
    pub start: bool,
    pub stop: bool,
    pub reset: bool,
}

impl ControlBits {
    pub const START: Self = Self {
        start: true,
        stop: false,
        reset: false,
    };
    pub const STOP: Self = Self {
        start: false,
        stop: true,
        reset: false,
    };
    pub const RESET: Self = Self {
        start: false,
        stop: false,
        reset: true,
    };

    pub fn decode(raw: u32) -> Self {
        let flags = ControlFlags::from_bits_truncate(raw);
        Self {
            start: flags.contains(ControlFlags::START),
            stop: flags.contains(ControlFlags::STOP),
            reset: flags.contains(ControlFlags::RESET),
        }
    }

    /// Encodes the command bits; reserved bits are zero.
    pub fn encode(self) -> u32 {
        let mut flags = ControlFlags::empty();
        flags.set(ControlFlags::START, self.start);
        flags.set(ControlFlags::STOP, self.stop);
        flags.set(ControlFlags::RESET, self.reset);
        flags.bits()
    }

    pub fn any(self) -> bool {
        self.start || self.stop || self.reset
    }
}

/// Decoded `STATUS` register.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusBits {
    pub busy: bool,
    pub done: bool,
    /// 4-bit fault code; `0` means no fault.
    pub error: u8,
}

impl StatusBits {
    pub fn decode(raw: u32) -> Self {
        let flags = StatusFlags::from_bits_truncate(raw);
        Self {
            busy: flags.contains(StatusFlags::BUSY),
            done: flags.contains(StatusFlags::DONE),
            error: ((raw & STATUS_ERROR_MASK) >> STATUS_ERROR_SHIFT) as u8,
        }
    }

    /// Encodes the status; `error` saturates at [`STATUS_ERROR_MAX`].
    pub fn encode(self) -> u32 {
        let mut flags = StatusFlags::empty();
        flags.set(StatusFlags::BUSY, self.busy);
        flags.set(StatusFlags::DONE, self.done);
        let error = u32::from(self.error.min(STATUS_ERROR_MAX));
        flags.bits() | (error << STATUS_ERROR_SHIFT)
    }

    pub fn state(self) -> DeviceState {
        match (self.busy, self.done) {
            (false, false) => DeviceState::Idle,
            (false, true) => DeviceState::Done,
            // `(1, 1)` is never produced by the command engine.
            (true, _) => DeviceState::Busy,
        }
    }
}

/// Command engine state as encoded by `STATUS.BUSY`/`STATUS.DONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Busy,
    Done,
}

impl DeviceState {
    pub fn status_bits(self) -> StatusBits {
        match self {
            DeviceState::Idle => StatusBits::default(),
            DeviceState::Busy => StatusBits {
                busy: true,
                ..StatusBits::default()
            },
            DeviceState::Done => StatusBits {
                done: true,
                ..StatusBits::default()
            },
        }
    }
}

/// Byte image of the BAR0 register file.
///
/// This only models register memory: [`RegisterFile::apply_write`] stores bytes and nothing else.
/// Read-only filtering and command side effects belong to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    bytes: [u8; REGISTER_FILE_SIZE],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            bytes: [0; REGISTER_FILE_SIZE],
        }
    }

    fn range(offset: usize, size: usize) -> Option<core::ops::Range<usize>> {
        if size == 0 || size > 8 {
            return None;
        }
        let end = offset.checked_add(size)?;
        (end <= REGISTER_FILE_SIZE).then_some(offset..end)
    }

    /// Little-endian read of `size` bytes at `offset`, or `None` if out of range.
    pub fn read(&self, offset: usize, size: usize) -> Option<u64> {
        let range = Self::range(offset, size)?;
        let mut buf = [0u8; 8];
        buf[..size].copy_from_slice(&self.bytes[range]);
        Some(u64::from_le_bytes(buf))
    }

    /// 32-bit read; out-of-range offsets float high.
    pub fn read32(&self, offset: usize) -> u32 {
        self.read(offset, 4).unwrap_or(all_ones(4)) as u32
    }

    /// Stores the low `size` bytes of `value` at `offset`. Returns `false` (and stores nothing) if
    /// the access is out of range.
    pub fn apply_write(&mut self, offset: usize, size: usize, value: u64) -> bool {
        let Some(range) = Self::range(offset, size) else {
            return false;
        };
        self.bytes[range].copy_from_slice(&value.to_le_bytes()[..size]);
        true
    }

    fn write32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn control_raw(&self) -> u32 {
        self.read32(CONTROL)
    }

    pub fn control(&self) -> ControlBits {
        ControlBits::decode(self.control_raw())
    }

    /// Replaces the command bits of `CONTROL`, preserving its reserved bits.
    pub fn set_control(&mut self, bits: ControlBits) {
        let reserved = self.control_raw() & !ControlFlags::all().bits();
        self.write32(CONTROL, reserved | bits.encode());
    }

    pub fn status_raw(&self) -> u32 {
        self.read32(STATUS)
    }

    pub fn status(&self) -> StatusBits {
        StatusBits::decode(self.status_raw())
    }

    pub fn set_status(&mut self, status: StatusBits) {
        self.write32(STATUS, status.encode());
    }

    pub fn as_bytes(&self) -> &[u8; REGISTER_FILE_SIZE] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

/// Returns true if `[offset, offset + size)` overlaps the read-only `STATUS` register.
pub fn overlaps_status(offset: usize, size: usize) -> bool {
    let end = offset.saturating_add(size);
    offset < STATUS + 4 && STATUS < end
}
