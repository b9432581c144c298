//! Raw byte windows used to stage inference input (BAR1) and expose results (BAR2).

/// Size of each data window and of the BAR1/BAR2 windows.
pub const DATA_WINDOW_SIZE: usize = 4096;

/// A fixed 4 KiB byte buffer addressed by byte offset.
///
/// Accesses of 1 to 8 bytes are accepted at any byte offset as long as they end within the
/// window; natural alignment is not required. Values are little-endian.
#[derive(Clone, PartialEq, Eq)]
pub struct DataWindow {
    bytes: Box<[u8; DATA_WINDOW_SIZE]>,
}

impl core::fmt::Debug for DataWindow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let nonzero = self.bytes.iter().filter(|&&b| b != 0).count();
        f.debug_struct("DataWindow")
            .field("len", &DATA_WINDOW_SIZE)
            .field("nonzero_bytes", &nonzero)
            .finish()
    }
}

impl Default for DataWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl DataWindow {
    pub fn new() -> Self {
        Self {
            bytes: Box::new([0; DATA_WINDOW_SIZE]),
        }
    }

    fn range(offset: usize, size: usize) -> Option<core::ops::Range<usize>> {
        if size == 0 || size > 8 {
            return None;
        }
        let end = offset.checked_add(size)?;
        (end <= DATA_WINDOW_SIZE).then_some(offset..end)
    }

    pub fn read(&self, offset: usize, size: usize) -> Option<u64> {
        let range = Self::range(offset, size)?;
        let mut buf = [0u8; 8];
        buf[..size].copy_from_slice(&self.bytes[range]);
        Some(u64::from_le_bytes(buf))
    }

    /// Stores the low `size` bytes of `value`; returns `false` without storing if out of range.
    pub fn write(&mut self, offset: usize, size: usize, value: u64) -> bool {
        let Some(range) = Self::range(offset, size) else {
            return false;
        };
        self.bytes[range].copy_from_slice(&value.to_le_bytes()[..size]);
        true
    }

    pub fn as_bytes(&self) -> &[u8; DATA_WINDOW_SIZE] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; DATA_WINDOW_SIZE] {
        &mut self.bytes
    }

    pub fn fill(&mut self, byte: u8) {
        self.bytes.fill(byte);
    }

    pub fn clear(&mut self) {
        self.fill(0);
    }

    pub fn is_zeroed(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}
