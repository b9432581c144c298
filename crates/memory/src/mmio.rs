/// Callback interface for a memory-mapped device window.
///
/// `offset` is a byte offset relative to the start of the window and `size` is the access width in
/// bytes. Values are little-endian: byte `offset` lands in bits `0..8` of the returned value.
///
/// Reads are defined as `&mut self` because device registers may have read side effects.
pub trait MmioHandler {
    fn read(&mut self, offset: u64, size: usize) -> u64;
    fn write(&mut self, offset: u64, size: usize, value: u64);
}

impl<T: MmioHandler + ?Sized> MmioHandler for Box<T> {
    fn read(&mut self, offset: u64, size: usize) -> u64 {
        (**self).read(offset, size)
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        (**self).write(offset, size, value)
    }
}

/// Open-bus value for an access of `size` bytes.
///
/// Rejected or unmapped reads float high; the pattern is sized to the access width so callers
/// always get back a value of the width they asked for.
pub fn all_ones(size: usize) -> u64 {
    if size == 0 {
        return 0;
    }
    if size >= 8 {
        return u64::MAX;
    }
    (1u64 << (size * 8)) - 1
}

/// Access widths (in bytes) a window accepts.
///
/// The bus refuses accesses outside this range before they reach the handler, so handlers only
/// need to validate offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioAccessRange {
    pub min: usize,
    pub max: usize,
}

impl MmioAccessRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub const fn contains(&self, size: usize) -> bool {
        size >= self.min && size <= self.max
    }
}

impl Default for MmioAccessRange {
    fn default() -> Self {
        Self::new(1, 8)
    }
}

/// A window without a write path.
///
/// Reads are forwarded; stores are discarded without reaching the inner handler.
pub struct ReadOnlyMmio<H> {
    inner: H,
}

impl<H> ReadOnlyMmio<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H: MmioHandler> MmioHandler for ReadOnlyMmio<H> {
    fn read(&mut self, offset: u64, size: usize) -> u64 {
        self.inner.read(offset, size)
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        tracing::debug!(
            offset = format_args!("0x{offset:x}"),
            size,
            value = format_args!("0x{value:x}"),
            "discarding store to read-only window"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ones_is_sized_to_the_access_width() {
        assert_eq!(all_ones(0), 0);
        assert_eq!(all_ones(1), 0xFF);
        assert_eq!(all_ones(2), 0xFFFF);
        assert_eq!(all_ones(4), 0xFFFF_FFFF);
        assert_eq!(all_ones(8), u64::MAX);
        assert_eq!(all_ones(16), u64::MAX);
    }

    #[test]
    fn access_range_bounds_are_inclusive() {
        let range = MmioAccessRange::new(1, 4);
        assert!(!range.contains(0));
        assert!(range.contains(1));
        assert!(range.contains(4));
        assert!(!range.contains(8));
    }
}
