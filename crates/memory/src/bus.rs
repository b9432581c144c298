use crate::mmio::{all_ones, MmioAccessRange, MmioHandler};
use thiserror::Error;

/// Errors returned when mapping an MMIO window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("mmio window at 0x{base:x} has zero length")]
    EmptyRegion { base: u64 },

    #[error("mmio window at 0x{base:x} with length 0x{len:x} overflows the address space")]
    AddressOverflow { base: u64, len: u64 },

    #[error(
        "mmio window 0x{base:x}+0x{len:x} overlaps existing window 0x{existing_base:x}+0x{existing_len:x}"
    )]
    Overlap {
        base: u64,
        len: u64,
        existing_base: u64,
        existing_len: u64,
    },
}

/// Opaque handle for a mapped window, used to unmap it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MmioRegionId(u64);

struct MmioRegion {
    id: MmioRegionId,
    base: u64,
    len: u64,
    access: MmioAccessRange,
    handler: Box<dyn MmioHandler>,
}

impl MmioRegion {
    fn end(&self) -> u64 {
        // `map_mmio` rejects windows whose end overflows.
        self.base + self.len
    }
}

/// Guest-physical MMIO router.
///
/// Each access is delivered to the single window that fully contains `[paddr, paddr + size)`,
/// with the offset rebased to the window start. The bus is responsible for refusing access widths
/// the window does not advertise; such accesses, accesses that straddle a window edge, and
/// accesses to unmapped addresses behave like an open bus (reads float high, writes are dropped).
///
/// Accesses are serialized by `&mut self`: a handler never observes two concurrent accesses.
#[derive(Default)]
pub struct MmioBus {
    regions: Vec<MmioRegion>,
    next_id: u64,
}

impl MmioBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_mmio(
        &mut self,
        base: u64,
        len: u64,
        access: MmioAccessRange,
        handler: Box<dyn MmioHandler>,
    ) -> Result<MmioRegionId, MapError> {
        if len == 0 {
            return Err(MapError::EmptyRegion { base });
        }
        let end = base
            .checked_add(len)
            .ok_or(MapError::AddressOverflow { base, len })?;

        if let Some(existing) = self
            .regions
            .iter()
            .find(|r| base < r.end() && r.base < end)
        {
            return Err(MapError::Overlap {
                base,
                len,
                existing_base: existing.base,
                existing_len: existing.len,
            });
        }

        let id = MmioRegionId(self.next_id);
        self.next_id += 1;

        let pos = self.regions.partition_point(|r| r.base < base);
        self.regions.insert(
            pos,
            MmioRegion {
                id,
                base,
                len,
                access,
                handler,
            },
        );
        tracing::debug!(
            base = format_args!("0x{base:x}"),
            len = format_args!("0x{len:x}"),
            min = access.min,
            max = access.max,
            "mapped mmio window"
        );
        Ok(id)
    }

    /// Removes a window; returns `false` if the id is not mapped.
    pub fn unmap(&mut self, id: MmioRegionId) -> bool {
        let Some(pos) = self.regions.iter().position(|r| r.id == id) else {
            return false;
        };
        self.regions.remove(pos);
        true
    }

    pub fn is_mapped(&self, paddr: u64) -> bool {
        self.regions
            .iter()
            .any(|r| paddr >= r.base && paddr < r.end())
    }

    fn find_target(&mut self, paddr: u64, size: usize) -> Option<(&mut MmioRegion, u64)> {
        let access_end = paddr.checked_add(size as u64)?;

        // Regions are sorted by base and never overlap, so the candidate is the last region
        // starting at or below `paddr`.
        let idx = self.regions.partition_point(|r| r.base <= paddr);
        let region = self.regions.get_mut(idx.checked_sub(1)?)?;
        if access_end > region.end() {
            return None;
        }
        if !region.access.contains(size) {
            return None;
        }
        let offset = paddr - region.base;
        Some((region, offset))
    }

    pub fn read(&mut self, paddr: u64, size: usize) -> u64 {
        if size == 0 || size > 8 {
            return all_ones(size);
        }
        match self.find_target(paddr, size) {
            Some((region, offset)) => region.handler.read(offset, size) & all_ones(size),
            None => {
                tracing::trace!(
                    paddr = format_args!("0x{paddr:x}"),
                    size,
                    "open-bus mmio read"
                );
                all_ones(size)
            }
        }
    }

    pub fn write(&mut self, paddr: u64, size: usize, value: u64) {
        if size == 0 || size > 8 {
            return;
        }
        match self.find_target(paddr, size) {
            Some((region, offset)) => region.handler.write(offset, size, value & all_ones(size)),
            None => {
                tracing::trace!(
                    paddr = format_args!("0x{paddr:x}"),
                    size,
                    value = format_args!("0x{value:x}"),
                    "dropping open-bus mmio write"
                );
            }
        }
    }

    pub fn read_u8(&mut self, paddr: u64) -> u8 {
        self.read(paddr, 1) as u8
    }

    pub fn read_u16(&mut self, paddr: u64) -> u16 {
        self.read(paddr, 2) as u16
    }

    pub fn read_u32(&mut self, paddr: u64) -> u32 {
        self.read(paddr, 4) as u32
    }

    pub fn read_u64(&mut self, paddr: u64) -> u64 {
        self.read(paddr, 8)
    }

    pub fn write_u8(&mut self, paddr: u64, value: u8) {
        self.write(paddr, 1, u64::from(value));
    }

    pub fn write_u16(&mut self, paddr: u64, value: u16) {
        self.write(paddr, 2, u64::from(value));
    }

    pub fn write_u32(&mut self, paddr: u64, value: u32) {
        self.write(paddr, 4, u64::from(value));
    }

    pub fn write_u64(&mut self, paddr: u64, value: u64) {
        self.write(paddr, 8, value);
    }
}
