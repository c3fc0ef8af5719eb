//! Physical memory map of the KN100.
//!
//! The accelerator can reach six disjoint regions: four same-sized tightly
//! coupled SRAM banks, one region carved out of the system cache, and one
//! window into external DRAM. Model activations may land in any of them;
//! footprint accounting scans exactly this partition.

/// A closed-open physical address range `[base, base + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    /// First byte of the range.
    pub base: u64,
    /// Length in bytes. Never zero for the ranges defined here.
    pub len: u64,
}

impl AddressRange {
    /// Construct a range from base and length.
    #[must_use]
    pub const fn new(base: u64, len: u64) -> Self {
        Self { base, len }
    }

    /// Last byte covered by the range (inclusive).
    #[must_use]
    pub const fn last(&self) -> u64 {
        self.base + self.len - 1
    }

    /// Whether `addr` falls inside the range.
    #[must_use]
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr <= self.last()
    }
}

/// Number of tightly coupled SRAM banks.
pub const SRAM_BANK_COUNT: usize = 4;
/// Size of each SRAM bank in bytes (256 KiB).
pub const SRAM_BANK_SIZE: u64 = 256 * 1024;
/// Base address of SRAM bank 0; banks are contiguous.
pub const SRAM_BANK_BASE: u64 = 0x3000_0000;

/// Region carved from the system cache and handed to the NPU (2 MiB).
pub const CACHE_CARVE: AddressRange = AddressRange::new(0x3800_0000, 2 * 1024 * 1024);

/// External DRAM window visible to the NPU (64 MiB).
pub const EXTERNAL_WINDOW: AddressRange = AddressRange::new(0x8000_0000, 64 * 1024 * 1024);

/// SRAM bank `idx` as an address range.
///
/// # Panics
///
/// Panics if `idx >= SRAM_BANK_COUNT`.
#[must_use]
pub const fn sram_bank(idx: usize) -> AddressRange {
    assert!(idx < SRAM_BANK_COUNT);
    AddressRange::new(SRAM_BANK_BASE + (idx as u64) * SRAM_BANK_SIZE, SRAM_BANK_SIZE)
}

/// The fixed partition scanned for activation-memory accounting:
/// all SRAM banks, the cache-carve region, and the external window.
#[must_use]
pub const fn activation_regions() -> [AddressRange; SRAM_BANK_COUNT + 2] {
    [
        sram_bank(0),
        sram_bank(1),
        sram_bank(2),
        sram_bank(3),
        CACHE_CARVE,
        EXTERNAL_WINDOW,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sram_banks_contiguous() {
        for i in 1..SRAM_BANK_COUNT {
            assert_eq!(sram_bank(i).base, sram_bank(i - 1).last() + 1);
        }
    }

    #[test]
    fn regions_disjoint() {
        let regions = activation_regions();
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                assert!(a.last() < b.base || b.last() < a.base, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn contains_endpoints() {
        let r = AddressRange::new(0x1000, 0x100);
        assert!(r.contains(0x1000));
        assert!(r.contains(0x10FF));
        assert!(!r.contains(0x1100));
    }
}
