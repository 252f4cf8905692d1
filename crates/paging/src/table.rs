//! Page table structure.

use crate::{AddressTranslator, PhysicalAddress, layout::ENTRY_COUNT};

/// A view of one page directory or page table living in physical memory.
///
/// On i386 both levels are a single 4 KiB frame of 1024 32-bit entries, so the same
/// view serves for both; callers wrap the raw values in
/// [`DirectoryEntry`](crate::DirectoryEntry) or [`LeafEntry`](crate::LeafEntry).
/// All access goes through the current [`AddressTranslator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTable {
    base: PhysicalAddress,
}

impl PageTable {
    /// Size of one entry in bytes.
    const ENTRY_SIZE: u32 = 4;

    /// Creates a view of the table whose frame starts at `base`.
    ///
    /// # Panics
    /// Panics if `base` is not page-aligned.
    pub fn at(base: PhysicalAddress) -> Self {
        assert!(
            base.is_aligned(crate::layout::PAGE_SIZE),
            "page table must be page-aligned"
        );
        Self { base }
    }

    /// Returns the physical address of this table.
    pub const fn physical_address(&self) -> PhysicalAddress {
        self.base
    }

    /// Returns the raw entry at the given index.
    ///
    /// # Panics
    /// Panics if index >= 1024.
    pub fn entry(&self, index: usize) -> u32 {
        AddressTranslator::current().read_word(self.entry_address(index))
    }

    /// Overwrites the raw entry at the given index.
    ///
    /// # Safety
    /// The table must be a live paging structure owned by the caller's address space, and
    /// `value` must describe a mapping the caller is allowed to install. Any stale TLB
    /// entry for the affected range remains the caller's responsibility.
    ///
    /// # Panics
    /// Panics if index >= 1024.
    pub unsafe fn set_entry(&self, index: usize, value: u32) {
        let address = self.entry_address(index);
        // SAFETY: Upheld by the caller.
        unsafe { AddressTranslator::current().write_word(address, value) }
    }

    /// Returns the number of entries in this page table.
    pub const fn len(&self) -> usize {
        ENTRY_COUNT
    }

    fn entry_address(&self, index: usize) -> PhysicalAddress {
        assert!(index < ENTRY_COUNT, "page table index out of bounds");
        self.base + index as u32 * Self::ENTRY_SIZE
    }
}
