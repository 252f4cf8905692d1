//! Page directory and page table entry attribute bits.

use bitflags::bitflags;

bitflags! {
    /// The nine attribute bits shared by i386 page directory and page table entries.
    ///
    /// Bits 9-11 of an entry are available to software and bits 12-31 hold the frame
    /// address; neither is part of this set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PermissionSet: u32 {
        /// The entry is valid and used by the MMU for translation.
        const PRESENT = 1 << 0;
        /// Writes are allowed.
        const WRITABLE = 1 << 1;
        /// Accessible from user mode.
        const USER = 1 << 2;
        /// Write-through caching.
        const WRITE_THROUGH = 1 << 3;
        /// Caching disabled.
        const CACHE_DISABLED = 1 << 4;
        /// Set by the MMU when the mapping has been used.
        const ACCESSED = 1 << 5;
        /// Set by the MMU when the mapped page has been written.
        const DIRTY = 1 << 6;
        /// In a directory entry, maps a 4 MiB superpage instead of pointing at a table.
        const SUPERPAGE = 1 << 7;
        /// Not flushed from the TLB on address space switches.
        const GLOBAL = 1 << 8;
    }
}

impl PermissionSet {
    /// Mask of every attribute bit in an entry.
    pub const MASK: u32 = 0x1FF;

    /// Attributes that can be stored in a page table entry.
    ///
    /// Bit 7 of a page table entry is PAT, not a superpage marker, so it is never written
    /// through this set.
    pub const LEAF_APPLICABLE: Self = Self::all().difference(Self::SUPERPAGE);

    /// Extracts the attribute bits from a raw entry, ignoring frame and software bits.
    #[inline]
    pub const fn from_entry(raw: u32) -> Self {
        Self::from_bits_truncate(raw & Self::MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_positions_match_hardware() {
        assert_eq!(PermissionSet::PRESENT.bits(), 0x001);
        assert_eq!(PermissionSet::WRITABLE.bits(), 0x002);
        assert_eq!(PermissionSet::USER.bits(), 0x004);
        assert_eq!(PermissionSet::WRITE_THROUGH.bits(), 0x008);
        assert_eq!(PermissionSet::CACHE_DISABLED.bits(), 0x010);
        assert_eq!(PermissionSet::ACCESSED.bits(), 0x020);
        assert_eq!(PermissionSet::DIRTY.bits(), 0x040);
        assert_eq!(PermissionSet::SUPERPAGE.bits(), 0x080);
        assert_eq!(PermissionSet::GLOBAL.bits(), 0x100);
        assert_eq!(PermissionSet::all().bits(), PermissionSet::MASK);
    }

    #[test]
    fn from_entry_drops_frame_and_software_bits() {
        let flags = PermissionSet::from_entry(0x0012_3E63);
        assert_eq!(
            flags,
            PermissionSet::PRESENT
                | PermissionSet::WRITABLE
                | PermissionSet::ACCESSED
                | PermissionSet::DIRTY
        );
    }

    #[test]
    fn leaf_applicable_excludes_superpage() {
        assert!(!PermissionSet::LEAF_APPLICABLE.contains(PermissionSet::SUPERPAGE));
        assert_eq!(PermissionSet::LEAF_APPLICABLE.bits(), 0x17F);
    }
}
