//! Page directory and page table entries.

use core::fmt;

use crate::{PermissionSet, PhysicalAddress};

/// A first-level entry of an i386 page directory.
///
/// The entry format:
/// - Bits 0-8: Attributes ([`PermissionSet`]); bit 7 selects a 4 MiB superpage
/// - Bits 9-11: Available to software
/// - Bits 12-31: Physical address of the page table, or
/// - Bits 22-31: Physical address of the superpage frame when bit 7 is set
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct DirectoryEntry(u32);

impl DirectoryEntry {
    /// Page table address mask.
    const TABLE_MASK: u32 = 0xFFFF_F000;

    /// Superpage frame address mask.
    const LARGE_FRAME_MASK: u32 = 0xFFC0_0000;

    /// Creates an entry from a raw value.
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value of this entry.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the attribute bits of this entry.
    pub const fn permissions(self) -> PermissionSet {
        PermissionSet::from_entry(self.0)
    }

    /// Returns whether this entry is present.
    pub const fn is_present(self) -> bool {
        self.0 & PermissionSet::PRESENT.bits() != 0
    }

    /// Returns whether this entry maps a superpage.
    ///
    /// This reports the bit alone; a superpage is only in effect when the entry is also
    /// present.
    pub const fn is_superpage(self) -> bool {
        self.0 & PermissionSet::SUPERPAGE.bits() != 0
    }

    /// Returns the physical address of the second-level table.
    ///
    /// Returns None if the entry is not present or maps a superpage.
    pub fn table_address(self) -> Option<PhysicalAddress> {
        if self.is_present() && !self.is_superpage() {
            Some(PhysicalAddress::new(self.0 & Self::TABLE_MASK))
        } else {
            None
        }
    }

    /// Returns the physical base of the superpage frame.
    ///
    /// Returns None if the entry is not a present superpage.
    pub fn large_frame(self) -> Option<PhysicalAddress> {
        if self.is_present() && self.is_superpage() {
            Some(PhysicalAddress::new(self.0 & Self::LARGE_FRAME_MASK))
        } else {
            None
        }
    }

    /// Replaces the attribute bits of a superpage entry.
    ///
    /// Present and Superpage are always re-asserted, so a superpage can be re-protected
    /// but never unmapped or demoted this way. Frame and software bits are preserved.
    pub fn set_superpage_permissions(&mut self, permissions: PermissionSet) {
        let permissions = permissions | PermissionSet::PRESENT | PermissionSet::SUPERPAGE;
        self.0 = (self.0 & !PermissionSet::MASK) | permissions.bits();
    }
}

impl fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryEntry")
            .field("raw", &format_args!("{:#010x}", self.0))
            .field("flags", &self.permissions())
            .finish()
    }
}

/// A second-level entry of an i386 page table.
///
/// The entry format:
/// - Bits 0-8: Attributes ([`PermissionSet`]); bit 7 is PAT and never treated as a superpage
/// - Bits 9-11: Available to software
/// - Bits 12-31: Physical address of the 4 KiB frame
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct LeafEntry(u32);

impl LeafEntry {
    /// Frame address mask.
    const FRAME_MASK: u32 = 0xFFFF_F000;

    /// Creates an entry from a raw value.
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value of this entry.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the attribute bits of this entry.
    pub const fn permissions(self) -> PermissionSet {
        PermissionSet::from_entry(self.0)
    }

    /// Returns whether this entry is present.
    pub const fn is_present(self) -> bool {
        self.0 & PermissionSet::PRESENT.bits() != 0
    }

    /// Returns the physical address of the mapped frame.
    ///
    /// Returns None if the entry is not present.
    pub fn frame(self) -> Option<PhysicalAddress> {
        if self.is_present() {
            Some(PhysicalAddress::new(self.0 & Self::FRAME_MASK))
        } else {
            None
        }
    }

    /// Replaces the attribute bits of this entry.
    ///
    /// The set is masked to [`PermissionSet::LEAF_APPLICABLE`] and Present is always
    /// re-asserted. Frame and software bits are preserved.
    pub fn set_permissions(&mut self, permissions: PermissionSet) {
        let permissions =
            (permissions & PermissionSet::LEAF_APPLICABLE) | PermissionSet::PRESENT;
        self.0 = (self.0 & !PermissionSet::MASK) | permissions.bits();
    }
}

impl fmt::Debug for LeafEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafEntry")
            .field("raw", &format_args!("{:#010x}", self.0))
            .field("flags", &self.permissions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_table_address() {
        let entry = DirectoryEntry::from_raw(0x0003_5007);
        assert!(entry.is_present());
        assert!(!entry.is_superpage());
        assert_eq!(entry.table_address(), Some(PhysicalAddress::new(0x0003_5000)));
        assert_eq!(entry.large_frame(), None);
    }

    #[test]
    fn directory_superpage_frame() {
        let entry = DirectoryEntry::from_raw(0x0040_0083);
        assert!(entry.is_superpage());
        assert_eq!(entry.large_frame(), Some(PhysicalAddress::new(0x0040_0000)));
        assert_eq!(entry.table_address(), None);
    }

    #[test]
    fn absent_directory_has_no_target() {
        let entry = DirectoryEntry::from_raw(0x0040_0080);
        assert!(!entry.is_present());
        assert_eq!(entry.large_frame(), None);
        assert_eq!(entry.table_address(), None);
    }

    #[test]
    fn superpage_permissions_keep_present_and_superpage() {
        let mut entry = DirectoryEntry::from_raw(0x0040_0E83);
        entry.set_superpage_permissions(PermissionSet::USER);
        assert_eq!(entry.raw(), 0x0040_0E85);
        assert!(entry.is_present());
        assert!(entry.is_superpage());
    }

    #[test]
    fn leaf_frame() {
        let entry = LeafEntry::from_raw(0x0012_3063);
        assert_eq!(entry.frame(), Some(PhysicalAddress::new(0x0012_3000)));
        assert_eq!(LeafEntry::from_raw(0x0012_3000).frame(), None);
    }

    #[test]
    fn leaf_permissions_keep_present_and_drop_superpage() {
        let mut entry = LeafEntry::from_raw(0x0012_3A07);
        entry.set_permissions(PermissionSet::WRITABLE | PermissionSet::SUPERPAGE);
        assert_eq!(entry.raw(), 0x0012_3A03);
    }
}
