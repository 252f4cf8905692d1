//! Address space walking.
//!
//! An [`AddressSpace`] is a handle to a page directory. It resolves virtual addresses
//! through the directory and, unless a superpage is in effect, the second-level table.
//! Which address space is "active" is decided by the caller; nothing here looks at CR3.

use crate::{
    AddressTranslator, DirectoryEntry, LeafEntry, PageTable, PermissionSet, PhysicalAddress,
    VirtualAddress,
    layout::{LARGE_PAGE_SIZE, PAGE_SIZE},
};

/// Granularity of a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// A 4 KiB page mapped by a page table entry.
    Small,
    /// A 4 MiB superpage mapped directly by a directory entry.
    Large,
}

impl PageSize {
    /// Returns the size in bytes.
    pub const fn bytes(self) -> u32 {
        match self {
            PageSize::Small => PAGE_SIZE,
            PageSize::Large => LARGE_PAGE_SIZE,
        }
    }
}

/// The result of translating a virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    /// The physical address of the translated byte.
    pub physical: PhysicalAddress,
    /// The attribute bits of the entry that governs the translation.
    pub permissions: PermissionSet,
    /// Whether a page table entry or a superpage directory entry governs the translation.
    pub size: PageSize,
}

/// A virtual address space rooted at a page directory.
#[derive(Debug)]
pub struct AddressSpace {
    directory: PageTable,
}

impl AddressSpace {
    /// Creates a handle for the page directory at `root`.
    ///
    /// # Panics
    /// Panics if `root` is not page-aligned.
    pub fn new(root: PhysicalAddress) -> Self {
        Self {
            directory: PageTable::at(root),
        }
    }

    /// Returns the physical address of the page directory.
    pub fn root(&self) -> PhysicalAddress {
        self.directory.physical_address()
    }

    /// Returns the directory entry governing `virt`.
    pub fn directory_entry(&self, virt: VirtualAddress) -> DirectoryEntry {
        DirectoryEntry::from_raw(self.directory.entry(virt.directory_index()))
    }

    /// Returns the page table entry for `virt`.
    ///
    /// Returns None if the directory entry is not present, or if it maps a superpage, in
    /// which case there is no second level. Missing tables are never created.
    pub fn leaf_entry(&self, virt: VirtualAddress) -> Option<LeafEntry> {
        let table = self.leaf_table(virt)?;
        Some(LeafEntry::from_raw(table.entry(virt.table_index())))
    }

    /// Translates `virt` to a physical address.
    ///
    /// Returns None if any level of the walk is not present.
    pub fn translate(&self, virt: VirtualAddress) -> Option<Translation> {
        let directory = self.directory_entry(virt);
        if let Some(frame) = directory.large_frame() {
            return Some(Translation {
                physical: frame + virt.large_page_offset(),
                permissions: directory.permissions(),
                size: PageSize::Large,
            });
        }

        let leaf = self.leaf_entry(virt)?;
        let frame = leaf.frame()?;
        Some(Translation {
            physical: frame + virt.page_offset(),
            permissions: leaf.permissions(),
            size: PageSize::Small,
        })
    }

    /// Returns whether `virt` has a present translation.
    pub fn is_mapped(&self, virt: VirtualAddress) -> bool {
        self.translate(virt).is_some()
    }

    /// Reads the byte at `virt`, or None if it is not mapped.
    ///
    /// Frames inside the direct map are read through it, which works whether or not this
    /// address space is loaded. On hardware, a frame beyond the direct map (device memory
    /// mapped high, for example) is read at `virt` itself, which is only meaningful when
    /// this is the address space currently loaded in CR3.
    pub fn read_byte(&self, virt: VirtualAddress) -> Option<u8> {
        let translation = self.translate(virt)?;
        Some(AddressTranslator::current().read_mapped_byte(virt, translation.physical))
    }

    /// Reads the little-endian 32-bit word at `virt`, or None if any of its bytes is not
    /// mapped.
    pub fn read_word(&self, virt: VirtualAddress) -> Option<u32> {
        if virt.is_aligned(4) {
            let translation = self.translate(virt)?;
            let translator = AddressTranslator::current();
            if (translation.physical.as_u32() as u64) + 4 <= translator.physical_limit() {
                return Some(translator.read_word(translation.physical));
            }
        }

        let mut bytes = [0u8; 4];
        for (offset, byte) in bytes.iter_mut().enumerate() {
            let address = (virt.as_u32() as u64) + offset as u64;
            let address = VirtualAddress::new(u32::try_from(address).ok()?);
            *byte = self.read_byte(address)?;
        }
        Some(u32::from_le_bytes(bytes))
    }

    /// Rewrites the directory entry governing `virt` in place and returns the new value.
    ///
    /// # Safety
    /// The directory is live. The caller must only make changes that keep every mapping
    /// the kernel relies on valid, and must flush any stale TLB entries.
    pub unsafe fn update_directory_entry(
        &mut self,
        virt: VirtualAddress,
        update: impl FnOnce(&mut DirectoryEntry),
    ) -> DirectoryEntry {
        let index = virt.directory_index();
        let old = self.directory.entry(index);
        let mut entry = DirectoryEntry::from_raw(old);
        update(&mut entry);
        log::trace!("directory entry {index}: {old:#010x} -> {:#010x}", entry.raw());
        // SAFETY: Upheld by the caller.
        unsafe { self.directory.set_entry(index, entry.raw()) };
        entry
    }

    /// Rewrites the page table entry for `virt` in place and returns the new value.
    ///
    /// Returns None without touching anything if there is no second-level table for
    /// `virt`; a table is never allocated.
    ///
    /// # Safety
    /// Same contract as [`update_directory_entry`](Self::update_directory_entry).
    pub unsafe fn update_leaf_entry(
        &mut self,
        virt: VirtualAddress,
        update: impl FnOnce(&mut LeafEntry),
    ) -> Option<LeafEntry> {
        let table = self.leaf_table(virt)?;
        let index = virt.table_index();
        let old = table.entry(index);
        let mut entry = LeafEntry::from_raw(old);
        update(&mut entry);
        log::trace!(
            "table {} entry {index}: {old:#010x} -> {:#010x}",
            table.physical_address(),
            entry.raw()
        );
        // SAFETY: Upheld by the caller.
        unsafe { table.set_entry(index, entry.raw()) };
        Some(entry)
    }

    fn leaf_table(&self, virt: VirtualAddress) -> Option<PageTable> {
        self.directory_entry(virt)
            .table_address()
            .map(PageTable::at)
    }
}
