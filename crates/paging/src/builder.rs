//! Construction of address spaces in emulated memory.
//!
//! The kernel builds its page tables long before the monitor runs, so only tests and
//! tooling built with `software-emulation` need to create them.

use crate::{
    AddressSpace, AddressTranslator, DirectoryEntry, PageTable, PermissionSet, PhysicalAddress,
    VirtualAddress,
    layout::{LARGE_PAGE_SIZE, PAGE_SIZE},
};

/// Allocates a zeroed, page-aligned frame from the current emulated memory.
fn alloc_frame(size: u32) -> PhysicalAddress {
    AddressTranslator::current()
        .allocate(size as usize, size as usize)
        .expect("out of emulated memory")
}

/// Builds a page directory and its tables in emulated physical memory.
#[derive(Debug)]
pub struct AddressSpaceBuilder {
    directory: PageTable,
}

impl AddressSpaceBuilder {
    /// Allocates an empty page directory.
    pub fn new() -> Self {
        Self {
            directory: PageTable::at(alloc_frame(PAGE_SIZE)),
        }
    }

    /// Allocates a zeroed 4 KiB data frame.
    pub fn allocate_frame(&mut self) -> PhysicalAddress {
        alloc_frame(PAGE_SIZE)
    }

    /// Maps the 4 KiB page at `virt` to `phys`. Present is always added to `flags`.
    ///
    /// A page table is allocated if the directory entry is empty. Intermediate entries
    /// are created present, writable and user-accessible so the leaf alone decides
    /// access.
    ///
    /// # Panics
    /// Panics if either address is not page-aligned, or if `virt` lies in a superpage.
    pub fn map_page(
        &mut self,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        flags: PermissionSet,
    ) -> &mut Self {
        assert!(
            virt.is_aligned(PAGE_SIZE),
            "virtual address must be page-aligned"
        );
        assert!(
            phys.is_aligned(PAGE_SIZE),
            "physical address must be page-aligned"
        );

        let flags = (flags & PermissionSet::LEAF_APPLICABLE) | PermissionSet::PRESENT;
        let table = self.walk_or_create(virt);
        // SAFETY: The table belongs to this builder and is not in use by any MMU.
        unsafe { table.set_entry(virt.table_index(), phys.as_u32() | flags.bits()) };
        self
    }

    /// Maps the 4 MiB superpage at `virt` to `phys`. Present and Superpage are always
    /// added to `flags`.
    ///
    /// # Panics
    /// Panics if either address is not 4 MiB aligned.
    pub fn map_large_page(
        &mut self,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        flags: PermissionSet,
    ) -> &mut Self {
        assert!(
            virt.is_aligned(LARGE_PAGE_SIZE),
            "virtual address must be superpage-aligned"
        );
        assert!(
            phys.is_aligned(LARGE_PAGE_SIZE),
            "physical address must be superpage-aligned"
        );

        let flags = flags | PermissionSet::PRESENT | PermissionSet::SUPERPAGE;
        self.set_directory_raw(virt, phys.as_u32() | flags.bits())
    }

    /// Writes a raw value into the directory entry governing `virt`.
    ///
    /// Used to describe entries the mapping helpers would never produce, such as a
    /// superpage bit without Present.
    pub fn set_directory_raw(&mut self, virt: VirtualAddress, raw: u32) -> &mut Self {
        // SAFETY: The directory belongs to this builder and is not in use by any MMU.
        unsafe { self.directory.set_entry(virt.directory_index(), raw) };
        self
    }

    /// Writes a raw value into the page table entry for `virt`, allocating the table if
    /// needed.
    pub fn set_leaf_raw(&mut self, virt: VirtualAddress, raw: u32) -> &mut Self {
        let table = self.walk_or_create(virt);
        // SAFETY: The table belongs to this builder and is not in use by any MMU.
        unsafe { table.set_entry(virt.table_index(), raw) };
        self
    }

    /// Copies `bytes` into physical memory starting at `phys`.
    pub fn write_bytes(&mut self, phys: PhysicalAddress, bytes: &[u8]) -> &mut Self {
        let translator = AddressTranslator::current();
        for (offset, byte) in bytes.iter().enumerate() {
            let address = phys + offset as u32;
            assert!(
                (address.as_u32() as u64) < translator.physical_limit(),
                "physical address beyond the top of memory"
            );
            // SAFETY: Bounds are checked above and emulated memory is interior-mutable.
            unsafe { core::ptr::write_volatile(translator.phys_to_ptr::<u8>(address), *byte) };
        }
        self
    }

    /// Writes a 32-bit word into physical memory at `phys`.
    pub fn write_word(&mut self, phys: PhysicalAddress, value: u32) -> &mut Self {
        // SAFETY: Emulated memory has no owner other than the test building it.
        unsafe { AddressTranslator::current().write_word(phys, value) };
        self
    }

    /// Finishes building and returns a handle to the address space.
    pub fn build(&self) -> AddressSpace {
        AddressSpace::new(self.directory.physical_address())
    }

    fn walk_or_create(&mut self, virt: VirtualAddress) -> PageTable {
        let index = virt.directory_index();
        let entry = DirectoryEntry::from_raw(self.directory.entry(index));
        assert!(
            !(entry.is_present() && entry.is_superpage()),
            "address lies within a superpage"
        );

        if let Some(table) = entry.table_address() {
            return PageTable::at(table);
        }

        let table = alloc_frame(PAGE_SIZE);
        let flags = PermissionSet::PRESENT | PermissionSet::WRITABLE | PermissionSet::USER;
        // SAFETY: The directory belongs to this builder and is not in use by any MMU.
        unsafe { self.directory.set_entry(index, table.as_u32() | flags.bits()) };
        PageTable::at(table)
    }
}

impl Default for AddressSpaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() {
        if AddressTranslator::try_current().is_none() {
            AddressTranslator::set_current(AddressTranslator::emulated(8 * 1024 * 1024));
        }
    }

    #[test]
    fn map_page_creates_table_once() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        let frame = builder.allocate_frame();
        builder
            .map_page(VirtualAddress::new(0x1000), frame, PermissionSet::WRITABLE)
            .map_page(VirtualAddress::new(0x2000), frame, PermissionSet::empty());
        let space = builder.build();

        let directory = space.directory_entry(VirtualAddress::new(0x1000));
        assert_eq!(
            directory.table_address(),
            space
                .directory_entry(VirtualAddress::new(0x2000))
                .table_address()
        );
        assert_eq!(
            space.leaf_entry(VirtualAddress::new(0x2000)).unwrap().raw(),
            frame.as_u32() | 0x1
        );
    }

    #[test]
    #[should_panic(expected = "address lies within a superpage")]
    fn map_page_inside_superpage_panics() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        builder.map_large_page(
            VirtualAddress::new(0),
            PhysicalAddress::new(0),
            PermissionSet::empty(),
        );
        builder.map_page(
            VirtualAddress::new(0x1000),
            PhysicalAddress::new(0x1000),
            PermissionSet::empty(),
        );
    }

    #[test]
    fn writes_reach_physical_memory() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        let frame = builder.allocate_frame();
        builder.write_bytes(frame + 1, &[0xAB]).write_word(frame + 4, 0x1234_5678);

        let translator = AddressTranslator::current();
        assert_eq!(translator.read_byte(frame + 1), 0xAB);
        assert_eq!(translator.read_word(frame + 4), 0x1234_5678);
    }
}
