//! i386 two-level paging layout.
//!
//! A 32-bit virtual address is split into a 10-bit directory index, a 10-bit
//! table index and a 12-bit page offset. With PSE enabled a directory entry may
//! instead map a 4 MiB superpage directly, in which case the low 22 bits of the
//! virtual address are the offset into that superpage.
//!
//! ```text
//! 31          22 21          12 11             0
//! +-------------+--------------+----------------+
//! |  directory  |    table     |     offset     |
//! +-------------+--------------+----------------+
//! ```

/// Number of entries in a page directory or a page table.
pub const ENTRY_COUNT: usize = 1024;

/// Size of a small page in bytes (4 KiB).
pub const PAGE_SIZE: u32 = 4096;

/// Size of a superpage in bytes (4 MiB). This is also the span of one directory entry.
pub const LARGE_PAGE_SIZE: u32 = 4 * 1024 * 1024;

/// Shift of the table index within a virtual address.
pub const TABLE_SHIFT: u32 = 12;

/// Shift of the directory index within a virtual address.
pub const DIRECTORY_SHIFT: u32 = 22;

/// Size of the whole 32-bit address space, used as an exclusive upper bound.
pub const ADDRESS_SPACE_END: u64 = 1 << 32;

/// Virtual address at which the kernel maps all of physical memory.
pub const KERNEL_BASE: u32 = 0xF000_0000;

/// Returns the page directory index for a virtual address.
#[inline]
pub const fn directory_index(address: u32) -> usize {
    (address >> DIRECTORY_SHIFT) as usize
}

/// Returns the page table index for a virtual address.
#[inline]
pub const fn table_index(address: u32) -> usize {
    ((address >> TABLE_SHIFT) as usize) & (ENTRY_COUNT - 1)
}

/// Returns the offset of an address within its small page.
#[inline]
pub const fn page_offset(address: u32) -> u32 {
    address & (PAGE_SIZE - 1)
}

/// Returns the offset of an address within its superpage.
#[inline]
pub const fn large_page_offset(address: u32) -> u32 {
    address & (LARGE_PAGE_SIZE - 1)
}

/// Rounds `address` up to the next multiple of `align`, without wrapping past 4 GiB.
///
/// The result is a `u64` so that the end of the last region is representable.
#[inline]
pub const fn next_boundary(address: u64, align: u32) -> u64 {
    let align = align as u64;
    (address & !(align - 1)) + align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_address_into_indices() {
        let address = 0xF011_2345;
        assert_eq!(directory_index(address), 0x3C0);
        assert_eq!(table_index(address), 0x112);
        assert_eq!(page_offset(address), 0x345);
        assert_eq!(large_page_offset(address), 0x11_2345);
    }

    #[test]
    fn index_extremes() {
        assert_eq!(directory_index(0), 0);
        assert_eq!(table_index(0), 0);
        assert_eq!(directory_index(u32::MAX), ENTRY_COUNT - 1);
        assert_eq!(table_index(u32::MAX), ENTRY_COUNT - 1);
    }

    #[test]
    fn next_boundary_does_not_wrap() {
        assert_eq!(next_boundary(0x1234, PAGE_SIZE), 0x2000);
        assert_eq!(next_boundary(0x2000, PAGE_SIZE), 0x3000);
        assert_eq!(
            next_boundary(0xFFFF_F000, PAGE_SIZE),
            ADDRESS_SPACE_END
        );
        assert_eq!(
            next_boundary(0xFFC0_0001, LARGE_PAGE_SIZE),
            ADDRESS_SPACE_END
        );
    }
}
