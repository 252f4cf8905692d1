//! Listing of the mappings that cover a virtual range.

use paging::{
    AddressSpace, PageSize, VirtualAddress,
    layout::{ADDRESS_SPACE_END, LARGE_PAGE_SIZE, PAGE_SIZE, next_boundary},
};

use crate::Observation;

/// Lists the mappings covering `[start, start + length)`, one page or superpage at a time.
///
/// The listing starts at the page containing `start` and stops at the first address that
/// has no translation, which is reported as [`Observation::Unmapped`]. A range that runs
/// past the top of the address space is cut off there.
pub fn showmap(space: &AddressSpace, start: VirtualAddress, length: u32) -> Showmap<'_> {
    let end = (start.as_u32() as u64 + length as u64).min(ADDRESS_SPACE_END);
    Showmap {
        space,
        cursor: start.align_down(PAGE_SIZE).as_u32() as u64,
        end,
        finished: length == 0,
    }
}

/// Iterator returned by [`showmap`].
pub struct Showmap<'a> {
    space: &'a AddressSpace,
    cursor: u64,
    end: u64,
    finished: bool,
}

impl Iterator for Showmap<'_> {
    type Item = Observation;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.cursor >= self.end {
            return None;
        }

        let virt = VirtualAddress::new(self.cursor as u32);
        let Some(translation) = self.space.translate(virt) else {
            self.finished = true;
            return Some(Observation::Unmapped(virt));
        };

        self.cursor = match translation.size {
            PageSize::Large => next_boundary(self.cursor, LARGE_PAGE_SIZE),
            PageSize::Small => self.cursor + PAGE_SIZE as u64,
        };

        #[cfg(feature = "detailed-logging")]
        log::trace!("showmap {} -> {:?}", virt, translation);

        Some(Observation::Mapped {
            virt,
            phys: translation.physical,
            permissions: translation.permissions,
            size: translation.size,
        })
    }
}

impl core::iter::FusedIterator for Showmap<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;
    use paging::{AddressSpaceBuilder, PermissionSet, PhysicalAddress};

    const WP: PermissionSet = PermissionSet::WRITABLE;

    #[test]
    fn single_small_page() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        let frame = builder.allocate_frame();
        builder.map_page(VirtualAddress::new(0x1000), frame, WP);
        let space = builder.build();

        let lines: Vec<_> = showmap(&space, VirtualAddress::new(0x1000), 1).collect();
        assert_eq!(
            lines,
            [Observation::Mapped {
                virt: VirtualAddress::new(0x1000),
                phys: frame,
                permissions: PermissionSet::PRESENT | WP,
                size: PageSize::Small,
            }]
        );
        assert_eq!(
            format!("{}", lines[0]),
            format!("(PSE_OFF) VA: 0x00001000, PA: {}, PERM: -------WP", frame)
        );
    }

    #[test]
    fn gapless_range_yields_one_line_per_page() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        for page in 0..8u32 {
            let frame = builder.allocate_frame();
            builder.map_page(VirtualAddress::new(0x0001_0000 + page * PAGE_SIZE), frame, WP);
        }
        let space = builder.build();

        let count = showmap(&space, VirtualAddress::new(0x0001_0000), 5 * PAGE_SIZE + 1)
            .filter(|line| matches!(line, Observation::Mapped { .. }))
            .count();
        assert_eq!(count, 6);
    }

    #[test]
    fn unaligned_start_lists_containing_page() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        let frame = builder.allocate_frame();
        builder.map_page(VirtualAddress::new(0x3000), frame, WP);
        let space = builder.build();

        let lines: Vec<_> = showmap(&space, VirtualAddress::new(0x3FF0), 0x10).collect();
        assert_eq!(lines.len(), 1);
        assert!(matches!(
            lines[0],
            Observation::Mapped { virt, .. } if virt == VirtualAddress::new(0x3000)
        ));
    }

    #[test]
    fn stops_at_first_gap() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        let frame = builder.allocate_frame();
        builder.map_page(VirtualAddress::new(0x1000), frame, WP);
        builder.map_page(VirtualAddress::new(0x3000), frame, WP);
        let space = builder.build();

        let lines: Vec<_> = showmap(&space, VirtualAddress::new(0x1000), 3 * PAGE_SIZE).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], Observation::Unmapped(VirtualAddress::new(0x2000)));
    }

    #[test]
    fn unmapped_first_unit_yields_single_gap() {
        setup();
        let space = AddressSpaceBuilder::new().build();
        let lines: Vec<_> = showmap(&space, VirtualAddress::new(0x0080_0000), 0x0100_0000).collect();
        assert_eq!(lines, [Observation::Unmapped(VirtualAddress::new(0x0080_0000))]);
    }

    #[test]
    fn non_present_leaf_is_a_gap() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        builder.set_leaf_raw(VirtualAddress::new(0x1000), 0x0000_5002);
        let space = builder.build();

        let lines: Vec<_> = showmap(&space, VirtualAddress::new(0x1000), PAGE_SIZE).collect();
        assert_eq!(lines, [Observation::Unmapped(VirtualAddress::new(0x1000))]);
    }

    #[test]
    fn superpages_advance_to_next_boundary() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        builder.map_large_page(
            VirtualAddress::new(0x0040_0000),
            PhysicalAddress::new(0x0040_0000),
            WP,
        );
        builder.map_large_page(
            VirtualAddress::new(0x0080_0000),
            PhysicalAddress::new(0x0040_0000),
            PermissionSet::USER,
        );
        let space = builder.build();

        let lines: Vec<_> = showmap(&space, VirtualAddress::new(0x0043_2100), LARGE_PAGE_SIZE).collect();
        assert_eq!(
            lines,
            [
                Observation::Mapped {
                    virt: VirtualAddress::new(0x0043_2000),
                    phys: PhysicalAddress::new(0x0043_2000),
                    permissions: PermissionSet::PRESENT | WP | PermissionSet::SUPERPAGE,
                    size: PageSize::Large,
                },
                Observation::Mapped {
                    virt: VirtualAddress::new(0x0080_0000),
                    phys: PhysicalAddress::new(0x0040_0000),
                    permissions: PermissionSet::PRESENT
                        | PermissionSet::USER
                        | PermissionSet::SUPERPAGE,
                    size: PageSize::Large,
                },
            ]
        );
        assert!(format!("{}", lines[0]).starts_with("(PSE_ON) VA: 0x00432000, PA: 0x00432000"));
    }

    #[test]
    fn zero_length_lists_nothing() {
        setup();
        let space = AddressSpaceBuilder::new().build();
        assert_eq!(showmap(&space, VirtualAddress::new(0x1000), 0).count(), 0);
    }

    #[test]
    fn range_ending_at_top_of_address_space() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        builder.map_large_page(
            VirtualAddress::new(0xFFC0_0000),
            PhysicalAddress::new(0),
            WP,
        );
        let space = builder.build();

        let lines: Vec<_> = showmap(&space, VirtualAddress::new(0xFFFF_F000), u32::MAX).collect();
        assert_eq!(lines.len(), 1);
        assert!(matches!(lines[0], Observation::Mapped { size: PageSize::Large, .. }));
    }
}
