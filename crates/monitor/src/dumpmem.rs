//! Byte dumps of physical or virtual memory.

use paging::{
    AddressSpace, AddressTranslator, PhysicalAddress, VirtualAddress,
    layout::{ADDRESS_SPACE_END, LARGE_PAGE_SIZE, PAGE_SIZE, next_boundary},
};

use crate::{ByteLocation, MonitorError, Observation};

/// The addressing domain a dump is taken in.
#[derive(Debug, Clone, Copy)]
pub enum DumpMode<'a> {
    /// Addresses are physical and read through the direct map, without translation.
    Physical,
    /// Addresses are virtual and translated through the given address space.
    Virtual(&'a AddressSpace),
}

/// Dumps every byte of `[start, start + length)`.
///
/// `start` is a physical or a virtual address depending on `mode`. Exactly one
/// [`Observation`] is produced per address. In virtual mode, addresses with no
/// translation are reported as [`Observation::Unmapped`] and the dump carries on past
/// them. In physical mode the range is clamped to the top of physical memory; the clamp
/// is logged and reported by [`Dumpmem::truncation`].
pub fn dumpmem(mode: DumpMode<'_>, start: u32, length: u32) -> Dumpmem<'_> {
    let mut end = (start as u64 + length as u64).min(ADDRESS_SPACE_END);
    let mut truncation = None;

    if let DumpMode::Physical = mode {
        let limit = AddressTranslator::current().physical_limit();
        if end > limit {
            let notice = MonitorError::RangeTruncated {
                requested_end: end,
                limit,
            };
            log::warn!("{}; dumping up to the top", notice);
            truncation = Some(notice);
            end = limit;
        }
    }

    Dumpmem {
        mode,
        cursor: start as u64,
        end,
        chunk: Chunk::EMPTY,
        truncation,
    }
}

/// Iterator returned by [`dumpmem`].
pub struct Dumpmem<'a> {
    mode: DumpMode<'a>,
    cursor: u64,
    end: u64,
    chunk: Chunk,
    truncation: Option<MonitorError>,
}

/// A run of addresses that share one translation outcome.
#[derive(Debug, Clone, Copy)]
struct Chunk {
    end: u64,
    /// Physical address of the first byte of the run, or None for a gap.
    phys_base: Option<PhysicalAddress>,
    virt_base: u64,
}

impl Chunk {
    const EMPTY: Self = Self {
        end: 0,
        phys_base: None,
        virt_base: 0,
    };
}

impl Dumpmem<'_> {
    /// Returns the truncation notice if a physical dump was clamped.
    pub fn truncation(&self) -> Option<MonitorError> {
        self.truncation
    }

    /// Finds the run of addresses starting at the cursor that resolve the same way.
    ///
    /// Runs never cross the granularity of the entry that governs them, so each one
    /// costs a single walk.
    fn next_chunk(&self, space: &AddressSpace) -> Chunk {
        let virt = VirtualAddress::new(self.cursor as u32);
        let directory = space.directory_entry(virt);

        let (end, phys_base) = if let Some(frame) = directory.large_frame() {
            let end = next_boundary(self.cursor, LARGE_PAGE_SIZE);
            (end, Some(frame + virt.large_page_offset()))
        } else if directory.table_address().is_none() {
            (next_boundary(self.cursor, LARGE_PAGE_SIZE), None)
        } else {
            let end = next_boundary(self.cursor, PAGE_SIZE);
            let phys = space
                .leaf_entry(virt)
                .and_then(|leaf| leaf.frame())
                .map(|frame| frame + virt.page_offset());
            (end, phys)
        };

        #[cfg(feature = "detailed-logging")]
        log::trace!("dumpmem run {} to {:#x}: {:?}", virt, end, phys_base);

        Chunk {
            end: end.min(self.end),
            phys_base,
            virt_base: self.cursor,
        }
    }
}

impl Iterator for Dumpmem<'_> {
    type Item = Observation;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }

        let translator = AddressTranslator::current();
        let observation = match self.mode {
            DumpMode::Physical => {
                let phys = PhysicalAddress::new(self.cursor as u32);
                Observation::MappedByte {
                    location: ByteLocation::Physical(phys),
                    value: translator.read_byte(phys),
                }
            }
            DumpMode::Virtual(space) => {
                if self.cursor >= self.chunk.end {
                    self.chunk = self.next_chunk(space);
                }
                let virt = VirtualAddress::new(self.cursor as u32);
                match self.chunk.phys_base {
                    Some(base) => {
                        let phys = base + (self.cursor - self.chunk.virt_base) as u32;
                        Observation::MappedByte {
                            location: ByteLocation::Virtual(virt, phys),
                            value: translator.read_mapped_byte(virt, phys),
                        }
                    }
                    None => Observation::Unmapped(virt),
                }
            }
        };

        self.cursor += 1;
        Some(observation)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.end.saturating_sub(self.cursor)) {
            Ok(remaining) => (remaining, Some(remaining)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl core::iter::FusedIterator for Dumpmem<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;
    use paging::{AddressSpaceBuilder, PermissionSet};

    #[test]
    fn physical_bytes() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        let frame = builder.allocate_frame();
        builder.write_bytes(frame, &[0xDE, 0xAD]);

        let dump = dumpmem(DumpMode::Physical, frame.as_u32(), 2);
        assert_eq!(dump.truncation(), None);
        let lines: Vec<_> = dump.collect();
        assert_eq!(
            lines,
            [
                Observation::MappedByte {
                    location: ByteLocation::Physical(frame),
                    value: 0xDE
                },
                Observation::MappedByte {
                    location: ByteLocation::Physical(frame + 1),
                    value: 0xAD
                },
            ]
        );
    }

    #[test]
    fn physical_dump_clamps_to_top_of_memory() {
        setup();
        let limit = AddressTranslator::current().physical_limit();
        let start = limit as u32 - 4;

        let dump = dumpmem(DumpMode::Physical, start, 16);
        assert_eq!(
            dump.truncation(),
            Some(MonitorError::RangeTruncated {
                requested_end: limit + 12,
                limit
            })
        );
        assert_eq!(dump.count(), 4);
    }

    #[test]
    fn virtual_bytes_follow_translation() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        let frame = builder.allocate_frame();
        builder.map_page(VirtualAddress::new(0x1000), frame, PermissionSet::empty());
        builder.write_bytes(frame + 0xFFF, &[0x42]);
        let space = builder.build();

        let lines: Vec<_> = dumpmem(DumpMode::Virtual(&space), 0x1FFF, 2).collect();
        assert_eq!(
            lines,
            [
                Observation::MappedByte {
                    location: ByteLocation::Virtual(VirtualAddress::new(0x1FFF), frame + 0xFFF),
                    value: 0x42
                },
                Observation::Unmapped(VirtualAddress::new(0x2000)),
            ]
        );
    }

    #[test]
    fn gapped_range_yields_one_observation_per_byte() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        let frame = builder.allocate_frame();
        builder.map_page(VirtualAddress::new(0x0000_1000), frame, PermissionSet::empty());
        builder.set_leaf_raw(VirtualAddress::new(0x0000_3000), frame.as_u32());
        builder.set_directory_raw(VirtualAddress::new(0x0040_0000), 0x0040_0080);
        let space = builder.build();

        // Starts in an unmapped page, crosses a mapped page, a non-present leaf, the end
        // of the table and a non-present superpage entry.
        let start = 0x0000_0800;
        let length = 0x0040_1000 - start;
        let mut mapped = 0;
        let mut unmapped = 0;
        for observation in dumpmem(DumpMode::Virtual(&space), start, length) {
            match observation {
                Observation::MappedByte { .. } => mapped += 1,
                Observation::Unmapped(_) => unmapped += 1,
                Observation::Mapped { .. } => panic!("dumps never report whole pages"),
            }
        }
        assert_eq!(mapped + unmapped, length);
        assert_eq!(mapped, PAGE_SIZE);
    }

    #[test]
    fn entirely_unmapped_region_continues() {
        setup();
        let space = AddressSpaceBuilder::new().build();
        let lines: Vec<_> = dumpmem(DumpMode::Virtual(&space), 0x003F_FFFE, 4).collect();
        assert_eq!(
            lines,
            [
                Observation::Unmapped(VirtualAddress::new(0x003F_FFFE)),
                Observation::Unmapped(VirtualAddress::new(0x003F_FFFF)),
                Observation::Unmapped(VirtualAddress::new(0x0040_0000)),
                Observation::Unmapped(VirtualAddress::new(0x0040_0001)),
            ]
        );
    }

    #[test]
    fn superpage_bytes() {
        setup();
        let mut builder = AddressSpaceBuilder::new();
        builder.map_large_page(
            VirtualAddress::new(0x0080_0000),
            PhysicalAddress::new(0x0040_0000),
            PermissionSet::WRITABLE,
        );
        builder.write_bytes(PhysicalAddress::new(0x0041_2345), &[0x99]);
        let space = builder.build();

        let lines: Vec<_> = dumpmem(DumpMode::Virtual(&space), 0x0081_2345, 1).collect();
        assert_eq!(
            lines,
            [Observation::MappedByte {
                location: ByteLocation::Virtual(
                    VirtualAddress::new(0x0081_2345),
                    PhysicalAddress::new(0x0041_2345)
                ),
                value: 0x99
            }]
        );
        assert_eq!(
            format!("{}", lines[0]),
            "[VA 0x00812345, PA 0x00412345]: 99"
        );
    }

    #[test]
    fn zero_length_dumps_nothing() {
        setup();
        let space = AddressSpaceBuilder::new().build();
        assert_eq!(dumpmem(DumpMode::Virtual(&space), 0x1000, 0).count(), 0);
        assert_eq!(dumpmem(DumpMode::Physical, 0x1000, 0).count(), 0);
    }
}
