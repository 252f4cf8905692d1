//! What the range inspectors report, and how each report is printed.

use core::fmt;

use paging::{PageSize, PermissionSet, PhysicalAddress, VirtualAddress};

use crate::codec::PermissionString;

/// Where a dumped byte was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteLocation {
    /// Read directly at a physical address.
    Physical(PhysicalAddress),
    /// Read at a virtual address, which translated to the given physical address.
    Virtual(VirtualAddress, PhysicalAddress),
}

/// One unit of output from [`showmap`](crate::showmap) or [`dumpmem`](crate::dumpmem).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// A page or superpage mapping.
    Mapped {
        virt: VirtualAddress,
        phys: PhysicalAddress,
        permissions: PermissionSet,
        size: PageSize,
    },
    /// A byte of memory.
    MappedByte { location: ByteLocation, value: u8 },
    /// A virtual address with no present translation.
    Unmapped(VirtualAddress),
}

impl Observation {
    /// Returns a renderer that prints gaps the way the page listing does.
    ///
    /// [`Display`](fmt::Display) prints gaps in the byte dump format.
    pub fn page_display(&self) -> PageDisplay<'_> {
        PageDisplay(self)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observation::Mapped {
                virt,
                phys,
                permissions,
                size,
            } => {
                let marker = match size {
                    PageSize::Large => "PSE_ON",
                    PageSize::Small => "PSE_OFF",
                };
                write!(
                    f,
                    "({}) VA: {}, PA: {}, PERM: {}",
                    marker,
                    virt,
                    phys,
                    PermissionString::from(*permissions)
                )
            }
            Observation::MappedByte {
                location: ByteLocation::Physical(phys),
                value,
            } => write!(f, "[PA {}]: {:02x}", phys, value),
            Observation::MappedByte {
                location: ByteLocation::Virtual(virt, phys),
                value,
            } => write!(f, "[VA {}, PA {}]: {:02x}", virt, phys, value),
            Observation::Unmapped(virt) => write!(f, "[VA {}, PA No-mapping]: None", virt),
        }
    }
}

/// See [`Observation::page_display`].
pub struct PageDisplay<'a>(&'a Observation);

impl fmt::Display for PageDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Observation::Unmapped(virt) => write!(f, "VA: {}, PA: No Mapping", virt),
            other => fmt::Display::fmt(other, f),
        }
    }
}
