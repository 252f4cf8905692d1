//! Address types for physical and virtual memory.
//!
//! This module provides wrappers around 32-bit physical and virtual addresses, and the
//! [`AddressTranslator`] which gives the monitor direct access to physical memory.

use core::fmt;
use core::ops::{Add, Sub};

use crate::layout;

#[cfg(any(test, feature = "software-emulation"))]
use crate::emulation::EmulatedMemory;

/// Physical memory accessor.
///
/// This enum supports two modes:
/// - Hardware: all of physical memory is mapped at a fixed offset (the kernel's direct map)
/// - Emulated: physical memory is a host buffer (testing mode)
pub enum AddressTranslator {
    /// Hardware translation using a direct-map offset.
    Hardware { direct_map_offset: u32 },
    /// Emulated translation using a simulated memory region.
    #[cfg(any(test, feature = "software-emulation"))]
    Emulated(EmulatedMemory),
}

impl AddressTranslator {
    /// Creates a new hardware translator with the given direct-map offset.
    pub const fn hardware(direct_map_offset: u32) -> Self {
        Self::Hardware { direct_map_offset }
    }

    /// Creates a new emulated translator with the given memory size.
    #[cfg(any(test, feature = "software-emulation"))]
    pub fn emulated(size: usize) -> Self {
        Self::Emulated(EmulatedMemory::new(size))
    }

    /// Sets the global address translator.
    ///
    /// This function must be called exactly once during initialization.
    ///
    /// # Panics
    ///
    /// Panics if the translator has already been set.
    pub fn set_current(translator: AddressTranslator) {
        #[cfg(not(any(test, feature = "software-emulation")))]
        {
            if ADDRESS_TRANSLATOR.get().is_some() {
                panic!("address translator already set");
            }
            ADDRESS_TRANSLATOR.call_once(|| translator);
        }

        #[cfg(any(test, feature = "software-emulation"))]
        {
            ADDRESS_TRANSLATOR.with(|t| {
                if t.get().is_some() {
                    panic!("address translator already set");
                }
                t.call_once(|| translator);
            });
        }
    }

    /// Returns a reference to the current global address translator.
    ///
    /// # Panics
    ///
    /// Panics if the translator has not been set yet.
    pub fn current() -> &'static AddressTranslator {
        match Self::try_current() {
            Some(translator) => translator,
            None => panic!(
                "address translator not set; call AddressTranslator::set_current during initialization"
            ),
        }
    }

    /// Returns a reference to the current global address translator if it has been set.
    pub fn try_current() -> Option<&'static AddressTranslator> {
        #[cfg(not(any(test, feature = "software-emulation")))]
        {
            ADDRESS_TRANSLATOR.get()
        }

        #[cfg(any(test, feature = "software-emulation"))]
        {
            ADDRESS_TRANSLATOR.with(|t| {
                t.get().map(|translator| {
                    // SAFETY: Each thread has its own ADDRESS_TRANSLATOR, it is never replaced
                    // once set, and it lives for the remainder of the thread.
                    unsafe { &*(translator as *const AddressTranslator) }
                })
            })
        }
    }

    /// Returns the exclusive upper bound of the physical memory reachable through this
    /// translator.
    ///
    /// For the hardware direct map this is the distance from the offset to the top of the
    /// 32-bit address space: with the kernel mapped at `0xF000_0000`, 256 MiB.
    pub fn physical_limit(&self) -> u64 {
        match self {
            Self::Hardware { direct_map_offset } => {
                layout::ADDRESS_SPACE_END - *direct_map_offset as u64
            }
            #[cfg(any(test, feature = "software-emulation"))]
            Self::Emulated(mem) => mem.size() as u64,
        }
    }

    /// Translates a physical address to a pointer usable by the monitor.
    pub fn phys_to_ptr<T>(&self, phys: PhysicalAddress) -> *mut T {
        match self {
            Self::Hardware { direct_map_offset } => {
                phys.as_u32().wrapping_add(*direct_map_offset) as usize as *mut T
            }
            #[cfg(any(test, feature = "software-emulation"))]
            Self::Emulated(mem) => mem.translate(phys.as_u32()) as *mut T,
        }
    }

    /// Reads one byte of physical memory.
    ///
    /// # Panics
    ///
    /// Panics if `phys` is at or above [`physical_limit`](Self::physical_limit).
    pub fn read_byte(&self, phys: PhysicalAddress) -> u8 {
        assert!(
            (phys.as_u32() as u64) < self.physical_limit(),
            "physical address beyond the top of memory"
        );
        // SAFETY: The direct map covers every physical address below the limit.
        unsafe { core::ptr::read_volatile(self.phys_to_ptr::<u8>(phys)) }
    }

    /// Reads the byte that `virt` maps to, given that it translates to `phys`.
    ///
    /// Frames inside the direct map are read through it. On hardware, a frame beyond
    /// the direct map (device memory mapped high, for example) is read at `virt` itself,
    /// which is only meaningful when the address space that produced the translation is
    /// the one currently loaded in CR3.
    ///
    /// # Panics
    ///
    /// Under emulation, panics if `phys` lies beyond the emulated memory.
    pub fn read_mapped_byte(&self, virt: VirtualAddress, phys: PhysicalAddress) -> u8 {
        if (phys.as_u32() as u64) < self.physical_limit() {
            return self.read_byte(phys);
        }
        match self {
            // SAFETY: `virt` is mapped in the loaded address space; see above.
            Self::Hardware { .. } => unsafe {
                core::ptr::read_volatile(virt.as_u32() as usize as *const u8)
            },
            #[cfg(any(test, feature = "software-emulation"))]
            Self::Emulated(_) => self.read_byte(phys),
        }
    }

    /// Reads a naturally aligned 32-bit word of physical memory.
    ///
    /// # Panics
    ///
    /// Panics if `phys` is not 4-byte aligned or lies beyond the top of memory.
    pub fn read_word(&self, phys: PhysicalAddress) -> u32 {
        assert!(phys.is_aligned(4), "word reads must be 4-byte aligned");
        assert!(
            (phys.as_u32() as u64) + 4 <= self.physical_limit(),
            "physical address beyond the top of memory"
        );
        // SAFETY: The direct map covers every physical address below the limit, and the
        // address is aligned for a u32.
        unsafe { core::ptr::read_volatile(self.phys_to_ptr::<u32>(phys)) }
    }

    /// Writes a naturally aligned 32-bit word of physical memory.
    ///
    /// # Safety
    ///
    /// Writing physical memory can change live page tables and any other kernel data.
    /// The caller must ensure the word is owned by whatever it intends to modify.
    pub unsafe fn write_word(&self, phys: PhysicalAddress, value: u32) {
        assert!(phys.is_aligned(4), "word writes must be 4-byte aligned");
        assert!(
            (phys.as_u32() as u64) + 4 <= self.physical_limit(),
            "physical address beyond the top of memory"
        );
        // SAFETY: Bounds and alignment are checked above; the caller upholds ownership.
        unsafe { core::ptr::write_volatile(self.phys_to_ptr::<u32>(phys), value) }
    }

    /// Allocates memory from the emulated space (test mode only).
    ///
    /// Returns the physical address of the allocated, zeroed block, or None if
    /// there's not enough space.
    #[cfg(any(test, feature = "software-emulation"))]
    pub fn allocate(&self, size: usize, align: usize) -> Option<PhysicalAddress> {
        match self {
            Self::Hardware { .. } => {
                panic!("cannot allocate from hardware translator")
            }
            Self::Emulated(mem) => mem
                .allocate(size, align)
                .map(|phys| PhysicalAddress::new(phys as u32)),
        }
    }
}

/// Global address translator.
///
/// This is initialized once during kernel initialization (with Hardware variant).
/// In test/software-emulation mode, this is thread-local to allow each test to have its own
/// emulated memory space.
#[cfg(not(any(test, feature = "software-emulation")))]
static ADDRESS_TRANSLATOR: spin::Once<AddressTranslator> = spin::Once::new();

#[cfg(any(test, feature = "software-emulation"))]
std::thread_local! {
    static ADDRESS_TRANSLATOR: spin::Once<AddressTranslator> = spin::Once::new();
}

/// Macro to define common address type functionality.
///
/// This macro generates the basic structure and methods common to both physical
/// and virtual address types, reducing code duplication.
macro_rules! impl_address_common {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Creates a new address.
            ///
            /// Every 32-bit value is a valid address on i386 without PAE.
            #[inline]
            pub const fn new(addr: u32) -> Self {
                Self(addr)
            }

            /// Returns the raw address value.
            #[inline]
            pub const fn as_u32(self) -> u32 {
                self.0
            }

            /// Checks if the address is aligned to the given alignment.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two.
            #[inline]
            pub const fn is_aligned(self, align: u32) -> bool {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                self.0 & (align - 1) == 0
            }

            /// Aligns the address down to the given alignment.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two.
            #[inline]
            pub const fn align_down(self, align: u32) -> Self {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                Self(self.0 & !(align - 1))
            }

            /// Aligns the address up to the given alignment.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two, or if the aligned address does not
            /// fit in 32 bits.
            #[inline]
            pub const fn align_up(self, align: u32) -> Self {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                Self((self.0 + align - 1) & !(align - 1))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#010x})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#010x}", self.0)
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(&self.0, f)
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(addr: u32) -> Self {
                Self::new(addr)
            }
        }

        impl From<$name> for u32 {
            #[inline]
            fn from(addr: $name) -> Self {
                addr.0
            }
        }

        impl Add<u32> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: u32) -> Self::Output {
                Self::new(self.0 + rhs)
            }
        }

        impl Sub<u32> for $name {
            type Output = Self;

            #[inline]
            fn sub(self, rhs: u32) -> Self::Output {
                Self::new(self.0 - rhs)
            }
        }

        impl Sub<$name> for $name {
            type Output = u32;

            #[inline]
            fn sub(self, rhs: $name) -> Self::Output {
                self.0 - rhs.0
            }
        }
    };
}

impl_address_common!(
    PhysicalAddress,
    "A physical memory address.\n\n\
     This is a newtype wrapper around a 32-bit physical address. It provides methods\n\
     for address manipulation and alignment checks."
);

impl_address_common!(
    VirtualAddress,
    "A virtual memory address.\n\n\
     This is a newtype wrapper around a 32-bit virtual address. It provides methods\n\
     for address manipulation, alignment checks, and extracting page table indices."
);

impl VirtualAddress {
    /// Returns the offset within the containing small page.
    #[inline]
    pub const fn page_offset(self) -> u32 {
        layout::page_offset(self.0)
    }

    /// Returns the offset within the containing superpage.
    #[inline]
    pub const fn large_page_offset(self) -> u32 {
        layout::large_page_offset(self.0)
    }

    /// Returns the page directory index of this address.
    #[inline]
    pub const fn directory_index(self) -> usize {
        layout::directory_index(self.0)
    }

    /// Returns the page table index of this address.
    #[inline]
    pub const fn table_index(self) -> usize {
        layout::table_index(self.0)
    }
}
