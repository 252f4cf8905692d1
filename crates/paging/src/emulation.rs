//! Software emulation of physical memory for testing.
//!
//! The walker and the monitor reach physical memory only through the
//! [`AddressTranslator`](crate::AddressTranslator). In emulation, physical address
//! `n` is byte `n` of a host buffer, so page directories, page tables and data
//! frames built by tests are walked by exactly the same code that walks real
//! tables on hardware.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Emulated memory for software simulation.
pub struct EmulatedMemory {
    /// The underlying memory buffer. Stored as words so that table entries are aligned
    /// on the host as well.
    memory: Vec<UnsafeCell<u32>>,
    /// Next allocation offset (simple bump allocator).
    next_alloc: AtomicUsize,
}

impl EmulatedMemory {
    /// Creates a new zeroed emulated memory region of the specified size in bytes.
    ///
    /// # Panics
    ///
    /// Panics if `size` is not a multiple of four or does not fit a 32-bit physical
    /// address space.
    pub fn new(size: usize) -> Self {
        assert!(size % 4 == 0, "emulated memory size must be a multiple of 4");
        assert!(
            size as u64 <= crate::layout::ADDRESS_SPACE_END,
            "emulated memory larger than the physical address space"
        );
        Self {
            memory: (0..size / 4).map(|_| UnsafeCell::new(0)).collect(),
            next_alloc: AtomicUsize::new(0),
        }
    }

    /// Allocates a block of memory from the emulated space.
    ///
    /// Returns the physical address of the allocated block, or None if
    /// there's not enough space.
    pub fn allocate(&self, size: usize, align: usize) -> Option<usize> {
        loop {
            let current = self.next_alloc.load(Ordering::Relaxed);

            // Align the current offset
            let aligned = (current + align - 1) & !(align - 1);
            let end = aligned + size;

            if end > self.size() {
                return None;
            }

            // Try to claim this allocation
            if self
                .next_alloc
                .compare_exchange(current, end, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return Some(aligned);
            }
        }
    }

    /// Translates a physical address to a pointer into the buffer.
    ///
    /// # Panics
    ///
    /// Panics if the address is outside the emulated memory.
    pub fn translate(&self, phys: u32) -> *mut u8 {
        let offset = phys as usize;
        assert!(offset < self.size(), "physical address out of bounds");
        // SAFETY: The offset is within the buffer, and the buffer is interior-mutable.
        unsafe { UnsafeCell::raw_get(self.memory.as_ptr()).cast::<u8>().add(offset) }
    }

    /// Returns the size of the emulated memory region in bytes.
    pub fn size(&self) -> usize {
        self.memory.len() * 4
    }
}
