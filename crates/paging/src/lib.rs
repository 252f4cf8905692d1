#![cfg_attr(not(any(test, feature = "software-emulation")), no_std)]

//! # Paging
//!
//! Read and attribute-edit access to i386 two-level page tables, used by the Polaris
//! kernel monitor. It provides:
//!
//! - 32-bit physical and virtual address types and the paging layout arithmetic.
//! - Typed page directory and page table entries, with superpage (PSE) support.
//! - An [`AddressSpace`] walker that translates addresses without ever allocating.
//! - Software emulation of physical memory, and an [`AddressSpaceBuilder`], for testing
//!   in non-kernel environments.

mod address;
mod address_space;
#[cfg(any(test, feature = "software-emulation"))]
mod builder;
#[cfg(any(test, feature = "software-emulation"))]
mod emulation;
mod entry;
mod flags;
pub mod layout;
mod table;

pub use address::{AddressTranslator, PhysicalAddress, VirtualAddress};
pub use address_space::{AddressSpace, PageSize, Translation};
#[cfg(any(test, feature = "software-emulation"))]
pub use builder::AddressSpaceBuilder;
pub use entry::{DirectoryEntry, LeafEntry};
pub use flags::PermissionSet;
pub use table::PageTable;

pub use layout::{LARGE_PAGE_SIZE, PAGE_SIZE};
