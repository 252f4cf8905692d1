#![cfg_attr(not(test), no_std)]

//! # Polaris kernel monitor
//!
//! The memory-introspection and execution-control commands of the kernel monitor:
//! page mapping listings, permission edits, memory dumps, stack backtraces, and
//! single-stepping of trapped user code.
//!
//! Input handling and console output live elsewhere. Every command here takes the
//! [`AddressSpace`](paging::AddressSpace) it operates on and returns values or lazy
//! iterators whose [`Display`](core::fmt::Display) impls produce the monitor's lines.

mod backtrace;
pub mod codec;
mod debuginfo;
mod dumpmem;
mod error;
mod observation;
mod setperm;
mod showmap;
mod step;
#[cfg(test)]
mod test_support;
mod trap;

pub use backtrace::{
    ARGUMENT_COUNT, Backtrace, BacktraceEntry, BacktraceOptions, StackFrame, StackMemory,
    backtrace,
};
pub use codec::PermissionString;
pub use debuginfo::{DebugInfo, DebugInfoResolver};
pub use dumpmem::{DumpMode, Dumpmem, dumpmem};
pub use error::MonitorError;
pub use observation::{ByteLocation, Observation, PageDisplay};
pub use setperm::{SetPermOutcome, setperm};
pub use showmap::{Showmap, showmap};
pub use step::{Control, StepController, StepState};
pub use trap::{TrapContext, TrapNumber};
