use paging::VirtualAddress;
use thiserror_no_std::Error;

/// Errors and notices produced by monitor commands.
///
/// Only [`InvalidPermissionToken`](Self::InvalidPermissionToken) and
/// [`NoSuchMapping`](Self::NoSuchMapping) abort a command. The other two are reported
/// alongside output that is still produced.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MonitorError {
    /// A permission string contained a character that is not a mnemonic.
    #[error("invalid permission token {token:?} at position {position}")]
    InvalidPermissionToken { token: char, position: usize },
    /// The address has no present mapping to modify.
    #[error("no mapping for {va}")]
    NoSuchMapping { va: VirtualAddress },
    /// A physical dump was clamped to the top of physical memory.
    #[error("range end {requested_end:#x} is beyond the top of physical memory at {limit:#x}")]
    RangeTruncated { requested_end: u64, limit: u64 },
    /// No debug information covers the address.
    #[error("no debug information for {address:#010x}")]
    UnresolvedSymbol { address: u32 },
}
