//! Source-level information about code addresses.

use symbolicator::SymbolTable;

/// Where an instruction address comes from in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugInfo<'a> {
    pub file: &'a str,
    pub line: usize,
    pub function: &'a str,
    /// Address of the first instruction of `function`.
    pub function_start: u32,
}

impl DebugInfo<'static> {
    /// Placeholder used when nothing is known about `address`.
    pub const fn unknown(address: u32) -> Self {
        Self {
            file: "<unknown>",
            line: 0,
            function: "<unknown>",
            function_start: address,
        }
    }
}

impl DebugInfo<'_> {
    /// Returns how far `address` lies into the function.
    pub const fn offset(&self, address: u32) -> u32 {
        address.wrapping_sub(self.function_start)
    }
}

/// A source of debug information for code addresses.
pub trait DebugInfoResolver {
    /// Looks up `address`, returning None if nothing covers it.
    fn resolve(&self, address: u32) -> Option<DebugInfo<'_>>;
}

impl DebugInfoResolver for SymbolTable<'_> {
    fn resolve(&self, address: u32) -> Option<DebugInfo<'_>> {
        let symbol = self.lookup(address as u64)?;
        Some(DebugInfo {
            file: symbol.source_file,
            line: symbol.line,
            function: symbol.function_name,
            function_start: symbol.function_start as u32,
        })
    }
}
