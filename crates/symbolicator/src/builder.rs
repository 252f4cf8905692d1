use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::mem::size_of;

use crate::{FunctionEntry, Header, LineEntry, SourceFileEntry, StringRef};

/// Builder for constructing a symbol table.
///
/// Accumulates entries and strings, then builds a binary symbol table file.
pub struct SymbolTableBuilder {
    lines: Vec<LineEntry>,
    functions: Vec<FunctionEntry>,
    source_files: Vec<SourceFileEntry>,
    strings: Vec<u8>,
    string_cache: BTreeMap<String, StringRef>,
    function_cache: BTreeMap<u64, u32>,
    file_cache: BTreeMap<String, u32>,
}

impl SymbolTableBuilder {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            functions: Vec::new(),
            source_files: Vec::new(),
            strings: Vec::new(),
            string_cache: BTreeMap::new(),
            function_cache: BTreeMap::new(),
            file_cache: BTreeMap::new(),
        }
    }

    /// Adds a line entry mapping an address to source location.
    ///
    /// Functions are identified by their start address, so two functions sharing a
    /// demangled name stay distinct.
    pub fn add_line(
        &mut self,
        address: u64,
        function: &str,
        function_start: u64,
        source_file: &str,
        line: u32,
    ) {
        let function_id = self.intern_function(function, function_start);
        let source_file_id = self.intern_source_file(source_file);

        self.lines
            .push(LineEntry::new(address, function_id, source_file_id, line));
    }

    fn intern_function(&mut self, name: &str, start: u64) -> u32 {
        if let Some(&id) = self.function_cache.get(&start) {
            return id;
        }

        let string_ref = self.intern_string(name);
        let id = self.functions.len() as u32;
        self.functions.push(FunctionEntry::new(string_ref, start));
        self.function_cache.insert(start, id);
        id
    }

    fn intern_source_file(&mut self, path: &str) -> u32 {
        if let Some(&id) = self.file_cache.get(path) {
            return id;
        }

        let string_ref = self.intern_string(path);
        let id = self.source_files.len() as u32;
        self.source_files.push(SourceFileEntry::new(string_ref));
        self.file_cache.insert(path.to_string(), id);
        id
    }

    fn intern_string(&mut self, s: &str) -> StringRef {
        if let Some(existing) = self.string_cache.get(s) {
            return *existing;
        }

        let offset = self.strings.len() as u64;
        let length = s.len() as u64;

        self.strings.extend_from_slice(s.as_bytes());

        let string_ref = StringRef::new(offset, length);
        self.string_cache.insert(s.to_string(), string_ref);
        string_ref
    }

    /// Builds the final binary symbol table.
    ///
    /// Sorts line entries by address and serializes all tables with header.
    pub fn build(mut self) -> SymbolTableBuffer {
        self.lines.sort_by_key(|entry| entry.address);

        let header_size = size_of::<Header>();

        let lines_offset = header_size;
        let lines_size = self.lines.len() * size_of::<LineEntry>();

        let functions_offset = lines_offset + lines_size;
        let functions_size = self.functions.len() * size_of::<FunctionEntry>();

        let source_files_offset = functions_offset + functions_size;
        let source_files_size = self.source_files.len() * size_of::<SourceFileEntry>();

        let string_pool_offset = source_files_offset + source_files_size;
        let string_pool_size = self.strings.len();

        let header = Header::new(
            lines_offset as u64,
            lines_size as u64,
            functions_offset as u64,
            functions_size as u64,
            source_files_offset as u64,
            source_files_size as u64,
            string_pool_offset as u64,
            string_pool_size as u64,
        );

        let mut output = Vec::new();

        output.extend_from_slice(unsafe {
            core::slice::from_raw_parts(&header as *const Header as *const u8, size_of::<Header>())
        });

        output.extend_from_slice(unsafe {
            core::slice::from_raw_parts(self.lines.as_ptr() as *const u8, lines_size)
        });

        output.extend_from_slice(unsafe {
            core::slice::from_raw_parts(self.functions.as_ptr() as *const u8, functions_size)
        });

        output.extend_from_slice(unsafe {
            core::slice::from_raw_parts(self.source_files.as_ptr() as *const u8, source_files_size)
        });

        output.extend_from_slice(&self.strings);

        SymbolTableBuffer::from_bytes(&output)
    }
}

impl Default for SymbolTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An owned symbol table image, aligned so that
/// [`SymbolTable::from_bytes`](crate::SymbolTable::from_bytes) can read it in place.
pub struct SymbolTableBuffer {
    words: Vec<u64>,
    len: usize,
}

impl SymbolTableBuffer {
    /// Copies `bytes` into a fresh 8-byte aligned buffer.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; bytes.len().div_ceil(size_of::<u64>())];
        // SAFETY: The word buffer covers at least `bytes.len()` bytes and u8 has no
        // alignment requirement.
        let target = unsafe {
            core::slice::from_raw_parts_mut(words.as_mut_ptr() as *mut u8, bytes.len())
        };
        target.copy_from_slice(bytes);
        Self {
            words,
            len: bytes.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `len` never exceeds the byte size of `words`.
        unsafe { core::slice::from_raw_parts(self.words.as_ptr() as *const u8, self.len) }
    }
}
