//! Frame pointer stack unwinding.
//!
//! With frame pointers, each i386 frame begins with the caller's saved EBP, followed by
//! the return address and the caller-pushed arguments:
//!
//! ```text
//! fp + 20  argument 3
//! fp + 16  argument 2
//! fp + 12  argument 1
//! fp + 8   argument 0
//! fp + 4   return address
//! fp       saved fp  ----> next frame
//! ```
//!
//! Four argument words are always read, whatever the callee's arity; the extra words
//! are simply whatever lies above on the stack. Above the outermost frame that can be
//! an unmapped page, so an argument slot may be missing without ending the walk.

use core::fmt;

use paging::{AddressSpace, VirtualAddress};

use crate::{DebugInfo, DebugInfoResolver, MonitorError};

/// Number of argument words read from each frame.
pub const ARGUMENT_COUNT: usize = 4;

/// Read access to the memory the stack lives in.
pub trait StackMemory {
    /// Reads the 32-bit word at `address`, or None if it cannot be read.
    fn read_word(&self, address: VirtualAddress) -> Option<u32>;
}

impl StackMemory for AddressSpace {
    fn read_word(&self, address: VirtualAddress) -> Option<u32> {
        AddressSpace::read_word(self, address)
    }
}

/// Limits on a stack walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BacktraceOptions {
    /// Stop after this many frames. None walks until the frame pointer is zero.
    pub max_frames: Option<usize>,
}

/// One frame of the call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame {
    pub frame_pointer: VirtualAddress,
    pub return_address: u32,
    /// Argument words, None where the stack slot could not be read.
    pub arguments: [Option<u32>; ARGUMENT_COUNT],
}

/// A frame together with what is known about its return address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktraceEntry<'a> {
    pub frame: StackFrame,
    /// Debug info for the return address, or
    /// [`UnresolvedSymbol`](MonitorError::UnresolvedSymbol) if there is none.
    pub location: Result<DebugInfo<'a>, MonitorError>,
}

impl BacktraceEntry<'_> {
    /// Returns the debug info, falling back to the `<unknown>` placeholder.
    pub fn debug_info(&self) -> DebugInfo<'_> {
        match self.location {
            Ok(info) => info,
            Err(_) => DebugInfo::unknown(self.frame.return_address),
        }
    }
}

impl fmt::Display for BacktraceEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ebp {:08x}  eip {:08x}  args",
            self.frame.frame_pointer, self.frame.return_address
        )?;
        for argument in self.frame.arguments {
            match argument {
                Some(word) => write!(f, " {:08x}", word)?,
                None => f.write_str(" ????????")?,
            }
        }
        let info = self.debug_info();
        write!(
            f,
            "\n\t{}:{}: {}+{}",
            info.file,
            info.line,
            info.function,
            info.offset(self.frame.return_address)
        )
    }
}

/// Walks the frame pointer chain starting at `frame_pointer`, innermost frame first.
///
/// The walk ends when the chain reaches a zero frame pointer, when `options` says so, or
/// when the saved frame pointer or return address cannot be read from `memory`. Nothing else bounds it, so a corrupt chain
/// that loops will loop unless `max_frames` is set.
pub fn backtrace<'a, M, R>(
    memory: &'a M,
    frame_pointer: VirtualAddress,
    resolver: &'a R,
    options: BacktraceOptions,
) -> Backtrace<'a, M, R>
where
    M: StackMemory + ?Sized,
    R: DebugInfoResolver + ?Sized,
{
    Backtrace {
        memory,
        resolver,
        frame_pointer,
        options,
        emitted: 0,
    }
}

/// Iterator returned by [`backtrace`].
pub struct Backtrace<'a, M: ?Sized, R: ?Sized> {
    memory: &'a M,
    resolver: &'a R,
    frame_pointer: VirtualAddress,
    options: BacktraceOptions,
    emitted: usize,
}

impl<M, R> Backtrace<'_, M, R>
where
    M: StackMemory + ?Sized,
    R: DebugInfoResolver + ?Sized,
{
    fn read_frame(&self) -> Option<(StackFrame, VirtualAddress)> {
        let fp = self.frame_pointer;
        let word = |index: u32| {
            let address = fp.as_u32().checked_add(index * 4)?;
            self.memory.read_word(VirtualAddress::new(address))
        };

        let next = word(0)?;
        let return_address = word(1)?;
        let mut arguments = [None; ARGUMENT_COUNT];
        for (index, argument) in arguments.iter_mut().enumerate() {
            *argument = word(2 + index as u32);
            if argument.is_none() {
                log::debug!("argument {} of frame {} is not readable", index, fp);
            }
        }

        let frame = StackFrame {
            frame_pointer: fp,
            return_address,
            arguments,
        };
        Some((frame, VirtualAddress::new(next)))
    }
}

impl<'a, M, R> Iterator for Backtrace<'a, M, R>
where
    M: StackMemory + ?Sized,
    R: DebugInfoResolver + ?Sized,
{
    type Item = BacktraceEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.frame_pointer.as_u32() == 0 {
            return None;
        }
        if self
            .options
            .max_frames
            .is_some_and(|max| self.emitted >= max)
        {
            return None;
        }

        let Some((frame, next)) = self.read_frame() else {
            log::warn!(
                "stack frame at {} is not readable; stopping backtrace",
                self.frame_pointer
            );
            self.frame_pointer = VirtualAddress::new(0);
            return None;
        };

        #[cfg(feature = "detailed-logging")]
        log::trace!("frame {} -> next {}", frame.frame_pointer, next);

        let resolver: &'a R = self.resolver;
        let location = resolver.resolve(frame.return_address).ok_or_else(|| {
            log::debug!("no debug info for {:#010x}", frame.return_address);
            MonitorError::UnresolvedSymbol {
                address: frame.return_address,
            }
        });

        self.frame_pointer = next;
        self.emitted += 1;
        Some(BacktraceEntry { frame, location })
    }
}

impl<M, R> core::iter::FusedIterator for Backtrace<'_, M, R>
where
    M: StackMemory + ?Sized,
    R: DebugInfoResolver + ?Sized,
{
}
