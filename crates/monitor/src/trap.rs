//! The CPU state the trap path hands to the monitor.

use x86_64::{PrivilegeLevel, registers::rflags::RFlags};

macro_rules! trap_numbers {
    (
        $storage: ty,
        $(
            $name:ident = $value:expr,
        )*
    ) => {
        /// Represents an i386 trap number.
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct TrapNumber($storage);

        impl TrapNumber {
            $(
                pub const $name: Self = Self($value);
            )*

            /// Creates a new trap number from a raw value.
            pub const fn new(value: $storage) -> Self {
                Self(value)
            }

            /// Returns the raw value of the trap number.
            pub const fn value(&self) -> $storage {
                self.0
            }

            /// Returns the name of the trap, if known.
            pub fn name(&self) -> Option<&'static str> {
                match self.0 {
                    $(
                        $value => Some(stringify!($name)),
                    )*
                    _ => None,
                }
            }
        }

        impl core::fmt::Debug for TrapNumber {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                if let Some(name) = self.name() {
                    write!(f, "TrapNumber::{}({})", name, self.0)
                } else {
                    write!(f, "TrapNumber({})", self.0)
                }
            }
        }

        impl core::fmt::Display for TrapNumber {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                if let Some(name) = self.name() {
                    write!(f, "{}", name)
                } else {
                    write!(f, "{}", self.0)
                }
            }
        }
    }
}

trap_numbers! {
    u32,
    DIVIDE_ERROR = 0,
    DEBUG = 1,
    NON_MASKABLE_INTERRUPT = 2,
    BREAKPOINT = 3,
    OVERFLOW = 4,
    BOUND_RANGE_EXCEEDED = 5,
    INVALID_OPCODE = 6,
    DEVICE_NOT_AVAILABLE = 7,
    DOUBLE_FAULT = 8,
    INVALID_TSS = 10,
    SEGMENT_NOT_PRESENT = 11,
    STACK_SEGMENT_FAULT = 12,
    GENERAL_PROTECTION_FAULT = 13,
    PAGE_FAULT = 14,
    X87_FLOATING_POINT_EXCEPTION = 16,
    ALIGNMENT_CHECK = 17,
    MACHINE_CHECK = 18,
    SIMD_FLOATING_POINT_EXCEPTION = 19,
    SYSCALL = 48,
}

/// Registers saved on entry to the trap path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapContext {
    pub trap_number: TrapNumber,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u16,
    pub eflags: u32,
    pub ebp: u32,
    pub esp: u32,
}

impl TrapContext {
    /// EFLAGS.TF, bit 8.
    const TRAP_FLAG: u32 = RFlags::TRAP_FLAG.bits() as u32;

    /// Returns the privilege level the trap was taken from.
    pub fn privilege_level(&self) -> PrivilegeLevel {
        PrivilegeLevel::from_u16(self.cs & 0b11)
    }

    /// Returns whether the trap came from user mode.
    pub fn from_user(&self) -> bool {
        self.privilege_level() == PrivilegeLevel::Ring3
    }

    /// Returns whether the trap was a debug exception or a breakpoint.
    pub fn is_debug_trap(&self) -> bool {
        self.trap_number == TrapNumber::DEBUG || self.trap_number == TrapNumber::BREAKPOINT
    }

    /// Returns whether the saved flags will single-step on return.
    pub fn trap_flag(&self) -> bool {
        self.eflags & Self::TRAP_FLAG != 0
    }

    pub(crate) fn set_trap_flag(&mut self, enabled: bool) {
        if enabled {
            self.eflags |= Self::TRAP_FLAG;
        } else {
            self.eflags &= !Self::TRAP_FLAG;
        }
    }
}
