//! The EFLAGS register.

use bitflags::bitflags;
use x86_64::PrivilegeLevel;

bitflags! {
    /// EFLAGS as returned by [`crate::cpu::readeflags`] and saved in
    /// [`crate::TrapFrame::eflags`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EFlags: u32 {
        /// Carry.
        const CARRY = 1 << 0;
        /// Reserved, always reads as 1.
        const RESERVED_1 = 1 << 1;
        /// Parity.
        const PARITY = 1 << 2;
        /// Auxiliary carry (BCD).
        const AUXILIARY_CARRY = 1 << 4;
        /// Zero.
        const ZERO = 1 << 6;
        /// Sign.
        const SIGN = 1 << 7;
        /// Single-step trap after every instruction.
        const TRAP = 1 << 8;
        /// Maskable external interrupts are delivered.
        const INTERRUPT = 1 << 9;
        /// String instructions decrement.
        const DIRECTION = 1 << 10;
        /// Overflow.
        const OVERFLOW = 1 << 11;
        /// Low bit of the I/O privilege level.
        const IOPL_LOW = 1 << 12;
        /// High bit of the I/O privilege level.
        const IOPL_HIGH = 1 << 13;
        /// Nested task.
        const NESTED_TASK = 1 << 14;
        /// Resume (suppresses debug faults for one instruction).
        const RESUME = 1 << 16;
        /// Virtual-8086 mode.
        const VIRTUAL_8086 = 1 << 17;
        /// Alignment check (with CR0.AM).
        const ALIGNMENT_CHECK = 1 << 18;
        /// Virtual interrupt flag.
        const VIRTUAL_INTERRUPT = 1 << 19;
        /// Virtual interrupt pending.
        const VIRTUAL_INTERRUPT_PENDING = 1 << 20;
        /// CPUID is available if software can toggle this bit.
        const ID = 1 << 21;
    }
}

impl EFlags {
    /// Flags for a context entered for the first time: interrupts on,
    /// everything else clear.
    pub const INITIAL: Self = Self::RESERVED_1.union(Self::INTERRUPT);

    /// Whether maskable interrupts are enabled.
    #[inline]
    pub const fn interrupts_enabled(self) -> bool {
        self.contains(Self::INTERRUPT)
    }

    /// The I/O privilege level field (bits 12-13).
    pub fn iopl(self) -> PrivilegeLevel {
        match (self.bits() >> 12) & 0b11 {
            0 => PrivilegeLevel::Ring0,
            1 => PrivilegeLevel::Ring1,
            2 => PrivilegeLevel::Ring2,
            _ => PrivilegeLevel::Ring3,
        }
    }
}
