//! Trap vector numbers.
//!
//! Vectors 0-31 are reserved by the processor. The kernel maps the IRQ
//! lines to `IRQ0..IRQ0 + 32` and uses `SYSCALL` for the system call
//! gate, chosen so that neither range overlaps the processor exceptions.

use core::fmt;

use crate::error::HalError;

/// First vector used for hardware IRQ lines.
pub const IRQ0: u32 = 32;
/// Vectors reserved for IRQ lines, including the local APIC error and
/// spurious vectors.
pub const IRQ_LINES: u32 = 32;
/// Vector of the system call gate (`int 0x40`).
pub const SYSCALL: u32 = 64;

/// IRQ lines with a fixed meaning, relative to [`IRQ0`].
pub mod irq {
    /// Local APIC timer.
    pub const TIMER: u32 = 0;
    /// Local APIC error interrupt.
    pub const ERROR: u32 = 19;
    /// Local APIC spurious interrupt.
    pub const SPURIOUS: u32 = 31;
}

/// Processor-defined exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Exception {
    DivideError = 0,
    Debug = 1,
    NonMaskableInterrupt = 2,
    Breakpoint = 3,
    Overflow = 4,
    BoundRangeExceeded = 5,
    InvalidOpcode = 6,
    DeviceNotAvailable = 7,
    DoubleFault = 8,
    /// Not generated since the 486.
    CoprocessorSegmentOverrun = 9,
    InvalidTss = 10,
    SegmentNotPresent = 11,
    StackSegmentFault = 12,
    GeneralProtectionFault = 13,
    PageFault = 14,
    X87FloatingPoint = 16,
    AlignmentCheck = 17,
    MachineCheck = 18,
    SimdFloatingPoint = 19,
    Virtualization = 20,
    ControlProtection = 21,
    SecurityException = 30,
}

impl Exception {
    /// Whether the processor pushes an error code for this exception.
    ///
    /// For every other vector the entry stub pushes a zero so the frame
    /// layout stays the same.
    pub const fn has_error_code(self) -> bool {
        matches!(
            self,
            Self::DoubleFault
                | Self::InvalidTss
                | Self::SegmentNotPresent
                | Self::StackSegmentFault
                | Self::GeneralProtectionFault
                | Self::PageFault
                | Self::AlignmentCheck
                | Self::ControlProtection
                | Self::SecurityException
        )
    }

    /// Faults that cannot be resumed.
    pub const fn is_abort(self) -> bool {
        matches!(self, Self::DoubleFault | Self::MachineCheck)
    }

    /// The assembler-style mnemonic, e.g. `#PF`.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::DivideError => "#DE",
            Self::Debug => "#DB",
            Self::NonMaskableInterrupt => "NMI",
            Self::Breakpoint => "#BP",
            Self::Overflow => "#OF",
            Self::BoundRangeExceeded => "#BR",
            Self::InvalidOpcode => "#UD",
            Self::DeviceNotAvailable => "#NM",
            Self::DoubleFault => "#DF",
            Self::CoprocessorSegmentOverrun => "CSO",
            Self::InvalidTss => "#TS",
            Self::SegmentNotPresent => "#NP",
            Self::StackSegmentFault => "#SS",
            Self::GeneralProtectionFault => "#GP",
            Self::PageFault => "#PF",
            Self::X87FloatingPoint => "#MF",
            Self::AlignmentCheck => "#AC",
            Self::MachineCheck => "#MC",
            Self::SimdFloatingPoint => "#XM",
            Self::Virtualization => "#VE",
            Self::ControlProtection => "#CP",
            Self::SecurityException => "#SX",
        }
    }

    pub const fn from_vector(vector: u32) -> Option<Self> {
        Some(match vector {
            0 => Self::DivideError,
            1 => Self::Debug,
            2 => Self::NonMaskableInterrupt,
            3 => Self::Breakpoint,
            4 => Self::Overflow,
            5 => Self::BoundRangeExceeded,
            6 => Self::InvalidOpcode,
            7 => Self::DeviceNotAvailable,
            8 => Self::DoubleFault,
            9 => Self::CoprocessorSegmentOverrun,
            10 => Self::InvalidTss,
            11 => Self::SegmentNotPresent,
            12 => Self::StackSegmentFault,
            13 => Self::GeneralProtectionFault,
            14 => Self::PageFault,
            16 => Self::X87FloatingPoint,
            17 => Self::AlignmentCheck,
            18 => Self::MachineCheck,
            19 => Self::SimdFloatingPoint,
            20 => Self::Virtualization,
            21 => Self::ControlProtection,
            30 => Self::SecurityException,
            _ => return None,
        })
    }
}

impl TryFrom<u32> for Exception {
    type Error = HalError;

    fn try_from(vector: u32) -> Result<Self, HalError> {
        Self::from_vector(vector).ok_or(HalError::NotAnException(vector))
    }
}

impl From<Exception> for u32 {
    fn from(exception: Exception) -> u32 {
        exception as u32
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.mnemonic(), self)
    }
}

/// Whether a trap with this vector carries a processor-pushed error code.
pub const fn has_error_code(vector: u32) -> bool {
    match Exception::from_vector(vector) {
        Some(exception) => exception.has_error_code(),
        None => false,
    }
}

/// The IRQ line for a hardware interrupt vector.
pub const fn irq_line(vector: u32) -> Option<u32> {
    if vector >= IRQ0 && vector < IRQ0 + IRQ_LINES {
        Some(vector - IRQ0)
    } else {
        None
    }
}
