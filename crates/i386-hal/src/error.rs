//! Errors for the checked constructors of this crate.
//!
//! The instructions themselves never fail: misuse raises a processor fault
//! that comes back as a new trap. Only the helpers that turn raw numbers into
//! typed values report errors.

use core::fmt;

/// Reasons a raw value cannot be turned into a HAL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// A descriptor table must be between 1 and 65536 bytes.
    TableSize(usize),
    /// A descriptor table base must fit in 32 bits.
    TableBase(u64),
    /// The upper half of a 32-bit selector slot was not zero.
    SelectorPadding(u32),
    /// The vector is not a processor-defined exception.
    NotAnException(u32),
}

impl HalError {
    /// Subsystem identifier carried in the high byte of [`HalError::code`].
    pub const SUBSYSTEM: u8 = 0x01;

    /// Numeric error code for debugging.
    pub const fn code(&self) -> u16 {
        let low = match self {
            Self::TableSize(_) => 0x01,
            Self::TableBase(_) => 0x02,
            Self::SelectorPadding(_) => 0x03,
            Self::NotAnException(_) => 0x04,
        };
        ((Self::SUBSYSTEM as u16) << 8) | low
    }

    /// Short description for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TableSize(_) => "Descriptor table size out of range",
            Self::TableBase(_) => "Descriptor table base above 4 GiB",
            Self::SelectorPadding(_) => "Selector slot padding not zero",
            Self::NotAnException(_) => "Vector is not a processor exception",
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04X}: {}", self.code(), self.name())?;
        match self {
            Self::TableSize(size) => write!(f, " ({size} bytes)"),
            Self::TableBase(base) => write!(f, " ({base:#x})"),
            Self::SelectorPadding(slot) => write!(f, " ({slot:#010x})"),
            Self::NotAnException(vector) => write!(f, " (vector {vector})"),
        }
    }
}

impl core::error::Error for HalError {}
