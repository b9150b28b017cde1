//! Hardware Abstraction Layer for protected-mode (32-bit) x86.
//!
//! The crate is split the same way the processor is:
//!   - `port`     the I/O port address space (`in`/`out`, `rep ins`/`rep outs`)
//!   - `string`   `rep stos` memory fills
//!   - `cpu`      interrupt flag, EFLAGS, control registers, HLT
//!   - `atomic`   `lock xchg`, the only cross-CPU primitive
//!   - `dtables`  GDT/IDT pseudo-descriptors, task register, GS reload
//!   - `trap`     the register snapshot built on the stack at trap entry
//!
//! Instructions whose operand width is fixed by protected mode (descriptor
//! loads, control registers, segment loads) only exist for
//! `target_arch = "x86"`. Width-neutral instructions are also built for
//! `x86_64` so the host test suite can run them.
#![cfg_attr(not(test), no_std)]

pub mod atomic;
pub mod cpu;
pub mod dtables;
pub mod error;
pub mod flags;
#[cfg(target_arch = "x86")]
#[doc(hidden)]
pub mod instances;
pub mod port;
pub mod string;
pub mod trap;

pub use error::HalError;
pub use flags::EFlags;
pub use port::PortIo;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use port::RawPorts;
pub use trap::TrapFrame;

pub use x86_64::structures::gdt::SegmentSelector;
pub use x86_64::PrivilegeLevel;
