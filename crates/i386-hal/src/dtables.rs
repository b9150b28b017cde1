//! Descriptor-table registers: GDTR, IDTR, the task register and GS.
//!
//! This module never builds descriptor entries. It only knows how to hand a
//! caller-owned table to the processor through the 6-byte pseudo-descriptor
//! `lgdt`/`lidt` consume. The processor keeps using the table in place, so the
//! table must stay at the same address for as long as it is loaded.

use core::mem::size_of;

use crate::error::HalError;

/// Largest table the 16-bit limit can describe (8192 eight-byte entries).
pub const MAX_TABLE_SIZE: usize = 0x1_0000;

/// Operand of `lgdt`/`lidt`: a 16-bit limit followed by a 32-bit linear base.
///
/// `limit` is the table size in bytes minus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct DescriptorTablePointer {
    limit: u16,
    base: u32,
}

const _: () = assert!(size_of::<DescriptorTablePointer>() == 6);

impl DescriptorTablePointer {
    /// Encode a table of `size` bytes at `base`.
    ///
    /// The limit is `size - 1` truncated to 16 bits, so sizes outside
    /// `1..=65536` wrap. Use [`Self::try_new`] to reject them instead.
    pub const fn new(base: u32, size: u32) -> Self {
        Self {
            limit: size.wrapping_sub(1) as u16,
            base,
        }
    }

    /// Checked form of [`Self::new`] for pointer-sized inputs.
    pub fn try_new(base: usize, size: usize) -> Result<Self, HalError> {
        if size == 0 || size > MAX_TABLE_SIZE {
            return Err(HalError::TableSize(size));
        }
        let base = u32::try_from(base).map_err(|_| HalError::TableBase(base as u64))?;
        Ok(Self::new(base, size as u32))
    }

    /// Describe `table` in place.
    pub fn for_table<T>(table: &[T]) -> Result<Self, HalError> {
        Self::try_new(table.as_ptr() as usize, core::mem::size_of_val(table))
    }

    /// Table size in bytes minus one.
    #[inline]
    pub const fn limit(&self) -> u16 {
        self.limit
    }

    /// Table size in bytes (1 to 65536).
    #[inline]
    pub const fn size(&self) -> u32 {
        let limit = self.limit;
        limit as u32 + 1
    }

    /// Linear address of the first entry.
    #[inline]
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// The record as three 16-bit words: limit, base bits 0-15, base bits 16-31.
    pub const fn words(&self) -> [u16; 3] {
        let (limit, base) = (self.limit, self.base);
        [limit, base as u16, (base >> 16) as u16]
    }

    /// The record exactly as it sits in memory.
    pub const fn as_bytes(&self) -> [u8; 6] {
        let (limit, base) = (self.limit, self.base);
        let limit = limit.to_le_bytes();
        let base = base.to_le_bytes();
        [limit[0], limit[1], base[0], base[1], base[2], base[3]]
    }
}

/// Load GDTR from an already encoded pseudo-descriptor.
///
/// # Safety
///
/// The described table must hold valid segment descriptors, stay at that
/// address while loaded, and describe the currently used segments.
#[cfg(target_arch = "x86")]
#[inline]
pub unsafe fn load_gdt(ptr: &DescriptorTablePointer) {
    core::arch::asm!(
        "lgdt [{}]",
        in(reg) ptr,
        options(readonly, nostack, preserves_flags)
    );
}

/// Load IDTR from an already encoded pseudo-descriptor.
///
/// # Safety
///
/// The described table must hold valid gate descriptors and stay at that
/// address while loaded.
#[cfg(target_arch = "x86")]
#[inline]
pub unsafe fn load_idt(ptr: &DescriptorTablePointer) {
    core::arch::asm!(
        "lidt [{}]",
        in(reg) ptr,
        options(readonly, nostack, preserves_flags)
    );
}

/// Point GDTR at the `size`-byte table at `table`.
///
/// Only the (limit, base) pair is copied into the register; the table itself
/// is read by the processor on every segment load afterwards. Nothing is
/// logged here; callers that want a record log the table before loading it.
///
/// # Safety
///
/// See [`load_gdt`]. `table` must not move or be freed while loaded.
#[cfg(target_arch = "x86")]
pub unsafe fn lgdt<T>(table: *const T, size: usize) {
    let pd = DescriptorTablePointer::new(table as u32, size as u32);
    load_gdt(&pd);
}

/// Point IDTR at the `size`-byte table at `table`.
///
/// # Safety
///
/// See [`load_idt`]. `table` must not move or be freed while loaded.
#[cfg(target_arch = "x86")]
pub unsafe fn lidt<T>(table: *const T, size: usize) {
    let pd = DescriptorTablePointer::new(table as u32, size as u32);
    load_idt(&pd);
}

/// Load the task register with a TSS selector.
///
/// Done once per CPU; marks the TSS descriptor busy.
///
/// # Safety
///
/// `sel` must select an available TSS descriptor in the loaded GDT.
#[cfg(target_arch = "x86")]
#[inline]
pub unsafe fn ltr(sel: u16) {
    // Not `nomem`: the processor reads the descriptor from the GDT and writes
    // its busy bit, so stores to the GDT must stay ordered around this.
    core::arch::asm!(
        "ltr {0:x}",
        in(reg) sel,
        options(nostack, preserves_flags)
    );
}

/// Load GS, typically with a per-CPU data segment.
///
/// # Safety
///
/// `sel` must be null or select a valid, present data segment whose DPL
/// permits the load.
#[cfg(target_arch = "x86")]
#[inline]
pub unsafe fn loadgs(sel: u16) {
    core::arch::asm!(
        "mov gs, {0:x}",
        in(reg) sel,
        options(nostack, preserves_flags)
    );
}
