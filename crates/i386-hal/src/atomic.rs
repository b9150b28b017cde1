//! Atomic exchange, the one multi-processor synchronization primitive.
//!
//! `lock xchg` is an indivisible read-modify-write and a full memory barrier:
//! every store issued before it is globally visible before the exchanged
//! value is. Spinlocks and other locks are built on top of it elsewhere.

use core::sync::atomic::AtomicU32;

/// Atomically store `newval` at `addr` and return the value it replaced.
///
/// # Safety
///
/// `addr` must be valid for reads and writes of a 4-byte aligned `u32`, and
/// every other concurrent access to it must also be atomic.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn xchg(addr: *mut u32, newval: u32) -> u32 {
    let result: u32;
    core::arch::asm!(
        "lock xchg dword ptr [{addr}], eax",
        addr = in(reg) addr,
        inout("eax") newval => result,
        options(nostack, preserves_flags)
    );
    result
}

/// [`xchg`] on a shared atomic cell.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub fn swap(cell: &AtomicU32, newval: u32) -> u32 {
    // SAFETY: `AtomicU32` is aligned and only ever accessed atomically.
    unsafe { xchg(cell.as_ptr(), newval) }
}
