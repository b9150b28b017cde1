//! `rep stos` memory fills.
//!
//! These are the primitives beneath any "set memory to a constant" helper a
//! kernel needs before its allocator (or `compiler_builtins`) is trusted,
//! e.g. zeroing BSS, page frames or page tables.

/// Store `value` into `count` consecutive bytes starting at `addr`.
///
/// A zero `count` writes nothing.
///
/// # Safety
///
/// `addr` must be valid for writes of `count` bytes.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn stosb(addr: *mut u8, value: u8, count: usize) {
    core::arch::asm!(
        "cld",
        "rep stosb",
        inout("edi") addr => _,
        inout("ecx") count => _,
        in("al") value,
        options(nostack)
    );
}

/// Store `value` into `count` consecutive double words starting at `addr`.
///
/// `count` is in 4-byte units, not bytes.
///
/// # Safety
///
/// `addr` must be valid for writes of `count` `u32`s and 4-byte aligned.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn stosl(addr: *mut u32, value: u32, count: usize) {
    core::arch::asm!(
        "cld",
        "rep stosd",
        inout("edi") addr => _,
        inout("ecx") count => _,
        in("eax") value,
        options(nostack)
    );
}

/// Set every byte of `dst` to `value`.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn fill_bytes(dst: &mut [u8], value: u8) {
    // SAFETY: the slice is valid for `len` byte writes.
    unsafe { stosb(dst.as_mut_ptr(), value, dst.len()) }
}

/// Set every double word of `dst` to `value`.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn fill_dwords(dst: &mut [u32], value: u32) {
    // SAFETY: the slice is valid and aligned for `len` u32 writes.
    unsafe { stosl(dst.as_mut_ptr(), value, dst.len()) }
}
