// =============================================================================
// i386-hal — CPU Control
// =============================================================================
//
// Interrupt flag, EFLAGS and control-register access. Each function is a
// thin wrapper around one privileged instruction with no logic of its own.
//
// The interrupt flag, CR3 and the descriptor-table registers are per-CPU
// global state. Nothing here locks them: callers that share them across
// CPUs build their own exclusion (typically a spinlock over `atomic::xchg`).
//
// CLI/STI are not counted. A `cli` inside a region that was already
// interrupt-free followed by an `sti` re-enables interrupts early; balancing
// nested sections is the caller's job.
// =============================================================================

use crate::flags::EFlags;

/// Clears the interrupt flag, masking external interrupts on this CPU.
///
/// NMIs and exceptions are still delivered. The asm block is a compiler
/// barrier so memory accesses are not moved out of the critical section.
///
/// # Safety
///
/// Must run at CPL 0 (or with IOPL permitting it), otherwise it raises #GP.
/// The caller owns the decision of when interrupts come back on.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn cli() {
    core::arch::asm!("cli", options(nostack, preserves_flags));
}

/// Sets the interrupt flag, unmasking external interrupts on this CPU.
///
/// The instruction after `sti` executes before any pending interrupt is
/// delivered.
///
/// # Safety
///
/// Same privilege requirement as [`cli`]. Interrupt handlers may run as soon
/// as the next instruction retires, so any state they touch must be
/// consistent.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn sti() {
    core::arch::asm!("sti", options(nostack, preserves_flags));
}

/// Reads EFLAGS by pushing it onto the stack and popping it into a register.
///
/// Has no side effect beyond the read. On a 64-bit host the upper half of
/// RFLAGS is reserved (zero) and is dropped.
#[cfg(target_arch = "x86")]
#[inline]
pub fn readeflags() -> u32 {
    let eflags: u32;
    // SAFETY: reading EFLAGS is allowed at every privilege level.
    unsafe {
        core::arch::asm!(
            "pushfd",
            "pop {}",
            out(reg) eflags,
            options(nomem, preserves_flags)
        );
    }
    eflags
}

#[cfg(target_arch = "x86_64")]
#[inline]
pub fn readeflags() -> u32 {
    let rflags: u64;
    // SAFETY: reading RFLAGS is allowed at every privilege level.
    unsafe {
        core::arch::asm!(
            "pushfq",
            "pop {}",
            out(reg) rflags,
            options(nomem, preserves_flags)
        );
    }
    rflags as u32
}

/// [`readeflags`] as a typed flag set.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub fn eflags() -> EFlags {
    EFlags::from_bits_retain(readeflags())
}

/// Whether maskable interrupts are currently enabled on this CPU.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub fn interrupts_enabled() -> bool {
    eflags().interrupts_enabled()
}

/// Halts the CPU until the next interrupt arrives.
///
/// If interrupts are disabled this never wakes up except for an NMI.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub fn hlt() {
    // SAFETY: HLT only stops instruction fetch until the next interrupt.
    unsafe {
        core::arch::asm!("hlt", options(nomem, nostack, preserves_flags));
    }
}

/// Reads CR2, the linear address of the most recent page fault.
///
/// Only meaningful inside the page-fault handler (vector 14) before another
/// fault can occur. At other times it holds stale data.
#[cfg(target_arch = "x86")]
#[inline]
pub fn rcr2() -> u32 {
    let value: u32;
    // SAFETY: reading CR2 is privileged but has no side effects.
    unsafe {
        core::arch::asm!(
            "mov {}, cr2",
            out(reg) value,
            options(nomem, nostack, preserves_flags)
        );
    }
    value
}

/// Loads CR3, switching the active page directory.
///
/// Writing CR3 flushes every non-global TLB entry on this CPU. The flush is
/// a consequence of the write and cannot be skipped.
///
/// # Safety
///
/// `pgdir` must be the physical address of a valid, 4 KiB aligned page
/// directory that maps the currently executing code and stack.
#[cfg(target_arch = "x86")]
#[inline]
pub unsafe fn lcr3(pgdir: u32) {
    core::arch::asm!(
        "mov cr3, {}",
        in(reg) pgdir,
        options(nostack, preserves_flags)
    );
}

/// Reads CR3, the physical address of the active page directory.
#[cfg(target_arch = "x86")]
#[inline]
pub fn rcr3() -> u32 {
    let value: u32;
    // SAFETY: reading CR3 is privileged but has no side effects.
    unsafe {
        core::arch::asm!(
            "mov {}, cr3",
            out(reg) value,
            options(nomem, nostack, preserves_flags)
        );
    }
    value
}

/// Reads CR0 (protection enable, paging, write protect, ...).
#[cfg(target_arch = "x86")]
#[inline]
pub fn rcr0() -> u32 {
    let value: u32;
    // SAFETY: reading CR0 has no side effects.
    unsafe {
        core::arch::asm!(
            "mov {}, cr0",
            out(reg) value,
            options(nomem, nostack, preserves_flags)
        );
    }
    value
}
