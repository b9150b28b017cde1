//! Out-of-line instances of the i386 primitives.
//!
//! Every primitive is `#[inline]`, so a library build alone never runs its
//! `asm!` template through the assembler. This module is built only for
//! `target_arch = "x86"` and calls each of them from one non-inline function,
//! which makes `cargo build-i686` assemble every template.

use core::mem::size_of_val;

use crate::dtables::DescriptorTablePointer;
use crate::{atomic, cpu, dtables, port, string};

/// Runs every primitive once. Never meant to be called.
///
/// # Safety
///
/// Loads the descriptor tables, the task register, GS and CR3, halts, and
/// performs port I/O. Calling it outside a purpose-built test kernel is
/// undefined behaviour.
#[doc(hidden)]
#[inline(never)]
pub unsafe fn every_primitive(
    table: &[u64],
    sel: u16,
    io: u16,
    buf: &mut [u32],
    word: *mut u32,
) -> u32 {
    let pd = DescriptorTablePointer::new(table.as_ptr() as u32, size_of_val(table) as u32);
    dtables::load_gdt(&pd);
    dtables::load_idt(&pd);
    dtables::lgdt(table.as_ptr(), size_of_val(table));
    dtables::lidt(table.as_ptr(), size_of_val(table));
    dtables::ltr(sel);
    dtables::loadgs(sel);

    cpu::cli();
    let mut acc = cpu::readeflags() ^ cpu::rcr0() ^ cpu::rcr2();
    cpu::lcr3(cpu::rcr3());
    cpu::sti();
    cpu::hlt();

    acc ^= u32::from(port::inb(io)) ^ u32::from(port::inw(io)) ^ port::inl(io);
    port::outb(io, acc as u8);
    port::outw(io, acc as u16);
    port::outl(io, acc);
    port::insl(io, buf.as_mut_ptr(), buf.len());
    port::outsl(io, buf.as_ptr(), buf.len());

    string::stosb(buf.as_mut_ptr().cast::<u8>(), acc as u8, size_of_val(buf));
    string::stosl(buf.as_mut_ptr(), acc, buf.len());

    acc ^ atomic::xchg(word, acc)
}
