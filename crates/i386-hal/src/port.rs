//! x86 port I/O primitives.
//!
//! Free functions wrap the `in`/`out` family of instructions one-to-one.
//! [`PortIo`] is the seam device code is written against, so the same code
//! runs on [`RawPorts`] in the kernel and on an in-memory bus in tests.

/// Read a byte from an x86 I/O port.
///
/// # Safety
///
/// Reading from an arbitrary I/O port can have side effects on hardware.
/// The caller must ensure the port is valid and that the current privilege
/// level (or the TSS I/O bitmap) allows the access.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let value: u8;
    core::arch::asm!(
        "in al, dx",
        in("dx") port,
        out("al") value,
        options(nomem, nostack, preserves_flags)
    );
    value
}

/// Read a 16-bit word from an x86 I/O port.
///
/// # Safety
///
/// Same contract as [`inb`].
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn inw(port: u16) -> u16 {
    let value: u16;
    core::arch::asm!(
        "in ax, dx",
        in("dx") port,
        out("ax") value,
        options(nomem, nostack, preserves_flags)
    );
    value
}

/// Read a 32-bit double word from an x86 I/O port.
///
/// # Safety
///
/// Same contract as [`inb`].
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn inl(port: u16) -> u32 {
    let value: u32;
    core::arch::asm!(
        "in eax, dx",
        in("dx") port,
        out("eax") value,
        options(nomem, nostack, preserves_flags)
    );
    value
}

/// Read `count` double words from `port` into memory starting at `addr`.
///
/// The destination pointer advances by four bytes per element. The asm block
/// is not marked `nomem`: the compiler must assume any memory may have been
/// written.
///
/// # Safety
///
/// `addr` must be valid for writes of `count` consecutive `u32`s, and the
/// port contract of [`inb`] applies.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn insl(port: u16, addr: *mut u32, count: usize) {
    core::arch::asm!(
        "cld",
        "rep insd",
        in("dx") port,
        inout("edi") addr => _,
        inout("ecx") count => _,
        options(nostack)
    );
}

/// Write a byte to an x86 I/O port.
///
/// # Safety
///
/// Writing to an arbitrary I/O port can have side effects on hardware.
/// The caller must ensure the port and value are valid.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn outb(port: u16, value: u8) {
    core::arch::asm!(
        "out dx, al",
        in("dx") port,
        in("al") value,
        options(nomem, nostack, preserves_flags)
    );
}

/// Write a 16-bit word to an x86 I/O port.
///
/// # Safety
///
/// Same contract as [`outb`].
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn outw(port: u16, value: u16) {
    core::arch::asm!(
        "out dx, ax",
        in("dx") port,
        in("ax") value,
        options(nomem, nostack, preserves_flags)
    );
}

/// Write a 32-bit double word to an x86 I/O port.
///
/// # Safety
///
/// Same contract as [`outb`].
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub unsafe fn outl(port: u16, value: u32) {
    core::arch::asm!(
        "out dx, eax",
        in("dx") port,
        in("eax") value,
        options(nomem, nostack, preserves_flags)
    );
}

/// Write `count` double words from memory starting at `addr` to `port`.
///
/// Source memory is only read.
///
/// # Safety
///
/// `addr` must be valid for reads of `count` consecutive `u32`s, and the
/// port contract of [`outb`] applies.
#[cfg(target_arch = "x86")]
#[inline]
pub unsafe fn outsl(port: u16, addr: *const u32, count: usize) {
    // LLVM reserves esi on i386, so the source is swapped in and out of it
    // around the instruction.
    core::arch::asm!(
        "xchg {src}, esi",
        "cld",
        "rep outsd",
        "xchg {src}, esi",
        src = inout(reg) addr => _,
        in("dx") port,
        inout("ecx") count => _,
        options(readonly, nostack)
    );
}

#[cfg(target_arch = "x86_64")]
#[inline]
pub unsafe fn outsl(port: u16, addr: *const u32, count: usize) {
    core::arch::asm!(
        "cld",
        "rep outsd",
        in("dx") port,
        inout("rsi") addr => _,
        inout("ecx") count => _,
        options(readonly, nostack)
    );
}

/// Access to the I/O port address space.
///
/// Bulk transfers have default implementations in terms of the single-value
/// accessors; hardware implementations override them with `rep` forms.
pub trait PortIo {
    fn read_u8(&mut self, port: u16) -> u8;
    fn read_u16(&mut self, port: u16) -> u16;
    fn read_u32(&mut self, port: u16) -> u32;

    fn write_u8(&mut self, port: u16, value: u8);
    fn write_u16(&mut self, port: u16, value: u16);
    fn write_u32(&mut self, port: u16, value: u32);

    /// Fill `buf` with consecutive double-word reads from `port`.
    fn read_dwords(&mut self, port: u16, buf: &mut [u32]) {
        for slot in buf.iter_mut() {
            *slot = self.read_u32(port);
        }
    }

    /// Write every element of `buf` to `port`, in order.
    fn write_dwords(&mut self, port: u16, buf: &[u32]) {
        for &value in buf {
            self.write_u32(port, value);
        }
    }
}

/// The real I/O port space of the executing processor.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[derive(Debug)]
pub struct RawPorts {
    _private: (),
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl RawPorts {
    /// Create a handle to the processor's port space.
    ///
    /// # Safety
    ///
    /// Every access made through the handle is a raw `in`/`out`. The caller
    /// must be running at a privilege level allowed to perform port I/O, and
    /// is responsible for every port the handle is later used with.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl PortIo for RawPorts {
    #[inline]
    fn read_u8(&mut self, port: u16) -> u8 {
        // SAFETY: the constructor's contract covers all accesses.
        unsafe { inb(port) }
    }

    #[inline]
    fn read_u16(&mut self, port: u16) -> u16 {
        // SAFETY: the constructor's contract covers all accesses.
        unsafe { inw(port) }
    }

    #[inline]
    fn read_u32(&mut self, port: u16) -> u32 {
        // SAFETY: the constructor's contract covers all accesses.
        unsafe { inl(port) }
    }

    #[inline]
    fn write_u8(&mut self, port: u16, value: u8) {
        // SAFETY: the constructor's contract covers all accesses.
        unsafe { outb(port, value) }
    }

    #[inline]
    fn write_u16(&mut self, port: u16, value: u16) {
        // SAFETY: the constructor's contract covers all accesses.
        unsafe { outw(port, value) }
    }

    #[inline]
    fn write_u32(&mut self, port: u16, value: u32) {
        // SAFETY: the constructor's contract covers all accesses.
        unsafe { outl(port, value) }
    }

    fn read_dwords(&mut self, port: u16, buf: &mut [u32]) {
        // SAFETY: `buf` is valid for `buf.len()` writes.
        unsafe { insl(port, buf.as_mut_ptr(), buf.len()) }
    }

    fn write_dwords(&mut self, port: u16, buf: &[u32]) {
        // SAFETY: `buf` is valid for `buf.len()` reads.
        unsafe { outsl(port, buf.as_ptr(), buf.len()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    /// Every port is a FIFO: writes enqueue, reads dequeue (all ones when empty,
    /// like a floating bus).
    #[derive(Default)]
    struct LoopbackBus {
        fifos: HashMap<u16, VecDeque<u32>>,
        writes: usize,
    }

    impl LoopbackBus {
        fn pop(&mut self, port: u16) -> u32 {
            self.fifos
                .get_mut(&port)
                .and_then(VecDeque::pop_front)
                .unwrap_or(u32::MAX)
        }

        fn push(&mut self, port: u16, value: u32) {
            self.writes += 1;
            self.fifos.entry(port).or_default().push_back(value);
        }
    }

    impl PortIo for LoopbackBus {
        fn read_u8(&mut self, port: u16) -> u8 {
            self.pop(port) as u8
        }
        fn read_u16(&mut self, port: u16) -> u16 {
            self.pop(port) as u16
        }
        fn read_u32(&mut self, port: u16) -> u32 {
            self.pop(port)
        }
        fn write_u8(&mut self, port: u16, value: u8) {
            self.push(port, u32::from(value));
        }
        fn write_u16(&mut self, port: u16, value: u16) {
            self.push(port, u32::from(value));
        }
        fn write_u32(&mut self, port: u16, value: u32) {
            self.push(port, value);
        }
    }

    #[test]
    fn test_byte_loopback_every_port() {
        let mut bus = LoopbackBus::default();
        for port in 0..=u16::MAX {
            let value = (port as u8) ^ 0xAE;
            bus.write_u8(port, value);
            assert_eq!(bus.read_u8(port), value, "port {port:#06x}");
        }
    }

    #[test]
    fn test_word_write_is_not_truncated() {
        let mut bus = LoopbackBus::default();
        bus.write_u16(0x1F0, 0xBEEF);
        assert_eq!(bus.read_u16(0x1F0), 0xBEEF);
    }

    #[test]
    fn test_bulk_transfer_preserves_order() {
        let mut bus = LoopbackBus::default();
        let sector: Vec<u32> = (0..128).map(|i| 0x1000_0000 | i).collect();
        bus.write_dwords(0x1F0, &sector);
        assert_eq!(bus.writes, 128);

        let mut back = [0u32; 128];
        bus.read_dwords(0x1F0, &mut back);
        assert_eq!(&back[..], &sector[..]);
    }

    #[test]
    fn test_bulk_transfer_of_nothing() {
        let mut bus = LoopbackBus::default();
        bus.write_dwords(0x1F0, &[]);
        let mut empty: [u32; 0] = [];
        bus.read_dwords(0x1F0, &mut empty);
        assert_eq!(bus.writes, 0);
    }

    #[test]
    fn test_bulk_read_leaves_source_port_untouched() {
        let mut bus = LoopbackBus::default();
        bus.write_dwords(0x170, &[1, 2, 3]);
        let mut buf = [0u32; 2];
        bus.read_dwords(0x1F0, &mut buf);
        assert_eq!(buf, [u32::MAX; 2]);
        assert_eq!(bus.read_u32(0x170), 1);
    }
}
