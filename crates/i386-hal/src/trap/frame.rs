// =============================================================================
// i386-hal — Trap Frame
// =============================================================================
//
// The register snapshot on the kernel stack at the moment a trap handler
// runs. It is built in three stages, from high addresses to low:
//
//   1. The processor pushes  [ss, esp]  (only when crossing rings),
//      then eflags, cs, eip, and for some exceptions an error code.
//   2. The per-vector stub pushes a zero error code when the processor
//      didn't, then the vector number.
//   3. The common entry stub pushes ds, es, fs, gs and runs `pushal`.
//
// The kernel receives `esp` after stage 3 as a `*mut TrapFrame`. Every
// field therefore has a fixed byte offset, asserted at compile time below.
//
//   offset  field          offset  field
//   0x00    edi            0x30    trapno
//   0x04    esi            0x34    err
//   0x08    ebp            0x38    eip
//   0x0C    oesp (ignored) 0x3C    cs     + pad
//   0x10    ebx            0x40    eflags
//   0x14    edx            ------  ring crossing only ------
//   0x18    ecx            0x44    esp
//   0x1C    eax            0x48    ss     + pad
//   0x20    gs  + pad
//   0x24    fs  + pad
//   0x28    es  + pad
//   0x2C    ds  + pad
//
// RING CROSSING:
//   The processor only pushes ss:esp when the trap moves to a more
//   privileged ring. Which ring the handler runs in is fixed by the gate's
//   target code segment, which this crate does not own, so every accessor
//   for the trailing block takes the handler's privilege level and compares
//   it with the RPL of the saved `cs`. Without a crossing the last 8 bytes
//   of the struct belong to whatever was on the stack before the trap.
//
// Virtual-8086 traps push four more selectors after ss and are not
// described here.
// =============================================================================

use core::mem::{offset_of, size_of};

use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

use super::vector::{self, Exception};
use crate::error::HalError;
use crate::flags::EFlags;

/// Saved execution context at trap entry, in push order.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    // registers as pushed by pushal
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// `esp` at the time of `pushal`; ignored by `popal`.
    pub oesp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,

    // pushed by the entry stub
    pub gs: u16,
    padding1: u16,
    pub fs: u16,
    padding2: u16,
    pub es: u16,
    padding3: u16,
    pub ds: u16,
    padding4: u16,
    pub trapno: u32,

    // pushed by the processor
    pub err: u32,
    pub eip: u32,
    pub cs: u16,
    padding5: u16,
    pub eflags: u32,

    // pushed by the processor only when crossing rings
    esp: u32,
    ss: u16,
    padding6: u16,
}

const _: () = {
    assert!(offset_of!(TrapFrame, edi) == 0x00);
    assert!(offset_of!(TrapFrame, oesp) == 0x0C);
    assert!(offset_of!(TrapFrame, eax) == 0x1C);
    assert!(offset_of!(TrapFrame, gs) == 0x20);
    assert!(offset_of!(TrapFrame, ds) == 0x2C);
    assert!(offset_of!(TrapFrame, trapno) == 0x30);
    assert!(offset_of!(TrapFrame, err) == 0x34);
    assert!(offset_of!(TrapFrame, eip) == 0x38);
    assert!(offset_of!(TrapFrame, cs) == 0x3C);
    assert!(offset_of!(TrapFrame, eflags) == 0x40);
    assert!(offset_of!(TrapFrame, esp) == TrapFrame::RING_CROSSING_OFFSET);
    assert!(offset_of!(TrapFrame, ss) == 0x48);
    assert!(size_of::<TrapFrame>() == TrapFrame::SIZE);
};

/// The stack the interrupted code was using before a ring crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedStack {
    pub esp: u32,
    pub ss: SegmentSelector,
}

/// Decode a 32-bit selector slot (selector in the low half, zero above).
pub fn selector_from_slot(slot: u32) -> Result<SegmentSelector, HalError> {
    if slot >> 16 != 0 {
        return Err(HalError::SelectorPadding(slot));
    }
    Ok(SegmentSelector(slot as u16))
}

impl TrapFrame {
    /// Size of the full record, ring-crossing block included.
    pub const SIZE: usize = 0x4C;

    /// Offset of the ring-crossing block; also the size of a frame for a
    /// trap taken without a privilege change.
    pub const RING_CROSSING_OFFSET: usize = 0x44;

    /// A frame that `iret`s into `entry` at the privilege level of `code`,
    /// on stack `esp` in segment `data`, with interrupts enabled.
    ///
    /// Used to start a context that has never run: the kernel copies this
    /// onto the new kernel stack and returns through the common trap exit.
    pub fn new_user(entry: u32, esp: u32, code: SegmentSelector, data: SegmentSelector) -> Self {
        Self {
            eip: entry,
            cs: code.0,
            eflags: EFlags::INITIAL.bits(),
            esp,
            ss: data.0,
            ds: data.0,
            es: data.0,
            ..Self::default()
        }
    }

    /// The vector number that brought us here.
    #[inline]
    pub const fn vector(&self) -> u32 {
        self.trapno
    }

    /// The processor exception, if the vector is one.
    pub const fn exception(&self) -> Option<Exception> {
        Exception::from_vector(self.trapno)
    }

    /// The error code, for the vectors where the processor supplies one.
    ///
    /// For every other vector `err` holds the stub's placeholder and is
    /// reported as `None`.
    pub const fn error_code(&self) -> Option<u32> {
        if vector::has_error_code(self.trapno) {
            Some(self.err)
        } else {
            None
        }
    }

    /// IRQ line if this trap is a hardware interrupt.
    pub const fn irq(&self) -> Option<u32> {
        vector::irq_line(self.trapno)
    }

    /// Whether this trap is the system call gate.
    pub const fn is_syscall(&self) -> bool {
        self.trapno == vector::SYSCALL
    }

    /// Saved EFLAGS as a flag set.
    pub const fn flags(&self) -> EFlags {
        EFlags::from_bits_retain(self.eflags)
    }

    /// The saved code segment selector.
    pub const fn code_selector(&self) -> SegmentSelector {
        SegmentSelector(self.cs)
    }

    /// The privilege level the interrupted code ran at (the RPL of `cs`).
    pub fn interrupted_privilege(&self) -> PrivilegeLevel {
        self.code_selector().rpl()
    }

    /// Whether the interrupted code was running in ring 3.
    pub fn from_user(&self) -> bool {
        self.interrupted_privilege() == PrivilegeLevel::Ring3
    }

    /// Whether the processor switched stacks (and pushed ss:esp) on the way
    /// into a handler running at `handler`.
    pub fn crossed_rings(&self, handler: PrivilegeLevel) -> bool {
        self.interrupted_privilege() as u8 > handler as u8
    }

    /// Number of bytes of this frame actually on the stack.
    pub fn frame_len(&self, handler: PrivilegeLevel) -> usize {
        if self.crossed_rings(handler) {
            Self::SIZE
        } else {
            Self::RING_CROSSING_OFFSET
        }
    }

    /// The pre-trap stack, present only after a ring crossing.
    pub fn saved_stack(&self, handler: PrivilegeLevel) -> Option<SavedStack> {
        self.crossed_rings(handler).then(|| SavedStack {
            esp: self.esp,
            ss: SegmentSelector(self.ss),
        })
    }

    /// Mutable access to the saved `esp`, present only after a ring crossing.
    pub fn saved_esp_mut(&mut self, handler: PrivilegeLevel) -> Option<&mut u32> {
        if self.crossed_rings(handler) {
            Some(&mut self.esp)
        } else {
            None
        }
    }

    /// The four data segment selectors, in push order (gs, fs, es, ds).
    pub const fn data_selectors(&self) -> [SegmentSelector; 4] {
        [
            SegmentSelector(self.gs),
            SegmentSelector(self.fs),
            SegmentSelector(self.es),
            SegmentSelector(self.ds),
        ]
    }

    /// Check that every selector slot below the ring-crossing block has a
    /// zero upper half.
    ///
    /// A non-zero pad means the entry stub pushed something other than
    /// what this layout describes.
    pub fn check_padding(&self) -> Result<(), HalError> {
        let slots = [
            (self.gs, self.padding1),
            (self.fs, self.padding2),
            (self.es, self.padding3),
            (self.ds, self.padding4),
            (self.cs, self.padding5),
        ];
        for (sel, pad) in slots {
            selector_from_slot(u32::from(sel) | u32::from(pad) << 16)?;
        }
        Ok(())
    }

    /// Set the value `eax` will hold after return (system call results).
    #[inline]
    pub fn set_return_value(&mut self, value: u32) {
        self.eax = value;
    }

    /// Resume `len` bytes past the saved instruction pointer.
    #[inline]
    pub fn advance_ip(&mut self, len: u32) {
        self.eip = self.eip.wrapping_add(len);
    }

    /// Emit the whole frame at `level`, e.g. before killing a context.
    pub fn log_dump(&self, level: log::Level, handler: PrivilegeLevel) {
        match self.exception() {
            Some(exception) => log::log!(level, "trap {} {}", self.trapno, exception),
            None => log::log!(level, "trap {}", self.trapno),
        }
        if let Some(err) = self.error_code() {
            log::log!(level, "  err    {:#010x}", err);
        }
        log::log!(
            level,
            "  eip    {:#010x}  cs {:#06x}  eflags {:#010x}",
            self.eip,
            self.cs,
            self.eflags
        );
        log::log!(
            level,
            "  eax {:#010x}  ebx {:#010x}  ecx {:#010x}  edx {:#010x}",
            self.eax,
            self.ebx,
            self.ecx,
            self.edx
        );
        log::log!(
            level,
            "  esi {:#010x}  edi {:#010x}  ebp {:#010x}",
            self.esi,
            self.edi,
            self.ebp
        );
        log::log!(
            level,
            "  ds {:#06x}  es {:#06x}  fs {:#06x}  gs {:#06x}",
            self.ds,
            self.es,
            self.fs,
            self.gs
        );
        if let Some(stack) = self.saved_stack(handler) {
            log::log!(level, "  esp    {:#010x}  ss {:#06x}", stack.esp, stack.ss.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KERNEL_CS: SegmentSelector = SegmentSelector::new(1, PrivilegeLevel::Ring0);
    const USER_CS: SegmentSelector = SegmentSelector::new(3, PrivilegeLevel::Ring3);
    const USER_DS: SegmentSelector = SegmentSelector::new(4, PrivilegeLevel::Ring3);

    /// A user-mode page fault as it sits on the kernel stack, lowest address
    /// first.
    fn user_page_fault_image() -> [u32; 19] {
        [
            0x11, 0x22, 0x33, 0xDEAD, 0x44, 0x55, 0x66, 0x77, // pushal
            0x23, 0x23, 0x23, 0x23, // gs fs es ds
            14,   // trapno
            0x6,  // err: user write to non-present page
            0x0804_8000, // eip
            0x1B, // cs
            0x202, // eflags
            0xBFFF_F000, // esp
            0x23, // ss
        ]
    }

    fn view(image: &[u32; 19]) -> &TrapFrame {
        // SAFETY: 76 bytes, 4-byte aligned, every bit pattern is valid.
        unsafe { &*(image.as_ptr() as *const TrapFrame) }
    }

    #[test]
    fn test_field_offsets_and_sizes() {
        let table: [(usize, usize, usize); 25] = [
            (offset_of!(TrapFrame, edi), 0x00, 4),
            (offset_of!(TrapFrame, esi), 0x04, 4),
            (offset_of!(TrapFrame, ebp), 0x08, 4),
            (offset_of!(TrapFrame, oesp), 0x0C, 4),
            (offset_of!(TrapFrame, ebx), 0x10, 4),
            (offset_of!(TrapFrame, edx), 0x14, 4),
            (offset_of!(TrapFrame, ecx), 0x18, 4),
            (offset_of!(TrapFrame, eax), 0x1C, 4),
            (offset_of!(TrapFrame, gs), 0x20, 2),
            (offset_of!(TrapFrame, padding1), 0x22, 2),
            (offset_of!(TrapFrame, fs), 0x24, 2),
            (offset_of!(TrapFrame, padding2), 0x26, 2),
            (offset_of!(TrapFrame, es), 0x28, 2),
            (offset_of!(TrapFrame, padding3), 0x2A, 2),
            (offset_of!(TrapFrame, ds), 0x2C, 2),
            (offset_of!(TrapFrame, padding4), 0x2E, 2),
            (offset_of!(TrapFrame, trapno), 0x30, 4),
            (offset_of!(TrapFrame, err), 0x34, 4),
            (offset_of!(TrapFrame, eip), 0x38, 4),
            (offset_of!(TrapFrame, cs), 0x3C, 2),
            (offset_of!(TrapFrame, padding5), 0x3E, 2),
            (offset_of!(TrapFrame, eflags), 0x40, 4),
            (offset_of!(TrapFrame, esp), 0x44, 4),
            (offset_of!(TrapFrame, ss), 0x48, 2),
            (offset_of!(TrapFrame, padding6), 0x4A, 2),
        ];
        // Consecutive entries tile the struct with no gaps.
        let mut next = 0;
        for (actual, expected, size) in table {
            assert_eq!(actual, expected);
            assert_eq!(actual, next);
            next += size;
        }
        assert_eq!(next, size_of::<TrapFrame>());
        assert_eq!(size_of::<TrapFrame>(), 76);
        assert_eq!(core::mem::align_of::<TrapFrame>(), 4);
    }

    #[test]
    fn test_reads_stack_image_in_push_order() {
        let image = user_page_fault_image();
        let tf = view(&image);

        assert_eq!((tf.edi, tf.esi, tf.ebp), (0x11, 0x22, 0x33));
        assert_eq!((tf.ebx, tf.edx, tf.ecx, tf.eax), (0x44, 0x55, 0x66, 0x77));
        assert_eq!((tf.gs, tf.fs, tf.es, tf.ds), (0x23, 0x23, 0x23, 0x23));
        assert_eq!(tf.vector(), 14);
        assert_eq!(tf.exception(), Some(Exception::PageFault));
        assert_eq!(tf.error_code(), Some(6));
        assert_eq!(tf.eip, 0x0804_8000);
        assert!(tf.flags().interrupts_enabled());
        assert!(tf.check_padding().is_ok());

        assert!(tf.from_user());
        assert_eq!(tf.frame_len(PrivilegeLevel::Ring0), TrapFrame::SIZE);
        assert_eq!(
            tf.saved_stack(PrivilegeLevel::Ring0),
            Some(SavedStack { esp: 0xBFFF_F000, ss: USER_DS })
        );
    }

    #[test]
    fn test_kernel_trap_has_no_saved_stack() {
        let mut image = user_page_fault_image();
        image[15] = u32::from(KERNEL_CS.0);
        let tf = view(&image);

        assert!(!tf.from_user());
        assert!(!tf.crossed_rings(PrivilegeLevel::Ring0));
        assert_eq!(tf.frame_len(PrivilegeLevel::Ring0), TrapFrame::RING_CROSSING_OFFSET);
        assert_eq!(tf.saved_stack(PrivilegeLevel::Ring0), None);
    }

    #[test]
    fn test_crossing_depends_on_handler_ring() {
        let tf = TrapFrame {
            cs: SegmentSelector::new(2, PrivilegeLevel::Ring1).0,
            ..TrapFrame::default()
        };
        assert!(tf.crossed_rings(PrivilegeLevel::Ring0));
        assert!(!tf.crossed_rings(PrivilegeLevel::Ring1));
        assert!(!tf.crossed_rings(PrivilegeLevel::Ring3));
    }

    #[test]
    fn test_error_code_hidden_for_vectors_without_one() {
        let mut tf = TrapFrame {
            trapno: vector::SYSCALL,
            err: 0,
            ..TrapFrame::default()
        };
        assert!(tf.is_syscall());
        assert_eq!(tf.error_code(), None);

        tf.trapno = vector::IRQ0 + vector::irq::TIMER;
        assert_eq!(tf.irq(), Some(0));
        assert_eq!(tf.error_code(), None);

        tf.trapno = Exception::GeneralProtectionFault as u32;
        tf.err = 0x10;
        assert_eq!(tf.error_code(), Some(0x10));
    }

    #[test]
    fn test_padding_violation_is_reported() {
        let mut image = user_page_fault_image();
        image[10] = 0x0001_0023; // es slot with garbage in the pad
        assert_eq!(
            view(&image).check_padding(),
            Err(HalError::SelectorPadding(0x0001_0023))
        );
    }

    #[test]
    fn test_selector_slot_decoding() {
        assert_eq!(selector_from_slot(0x1B), Ok(USER_CS));
        assert_eq!(selector_from_slot(0x1B).map(|s| s.index()), Ok(3));
        assert_eq!(
            selector_from_slot(0xFFFF_001B),
            Err(HalError::SelectorPadding(0xFFFF_001B))
        );
    }

    #[test]
    fn test_in_place_mutation_touches_only_its_slot() {
        let mut image = user_page_fault_image();
        let before = image;
        {
            // SAFETY: same layout argument as `view`.
            let tf = unsafe { &mut *(image.as_mut_ptr() as *mut TrapFrame) };
            tf.set_return_value(0xFFFF_FFFF);
            tf.advance_ip(2);
            *tf.saved_esp_mut(PrivilegeLevel::Ring0).unwrap() -= 4;
        }
        for (i, (&a, &b)) in before.iter().zip(image.iter()).enumerate() {
            match i {
                7 => assert_eq!(b, 0xFFFF_FFFF),
                14 => assert_eq!(b, a + 2),
                17 => assert_eq!(b, a - 4),
                _ => assert_eq!(a, b, "slot {i}"),
            }
        }
    }

    #[test]
    fn test_saved_esp_not_writable_without_crossing() {
        let mut tf = TrapFrame {
            cs: KERNEL_CS.0,
            ..TrapFrame::default()
        };
        assert!(tf.saved_esp_mut(PrivilegeLevel::Ring0).is_none());
    }

    #[test]
    fn test_new_user_frame() {
        let tf = TrapFrame::new_user(0, 0x1000, USER_CS, USER_DS);
        assert_eq!(tf.cs, 0x1B);
        assert_eq!((tf.ds, tf.es), (0x23, 0x23));
        assert_eq!((tf.fs, tf.gs), (0, 0));
        assert_eq!(tf.eflags, 0x202);
        assert!(tf.from_user());
        assert_eq!(
            tf.saved_stack(PrivilegeLevel::Ring0),
            Some(SavedStack { esp: 0x1000, ss: USER_DS })
        );
        assert!(tf.check_padding().is_ok());
    }

    #[test]
    fn test_data_selectors_in_push_order() {
        let tf = TrapFrame {
            gs: 0x30,
            fs: 0x28,
            es: 0x23,
            ds: 0x10,
            ..TrapFrame::default()
        };
        let sels = tf.data_selectors();
        assert_eq!(sels.map(|s| s.0), [0x30, 0x28, 0x23, 0x10]);
        assert_eq!(sels[2].rpl(), PrivilegeLevel::Ring3);
    }

    #[test]
    fn test_log_dump_without_logger_is_harmless() {
        let image = user_page_fault_image();
        view(&image).log_dump(log::Level::Error, PrivilegeLevel::Ring0);
    }
}
