//! Global Descriptor Table: flat 4 GiB segments for ring 0 and ring 3,
//! plus the TSS descriptor used for privilege-level stack switches.
//!
//! The `x86_64` crate's [`GlobalDescriptorTable`] type encodes long-mode
//! descriptors and cannot express a 32-bit TSS descriptor or a 32-bit
//! flat segment, so this table is hand-rolled the way the original
//! 32-bit course kernel this design is based on builds its own.

use core::{arch::asm, mem::size_of};

use lazy_static::lazy_static;
use spin::Mutex;

use super::tss::Tss;

/// Segment selector layout.
///
/// - 0x00: null descriptor
/// - 0x08: kernel code (ring 0)
/// - 0x10: kernel data (ring 0)
/// - 0x18: user code (ring 3, selector value 0x1B with RPL)
/// - 0x20: user data (ring 3, selector value 0x2B with RPL)
/// - 0x28: TSS
pub const KERNEL_CS: u16 = 0x08;
pub const KERNEL_DS: u16 = 0x10;
pub const USER_CS: u16 = 0x18 | 3;
pub const USER_DS: u16 = 0x20 | 3;
pub const TSS_SELECTOR: u16 = 0x28;

const ENTRY_COUNT: usize = 6;

#[derive(Clone, Copy)]
#[repr(C, packed)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    limit_high_flags: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        GdtEntry {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            limit_high_flags: 0,
            base_high: 0,
        }
    }

    /// A flat segment spanning all 4 GiB, 4 KiB granularity, 32-bit mode.
    const fn flat(access: u8) -> Self {
        GdtEntry {
            limit_low: 0xFFFF,
            base_low: 0,
            base_mid: 0,
            access,
            limit_high_flags: 0xCF,
            base_high: 0,
        }
    }

    fn tss(base: u32, limit: u32) -> Self {
        GdtEntry {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access: 0x89, // present, ring 0, 32-bit TSS (available)
            limit_high_flags: (((limit >> 16) & 0x0F) as u8) | 0x00,
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }
}

#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u32,
}

struct GdtTable {
    entries: [GdtEntry; ENTRY_COUNT],
}

lazy_static! {
    static ref TSS: Mutex<Tss> = Mutex::new(Tss::new(KERNEL_DS));
    static ref GDT: Mutex<GdtTable> = Mutex::new(GdtTable {
        entries: [GdtEntry::null(); ENTRY_COUNT],
    });
}

/// Build the table and load it. Must run once, early in boot, before any
/// segment selector other than the bootloader's own is used.
pub fn init() {
    {
        let mut gdt = GDT.lock();
        gdt.entries[1] = GdtEntry::flat(0x9A); // kernel code: present, ring0, exec/read
        gdt.entries[2] = GdtEntry::flat(0x92); // kernel data: present, ring0, read/write
        gdt.entries[3] = GdtEntry::flat(0xFA); // user code: present, ring3, exec/read
        gdt.entries[4] = GdtEntry::flat(0xF2); // user data: present, ring3, read/write
        let tss = TSS.lock();
        let tss_addr = &*tss as *const Tss as u32;
        gdt.entries[5] = GdtEntry::tss(tss_addr, (size_of::<Tss>() - 1) as u32);
    }

    let gdt = GDT.lock();
    let pointer = GdtPointer {
        limit: (size_of::<[GdtEntry; ENTRY_COUNT]>() - 1) as u16,
        base: gdt.entries.as_ptr() as u32,
    };

    // SAFETY: `pointer` addresses a `'static`-lifetime table that outlives
    // the kernel; `lgdt` only reads it. The subsequent far jump reloads CS
    // with a selector this same table defines, and the segment register
    // writes load selectors from entries just installed above.
    unsafe {
        asm!(
            "lgdt [{gdtr}]",
            "push {cs_sel:e}",
            "lea {scratch:e}, [2f]",
            "push {scratch:e}",
            "retf",
            "2:",
            "mov ax, {ds_sel:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            gdtr = in(reg) &pointer,
            cs_sel = in(reg) KERNEL_CS as u32,
            scratch = out(reg) _,
            ds_sel = in(reg) KERNEL_DS,
        );
        asm!("ltr {0:x}", in(reg) TSS_SELECTOR, options(nostack, preserves_flags));
    }
}

/// Rewrite the TSS's ring-0 stack pointer (`esp0`). Called on every context
/// switch so that the next ring3 -> ring0 transition lands on the right
/// kernel stack.
///
/// # Safety
///
/// Must be called with interrupts disabled; the TSS is live hardware state
/// consulted on the very next interrupt/syscall.
pub unsafe fn set_kernel_stack(esp0: u32) {
    let mut tss = TSS.lock();
    tss.esp0 = esp0;
}
