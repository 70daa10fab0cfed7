//! 32-bit Interrupt Descriptor Table.
//!
//! Vector numbers mirror the layout this kernel's hardware wiring expects:
//! 0-31 CPU exceptions, 0x20 PIT, 0x21 keyboard (IRQ1), 0x28 RTC (IRQ8),
//! 0x80 the syscall gate (DPL 3 so `int 0x80` is callable from ring 3).

use core::{arch::asm, mem::size_of};

use lazy_static::lazy_static;
use spin::Mutex;

use super::gdt::KERNEL_CS;

pub const PIT_VECTOR: u8 = 0x20;
pub const KEYBOARD_VECTOR: u8 = 0x21;
pub const RTC_VECTOR: u8 = 0x28;
pub const SYSCALL_VECTOR: u8 = 0x80;

const IDT_SIZE: usize = 256;

#[derive(Clone, Copy)]
#[repr(C, packed)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        IdtEntry {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, dpl: u8, gate_type: u8) -> Self {
        IdtEntry {
            offset_low: (handler & 0xFFFF) as u16,
            selector: KERNEL_CS,
            zero: 0,
            type_attr: 0x80 | ((dpl & 0x3) << 5) | gate_type,
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

/// 32-bit interrupt gate (interrupts disabled on entry).
const GATE_INTERRUPT_32: u8 = 0x0E;
/// 32-bit trap gate (interrupts left as-is on entry) — used for the
/// syscall vector, matching the source kernel's use of a trap gate so a
/// syscall can itself be interrupted.
const GATE_TRAP_32: u8 = 0x0F;

#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

struct IdtTable {
    entries: [IdtEntry; IDT_SIZE],
}

lazy_static! {
    static ref IDT: Mutex<IdtTable> = Mutex::new(IdtTable {
        entries: [IdtEntry::missing(); IDT_SIZE],
    });
}

/// Install a handler at `vector` with the given privilege level.
pub fn set_handler(vector: u8, handler: extern "C" fn() -> !, dpl: u8, gate_type: u8) {
    let mut idt = IDT.lock();
    idt.entries[vector as usize] = IdtEntry::new(handler as u32, dpl, gate_type);
}

pub fn set_interrupt_gate(vector: u8, handler: extern "C" fn() -> !) {
    set_handler(vector, handler, 0, GATE_INTERRUPT_32);
}

pub fn set_trap_gate(vector: u8, handler: extern "C" fn() -> !, dpl: u8) {
    set_handler(vector, handler, dpl, GATE_TRAP_32);
}

/// Load the table via `lidt`. Call once, after every handler has been
/// installed and after the GDT is live (the gates reference `KERNEL_CS`).
pub fn load() {
    let idt = IDT.lock();
    let pointer = IdtPointer {
        limit: (size_of::<[IdtEntry; IDT_SIZE]>() - 1) as u16,
        base: idt.entries.as_ptr() as u32,
    };
    // SAFETY: `pointer` addresses the table above, kept alive for
    // 'static via the lazy_static Mutex; lidt only reads it.
    unsafe {
        asm!("lidt [{0}]", in(reg) &pointer);
    }
}
