//! CPU exception vectors 0-19: the "blue screen" path.
//!
//! An exception that fires in user mode latches [`EXCEPTION_LATCHED`],
//! prints the exception name (and CR2 for a page fault) to the current
//! terminal, clears the screen, and invokes `halt(255)`. The latch makes
//! the parent's `execute` return extended status 256 (see
//! [`crate::process::halt`]).

use core::{arch::asm, sync::atomic::{AtomicBool, Ordering}};

use super::idt;

pub static EXCEPTION_LATCHED: AtomicBool = AtomicBool::new(false);

const EXCEPTION_NAMES: [&str; 20] = [
    "Divide Error Exception",
    "Debug Exception",
    "NMI Interrupt",
    "Breakpoint Exception",
    "Overflow Exception",
    "BOUND Range Exceeded Exception",
    "Invalid Opcode Exception",
    "Device Not Available Exception",
    "Double Fault Exception",
    "Coprocessor Segment Overrun",
    "Invalid TSS Exception",
    "Segment Not Present",
    "Stack Fault Exception",
    "General Protection Exception",
    "Page-Fault Exception",
    "Reserved",
    "x87 FPU Floating-Point Error",
    "Alignment Check Exception",
    "Machine-Check Exception",
    "SIMD Floating-Point Exception",
];

fn read_cr2() -> u32 {
    let value: u32;
    // SAFETY: reading CR2 has no side effects.
    unsafe {
        asm!("mov {0}, cr2", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Common handler body invoked by every `exception_N` stub below.
fn exception_handler(vector: u8) -> ! {
    crate::vga::clear_screen();
    let name = EXCEPTION_NAMES
        .get(vector as usize)
        .copied()
        .unwrap_or("Unknown Exception");
    log::error!("{name}");
    if vector == 14 {
        log::error!("faulting address: 0x{:08x}", read_cr2());
    }
    EXCEPTION_LATCHED.store(true, Ordering::SeqCst);
    crate::process::halt::halt(255)
}

macro_rules! exception_stub {
    ($name:ident, $vector:expr) => {
        extern "C" fn $name() -> ! {
            exception_handler($vector)
        }
    };
}

exception_stub!(exception_0, 0);
exception_stub!(exception_1, 1);
exception_stub!(exception_2, 2);
exception_stub!(exception_3, 3);
exception_stub!(exception_4, 4);
exception_stub!(exception_5, 5);
exception_stub!(exception_6, 6);
exception_stub!(exception_7, 7);
exception_stub!(exception_8, 8);
exception_stub!(exception_9, 9);
exception_stub!(exception_10, 10);
exception_stub!(exception_11, 11);
exception_stub!(exception_12, 12);
exception_stub!(exception_13, 13);
exception_stub!(exception_14, 14);
exception_stub!(exception_15, 15);
exception_stub!(exception_16, 16);
exception_stub!(exception_17, 17);
exception_stub!(exception_18, 18);
exception_stub!(exception_19, 19);

pub fn install() {
    idt::set_interrupt_gate(0, exception_0);
    idt::set_interrupt_gate(1, exception_1);
    idt::set_interrupt_gate(2, exception_2);
    idt::set_interrupt_gate(3, exception_3);
    idt::set_interrupt_gate(4, exception_4);
    idt::set_interrupt_gate(5, exception_5);
    idt::set_interrupt_gate(6, exception_6);
    idt::set_interrupt_gate(7, exception_7);
    idt::set_interrupt_gate(8, exception_8);
    idt::set_interrupt_gate(9, exception_9);
    idt::set_interrupt_gate(10, exception_10);
    idt::set_interrupt_gate(11, exception_11);
    idt::set_interrupt_gate(12, exception_12);
    idt::set_interrupt_gate(13, exception_13);
    idt::set_interrupt_gate(14, exception_14);
    idt::set_interrupt_gate(15, exception_15);
    idt::set_interrupt_gate(16, exception_16);
    idt::set_interrupt_gate(17, exception_17);
    idt::set_interrupt_gate(18, exception_18);
    idt::set_interrupt_gate(19, exception_19);
}
