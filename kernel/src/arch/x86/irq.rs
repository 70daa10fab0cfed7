//! Naked entry stubs for the two device IRQs that don't need a context
//! switch: keyboard (IRQ1) and RTC (IRQ8). Each just saves registers,
//! calls the driver's safe interrupt body, sends EOI, and `iretd`s back.
//!
//! The timer (IRQ0) is different — it drives the scheduler's preemption
//! tick and lives in [`crate::sched`] instead, since its stub may switch
//! to a completely different kernel stack before returning.

use core::arch::naked_asm;

use super::{idt, pic};

extern "C" fn keyboard_body() {
    // EOI first: `on_interrupt` can recurse into `execute` for a
    // lazily-spawned shell (`terminal::switch`'s first launch of a
    // terminal), which does not return until that process halts — i.e.
    // effectively never for a shell. Sending EOI after the call would
    // leave IRQ1 masked at the PIC forever on that path.
    pic::send_eoi(1);
    crate::devices::keyboard::on_interrupt();
}

extern "C" fn rtc_body() {
    pic::send_eoi(8);
    crate::devices::rtc::on_interrupt();
}

#[unsafe(naked)]
extern "C" fn keyboard_entry() -> ! {
    naked_asm!(
        "pushad",
        "call {body}",
        "popad",
        "iretd",
        body = sym keyboard_body,
    )
}

#[unsafe(naked)]
extern "C" fn rtc_entry() -> ! {
    naked_asm!(
        "pushad",
        "call {body}",
        "popad",
        "iretd",
        body = sym rtc_body,
    )
}

/// Install the keyboard and RTC interrupt gates. Call during boot before
/// `idt::load`.
pub fn install() {
    idt::set_interrupt_gate(idt::KEYBOARD_VECTOR, keyboard_entry);
    idt::set_interrupt_gate(idt::RTC_VECTOR, rtc_entry);
}
