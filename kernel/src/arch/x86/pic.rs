//! 8259 PIC cascade: remap, mask/unmask, end-of-interrupt.

use pic8259::ChainedPics;
use spin::Mutex;

/// IRQs are remapped so that IRQ0 lands on interrupt vector 0x20, clear of
/// the CPU exception vectors 0-31.
pub const PIC_1_OFFSET: u8 = 0x20;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

/// Remap and unmask both PICs. Must run once, early in boot, before `sti`.
pub fn init() {
    // SAFETY: called once during boot before interrupts are enabled; no
    // other code touches the PIC command/data ports concurrently.
    unsafe {
        PICS.lock().initialize();
    }
}

/// Send end-of-interrupt for the given IRQ line (not the raw vector number).
pub fn send_eoi(irq: u8) {
    unsafe {
        PICS.lock().notify_end_of_interrupt(PIC_1_OFFSET + irq);
    }
}

const MASTER_DATA: u16 = 0x21;
const SLAVE_DATA: u16 = 0xA1;

/// Clear IRQ `irq`'s mask bit so it reaches the CPU. `pic8259::ChainedPics`
/// has no per-line mask API, so this talks to the data ports directly.
pub fn unmask_irq(irq: u8) {
    use super::port::{inb, outb};
    let (port, bit) = if irq < 8 {
        (MASTER_DATA, irq)
    } else {
        (SLAVE_DATA, irq - 8)
    };
    // SAFETY: reads then writes the PIC's own mask register; PICS' lock is
    // not needed since this touches the data port, not the command port
    // `initialize()`/`notify_end_of_interrupt` use.
    unsafe {
        let mask = inb(port);
        outb(port, mask & !(1 << bit));
    }
}
