//! 32-bit x86 protected-mode support: descriptor tables, the ring3 entry
//! shim, exception handling, the PIC, and raw port I/O. Everything the
//! rest of the kernel needs from the CPU lives here.

pub mod boot;
pub mod context;
pub mod exceptions;
pub mod gdt;
pub mod idt;
pub mod irq;
pub mod pic;
pub mod port;
pub mod tss;

/// Bring up segmentation, the CPU exception vectors, and the PIC. Call
/// once at boot, before paging or any device driver.
///
/// Deliberately does not call [`idt::load`]: device drivers and the
/// syscall gate still need to install their own vectors first. The boot
/// sequence in `main` loads the table once every vector is in place.
pub fn init() {
    gdt::init();
    exceptions::install();
    pic::init();
}

/// Halt the CPU until the next interrupt. Used by the idle loop once
/// boot is complete — every real unit of work happens inside an
/// interrupt or a process's own `execute`/`halt` call chain.
pub fn idle() {
    // SAFETY: `hlt` with interrupts enabled just parks the CPU.
    unsafe {
        core::arch::asm!("hlt", options(nomem, nostack));
    }
}
