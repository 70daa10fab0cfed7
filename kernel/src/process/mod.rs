//! Process control: a fixed 8-slot PCB pool, per-process file descriptor
//! tables, and the three pieces that create, run, and tear processes
//! down (`execute`, `halt`, and the `int 0x80` dispatch table).

pub mod execute;
pub mod fd_table;
pub mod halt;
pub mod pcb;
pub mod syscall;

pub use pcb::ProcessId;

/// Wire up the `int 0x80` gate. Call during boot after the IDT exists and
/// before `arch::x86::idt::load`.
pub fn init() {
    syscall::init();
}
