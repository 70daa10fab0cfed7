//! PIT-driven round-robin preemption across the three terminals.
//!
//! Each tick looks for the next terminal (after the one currently
//! running) with a live, previously-preempted process and switches the
//! CPU onto it via [`context::switch_stack`] — a plain coroutine swap of
//! `esp`/`ebp`, paired with updating the TSS `esp0` and the installed
//! process page so the switched-to process's own next ring3 -> ring0
//! transition and user-space memory accesses land correctly.
//!
//! A process that has never been preempted (its `preempt` frame is still
//! the zeroed default) is skipped: it has no valid resume point yet, and
//! by construction every process that ever becomes a switch target was
//! first an outgoing process on some earlier tick, which seeds it.
//!
//! If round robin reaches a terminal that has never launched a shell at
//! all, this is where that happens too — not just on an explicit
//! terminal switch.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::{
    arch::x86::{context, context::SavedFrame, gdt, idt, pic, port},
    paging,
    process::pcb::{ProcessId, CURRENT, PROCESSES},
    terminal,
};

/// Matches the source kernel's `TIME_SLICE`: 30 Hz preemption.
const TIME_SLICE_HZ: u32 = 30;
/// The PIT's fixed input clock, `original_source/sched.h`'s `MAX_PIT_FREQ`.
const MAX_PIT_FREQ: u32 = 1_193_182;

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;
/// Channel 0, access mode lobyte/hibyte, mode 3 (square wave), binary.
/// The source's `pit_init` writes the divisor straight to 0x40 without
/// this byte, which only works by luck of whatever mode the BIOS left
/// the PIT in; this port sets it explicitly.
const PIT_MODE_SQUARE_WAVE: u8 = 0x36;

/// Which terminal the scheduler last handed the CPU to, so the next tick
/// knows where to resume the round robin.
static SCHED_TERMINAL: AtomicU8 = AtomicU8::new(0);

/// Program PIT channel 0 for a 30 Hz tick and unmask IRQ0. Call during
/// boot, after the PIC is live and before `idt::load`.
pub fn init() {
    let divisor = (MAX_PIT_FREQ / TIME_SLICE_HZ) as u16;
    port::without_interrupts(|| {
        // SAFETY: programming the PIT's own command and channel-0 ports.
        unsafe {
            port::outb(PIT_COMMAND, PIT_MODE_SQUARE_WAVE);
            port::outb(PIT_CHANNEL0, (divisor & 0xFF) as u8);
            port::outb(PIT_CHANNEL0, (divisor >> 8) as u8);
        }
    });
    pic::unmask_irq(0);
    idt::set_interrupt_gate(idt::PIT_VECTOR, pit_entry);
}

/// Find the next terminal after `from` (wrapping through all three) whose
/// process is a valid switch target: running, and not the same process
/// already executing.
fn next_target(from: u8, current: Option<ProcessId>) -> Option<(u8, ProcessId)> {
    for step in 1..=terminal::MAX_TERMINAL {
        let candidate = (from + step) % terminal::MAX_TERMINAL;
        if let Some(pid) = terminal::current_process(candidate) {
            if Some(pid) != current {
                let pool = PROCESSES.lock();
                if pool.in_use(pid) {
                    let has_resume_point = pool.get(pid).preempt.esp != 0;
                    if has_resume_point {
                        return Some((candidate, pid));
                    }
                }
            }
        }
    }
    None
}

/// Find the first terminal after `from` (wrapping through all three) that
/// has never launched a shell.
fn next_unlaunched(from: u8) -> Option<u8> {
    for step in 1..=terminal::MAX_TERMINAL {
        let candidate = (from + step) % terminal::MAX_TERMINAL;
        if terminal::current_process(candidate).is_none() {
            return Some(candidate);
        }
    }
    None
}

/// Decide this tick's switch and perform every side effect except the
/// actual stack swap: save the outgoing process's resume point, update
/// the TSS/paging for the incoming one, and hand back the two
/// `SavedFrame` pointers for [`context::switch_stack`], packed as
/// `(in_ptr << 32) | out_ptr` in the edx:eax return pair.
///
/// Returns `out == in_` (a same-stack no-op switch) when there is
/// nothing else runnable.
extern "C" fn prepare_switch(outgoing_esp: u32, outgoing_ebp: u32) -> u64 {
    let current = *CURRENT.lock();

    if let Some(pid) = current {
        let mut pool = PROCESSES.lock();
        if pool.in_use(pid) {
            pool.get_mut(pid).preempt = SavedFrame {
                esp: outgoing_esp,
                ebp: outgoing_ebp,
            };
        }
    }

    let from_terminal = SCHED_TERMINAL.load(Ordering::SeqCst);
    let target = next_target(from_terminal, current);

    // Nothing already running is due for a turn — if round robin has
    // reached a terminal that has never launched a shell, seed it now
    // rather than leaving it dark forever. `execute` here behaves exactly
    // as it does from `terminal::switch`'s own first-launch path: it does
    // not return for as long as the shell (or whatever replaces it) keeps
    // running, and an error return (e.g. a missing "shell" binary) just
    // falls through to the ordinary same-stack no-op below.
    if target.is_none() {
        if let Some(empty_terminal) = next_unlaunched(from_terminal) {
            SCHED_TERMINAL.store(empty_terminal, Ordering::SeqCst);
            let _ = crate::process::execute::execute(b"shell", None, empty_terminal);
        }
    }

    let out_ptr = match current {
        Some(pid) => {
            let mut pool = PROCESSES.lock();
            &mut pool.get_mut(pid).preempt as *mut SavedFrame as u32
        }
        // No process is running yet (still in early boot) — fall back to
        // a scratch frame built from the raw registers handed in, so a
        // same-stack no-op switch is still well-defined.
        None => {
            static mut BOOT_SCRATCH: SavedFrame = SavedFrame { esp: 0, ebp: 0 };
            // SAFETY: single CPU, interrupts disabled for the duration of
            // this handler.
            unsafe {
                BOOT_SCRATCH = SavedFrame {
                    esp: outgoing_esp,
                    ebp: outgoing_ebp,
                };
                core::ptr::addr_of_mut!(BOOT_SCRATCH) as u32
            }
        }
    };

    let in_ptr = match target {
        Some((next_terminal, next_pid)) => {
            SCHED_TERMINAL.store(next_terminal, Ordering::SeqCst);
            *CURRENT.lock() = Some(next_pid);
            let esp0 = crate::process::execute::kernel_stack_top(next_pid);
            // SAFETY: `next_pid` is a live process with its own private
            // kernel stack and installed page.
            unsafe {
                gdt::set_kernel_stack(esp0);
            }
            paging::install_process_page(next_pid.0 as u32);
            let pool = PROCESSES.lock();
            &pool.get(next_pid).preempt as *const SavedFrame as u32
        }
        None => out_ptr,
    };

    ((in_ptr as u64) << 32) | out_ptr as u64
}

extern "C" fn send_eoi0() {
    pic::send_eoi(0);
}

/// IRQ0 handler: EOI, then hand off to the round robin. `pushad` has
/// already captured every general-purpose register on the interrupted
/// process's own kernel stack by the time `prepare_switch` runs, and
/// `switch_stack` may leave this stack for a different one entirely —
/// the `popad`/`iretd` that eventually run belong to whichever process's
/// stack the CPU is standing on by then.
#[unsafe(naked)]
extern "C" fn pit_entry() -> ! {
    core::arch::naked_asm!(
        "pushad",
        "call {eoi}",
        "mov eax, esp",
        "mov ecx, ebp",
        "push ecx",
        "push eax",
        "call {prepare}",
        "add esp, 8",
        // edx:eax = (in_ptr << 32) | out_ptr
        "push edx",
        "push eax",
        "call {switch}",
        "add esp, 8",
        "popad",
        "iretd",
        eoi = sym send_eoi0,
        prepare = sym prepare_switch,
        switch = sym context::switch_stack,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_matches_thirty_hertz() {
        let divisor = MAX_PIT_FREQ / TIME_SLICE_HZ;
        assert_eq!(divisor, 39772);
    }

    #[test]
    fn next_target_skips_never_preempted_processes() {
        // A terminal whose process has `preempt == {0,0}` (never
        // preempted) is not yet a valid switch target.
        assert_eq!(next_target(0, None), None);
    }

    #[test]
    fn next_unlaunched_finds_a_terminal_with_no_process_yet() {
        // No processes exist in this unit-test environment, so every
        // terminal after terminal 0 still counts as unlaunched.
        assert_eq!(next_unlaunched(0), Some(1));
    }
}
