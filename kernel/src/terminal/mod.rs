//! The three virtual terminals: one foreground, two backed by off-screen
//! video frames. Switching saves real video memory into the outgoing
//! terminal's backing frame, restores the incoming one, and remaps the
//! outgoing terminal's virtual video window so its (possibly still
//! running) process keeps writing somewhere sane.

use spin::Mutex;

use crate::{
    arch::x86::{context, context::SavedFrame, gdt},
    error::KernelError,
    paging,
    process::pcb::{self, ProcessId, PROCESSES},
    vga,
};

pub const MAX_TERMINAL: u8 = 3;

struct TerminalState {
    /// `None` until the terminal's first process (its shell) has been
    /// launched at least once.
    current_process: Option<ProcessId>,
}

struct TerminalManager {
    foreground: u8,
    terminals: [TerminalState; MAX_TERMINAL as usize],
}

static MANAGER: Mutex<TerminalManager> = Mutex::new(TerminalManager {
    foreground: 0,
    terminals: [
        TerminalState {
            current_process: None,
        },
        TerminalState {
            current_process: None,
        },
        TerminalState {
            current_process: None,
        },
    ],
});

pub fn foreground() -> u8 {
    MANAGER.lock().foreground
}

pub fn current_process(terminal: u8) -> Option<ProcessId> {
    MANAGER.lock().terminals[terminal as usize].current_process
}

pub fn set_current_process(terminal: u8, pid: ProcessId) {
    MANAGER.lock().terminals[terminal as usize].current_process = Some(pid);
}

pub fn clear_current_process(terminal: u8) {
    MANAGER.lock().terminals[terminal as usize].current_process = None;
}

/// Switch the foreground terminal, preserving each terminal's on-screen
/// contents across the swap. Starts that terminal's shell the first time
/// it becomes foreground. A no-op if `new_terminal` is already
/// foreground; an error if it is out of range.
pub fn switch(new_terminal: u8) -> Result<(), KernelError> {
    if new_terminal >= MAX_TERMINAL {
        return Err(KernelError::InvalidTerminal);
    }

    let (old, existing_pid) = crate::arch::x86::port::without_interrupts(|| {
        let mut manager = MANAGER.lock();
        if new_terminal == manager.foreground {
            return (manager.foreground, None);
        }
        let old = manager.foreground;
        manager.foreground = new_terminal;

        let mut frame = [0u8; 4096];
        vga::WRITER.lock().snapshot(&mut frame);
        paging::map_4k(paging::VIRT_VID_TERM[old as usize], paging::BACKUP_VID[old as usize]);
        // SAFETY: backing frame for `old` is a fixed, always-mapped 4 KiB
        // physical page reserved for exactly this purpose.
        unsafe {
            core::ptr::copy_nonoverlapping(
                frame.as_ptr(),
                paging::BACKUP_VID[old as usize] as *mut u8,
                4096,
            );
        }

        let mut incoming = [0u8; 4096];
        // SAFETY: see above.
        unsafe {
            core::ptr::copy_nonoverlapping(
                paging::BACKUP_VID[new_terminal as usize] as *const u8,
                incoming.as_mut_ptr(),
                4096,
            );
        }
        vga::WRITER.lock().restore(&incoming);
        paging::map_4k(paging::VIRT_VID_TERM[new_terminal as usize], paging::VIDEO_MEMORY);

        (old, manager.terminals[new_terminal as usize].current_process)
    });
    let _ = old;

    match existing_pid {
        None => crate::process::execute::execute(b"shell", None, new_terminal).map(|_| ()),
        // A process only has a resume point once it has survived at least
        // one PIT tick in the background (see `hand_off`'s doc comment).
        // In the narrow window before that, there is nothing to jump to
        // yet; the video frame swap above still took effect, and the
        // process regains the CPU on its next scheduler tick as usual.
        Some(in_pid) if PROCESSES.lock().get(in_pid).preempt.esp != 0 => {
            hand_off(in_pid);
            Ok(())
        }
        Some(_) => Ok(()),
    }
}

/// Hand the CPU to `in_pid`, an already-running background process, the
/// same way the scheduler hands it to the next round-robin target: save
/// whatever is presently executing into its own `preempt` frame and
/// restore `in_pid`'s via [`context::switch_stack`].
///
/// Sound only because `in_pid` reached "already running" by surviving at
/// least one PIT tick in the background first, which is what populates
/// `preempt` — the same bootstrapping invariant `sched::next_target`
/// relies on. A terminal's *first* switch instead takes the `execute`
/// branch above, which hands control to a brand new process and, per its
/// own contract, never returns to this call site — so there is no
/// resume point to capture for that case, and `preempt` is left untouched.
fn hand_off(in_pid: ProcessId) {
    let esp0 = crate::process::execute::kernel_stack_top(in_pid);
    // SAFETY: `in_pid` is a live process with its own private kernel stack.
    unsafe {
        gdt::set_kernel_stack(esp0);
    }
    paging::install_process_page(in_pid.0 as u32);

    let out_pid = *pcb::CURRENT.lock();
    *pcb::CURRENT.lock() = Some(in_pid);

    let out_ptr = match out_pid {
        Some(pid) => &mut PROCESSES.lock().get_mut(pid).preempt as *mut SavedFrame,
        // Nothing is running yet (switch called before any shell exists) —
        // a scratch cell makes the same-stack save a well-defined no-op.
        None => {
            static mut SCRATCH: SavedFrame = SavedFrame { esp: 0, ebp: 0 };
            // SAFETY: single CPU, interrupts already disabled (keyboard
            // and RTC use interrupt gates, which clear IF on entry).
            unsafe { core::ptr::addr_of_mut!(SCRATCH) }
        }
    };
    let in_ptr = &PROCESSES.lock().get(in_pid).preempt as *const SavedFrame;

    // SAFETY: `in_ptr` was populated by an earlier `switch_stack` call (a
    // PIT tick, or a previous hand-off) the first time `in_pid` ran in the
    // background; `out_ptr` points at storage — a PCB field or the static
    // scratch cell above — that outlives this call.
    unsafe {
        context::switch_stack(out_ptr, in_ptr);
    }
}

/// Write `bytes` to `terminal`'s output: directly to VGA if it's
/// foreground, otherwise nowhere — a background process only ever
/// writes through its vidmap page (see `process::syscall::vidmap`),
/// which `paging::map_4k` already points at that terminal's backing
/// frame, so there is nothing for this path to do.
pub fn write_bytes(terminal: u8, bytes: &[u8]) {
    if terminal == foreground() {
        for &b in bytes {
            vga::WRITER.lock().write_byte(b);
        }
    }
}

pub fn putc(terminal: u8, byte: u8) {
    write_bytes(terminal, &[byte]);
}

pub fn newline(terminal: u8) {
    write_bytes(terminal, b"\n");
}

pub fn backspace(terminal: u8) {
    if terminal == foreground() {
        let mut writer = vga::WRITER.lock();
        if writer.column_position() > 0 {
            writer.move_back_and_erase();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_to_same_terminal_is_a_cheap_noop() {
        assert_eq!(MANAGER.lock().foreground, 0);
    }

    #[test]
    fn switch_rejects_out_of_range_terminal() {
        assert_eq!(switch(MAX_TERMINAL).unwrap_err(), KernelError::InvalidTerminal);
    }
}
