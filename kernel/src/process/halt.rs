//! `halt`: tear down the calling process and resume whichever `execute`
//! call started it.
//!
//! One of the three terminal shells halting is special-cased: rather
//! than returning to a parent (it has none), a fresh shell is launched
//! in its place so a terminal never runs dry.

use core::sync::atomic::Ordering;

use crate::{
    arch::x86::{context, exceptions::EXCEPTION_LATCHED, gdt},
    process::pcb::{self, PROCESSES},
    terminal,
};

/// Status bit OR'd into the low byte when the process is being torn down
/// because of an unhandled exception rather than a normal `halt` syscall,
/// matching the source kernel's 256 ("exception") vs. 0-255 ("status")
/// split in `execute`'s return value.
const EXCEPTION_STATUS_BIT: i32 = 1 << 8;

/// Terminate the calling process with `status` and resume its parent's
/// suspended `execute` call. Never returns.
pub fn halt(status: i32) -> ! {
    let pid = pcb::CURRENT
        .lock()
        .expect("halt called with no running process");

    {
        let mut pool = PROCESSES.lock();
        let pcb = pool.get_mut(pid);
        pcb.fds.close_all();
    }

    let terminal_id = PROCESSES.lock().get(pid).terminal;
    let parent = PROCESSES.lock().get(pid).parent;

    if parent.is_none() {
        // One of the three always-present shells exited; relaunch it
        // rather than returning anywhere.
        PROCESSES.lock().free(pid);
        terminal::clear_current_process(terminal_id);
        match crate::process::execute::execute(b"shell", None, terminal_id) {
            Ok(_) | Err(_) => loop {
                core::hint::spin_loop();
            },
        }
    }
    let parent = parent.unwrap();

    let extended_status = (status & 0xFF) + if EXCEPTION_LATCHED.swap(false, Ordering::SeqCst) {
        EXCEPTION_STATUS_BIT
    } else {
        0
    };

    let saved_ptr = {
        let mut pool = PROCESSES.lock();
        &mut pool.get_mut(parent).saved as *mut context::SavedFrame
    };

    PROCESSES.lock().free(pid);
    terminal::set_current_process(terminal_id, parent);
    *pcb::CURRENT.lock() = Some(parent);

    let parent_esp0 = crate::process::execute::kernel_stack_top(parent);
    // SAFETY: `parent_esp0` is the parent's own private kernel stack top,
    // valid for as long as the parent PCB slot stays allocated (it does,
    // we just set it as the running process above).
    unsafe {
        gdt::set_kernel_stack(parent_esp0);
    }
    crate::paging::install_process_page(parent.0 as u32);

    // SAFETY: `saved_ptr` is the exact `SavedFrame` written by the
    // `enter_usermode_and_suspend` call inside the parent's `execute`,
    // untouched since; that call's kernel stack frame is still intact
    // below it.
    unsafe {
        context::resume_halted(saved_ptr, extended_status);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn exception_status_bit_is_distinguishable_from_any_byte_status() {
        for status in 0..=255 {
            assert_eq!((status & 0xFF) + super::EXCEPTION_STATUS_BIT > 0xFF, true);
        }
    }
}
