//! `execute`: parse a command line, load an executable image, and drop
//! into user mode until it halts.
//!
//! Each process slot owns a fixed-size kernel stack (`KERNEL_STACKS`)
//! rather than the source kernel's raw carve-out of addresses below
//! `K_STACK_BOTTOM` — an ordinary static array gives the same "one
//! private 8 KiB kernel stack per process slot" property without
//! hand-placing the PCB at a computed address inside it.

extern crate alloc;

use core::mem::MaybeUninit;

use alloc::boxed::Box;

use crate::{
    arch::x86::{context, gdt},
    error::KernelError,
    fs, paging,
    process::pcb::{self, ProcessId, PROCESSES},
    terminal,
};

const MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const HEADER_BYTES: usize = 28;
const ENTRY_POINT_OFFSET: usize = 24;
const FILE_NAME_LEN: usize = 32;

const KERNEL_STACK_SIZE: usize = 8 * 1024;

#[repr(align(16))]
struct Stack([MaybeUninit<u8>; KERNEL_STACK_SIZE]);

static mut KERNEL_STACKS: [Stack; pcb::MAX_PROCESSES] = [
    Stack([MaybeUninit::uninit(); KERNEL_STACK_SIZE]),
    Stack([MaybeUninit::uninit(); KERNEL_STACK_SIZE]),
    Stack([MaybeUninit::uninit(); KERNEL_STACK_SIZE]),
    Stack([MaybeUninit::uninit(); KERNEL_STACK_SIZE]),
    Stack([MaybeUninit::uninit(); KERNEL_STACK_SIZE]),
    Stack([MaybeUninit::uninit(); KERNEL_STACK_SIZE]),
    Stack([MaybeUninit::uninit(); KERNEL_STACK_SIZE]),
    Stack([MaybeUninit::uninit(); KERNEL_STACK_SIZE]),
];

pub(crate) fn kernel_stack_top(pid: ProcessId) -> u32 {
    // SAFETY: each process slot has exclusive use of its own stack array
    // entry; no two processes run concurrently on one CPU.
    let stack = unsafe { &KERNEL_STACKS[pid.0 as usize] };
    stack.0.as_ptr() as u32 + KERNEL_STACK_SIZE as u32
}

/// Split `comm` into the command name and the argument string that
/// follows the first space, matching `parse_cmd_args`'s two-field
/// layout (`getargs` later hands the argument half back to user space).
fn parse_command(comm: &[u8]) -> (&[u8], &[u8]) {
    let end = comm
        .iter()
        .position(|&b| b == b' ' || b == 0 || b == b'\n')
        .unwrap_or(comm.len());
    let (name, rest) = comm.split_at(end);
    let args_start = rest.iter().position(|&b| b != b' ').unwrap_or(rest.len());
    let args_end = rest[args_start..]
        .iter()
        .position(|&b| b == 0 || b == b'\n')
        .map(|i| args_start + i)
        .unwrap_or(rest.len());
    (name, &rest[args_start..args_end])
}

/// Load and run `command`, returning only once the new process has
/// `halt`ed (or the command could not be started at all).
///
/// `parent` is the calling process, `None` for a terminal's first shell.
pub fn execute(command: &[u8], parent: Option<ProcessId>, terminal_id: u8) -> Result<i32, KernelError> {
    if command.is_empty() {
        return Err(KernelError::NullArgument);
    }

    let (file_name, args) = parse_command(command);
    if file_name.len() >= FILE_NAME_LEN {
        return Err(KernelError::ProgramNotFound);
    }

    let dentry = fs::lookup_by_name(file_name).ok_or(KernelError::ProgramNotFound)?;
    if dentry.file_type != fs::FileType::Regular {
        return Err(KernelError::NotExecutable);
    }

    let mut header = [0u8; HEADER_BYTES];
    fs::read_data(dentry.inode, 0, &mut header)?;
    if header[..4] != MAGIC {
        return Err(KernelError::NotExecutable);
    }
    let entry_point = u32::from_le_bytes([
        header[ENTRY_POINT_OFFSET],
        header[ENTRY_POINT_OFFSET + 1],
        header[ENTRY_POINT_OFFSET + 2],
        header[ENTRY_POINT_OFFSET + 3],
    ]);

    let pid = {
        let mut pool = PROCESSES.lock();
        let pcb = pool.allocate(parent, terminal_id, args)?;
        pcb.pid
    };

    paging::install_process_page(pid.0 as u32);

    let file_size = fs::file_size(dentry.inode)?;
    // SAFETY: `install_process_page` just mapped this process's 4 MiB
    // user page at `PROGRAM_LOAD_ADDR`; the image fits (the filesystem
    // format caps a file at 1023 * 4 KiB, well under 4 MiB).
    let image = unsafe {
        core::slice::from_raw_parts_mut(paging::PROGRAM_LOAD_ADDR as *mut u8, file_size)
    };
    let copied = fs::read_data(dentry.inode, 0, image)?;
    if copied != file_size {
        PROCESSES.lock().free(pid);
        return Err(KernelError::MalformedExecutable);
    }

    PROCESSES.lock().get_mut(pid).fds.install_std_streams(
        Box::new(crate::devices::Stdin { terminal: terminal_id }),
        Box::new(crate::devices::Stdout { terminal: terminal_id }),
    );

    terminal::set_current_process(terminal_id, pid);
    *pcb::CURRENT.lock() = Some(pid);

    let esp0 = kernel_stack_top(pid);
    // SAFETY: esp0 is the top of this process's private kernel stack,
    // unused by anyone else; interrupts are enabled but this process has
    // not yet started, so nothing else reads the TSS concurrently.
    unsafe {
        gdt::set_kernel_stack(esp0);
    }

    let user_esp = paging::PROCESS_VIRT_BASE + paging::PROCESS_SIZE - 4;

    let saved_ptr = {
        let mut pool = PROCESSES.lock();
        &mut pool.get_mut(pid).saved as *mut context::SavedFrame
    };

    // SAFETY: `entry_point` was read from the loaded image's own header
    // and falls inside the page just mapped; `user_esp` is the top of
    // that same page; `gdt::USER_CS`/`USER_DS` are live ring-3 selectors;
    // `saved_ptr` points at this PCB's `saved` field, which outlives the
    // call; `set_kernel_stack` was just called for this process's esp0.
    let status = unsafe {
        context::enter_usermode_and_suspend(
            entry_point,
            user_esp,
            gdt::USER_CS as u32,
            gdt::USER_DS as u32,
            saved_ptr,
        )
    };

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_splits_on_first_space() {
        let (name, args) = parse_command(b"shell");
        assert_eq!(name, b"shell");
        assert_eq!(args, b"");

        let (name, args) = parse_command(b"cat file.txt");
        assert_eq!(name, b"cat");
        assert_eq!(args, b"file.txt");

        let (name, args) = parse_command(b"grep   needle");
        assert_eq!(name, b"grep");
        assert_eq!(args, b"needle");
    }

    #[test]
    fn parse_command_handles_trailing_newline() {
        let (name, args) = parse_command(b"ls -l\n");
        assert_eq!(name, b"ls");
        assert_eq!(args, b"-l");
    }
}
