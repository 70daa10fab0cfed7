//! The `int 0x80` gate: register-convention glue around the system call
//! dispatch table.
//!
//! Registers follow the source kernel's convention: `eax` is the call
//! number, `ebx`/`ecx`/`edx` are up to three arguments, and the return
//! value comes back in `eax`. `halt` is the one call that never returns
//! through this path — it jumps straight into the parent's suspended
//! `execute` via [`context::resume_halted`], bypassing the epilogue
//! below entirely.

extern crate alloc;

use core::arch::naked_asm;

use alloc::boxed::Box;

use crate::{
    devices::{Directory, RegularFile, RtcHandle},
    error::{self, KernelError},
    fs,
    process::{
        execute,
        halt,
        pcb::{self, ProcessId, PROCESSES},
    },
};

const SYS_HALT: u32 = 1;
const SYS_EXECUTE: u32 = 2;
const SYS_READ: u32 = 3;
const SYS_WRITE: u32 = 4;
const SYS_OPEN: u32 = 5;
const SYS_CLOSE: u32 = 6;
const SYS_GETARGS: u32 = 7;
const SYS_VIDMAP: u32 = 8;
const SYS_SET_HANDLER: u32 = 9;
const SYS_SIGRETURN: u32 = 10;

fn current_pid() -> Result<ProcessId, KernelError> {
    pcb::CURRENT.lock().ok_or(KernelError::ProcessSlotsExhausted)
}

/// Read a NUL/newline-terminated string out of the calling process's own
/// address space. `ptr` and up to `max_len` bytes following it must lie
/// inside that process's 4 MiB user window.
///
/// # Safety
///
/// `ptr` must be a user-space address the caller claims is valid; this
/// function only narrows the *range* checked, it cannot verify the bytes
/// back it with real memory beyond trusting the paging setup installed by
/// `execute`.
unsafe fn user_bytes<'a>(ptr: u32, max_len: usize) -> Result<&'a [u8], KernelError> {
    let base = crate::paging::PROCESS_VIRT_BASE;
    let limit = base + crate::paging::PROCESS_SIZE;
    if ptr < base || ptr >= limit {
        return Err(KernelError::NullArgument);
    }
    let available = (limit - ptr) as usize;
    let len = max_len.min(available);
    Ok(core::slice::from_raw_parts(ptr as *const u8, len))
}

unsafe fn user_bytes_mut<'a>(ptr: u32, max_len: usize) -> Result<&'a mut [u8], KernelError> {
    let base = crate::paging::PROCESS_VIRT_BASE;
    let limit = base + crate::paging::PROCESS_SIZE;
    if ptr < base || ptr >= limit {
        return Err(KernelError::NullArgument);
    }
    let available = (limit - ptr) as usize;
    let len = max_len.min(available);
    Ok(core::slice::from_raw_parts_mut(ptr as *mut u8, len))
}

fn sys_execute(command_ptr: u32) -> Result<i32, KernelError> {
    // SAFETY: bounds-checked by `user_bytes` against the caller's window.
    let raw = unsafe { user_bytes(command_ptr, pcb::ARGS_BUF_LEN)? };
    let len = raw.iter().position(|&b| b == 0 || b == b'\n').unwrap_or(raw.len());
    let parent = current_pid()?;
    let terminal = PROCESSES.lock().get(parent).terminal;
    execute::execute(&raw[..len], Some(parent), terminal)
}

fn sys_read(fd: i32, buf_ptr: u32, nbytes: u32) -> Result<i32, KernelError> {
    // SAFETY: see `user_bytes_mut`.
    let buf = unsafe { user_bytes_mut(buf_ptr, nbytes as usize)? };
    let pid = current_pid()?;
    let n = PROCESSES.lock().get_mut(pid).fds.read(fd, buf)?;
    Ok(n as i32)
}

fn sys_write(fd: i32, buf_ptr: u32, nbytes: u32) -> Result<i32, KernelError> {
    // SAFETY: see `user_bytes`.
    let buf = unsafe { user_bytes(buf_ptr, nbytes as usize)? };
    let pid = current_pid()?;
    let n = PROCESSES.lock().get_mut(pid).fds.write(fd, buf)?;
    Ok(n as i32)
}

fn sys_open(name_ptr: u32) -> Result<i32, KernelError> {
    // SAFETY: see `user_bytes`.
    let raw = unsafe { user_bytes(name_ptr, fs::MAX_NAME_CHARS)? };
    // `lookup_by_name` trims at the first space or NUL itself; no need to
    // pre-truncate here too.
    let dentry = fs::lookup_by_name(raw).ok_or(KernelError::ProgramNotFound)?;
    let pid = current_pid()?;
    let mut pool = PROCESSES.lock();
    let fds = &mut pool.get_mut(pid).fds;
    match dentry.file_type {
        fs::FileType::Rtc => fds.open(Box::new(RtcHandle {
            target_count: crate::devices::rtc::ticks(),
        })),
        fs::FileType::Directory => fds.open(Box::new(Directory { next_index: 0 })),
        fs::FileType::Regular => fds.open(Box::new(RegularFile {
            inode: dentry.inode,
            position: 0,
        })),
    }
}

fn sys_close(fd: i32) -> Result<i32, KernelError> {
    let pid = current_pid()?;
    PROCESSES.lock().get_mut(pid).fds.close(fd)?;
    Ok(0)
}

fn sys_getargs(buf_ptr: u32, nbytes: u32) -> Result<i32, KernelError> {
    // SAFETY: see `user_bytes_mut`.
    let buf = unsafe { user_bytes_mut(buf_ptr, nbytes as usize)? };
    let pid = current_pid()?;
    let pool = PROCESSES.lock();
    let command = pool.get(pid).command();
    if command.len() + 1 > buf.len() {
        return Err(KernelError::InvalidDescriptor);
    }
    buf[..command.len()].copy_from_slice(command);
    buf[command.len()] = 0;
    Ok(0)
}

/// Hand the calling process the virtual address its terminal's video
/// window lives at: `paging::VIRT_VID_TERM[terminal]`, already kept
/// pointed at real video memory or this terminal's backing frame by
/// `terminal::switch`.
fn sys_vidmap(screen_start_ptr: u32) -> Result<i32, KernelError> {
    // SAFETY: see `user_bytes_mut`; a single u32 destination.
    let out = unsafe { user_bytes_mut(screen_start_ptr, 4)? };
    let pid = current_pid()?;
    let terminal = PROCESSES.lock().get(pid).terminal;
    let addr = crate::paging::VIRT_VID_TERM[terminal as usize];
    out[..4].copy_from_slice(&addr.to_le_bytes());
    Ok(0)
}

/// ABI entry point called by [`syscall_entry`]'s trampoline. `halt`
/// diverges; every other call returns normally.
extern "C" fn dispatch(num: u32, a: u32, b: u32, c: u32) -> i32 {
    match num {
        SYS_HALT => halt::halt(a as i32),
        SYS_EXECUTE => error::to_syscall_return(sys_execute(a)),
        SYS_READ => error::to_syscall_return(sys_read(a as i32, b, c)),
        SYS_WRITE => error::to_syscall_return(sys_write(a as i32, b, c)),
        SYS_OPEN => error::to_syscall_return(sys_open(a)),
        SYS_CLOSE => error::to_syscall_return(sys_close(a as i32)),
        SYS_GETARGS => error::to_syscall_return(sys_getargs(a, b)),
        SYS_VIDMAP => error::to_syscall_return(sys_vidmap(a)),
        SYS_SET_HANDLER | SYS_SIGRETURN => error::to_syscall_return(Err(KernelError::Unsupported)),
        _ => error::to_syscall_return(Err(KernelError::Unsupported)),
    }
}

/// The `int 0x80` handler: saves every general-purpose register with
/// `pushad`, reads the call number/arguments off them, dispatches, and
/// writes the result back into the saved `eax` slot before `popad`.
#[unsafe(naked)]
pub extern "C" fn syscall_entry() -> ! {
    naked_asm!(
        "pushad",
        "mov eax, [esp+28]", // saved eax: call number
        "mov ebx, [esp+16]", // saved ebx: arg0
        "mov ecx, [esp+24]", // saved ecx: arg1
        "mov edx, [esp+20]", // saved edx: arg2
        "push edx",
        "push ecx",
        "push ebx",
        "push eax",
        "call {dispatch}",
        "add esp, 16",
        "mov [esp+28], eax",
        "popad",
        "iretd",
        dispatch = sym dispatch,
    )
}

/// Install the vector 0x80 trap gate, DPL 3 so `int 0x80` is callable
/// from ring 3.
pub fn init() {
    crate::arch::x86::idt::set_trap_gate(crate::arch::x86::idt::SYSCALL_VECTOR, syscall_entry, 3);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_calls_collapse_to_minus_one() {
        assert_eq!(dispatch(SYS_SET_HANDLER, 0, 0, 0), -1);
        assert_eq!(dispatch(SYS_SIGRETURN, 0, 0, 0), -1);
        assert_eq!(dispatch(99, 0, 0, 0), -1);
    }
}
