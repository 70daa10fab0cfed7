//! Kernel-internal error type.
//!
//! Everything below the system-call dispatch boundary returns
//! `Result<T, KernelError>`. The dispatcher in
//! [`crate::process::syscall`] is the single place that collapses this
//! down to the `-1` the ABI allows.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// A required pointer argument was null or a buffer argument had
    /// invalid length.
    NullArgument,
    /// A file descriptor index was out of range or referred to a closed
    /// slot.
    InvalidDescriptor,
    /// A process's fd table has no free slot for `open`.
    DescriptorsExhausted,
    /// All 8 process slots are in use; `execute` cannot start another.
    ProcessSlotsExhausted,
    /// `execute`'s filename did not resolve to a directory entry.
    ProgramNotFound,
    /// The dentry named by `execute` exists but is not a regular file.
    NotExecutable,
    /// The dentry exists and is a file but fails the executable magic
    /// check or is too large to load into the process image.
    MalformedExecutable,
    /// A terminal index outside 0..3 was requested.
    InvalidTerminal,
    /// The device underlying a descriptor cannot service this operation
    /// right now (e.g. `write` on a directory, `read` on stdout).
    DeviceBusy,
    /// The operation is recognized but deliberately not implemented
    /// (`set_handler`, `sigreturn`).
    Unsupported,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::NullArgument => "null or invalid-length argument",
            KernelError::InvalidDescriptor => "invalid file descriptor",
            KernelError::DescriptorsExhausted => "no free file descriptor",
            KernelError::ProcessSlotsExhausted => "no free process slot",
            KernelError::ProgramNotFound => "program not found",
            KernelError::NotExecutable => "not an executable file",
            KernelError::MalformedExecutable => "malformed executable image",
            KernelError::InvalidTerminal => "invalid terminal index",
            KernelError::DeviceBusy => "operation not supported on this descriptor",
            KernelError::Unsupported => "system call not implemented",
        };
        f.write_str(msg)
    }
}

/// Collapse a kernel `Result` to the syscall ABI's `i32` return
/// convention: non-negative success value, or `-1` on any error.
pub fn to_syscall_return(result: Result<i32, KernelError>) -> i32 {
    result.unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_passes_through() {
        assert_eq!(to_syscall_return(Ok(7)), 7);
    }

    #[test]
    fn err_collapses_to_negative_one() {
        assert_eq!(to_syscall_return(Err(KernelError::InvalidDescriptor)), -1);
    }
}
