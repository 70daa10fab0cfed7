//! Device dispatch: the capability interface every open file descriptor
//! ultimately routes through.
//!
//! The source kernel gives each fd a `fd_ops_t` of four function
//! pointers (`open`/`close`/`read`/`write`); the natural Rust shape for
//! that is a trait object, so `FdTable` stores `Box<dyn DeviceOps>` and
//! dispatch is an ordinary virtual call instead of the source's explicit
//! jump table.

use crate::error::KernelError;

pub mod keyboard;
pub mod rtc;

/// Operations a file descriptor can be backed by. `read`/`write` return
/// the byte count on success, matching the syscall ABI directly.
pub trait DeviceOps: Send {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, KernelError>;
    fn write(&mut self, buf: &[u8]) -> Result<usize, KernelError>;
    /// Called when the owning descriptor is closed; most devices have
    /// nothing to do here.
    fn close(&mut self) -> Result<(), KernelError> {
        Ok(())
    }
}

/// Standard input: reads a line from this process's terminal.
pub struct Stdin {
    pub terminal: u8,
}

impl DeviceOps for Stdin {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, KernelError> {
        crate::devices::keyboard::read_line(self.terminal, buf)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize, KernelError> {
        Err(KernelError::DeviceBusy)
    }
}

/// Standard output: writes to this process's terminal.
pub struct Stdout {
    pub terminal: u8,
}

impl DeviceOps for Stdout {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, KernelError> {
        Err(KernelError::DeviceBusy)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, KernelError> {
        crate::terminal::write_bytes(self.terminal, buf);
        Ok(buf.len())
    }
}

/// A regular file opened from the read-only filesystem image.
pub struct RegularFile {
    pub inode: u32,
    pub position: usize,
}

impl DeviceOps for RegularFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, KernelError> {
        let n = crate::fs::read_data(self.inode, self.position, buf)?;
        self.position += n;
        Ok(n)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize, KernelError> {
        Err(KernelError::DeviceBusy)
    }
}

/// A directory opened from the filesystem image: each `read` returns one
/// more entry name, matching the source kernel's stateful directory
/// read rather than a single bulk listing.
pub struct Directory {
    pub next_index: u32,
}

impl DeviceOps for Directory {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, KernelError> {
        match crate::fs::entry_name(self.next_index) {
            Some(name) => {
                self.next_index += 1;
                let len = name.len().min(buf.len());
                buf[..len].copy_from_slice(&name.as_bytes()[..len]);
                Ok(len)
            }
            None => Ok(0),
        }
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize, KernelError> {
        Err(KernelError::DeviceBusy)
    }
}

/// The CMOS real-time clock, opened in one-shot "wait for next tick"
/// mode: each `read` blocks (by spin-waiting on the interrupt count)
/// until the next periodic interrupt at the frequency set by the last
/// `write`.
pub struct RtcHandle {
    pub target_count: u64,
}

impl DeviceOps for RtcHandle {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, KernelError> {
        crate::devices::rtc::wait_for_tick(&mut self.target_count);
        Ok(0)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, KernelError> {
        if buf.len() != 4 {
            return Err(KernelError::NullArgument);
        }
        let freq = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
        crate::devices::rtc::set_frequency(freq)?;
        Ok(4)
    }
}
