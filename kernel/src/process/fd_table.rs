//! Per-process file descriptor table.
//!
//! Slots 0 and 1 are reserved for stdin/stdout the way the source
//! kernel's `open_fd`/`close_fd` treat fd 0/1 specially; slots 2-7 are
//! available to `open`.

use crate::{devices::DeviceOps, error::KernelError};

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "alloc")]
use alloc::boxed::Box;

pub const NUM_FDS: usize = 8;

struct Slot {
    device: Option<Box<dyn DeviceOps>>,
}

impl Slot {
    const fn empty() -> Self {
        Slot { device: None }
    }
}

pub struct FdTable {
    slots: [Slot; NUM_FDS],
}

impl FdTable {
    pub const fn new() -> Self {
        FdTable {
            slots: [
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
            ],
        }
    }

    /// Install `device` in slot 0 (stdin) and slot 1 (stdout), called once
    /// by `execute` right after a process is allocated.
    pub fn install_std_streams(&mut self, stdin: Box<dyn DeviceOps>, stdout: Box<dyn DeviceOps>) {
        self.slots[0].device = Some(stdin);
        self.slots[1].device = Some(stdout);
    }

    /// Find the lowest free slot at or above 2 and install `device` there.
    pub fn open(&mut self, device: Box<dyn DeviceOps>) -> Result<i32, KernelError> {
        let index = self.slots[2..]
            .iter()
            .position(|s| s.device.is_none())
            .map(|i| i + 2)
            .ok_or(KernelError::DescriptorsExhausted)?;
        self.slots[index].device = Some(device);
        Ok(index as i32)
    }

    fn slot(&mut self, fd: i32) -> Result<&mut Slot, KernelError> {
        if !(0..NUM_FDS as i32).contains(&fd) {
            return Err(KernelError::InvalidDescriptor);
        }
        let slot = &mut self.slots[fd as usize];
        if slot.device.is_none() {
            return Err(KernelError::InvalidDescriptor);
        }
        Ok(slot)
    }

    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> Result<usize, KernelError> {
        self.slot(fd)?.device.as_mut().unwrap().read(buf)
    }

    pub fn write(&mut self, fd: i32, buf: &[u8]) -> Result<usize, KernelError> {
        self.slot(fd)?.device.as_mut().unwrap().write(buf)
    }

    /// Close `fd`. Stdin/stdout (0, 1) can never be closed, matching the
    /// source kernel's `close` rejecting those indices outright.
    pub fn close(&mut self, fd: i32) -> Result<(), KernelError> {
        if fd == 0 || fd == 1 {
            return Err(KernelError::InvalidDescriptor);
        }
        let slot = self.slot(fd)?;
        slot.device.as_mut().unwrap().close()?;
        slot.device = None;
        Ok(())
    }

    /// Close every open descriptor, called by `halt` during teardown.
    pub fn close_all(&mut self) {
        for index in 2..NUM_FDS {
            if self.slots[index].device.is_some() {
                let _ = self.close(index as i32);
            }
        }
        self.slots[0].device = None;
        self.slots[1].device = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u8);

    impl DeviceOps for Counter {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, KernelError> {
            buf[0] = self.0;
            Ok(1)
        }
        fn write(&mut self, _buf: &[u8]) -> Result<usize, KernelError> {
            Ok(0)
        }
    }

    #[test]
    fn open_picks_lowest_free_slot_above_stdio() {
        let mut table = FdTable::new();
        table.install_std_streams(Box::new(Counter(0)), Box::new(Counter(0)));
        let a = table.open(Box::new(Counter(1))).unwrap();
        let b = table.open(Box::new(Counter(2))).unwrap();
        assert_eq!(a, 2);
        assert_eq!(b, 3);
        table.close(a).unwrap();
        let c = table.open(Box::new(Counter(3))).unwrap();
        assert_eq!(c, 2);
    }

    #[test]
    fn stdio_cannot_be_closed() {
        let mut table = FdTable::new();
        table.install_std_streams(Box::new(Counter(0)), Box::new(Counter(0)));
        assert_eq!(table.close(0).unwrap_err(), KernelError::InvalidDescriptor);
        assert_eq!(table.close(1).unwrap_err(), KernelError::InvalidDescriptor);
    }

    #[test]
    fn exhausted_table_errors() {
        let mut table = FdTable::new();
        table.install_std_streams(Box::new(Counter(0)), Box::new(Counter(0)));
        for _ in 0..(NUM_FDS - 2) {
            table.open(Box::new(Counter(0))).unwrap();
        }
        assert_eq!(
            table.open(Box::new(Counter(0))).unwrap_err(),
            KernelError::DescriptorsExhausted
        );
    }

    #[test]
    fn read_from_closed_slot_errors() {
        let mut table = FdTable::new();
        table.install_std_streams(Box::new(Counter(0)), Box::new(Counter(0)));
        let mut buf = [0u8; 4];
        assert_eq!(
            table.read(2, &mut buf).unwrap_err(),
            KernelError::InvalidDescriptor
        );
    }
}
