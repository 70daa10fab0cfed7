//! Custom `#[test_case]` runner for the bare-metal target: tests report
//! through the serial port and the run exits QEMU via the debug-exit
//! device (port 0xf4) with a pass/fail code, since there is no process to
//! return an exit status to.

use core::panic::PanicInfo;

use crate::{arch::x86::port::outb, error::KernelError, serial_print, serial_println};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

pub trait Testable {
    fn run(&self) -> Result<(), KernelError>;
}

impl<T> Testable for T
where
    T: Fn() -> Result<(), KernelError>,
{
    fn run(&self) -> Result<(), KernelError> {
        serial_print!("{}...\t", core::any::type_name::<T>());
        match self() {
            Ok(()) => {
                serial_println!("[ok]");
                Ok(())
            }
            Err(e) => {
                serial_println!("[failed]: {}", e);
                Err(e)
            }
        }
    }
}

pub fn test_runner(tests: &[&dyn Testable]) -> ! {
    serial_println!("Running {} tests", tests.len());
    let mut passed = 0;
    let mut failed = 0;

    for test in tests {
        match test.run() {
            Ok(()) => passed += 1,
            Err(_) => failed += 1,
        }
    }

    serial_println!("\nTest results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        exit_qemu(QemuExitCode::Success);
    } else {
        exit_qemu(QemuExitCode::Failed);
    }
}

pub fn test_panic_handler(info: &PanicInfo) -> ! {
    serial_println!("[failed]\n");
    serial_println!("Error: {}\n", info);
    exit_qemu(QemuExitCode::Failed);
}

/// Write `exit_code` to QEMU's isa-debug-exit device and halt. Never
/// returns: QEMU terminates before any instruction after the port write
/// executes.
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    // SAFETY: port 0xf4 is the isa-debug-exit device configured in the
    // runner's QEMU invocation; writing to it is how a bare-metal test
    // binary reports its result and ends the run.
    unsafe {
        outb(0xf4, exit_code as u32 as u8);
    }
    loop {
        core::hint::spin_loop();
    }
}
