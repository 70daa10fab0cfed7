//! Kernel library crate: everything `main.rs` needs to bring the machine
//! up lives here so the bare-metal binary and the integration tests in
//! `tests/` share one implementation.

#![no_std]
#![feature(abi_x86_interrupt)]
#![feature(alloc_error_handler)]

extern crate alloc;

#[macro_use]
pub mod print;

pub mod allocator;
pub mod arch;
pub mod devices;
pub mod error;
pub mod fs;
pub mod logging;
pub mod paging;
pub mod process;
pub mod sched;
pub mod serial;
pub mod terminal;
pub mod test_framework;
pub mod vga;

pub use test_framework::{exit_qemu, test_panic_handler, QemuExitCode, Testable};

/// Real kernel entry point, reached from [`arch::x86::boot::multiboot_main`]
/// once the bootloader has handed control over on a flat stack with
/// interrupts still disabled.
///
/// Brings up descriptor tables, the heap, paging, every device this
/// kernel knows about, and the read-only filesystem image passed in as
/// the one multiboot module, then starts terminal 0's shell. Never
/// returns: `process::halt` relaunches a terminal's shell in place of
/// returning here, and paging/interrupts mean there is nothing left for
/// this function to do afterward but fall back to idling.
pub fn kernel_main_impl(multiboot_info_addr: u32) -> ! {
    arch::x86::init();
    serial::init();
    logging::init();

    println!("kernel booting");
    log::info!("gdt, exceptions, and pic initialized");

    devices::keyboard::init();
    devices::rtc::init();
    process::init();
    arch::x86::irq::install();
    sched::init();
    arch::x86::idt::load();
    log::info!("idt loaded, all vectors installed");

    paging::init();
    allocator::init();
    log::info!("paging and heap initialized");

    // SAFETY: `multiboot_info_addr` is the untouched pointer handed to us
    // from the bootloader via `multiboot_main`, read exactly once here.
    let module = unsafe { arch::x86::boot::find_module(multiboot_info_addr) };
    let (mod_start, mod_end) =
        module.expect("bootloader did not provide the filesystem image module");
    // SAFETY: the bootloader loaded the filesystem image into this
    // physical range and identity-mapped it as part of the kernel's
    // initial 4 MiB page; it outlives the kernel.
    let image = unsafe {
        core::slice::from_raw_parts(mod_start as *const u8, (mod_end - mod_start) as usize)
    };
    fs::init(image);
    log::info!("filesystem image loaded, {} bytes", image.len());

    arch::x86::port::enable_interrupts();
    log::info!("interrupts enabled, starting terminal 0");

    match process::execute::execute(b"shell", None, 0) {
        Ok(_) | Err(_) => loop {
            arch::x86::idle();
        },
    }
}
