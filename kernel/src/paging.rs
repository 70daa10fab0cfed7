//! Two-level x86 paging with PSE: a 1024-entry page directory backing a
//! 4 MiB kernel page, a 4 KiB page table for the 0-4 MiB region (video
//! memory plus, eventually, one slot per process), and one more 4 MiB
//! page per running process at a fixed directory index.

use bitflags::bitflags;
use core::arch::asm;
use spin::Mutex;

pub const PAGE_SIZE: usize = 1024;
const DIR_IDX_SHIFT: u32 = 22;
const TABLE_IDX_SHIFT: u32 = 12;
const CLEAR_DIR_IDX: u32 = 0x003F_FFFF;

pub const VIDEO_MEMORY: u32 = 0xB8000;
pub const VIRT_VID_TERM: [u32; 3] = [0x1000_0000, 0x1000_1000, 0x1000_2000];
pub const BACKUP_VID: [u32; 3] = [0xB9000, 0xBA000, 0xBB000];

const KERNEL_MEM: u32 = 0x0040_0000;
pub const USER_SPACE: u32 = 0x0080_0000;
pub const PROCESS_SIZE: u32 = 0x0040_0000;
/// Every process's 4 MiB page lands at this single page-directory index;
/// only one process is ever mapped into user space at a time (the one
/// currently executing in user mode), matching the source kernel's
/// single-process-at-a-time address space model.
const PROCESS_IDX: usize = 32;

bitflags! {
    #[derive(Clone, Copy)]
    struct DirFlags: u32 {
        const PRESENT = 0x01;
        const RW = 0x02;
        const USER = 0x04;
        const PAGE_SIZE_4M = 0x80;
    }
}

const RW_ONLY: u32 = DirFlags::RW.bits();
const RW_PRESENT: u32 = DirFlags::RW.bits() | DirFlags::PRESENT.bits();
const RW_PRESENT_4M: u32 = RW_PRESENT | DirFlags::PAGE_SIZE_4M.bits();
const PROCESS_FLAGS: u32 =
    DirFlags::PRESENT.bits() | DirFlags::RW.bits() | DirFlags::USER.bits() | DirFlags::PAGE_SIZE_4M.bits();
const USER_4K_FLAGS: u32 = DirFlags::PRESENT.bits() | DirFlags::RW.bits() | DirFlags::USER.bits();

#[repr(C, align(4096))]
struct PageTable([u32; PAGE_SIZE]);

#[repr(C, align(4096))]
struct PageDirectory([u32; PAGE_SIZE]);

struct Tables {
    directory: PageDirectory,
    /// Page table backing directory entry 0 (0-4 MiB), holds the video
    /// memory mapping.
    low_table: PageTable,
    /// Page table shared by every `map_4k` call for the three terminal
    /// backing-frame/virtual-video mappings (all three live in the same
    /// 4 MiB region starting at 0x10000000, so one table covers them).
    user_table: PageTable,
}

static TABLES: Mutex<Tables> = Mutex::new(Tables {
    directory: PageDirectory([RW_ONLY; PAGE_SIZE]),
    low_table: PageTable([RW_ONLY; PAGE_SIZE]),
    user_table: PageTable([RW_ONLY; PAGE_SIZE]),
});

/// Build the initial directory/table state and turn on paging (CR3, CR4
/// PSE, CR0 PG). Call once, before any user process is started.
pub fn init() {
    let mut tables = TABLES.lock();

    tables.directory.0[1] = KERNEL_MEM | RW_PRESENT_4M;
    let low_table_addr = tables.low_table.0.as_ptr() as u32;
    tables.directory.0[0] = low_table_addr | RW_PRESENT;

    let video_index = (VIDEO_MEMORY >> TABLE_IDX_SHIFT) as usize;
    tables.low_table.0[video_index] = VIDEO_MEMORY | RW_PRESENT;

    for i in 0..3 {
        map_4k_locked(&mut tables, VIRT_VID_TERM[i], BACKUP_VID[i]);
    }
    // Terminal 0 is foreground at boot; its vidmap window starts pointed
    // at real video memory rather than its (blank) backing frame.
    map_4k_locked(&mut tables, VIRT_VID_TERM[0], VIDEO_MEMORY);

    let directory_addr = &tables.directory.0 as *const _ as u32;
    // SAFETY: `directory_addr` points at a 4096-byte-aligned, 'static
    // table built above; loading CR3/CR4/CR0 here is exactly what
    // `init` exists to do, and runs once before any user code executes.
    unsafe {
        asm!("mov cr3, {0}", in(reg) directory_addr, options(nostack, preserves_flags));
        asm!(
            "mov eax, cr4",
            "or eax, 0x10",
            "mov cr4, eax",
            out("eax") _,
            options(nostack, preserves_flags),
        );
        asm!(
            "mov eax, cr0",
            "or eax, 0x80000000",
            "mov cr0, eax",
            out("eax") _,
            options(nostack, preserves_flags),
        );
    }
}

fn map_4k_locked(tables: &mut Tables, virt: u32, phys: u32) {
    let dir_index = (virt >> DIR_IDX_SHIFT) as usize;
    let table_addr = tables.user_table.0.as_ptr() as u32;
    tables.directory.0[dir_index] = table_addr | USER_4K_FLAGS;
    let table_index = ((virt & CLEAR_DIR_IDX) >> TABLE_IDX_SHIFT) as usize;
    tables.user_table.0[table_index] = phys | RW_PRESENT;
    flush_tlb_locked();
}

/// Map one 4 KiB virtual page to a physical frame, used for video-memory
/// remapping when a terminal leaves or rejoins the foreground.
pub fn map_4k(virt: u32, phys: u32) {
    let mut tables = TABLES.lock();
    map_4k_locked(&mut tables, virt, phys);
}

/// Install the single 4 MiB user page for `process_id` at the fixed
/// directory slot, replacing whatever process was mapped there before.
pub fn install_process_page(process_id: u32) {
    let mut tables = TABLES.lock();
    tables.directory.0[PROCESS_IDX] = (USER_SPACE + process_id * PROCESS_SIZE) | PROCESS_FLAGS;
    flush_tlb_locked();
}

fn flush_tlb_locked() {
    // SAFETY: reloading CR3 with its own current value, the standard
    // whole-TLB flush; no address ever changes identity mid-flush since
    // the lock is held across the directory edit and this call.
    unsafe {
        asm!(
            "mov eax, cr3",
            "mov cr3, eax",
            out("eax") _,
            options(nostack, preserves_flags),
        );
    }
}

/// The user-space virtual address every process's code and data start
/// at: directory slot [`PROCESS_IDX`]'s base address. Every process is
/// mapped here; only the physical frame backing it (picked by
/// [`install_process_page`]) changes between processes.
pub const PROCESS_VIRT_BASE: u32 = (PROCESS_IDX as u32) * PROCESS_SIZE;

/// Virtual address an executable's entry point and image are loaded at,
/// a fixed offset into the process's 4 MiB virtual window.
pub const PROGRAM_LOAD_ADDR: u32 = PROCESS_VIRT_BASE + 0x0004_8000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_index_math_matches_constants() {
        assert_eq!(VIRT_VID_TERM[0] >> DIR_IDX_SHIFT, VIRT_VID_TERM[1] >> DIR_IDX_SHIFT);
        assert_eq!(
            (VIRT_VID_TERM[1] & CLEAR_DIR_IDX) >> TABLE_IDX_SHIFT,
            ((VIRT_VID_TERM[0] & CLEAR_DIR_IDX) >> TABLE_IDX_SHIFT) + 1
        );
    }
}
