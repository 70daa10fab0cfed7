//! Kernel heap: a fixed-size static region backing a `linked_list_allocator`
//! free list. The heap only exists to back small `alloc`-gated bookkeeping
//! (boxed `DeviceOps` trait objects in `process::fd_table`) — nothing in
//! this kernel grows the heap or needs more than a few hundred KiB.

use linked_list_allocator::LockedHeap;

const HEAP_SIZE: usize = 256 * 1024;

#[repr(align(4096))]
struct HeapRegion([u8; HEAP_SIZE]);

static mut HEAP: HeapRegion = HeapRegion([0; HEAP_SIZE]);

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Hand the static heap region to the allocator. Call once during boot,
/// after paging is live (the region is identity-mapped kernel memory, so
/// this could in principle run earlier, but keeping it after paging keeps
/// the boot order easy to reason about).
pub fn init() {
    // SAFETY: `HEAP` is a `static mut` touched only here, once, before any
    // other code can have taken a reference into it.
    unsafe {
        let start = core::ptr::addr_of_mut!(HEAP) as usize;
        ALLOCATOR.lock().init(start as *mut u8, HEAP_SIZE);
    }
}

/// Heap allocation error handler. Panic is intentional: running out of a
/// 256 KiB bookkeeping heap in this kernel means something is leaking file
/// descriptors or processes, not a recoverable condition.
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("heap allocation error: {:?}", layout);
}
