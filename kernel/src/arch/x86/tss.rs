//! 32-bit Task State Segment.
//!
//! Only `esp0`/`ss0` are meaningful for this kernel: the TSS exists
//! exclusively so the CPU knows which kernel stack to switch to on a
//! ring3 -> ring0 transition (interrupt, exception, or the 0x80 syscall
//! gate). No hardware task-switching (`jmp`/`call` to a TSS selector) is
//! used.

#[repr(C, packed)]
pub struct Tss {
    pub prev_task_link: u32,
    pub esp0: u32,
    pub ss0: u32,
    pub esp1: u32,
    pub ss1: u32,
    pub esp2: u32,
    pub ss2: u32,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub es: u32,
    pub cs: u32,
    pub ss: u32,
    pub ds: u32,
    pub fs: u32,
    pub gs: u32,
    pub ldt: u32,
    pub trap: u16,
    pub iomap_base: u16,
}

impl Tss {
    pub fn new(kernel_ss: u16) -> Self {
        // SAFETY: a TSS of all zeroes is a valid (if inert) TSS; every
        // field below is explicitly assigned before use.
        let mut tss: Tss = unsafe { core::mem::zeroed() };
        tss.ss0 = kernel_ss as u32;
        tss.iomap_base = core::mem::size_of::<Tss>() as u16;
        tss
    }
}
