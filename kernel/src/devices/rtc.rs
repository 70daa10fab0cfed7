//! CMOS real-time clock: periodic-interrupt mode only. This kernel never
//! reads wall-clock time from it, only uses IRQ8 as a software-selectable
//! tick source for `rtc_read`/`rtc_write`.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::{arch::x86::port::{inb, outb}, error::KernelError};

const SELECT_REG: u16 = 0x70;
const CMOS_DATA: u16 = 0x71;
const REG_A: u8 = 0x0A;
const REG_B: u8 = 0x0B;
const REG_C: u8 = 0x0C;
const DISABLE_NMI: u8 = 0x80;
const PERIODIC: u8 = 0x40;

/// Rate 6 = 1024 Hz, the fastest this driver allows; the source kernel's
/// comment calls this "can't be over 15" / "can't be less than 6" but its
/// arithmetic treats 6 as the fast bound and 15 as the slow one.
const MAX_RATE: u8 = 6;
const MIN_RATE: u8 = 15;
const DEFAULT_FREQ: u32 = 2;

/// Index 0 is rate 1 (32768 Hz, unreachable — never selected, rate 6 is
/// the fastest this driver allows) through index 13 (rate 14, 4 Hz).
const FREQUENCIES: [u32; 14] = [
    32768, 16384, 8192, 4096, 2048, 1024, 512, 256, 128, 64, 32, 16, 8, 4,
];

static TICK_COUNT: AtomicU64 = AtomicU64::new(0);
static CURRENT_RATE: AtomicU32 = AtomicU32::new(MIN_RATE as u32);

/// Program register A's rate bits for `frequency`, clamped to the
/// [4 Hz, 1024 Hz] range the source kernel enforces. An unrecognized
/// frequency silently falls back to the slowest rate (2 Hz's neighbor),
/// matching the source's "defaults to the loop's post-increment value".
pub fn set_frequency(frequency: u32) -> Result<(), KernelError> {
    let mut rate = FREQUENCIES
        .iter()
        .position(|&f| f == frequency)
        .map(|i| i as u8 + 1)
        .unwrap_or(MIN_RATE);
    if rate > MIN_RATE {
        rate = MIN_RATE;
    }
    if rate < MAX_RATE {
        rate = MAX_RATE;
    }
    CURRENT_RATE.store(rate as u32, Ordering::SeqCst);

    crate::arch::x86::port::without_interrupts(|| {
        // SAFETY: standard CMOS register-select/read/write sequence on
        // ports 0x70/0x71, issued with interrupts disabled per the RTC's
        // requirement not to interleave select and data cycles.
        unsafe {
            outb(SELECT_REG, DISABLE_NMI | REG_A);
            let prev = inb(CMOS_DATA);
            outb(SELECT_REG, DISABLE_NMI | REG_A);
            outb(CMOS_DATA, (prev & 0xF0) | rate);
        }
    });
    Ok(())
}

/// Enable periodic interrupts at the default 2 Hz rate and unmask IRQ8.
/// Call once during boot, after the PIC and IDT are live.
pub fn init() {
    crate::arch::x86::port::without_interrupts(|| {
        // SAFETY: see set_frequency.
        unsafe {
            outb(SELECT_REG, DISABLE_NMI | REG_B);
            let prev = inb(CMOS_DATA);
            outb(SELECT_REG, DISABLE_NMI | REG_B);
            outb(CMOS_DATA, prev | PERIODIC);
        }
    });
    let _ = set_frequency(DEFAULT_FREQ);
    crate::arch::x86::pic::unmask_irq(8);
}

/// IRQ8 handler body: bump the tick counter and acknowledge register C so
/// the RTC will fire again.
pub fn on_interrupt() {
    TICK_COUNT.fetch_add(1, Ordering::SeqCst);
    crate::arch::x86::port::without_interrupts(|| {
        // SAFETY: see set_frequency; register C must be read after every
        // IRQ8 or the RTC stops generating further interrupts.
        unsafe {
            outb(SELECT_REG, REG_C);
            inb(CMOS_DATA);
        }
    });
}

pub fn ticks() -> u64 {
    TICK_COUNT.load(Ordering::SeqCst)
}

/// Block (by spinning on the tick counter — this kernel has no sleep
/// queue) until the next periodic interrupt after `target`, then advance
/// `target` to the tick that satisfied it.
pub fn wait_for_tick(target: &mut u64) {
    if *target == 0 {
        *target = ticks();
    }
    let wait_for = *target + 1;
    while ticks() < wait_for {
        core::hint::spin_loop();
    }
    *target = wait_for;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_table_is_descending_powers_of_two() {
        for pair in FREQUENCIES.windows(2) {
            assert_eq!(pair[0], pair[1] * 2);
        }
    }
}
