//! PS/2 keyboard: scancode decode, per-terminal line buffer, and the
//! Alt+F1/F2/F3 terminal-switch / Ctrl+L redraw hotkeys.
//!
//! Decoding stays on raw scan set 1 bytes rather than `pc_keyboard`'s
//! layout machinery: this kernel needs four *per-terminal* modifier
//! states (none/shift/caps/shift+caps) rather than one global layout, so
//! the make/break bytes and the ASCII table below are matched directly
//! against the scancodes themselves.

use spin::Mutex;

use crate::error::KernelError;

const KBD_DATA_PORT: u16 = 0x60;

const L_SHIFT_MAKE: u8 = 0x2A;
const R_SHIFT_MAKE: u8 = 0x36;
const L_SHIFT_BREAK: u8 = 0xAA;
const R_SHIFT_BREAK: u8 = 0xB6;
const CTRL_MAKE: u8 = 0x1D;
const CTRL_BREAK: u8 = 0x9D;
const CAPS: u8 = 0x3A;
const BKSP: u8 = 0x0E;
const ENTER: u8 = 0x1C;
const ALT_MAKE: u8 = 0x38;
const ALT_BREAK: u8 = 0xB8;
const L_MAKE: u8 = 0x26;
const FN1: u8 = 0x3B;
const FN2: u8 = 0x3C;
const FN3: u8 = 0x3D;
const ABC_LOW_SCANS: u8 = 0x02;
const ABC_HIGH_SCANS: u8 = 0x58;

pub const BUFFER_SIZE: usize = 128;
pub const MAX_TERMINAL: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ModeIndex {
    None = 0,
    Shift = 1,
    Caps = 2,
    ShiftCaps = 3,
}

const KEY_MODES: usize = 4;
const TOTAL_SCANCODES: usize = 128;

/// `kbd_ascii_key_map` from the scancode table above, one row per
/// [`ModeIndex`]. `\0` marks scancodes with no printable mapping.
#[rustfmt::skip]
const ASCII_TABLE: [[u8; TOTAL_SCANCODES]; KEY_MODES] = build_ascii_table();

const fn row(letters: &[(u8, u8)]) -> [u8; TOTAL_SCANCODES] {
    let mut table = [0u8; TOTAL_SCANCODES];
    let mut i = 0;
    while i < letters.len() {
        let (scan, ch) = letters[i];
        table[scan as usize] = ch;
        i += 1;
    }
    table
}

const fn build_ascii_table() -> [[u8; TOTAL_SCANCODES]; KEY_MODES] {
    const NONE_ROW: &[(u8, u8)] = &[
        (0x02, b'1'), (0x03, b'2'), (0x04, b'3'), (0x05, b'4'), (0x06, b'5'),
        (0x07, b'6'), (0x08, b'7'), (0x09, b'8'), (0x0A, b'9'), (0x0B, b'0'),
        (0x0C, b'-'), (0x0D, b'='),
        (0x10, b'q'), (0x11, b'w'), (0x12, b'e'), (0x13, b'r'), (0x14, b't'),
        (0x15, b'y'), (0x16, b'u'), (0x17, b'i'), (0x18, b'o'), (0x19, b'p'),
        (0x1A, b'['), (0x1B, b']'), (0x1C, b'\n'),
        (0x1E, b'a'), (0x1F, b's'), (0x20, b'd'), (0x21, b'f'), (0x22, b'g'),
        (0x23, b'h'), (0x24, b'j'), (0x25, b'k'), (0x26, b'l'), (0x27, b';'),
        (0x28, b'\''), (0x29, b'`'),
        (0x2B, b'\\'), (0x2C, b'z'), (0x2D, b'x'), (0x2E, b'c'), (0x2F, b'v'),
        (0x30, b'b'), (0x31, b'n'), (0x32, b'm'), (0x33, b','), (0x34, b'.'),
        (0x35, b'/'), (0x39, b' '),
    ];
    const SHIFT_ROW: &[(u8, u8)] = &[
        (0x02, b'!'), (0x03, b'@'), (0x04, b'#'), (0x05, b'$'), (0x06, b'%'),
        (0x07, b'^'), (0x08, b'&'), (0x09, b'*'), (0x0A, b'('), (0x0B, b')'),
        (0x0C, b'_'), (0x0D, b'+'),
        (0x10, b'Q'), (0x11, b'W'), (0x12, b'E'), (0x13, b'R'), (0x14, b'T'),
        (0x15, b'Y'), (0x16, b'U'), (0x17, b'I'), (0x18, b'O'), (0x19, b'P'),
        (0x1A, b'{'), (0x1B, b'}'), (0x1C, b'\n'),
        (0x1E, b'A'), (0x1F, b'S'), (0x20, b'D'), (0x21, b'F'), (0x22, b'G'),
        (0x23, b'H'), (0x24, b'J'), (0x25, b'K'), (0x26, b'L'), (0x27, b':'),
        (0x28, b'"'), (0x29, b'~'),
        (0x2B, b'|'), (0x2C, b'Z'), (0x2D, b'X'), (0x2E, b'C'), (0x2F, b'V'),
        (0x30, b'B'), (0x31, b'N'), (0x32, b'M'), (0x33, b'<'), (0x34, b'>'),
        (0x35, b'?'), (0x39, b' '),
    ];
    const CAPS_ROW: &[(u8, u8)] = &[
        (0x02, b'1'), (0x03, b'2'), (0x04, b'3'), (0x05, b'4'), (0x06, b'5'),
        (0x07, b'6'), (0x08, b'7'), (0x09, b'8'), (0x0A, b'9'), (0x0B, b'0'),
        (0x0C, b'-'), (0x0D, b'='),
        (0x10, b'Q'), (0x11, b'W'), (0x12, b'E'), (0x13, b'R'), (0x14, b'T'),
        (0x15, b'Y'), (0x16, b'U'), (0x17, b'I'), (0x18, b'O'), (0x19, b'P'),
        (0x1A, b'['), (0x1B, b']'), (0x1C, b'\n'),
        (0x1E, b'A'), (0x1F, b'S'), (0x20, b'D'), (0x21, b'F'), (0x22, b'G'),
        (0x23, b'H'), (0x24, b'J'), (0x25, b'K'), (0x26, b'L'), (0x27, b';'),
        (0x28, b'\''), (0x29, b'`'),
        (0x2B, b'\\'), (0x2C, b'Z'), (0x2D, b'X'), (0x2E, b'C'), (0x2F, b'V'),
        (0x30, b'B'), (0x31, b'N'), (0x32, b'M'), (0x33, b','), (0x34, b'.'),
        (0x35, b'/'), (0x39, b' '),
    ];
    const SHIFT_CAPS_ROW: &[(u8, u8)] = &[
        (0x02, b'!'), (0x03, b'@'), (0x04, b'#'), (0x05, b'$'), (0x06, b'%'),
        (0x07, b'^'), (0x08, b'&'), (0x09, b'*'), (0x0A, b'('), (0x0B, b')'),
        (0x0C, b'_'), (0x0D, b'+'),
        (0x10, b'q'), (0x11, b'w'), (0x12, b'e'), (0x13, b'r'), (0x14, b't'),
        (0x15, b'y'), (0x16, b'u'), (0x17, b'i'), (0x18, b'o'), (0x19, b'p'),
        (0x1A, b'{'), (0x1B, b'}'), (0x1C, b'\n'),
        (0x1E, b'a'), (0x1F, b's'), (0x20, b'd'), (0x21, b'f'), (0x22, b'g'),
        (0x23, b'h'), (0x24, b'j'), (0x25, b'k'), (0x26, b'l'), (0x27, b':'),
        (0x28, b'"'), (0x29, b'~'),
        (0x2B, b'|'), (0x2C, b'z'), (0x2D, b'x'), (0x2E, b'c'), (0x2F, b'v'),
        (0x30, b'b'), (0x31, b'n'), (0x32, b'm'), (0x33, b'<'), (0x34, b'>'),
        (0x35, b'?'), (0x39, b' '),
    ];
    [
        row(NONE_ROW),
        row(SHIFT_ROW),
        row(CAPS_ROW),
        row(SHIFT_CAPS_ROW),
    ]
}

struct TerminalKeyState {
    mode: ModeIndex,
    buffer: [u8; BUFFER_SIZE],
    len: usize,
    line_ready: bool,
}

impl TerminalKeyState {
    const fn new() -> Self {
        TerminalKeyState {
            mode: ModeIndex::None,
            buffer: [0; BUFFER_SIZE],
            len: 0,
            line_ready: false,
        }
    }
}

struct KeyboardState {
    terminals: [TerminalKeyState; MAX_TERMINAL],
    ctrl: bool,
    alt: bool,
}

impl KeyboardState {
    const fn new() -> Self {
        KeyboardState {
            terminals: [
                TerminalKeyState::new(),
                TerminalKeyState::new(),
                TerminalKeyState::new(),
            ],
            ctrl: false,
            alt: false,
        }
    }
}

static STATE: Mutex<KeyboardState> = Mutex::new(KeyboardState::new());

pub fn init() {
    crate::arch::x86::pic::unmask_irq(1);
}

fn toggle_caps(mode: &mut ModeIndex) {
    *mode = match mode {
        ModeIndex::None => ModeIndex::Caps,
        ModeIndex::Shift => ModeIndex::ShiftCaps,
        ModeIndex::Caps => ModeIndex::None,
        ModeIndex::ShiftCaps => ModeIndex::Shift,
    };
}

fn toggle_shift(mode: &mut ModeIndex, pressed: bool) {
    *mode = match (*mode, pressed) {
        (ModeIndex::None, true) => ModeIndex::Shift,
        (ModeIndex::Caps, true) => ModeIndex::ShiftCaps,
        (ModeIndex::Shift, false) => ModeIndex::None,
        (ModeIndex::ShiftCaps, false) => ModeIndex::Caps,
        (other, _) => other,
    };
}

/// IRQ1 handler body: decode one scancode byte and update the current
/// terminal's line buffer, or act on a control hotkey.
///
/// Alt+F1/F2/F3 is dispatched *after* the lock below is released: a
/// terminal switch to a not-yet-launched terminal calls `execute`, which
/// blocks synchronously until that shell halts (i.e. effectively never),
/// and that shell's first `read(0, …)` takes this same `STATE` lock —
/// holding the guard across the switch call would self-deadlock on the
/// first switch to a fresh terminal.
pub fn on_interrupt() {
    // SAFETY: reading the keyboard controller's output buffer in response
    // to its own interrupt.
    let scancode = unsafe { crate::arch::x86::port::inb(KBD_DATA_PORT) };

    let current = crate::terminal::foreground();
    let mut switch_target: Option<u8> = None;

    {
        let mut guard = STATE.lock();

        match scancode {
            CAPS => toggle_caps(&mut guard.terminals[current as usize].mode),
            L_SHIFT_MAKE | R_SHIFT_MAKE => {
                toggle_shift(&mut guard.terminals[current as usize].mode, true)
            }
            L_SHIFT_BREAK | R_SHIFT_BREAK => {
                toggle_shift(&mut guard.terminals[current as usize].mode, false)
            }
            CTRL_MAKE => guard.ctrl = true,
            CTRL_BREAK => guard.ctrl = false,
            ALT_MAKE => guard.alt = true,
            ALT_BREAK => guard.alt = false,
            BKSP => {
                let term = &mut guard.terminals[current as usize];
                if term.len > 0 {
                    term.len -= 1;
                    term.buffer[term.len] = 0;
                    crate::terminal::backspace(current);
                }
            }
            ENTER => {
                let term = &mut guard.terminals[current as usize];
                crate::terminal::newline(current);
                term.line_ready = true;
            }
            FN1 if guard.alt => switch_target = Some(0),
            FN2 if guard.alt => switch_target = Some(1),
            FN3 if guard.alt => switch_target = Some(2),
            L_MAKE if guard.ctrl => {
                crate::vga::clear_screen();
                let term = &guard.terminals[current as usize];
                crate::terminal::write_bytes(current, &term.buffer[..term.len]);
            }
            key if (ABC_LOW_SCANS..=ABC_HIGH_SCANS).contains(&key) => {
                let mode = guard.terminals[current as usize].mode as usize;
                let ch = ASCII_TABLE[mode][key as usize];
                if ch != 0 {
                    let term = &mut guard.terminals[current as usize];
                    if term.len + 1 < BUFFER_SIZE {
                        term.buffer[term.len] = ch;
                        term.len += 1;
                        crate::terminal::putc(current, ch);
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(target) = switch_target {
        let _ = crate::terminal::switch(target);
    }
}

/// Block until the current terminal's line buffer has a completed line
/// (Enter was pressed), then copy it into `buf`. Matches the source
/// kernel's busy-wait `kbdr_flag` poll — there is no sleep queue.
pub fn read_line(terminal: u8, buf: &mut [u8]) -> Result<usize, KernelError> {
    loop {
        {
            let mut guard = STATE.lock();
            let term = &mut guard.terminals[terminal as usize];
            if term.line_ready {
                let n = term.len.min(buf.len());
                buf[..n].copy_from_slice(&term.buffer[..n]);
                term.len = 0;
                term.buffer = [0; BUFFER_SIZE];
                term.line_ready = false;
                return Ok(n);
            }
        }
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_cycles_through_four_modes() {
        let mut mode = ModeIndex::None;
        toggle_caps(&mut mode);
        assert_eq!(mode, ModeIndex::Caps);
        toggle_shift(&mut mode, true);
        assert_eq!(mode, ModeIndex::ShiftCaps);
        toggle_caps(&mut mode);
        assert_eq!(mode, ModeIndex::Shift);
        toggle_shift(&mut mode, false);
        assert_eq!(mode, ModeIndex::None);
    }

    #[test]
    fn ascii_table_maps_q_row() {
        assert_eq!(ASCII_TABLE[ModeIndex::None as usize][0x10], b'q');
        assert_eq!(ASCII_TABLE[ModeIndex::Shift as usize][0x10], b'Q');
        assert_eq!(ASCII_TABLE[ModeIndex::Caps as usize][0x10], b'Q');
        assert_eq!(ASCII_TABLE[ModeIndex::ShiftCaps as usize][0x10], b'q');
    }
}
