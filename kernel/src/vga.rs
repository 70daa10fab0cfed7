//! VGA text-mode framebuffer: the only thing user-visible screen content
//! ever touches. Diagnostic logging never writes here — see
//! [`crate::logging`].

use core::{fmt, ptr::write_volatile};

use spin::Mutex;

pub const BUFFER_HEIGHT: usize = 25;
pub const BUFFER_WIDTH: usize = 80;

/// Physical/virtual address of the hardware video page while it is mapped
/// as foreground. Callers always go through [`Writer`], which is told at
/// construction time which 4 KiB page backs it.
pub const VIDEO_MEMORY: usize = 0xB8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
struct ColorCode(u8);

impl ColorCode {
    fn new(foreground: Color, background: Color) -> ColorCode {
        ColorCode(((background as u8) << 4) | (foreground as u8))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
struct ScreenChar {
    ascii_character: u8,
    color_code: ColorCode,
}

#[repr(transparent)]
struct Buffer {
    chars: [[ScreenChar; BUFFER_WIDTH]; BUFFER_HEIGHT],
}

/// A writer over whichever 4 KiB page is currently mapped as the video
/// buffer. The terminal manager repoints `buffer` at a backing frame when
/// its terminal leaves the foreground (see `terminal::switch`).
pub struct Writer {
    column_position: usize,
    row_position: usize,
    color_code: ColorCode,
    buffer: *mut Buffer,
}

// SAFETY: the pointer always addresses either the hardware video page or
// one of the fixed backing-frame physical addresses, both `'static`.
unsafe impl Send for Writer {}

impl Writer {
    const fn at(address: usize) -> Self {
        Writer {
            column_position: 0,
            row_position: 0,
            color_code: ColorCode::new(Color::White, Color::Black),
            buffer: address as *mut Buffer,
        }
    }

    /// Repoint this writer at a different physical page without touching
    /// the cursor state, used when a terminal is remapped to its backing
    /// frame or back to real video memory.
    pub fn retarget(&mut self, address: usize) {
        self.buffer = address as *mut Buffer;
    }

    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            byte => {
                if self.column_position >= BUFFER_WIDTH {
                    self.new_line();
                }
                let row = self.row_position;
                let col = self.column_position;
                let color_code = self.color_code;
                // SAFETY: row < BUFFER_HEIGHT, col < BUFFER_WIDTH by
                // construction; `buffer` addresses a live 4 KiB video page.
                unsafe {
                    write_volatile(
                        &mut (*self.buffer).chars[row][col],
                        ScreenChar {
                            ascii_character: byte,
                            color_code,
                        },
                    );
                }
                self.column_position += 1;
            }
        }
    }

    fn new_line(&mut self) {
        if self.row_position + 1 < BUFFER_HEIGHT {
            self.row_position += 1;
        } else {
            for row in 1..BUFFER_HEIGHT {
                for col in 0..BUFFER_WIDTH {
                    // SAFETY: see write_byte.
                    let character =
                        unsafe { core::ptr::read_volatile(&(*self.buffer).chars[row][col]) };
                    unsafe {
                        write_volatile(&mut (*self.buffer).chars[row - 1][col], character);
                    }
                }
            }
            self.clear_row(BUFFER_HEIGHT - 1);
        }
        self.column_position = 0;
    }

    fn clear_row(&mut self, row: usize) {
        let blank = ScreenChar {
            ascii_character: b' ',
            color_code: self.color_code,
        };
        for col in 0..BUFFER_WIDTH {
            // SAFETY: see write_byte.
            unsafe {
                write_volatile(&mut (*self.buffer).chars[row][col], blank);
            }
        }
    }

    pub fn column_position(&self) -> usize {
        self.column_position
    }

    /// Move the cursor back one column and blank that cell, the VGA half
    /// of a backspace keystroke.
    pub fn move_back_and_erase(&mut self) {
        if self.column_position == 0 {
            return;
        }
        self.column_position -= 1;
        let row = self.row_position;
        let col = self.column_position;
        let blank = ScreenChar {
            ascii_character: b' ',
            color_code: self.color_code,
        };
        // SAFETY: see write_byte.
        unsafe {
            write_volatile(&mut (*self.buffer).chars[row][col], blank);
        }
    }

    pub fn clear(&mut self) {
        for row in 0..BUFFER_HEIGHT {
            self.clear_row(row);
        }
        self.row_position = 0;
        self.column_position = 0;
    }

    pub fn write_string(&mut self, s: &str) {
        for byte in s.bytes() {
            match byte {
                0x20..=0x7e | b'\n' => self.write_byte(byte),
                _ => self.write_byte(0xfe),
            }
        }
    }

    /// Snapshot the full 4 KiB page this writer currently targets into
    /// `dst`, used by `terminal::switch` to preserve screen contents.
    pub fn snapshot(&self, dst: &mut [u8; 4096]) {
        // SAFETY: `buffer` always addresses a 4 KiB-sized video page.
        let src = unsafe { core::slice::from_raw_parts(self.buffer as *const u8, 4096) };
        dst.copy_from_slice(src);
    }

    /// Overwrite the full 4 KiB page this writer currently targets from
    /// `src`, the counterpart of [`Writer::snapshot`].
    pub fn restore(&mut self, src: &[u8; 4096]) {
        // SAFETY: see snapshot.
        let dst = unsafe { core::slice::from_raw_parts_mut(self.buffer as *mut u8, 4096) };
        dst.copy_from_slice(src);
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_string(s);
        Ok(())
    }
}

pub static WRITER: Mutex<Writer> = Mutex::new(Writer::at(VIDEO_MEMORY));

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    crate::arch::x86::port::without_interrupts(|| {
        WRITER.lock().write_fmt(args).expect("VGA write_fmt failed");
    });
}

pub fn clear_screen() {
    crate::arch::x86::port::without_interrupts(|| {
        WRITER.lock().clear();
    });
}
