//! `print!`/`println!` over the VGA text buffer, `serial_print!`/
//! `serial_println!` over COM1 (declared in `serial.rs`).

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::vga::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}
