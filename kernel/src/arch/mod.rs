//! Architecture support. Only the 32-bit protected-mode x86 target is
//! implemented; everything lives under [`x86`].

pub mod x86;

pub use x86::{idle, init};
