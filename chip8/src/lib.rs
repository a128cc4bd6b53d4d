//! Chip-8 virtual machine.
//!
//! The [`Chip8Vm`](prelude::Chip8Vm) executes one instruction per call to
//! `step`. Pacing the instruction rate, counting down the timers at 60Hz,
//! blitting the display and feeding keyboard input are up to the host.
mod bytecode;
pub mod constants;
mod cpu;
mod error;
mod keypad;
mod vm;

pub use self::{
    bytecode::{Instr, MathOp},
    error::{Chip8Error, Chip8Result, Snapshot},
    keypad::{InvalidKeyCode, KeyCode},
    vm::{Flow, Hz},
};

/// Version of this implementation.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        error::{Chip8Error, Chip8Result},
        keypad::KeyCode,
        vm::{Chip8Conf, Chip8Vm, Flow},
    };
}
