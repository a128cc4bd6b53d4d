//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::*;

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Attempt to load a bytecode program that can't fit in memory.
    LargeProgram { size: usize },
    /// Fetched instruction does not decode to any supported operation.
    UnknownOpcode(Box<Snapshot>),
    /// Subroutine call with a full call stack.
    StackOverflow(Box<Snapshot>),
    /// Subroutine return with an empty call stack.
    StackUnderflow(Box<Snapshot>),
    Io(std::io::Error),
}

impl Chip8Error {
    /// Machine state captured at the instruction that trapped, if this is a runtime error.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::UnknownOpcode(snapshot)
            | Self::StackOverflow(snapshot)
            | Self::StackUnderflow(snapshot) => Some(snapshot),
            Self::LargeProgram { .. } | Self::Io(_) => None,
        }
    }

    /// Runtime errors abort the execution session. The VM must not be stepped again.
    pub fn is_fatal(&self) -> bool {
        self.snapshot().is_some()
    }
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LargeProgram { size } => write!(
                f,
                "program too large for VM memory: {size} bytes, maximum is {MAX_PROGRAM_SIZE}"
            ),
            Self::UnknownOpcode(s) => write!(f, "unknown opcode {:04X} at {:03X}", s.opcode, s.pc),
            Self::StackOverflow(s) => write!(f, "call stack overflow at {:03X}", s.pc),
            Self::StackUnderflow(s) => write!(f, "call stack underflow at {:03X}", s.pc),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Chip8Error {}

impl From<std::io::Error> for Chip8Error {
    fn from(err: std::io::Error) -> Self {
        Chip8Error::Io(err)
    }
}

/// Copy of the CPU registers at a single instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Instruction word that was executing.
    pub opcode: u16,
    /// Address of the instruction.
    pub pc: Address,
    /// Address register I.
    pub index: Address,
    pub sp: usize,
    pub stack: [Address; STACK_SIZE],
    pub registers: [u8; REGISTER_COUNT],
    pub delay_timer: u8,
    pub sound_timer: u8,
}

impl Display for Snapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "op: {:04X}  pc: {:03X}  I: {:03X}  sp: {}  DT: {}  ST: {}",
            self.opcode, self.pc, self.index, self.sp, self.delay_timer, self.sound_timer
        )?;

        for (i, v) in self.registers.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "V{i:X}={v:02X}")?;
        }
        writeln!(f)?;

        write!(f, "stack:")?;
        for addr in &self.stack[..self.sp] {
            write!(f, " {addr:03X}")?;
        }

        Ok(())
    }
}
