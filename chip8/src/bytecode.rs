//! Instruction decoding.
use std::fmt;

use crate::constants::Address;

/// Extract the opcode family from the upper nibble.
#[inline(always)]
pub fn op_code(word: u16) -> u8 {
    ((word & 0xF000) >> 12) as u8
}

/// Extract operand VX.
#[inline(always)]
pub fn op_x(word: u16) -> u8 {
    ((word & 0x0F00) >> 8) as u8
}

/// Extract operand VY.
#[inline(always)]
pub fn op_y(word: u16) -> u8 {
    ((word & 0x00F0) >> 4) as u8
}

/// Extract operand N from the lowest nibble.
#[inline(always)]
pub fn op_n(word: u16) -> u8 {
    (word & 0x000F) as u8
}

/// Extract operand NN from the lowest byte.
#[inline(always)]
pub fn op_nn(word: u16) -> u8 {
    (word & 0x00FF) as u8
}

/// Extract the 12-bit address operand NNN.
#[inline(always)]
pub fn op_nnn(word: u16) -> Address {
    word & 0x0FFF
}

/// Decoded instruction.
///
/// Register operands are indices in the range `0x0..=0xF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// 0NNN (SYS addr), machine code routine. Ignored.
    Sys(Address),
    /// 00E0 (CLS)
    Cls,
    /// 00EE (RET)
    Ret,
    /// 1NNN (JP addr)
    Jump(Address),
    /// 2NNN (CALL addr)
    Call(Address),
    /// 3XNN (SE Vx, byte)
    SkipEqImm { vx: u8, nn: u8 },
    /// 4XNN (SNE Vx, byte)
    SkipNeImm { vx: u8, nn: u8 },
    /// 5XY0 (SE Vx, Vy)
    SkipEqReg { vx: u8, vy: u8 },
    /// 6XNN (LD Vx, byte)
    LoadImm { vx: u8, nn: u8 },
    /// 7XNN (ADD Vx, byte)
    AddImm { vx: u8, nn: u8 },
    /// 8XYn arithmetic and logic.
    Math { op: MathOp, vx: u8, vy: u8 },
    /// 9XY0 (SNE Vx, Vy)
    SkipNeReg { vx: u8, vy: u8 },
    /// ANNN (LD I, addr)
    LoadIndex(Address),
    /// BNNN (JP V0, addr)
    JumpOffset(Address),
    /// CXNN (RND Vx, byte)
    Random { vx: u8, nn: u8 },
    /// DXYN (DRW Vx, Vy, nibble)
    Draw { vx: u8, vy: u8, n: u8 },
    /// EX9E (SKP Vx)
    SkipKey { vx: u8 },
    /// EXA1 (SKNP Vx)
    SkipNotKey { vx: u8 },
    /// FX07 (LD Vx, DT)
    LoadDelay { vx: u8 },
    /// FX0A (LD Vx, K)
    WaitKey { vx: u8 },
    /// FX15 (LD DT, Vx)
    SetDelay { vx: u8 },
    /// FX18 (LD ST, Vx)
    SetSound { vx: u8 },
    /// FX1E (ADD I, Vx)
    AddIndex { vx: u8 },
    /// FX29 (LD F, Vx)
    LoadFont { vx: u8 },
    /// FX33 (LD B, Vx)
    StoreBcd { vx: u8 },
    /// FX55 (LD [I], Vx)
    StoreRegs { vx: u8 },
    /// FX65 (LD Vx, [I])
    LoadRegs { vx: u8 },
}

/// Register to register operations of the `8XYn` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    /// 8XY0 (LD Vx, Vy)
    Load,
    /// 8XY1 (OR Vx, Vy)
    Or,
    /// 8XY2 (AND Vx, Vy)
    And,
    /// 8XY3 (XOR Vx, Vy)
    Xor,
    /// 8XY4 (ADD Vx, Vy)
    Add,
    /// 8XY5 (SUB Vx, Vy)
    Sub,
    /// 8XY6 (SHR Vx)
    Shr,
    /// 8XY7 (SUBN Vx, Vy)
    SubN,
    /// 8XYE (SHL Vx)
    Shl,
}

impl MathOp {
    fn decode(n: u8) -> Option<Self> {
        match n {
            0x0 => Some(Self::Load),
            0x1 => Some(Self::Or),
            0x2 => Some(Self::And),
            0x3 => Some(Self::Xor),
            0x4 => Some(Self::Add),
            0x5 => Some(Self::Sub),
            0x6 => Some(Self::Shr),
            0x7 => Some(Self::SubN),
            0xE => Some(Self::Shl),
            _ => None,
        }
    }

    fn mnemonic(&self) -> &'static str {
        match self {
            Self::Load => "LD",
            Self::Or => "OR",
            Self::And => "AND",
            Self::Xor => "XOR",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Shr => "SHR",
            Self::SubN => "SUBN",
            Self::Shl => "SHL",
        }
    }
}

impl Instr {
    /// Decode an instruction word.
    ///
    /// Returns `None` when the word does not map to a supported instruction.
    pub fn decode(word: u16) -> Option<Self> {
        let (vx, vy, n, nn, nnn) = (op_x(word), op_y(word), op_n(word), op_nn(word), op_nnn(word));

        let instr = match op_code(word) {
            0x0 => match word {
                0x00E0 => Self::Cls,
                0x00EE => Self::Ret,
                _ => Self::Sys(nnn),
            },
            0x1 => Self::Jump(nnn),
            0x2 => Self::Call(nnn),
            0x3 => Self::SkipEqImm { vx, nn },
            0x4 => Self::SkipNeImm { vx, nn },
            0x5 if n == 0 => Self::SkipEqReg { vx, vy },
            0x6 => Self::LoadImm { vx, nn },
            0x7 => Self::AddImm { vx, nn },
            0x8 => Self::Math {
                op: MathOp::decode(n)?,
                vx,
                vy,
            },
            0x9 if n == 0 => Self::SkipNeReg { vx, vy },
            0xA => Self::LoadIndex(nnn),
            0xB => Self::JumpOffset(nnn),
            0xC => Self::Random { vx, nn },
            0xD => Self::Draw { vx, vy, n },
            0xE => match nn {
                0x9E => Self::SkipKey { vx },
                0xA1 => Self::SkipNotKey { vx },
                _ => return None,
            },
            0xF => match nn {
                0x07 => Self::LoadDelay { vx },
                0x0A => Self::WaitKey { vx },
                0x15 => Self::SetDelay { vx },
                0x18 => Self::SetSound { vx },
                0x1E => Self::AddIndex { vx },
                0x29 => Self::LoadFont { vx },
                0x33 => Self::StoreBcd { vx },
                0x55 => Self::StoreRegs { vx },
                0x65 => Self::LoadRegs { vx },
                _ => return None,
            },
            // 5XYn and 9XYn with a non-zero n
            _ => return None,
        };

        Some(instr)
    }
}

/// Assembly mnemonic, used for instruction traces.
impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Sys(nnn) => write!(f, "SYS  {nnn:03X}"),
            Self::Cls => write!(f, "CLS"),
            Self::Ret => write!(f, "RET"),
            Self::Jump(nnn) => write!(f, "JP   {nnn:03X}"),
            Self::Call(nnn) => write!(f, "CALL {nnn:03X}"),
            Self::SkipEqImm { vx, nn } => write!(f, "SE   V{vx:X}, {nn:02X}"),
            Self::SkipNeImm { vx, nn } => write!(f, "SNE  V{vx:X}, {nn:02X}"),
            Self::SkipEqReg { vx, vy } => write!(f, "SE   V{vx:X}, V{vy:X}"),
            Self::LoadImm { vx, nn } => write!(f, "LD   V{vx:X}, {nn:02X}"),
            Self::AddImm { vx, nn } => write!(f, "ADD  V{vx:X}, {nn:02X}"),
            Self::Math { op, vx, vy } => write!(f, "{:4} V{vx:X}, V{vy:X}", op.mnemonic()),
            Self::SkipNeReg { vx, vy } => write!(f, "SNE  V{vx:X}, V{vy:X}"),
            Self::LoadIndex(nnn) => write!(f, "LD   I, {nnn:03X}"),
            Self::JumpOffset(nnn) => write!(f, "JP   V0, {nnn:03X}"),
            Self::Random { vx, nn } => write!(f, "RND  V{vx:X}, {nn:02X}"),
            Self::Draw { vx, vy, n } => write!(f, "DRW  V{vx:X}, V{vy:X}, {n:X}"),
            Self::SkipKey { vx } => write!(f, "SKP  V{vx:X}"),
            Self::SkipNotKey { vx } => write!(f, "SKNP V{vx:X}"),
            Self::LoadDelay { vx } => write!(f, "LD   V{vx:X}, DT"),
            Self::WaitKey { vx } => write!(f, "LD   V{vx:X}, K"),
            Self::SetDelay { vx } => write!(f, "LD   DT, V{vx:X}"),
            Self::SetSound { vx } => write!(f, "LD   ST, V{vx:X}"),
            Self::AddIndex { vx } => write!(f, "ADD  I, V{vx:X}"),
            Self::LoadFont { vx } => write!(f, "LD   F, V{vx:X}"),
            Self::StoreBcd { vx } => write!(f, "LD   B, V{vx:X}"),
            Self::StoreRegs { vx } => write!(f, "LD   [I], V{vx:X}"),
            Self::LoadRegs { vx } => write!(f, "LD   V{vx:X}, [I]"),
        }
    }
}
