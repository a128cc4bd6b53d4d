//! Virtual machine.
use std::{
    fmt::{self, Write},
    path::Path,
    time::Duration,
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    bytecode::{Instr, MathOp},
    constants::*,
    cpu::Chip8Cpu,
    error::{Chip8Error, Chip8Result, Snapshot},
    keypad::KeyCode,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    /// Source of the random numbers for `CXNN (RND Vx, byte)`.
    rng: StdRng,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Chip8Vm {
            cpu: Chip8Cpu::new(),
            rng,
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Copy a program into memory at [`MEM_START`].
    ///
    /// The whole program region is overwritten. Registers, timers and
    /// the display are left as they are.
    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if !check_program_size(bytecode) {
            return Err(Chip8Error::LargeProgram {
                size: bytecode.len(),
            });
        }

        // Start with clean program memory to avoid leaking a previous program.
        self.cpu.ram[MEM_START..].fill(0);
        self.cpu.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);

        log::debug!("loaded program: {} bytes", bytecode.len());

        Ok(())
    }

    /// Read a ROM file from disk and load it as the program.
    pub fn load_file(&mut self, filepath: impl AsRef<Path>) -> Chip8Result<()> {
        let bytecode = std::fs::read(filepath.as_ref())?;
        self.load_bytecode(&bytecode)
    }

    pub fn display_buffer(&self) -> Chip8DisplayBuffer<'_> {
        &self.cpu.display
    }

    /// Whether the display buffer changed since the last [`Chip8Vm::take_redraw`].
    pub fn redraw(&self) -> bool {
        self.cpu.redraw
    }

    /// Read and clear the redraw flag.
    ///
    /// The display adapter calls this once per frame, and only
    /// needs to blit the display buffer when it returns `true`.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::replace(&mut self.cpu.redraw, false)
    }
}

/// Step outcome, telling the host loop what the instruction did.
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    Draw,
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
}

/// VM Configuration Parameters.
#[derive(Debug, Default, Clone)]
pub struct Chip8Conf {
    /// Seed for the random number generator. Runs are reproducible when set.
    pub seed: Option<u64>,
}

/// Clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Timers and keypad
impl Chip8Vm {
    /// Sets the keyboard key input state.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.set_key_state(key.as_u8(), pressed);
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.cpu.key_state(key.as_u8())
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.cpu.clear_keys()
    }

    /// The machine is stalled on `Fx0A (LD Vx, K)` until a key is pressed.
    pub fn key_wait(&self) -> bool {
        self.cpu.key_wait
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer
    }

    pub fn set_delay_timer(&mut self, value: u8) {
        self.cpu.delay_timer = value;
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer
    }

    pub fn set_sound_timer(&mut self, value: u8) {
        self.cpu.sound_timer = value;
    }

    /// Count both timers down by one, stopping at zero.
    ///
    /// Must be called by the host at [`DELAY_FREQUENCY`], independent
    /// of the instruction rate.
    pub fn tick_timers(&mut self) {
        self.cpu.tick_delay();
        self.cpu.tick_sound();
    }

    /// The buzzer sounds while the sound timer is counting down.
    pub fn buzzer(&self) -> bool {
        self.cpu.sound_timer > 0
    }
}

/// Registers
impl Chip8Vm {
    pub fn pc(&self) -> usize {
        self.cpu.pc
    }

    /// Address register I.
    pub fn index(&self) -> Address {
        self.cpu.address
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.cpu.registers
    }

    /// Number of return addresses on the call stack.
    pub fn stack_depth(&self) -> usize {
        self.cpu.sp
    }

    /// Instruction word fetched by the most recent step.
    pub fn opcode(&self) -> u16 {
        self.cpu.opcode
    }

    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.cpu.ram
    }

    pub fn snapshot(&self) -> Snapshot {
        self.cpu.snapshot()
    }
}

/// Interpreter
impl Chip8Vm {
    /// Execute `step_count` instructions, stopping early on error.
    ///
    /// Returns the flow of the last executed instruction.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step()?;
        }

        Ok(flow)
    }

    /// Fetch, decode and execute exactly one instruction.
    ///
    /// Errors are fatal. The program counter is left pointing at the
    /// failing instruction, and the VM should not be stepped again.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        let origin = self.cpu.pc;

        // Each instruction is two bytes, with the opcode identity in the first 4-bit nibble.
        let word = self.cpu.instr();
        self.cpu.opcode = word;

        let instr = match Instr::decode(word) {
            Some(instr) => instr,
            None => return Err(self.trap(origin, Chip8Error::UnknownOpcode)),
        };

        op_trace(&self.cpu, &instr);

        self.cpu.pc = (self.cpu.pc + 2) & MEM_MASK;

        let flow = self.exec(origin, instr)?;

        // Jumps and skips past the end of memory wrap around to the start.
        self.cpu.pc &= MEM_MASK;

        Ok(flow)
    }

    /// Capture the machine state for a fatal error.
    ///
    /// The program counter is rewound to the failing instruction.
    fn trap(&mut self, origin: usize, kind: fn(Box<Snapshot>) -> Chip8Error) -> Chip8Error {
        self.cpu.pc = origin;
        let snapshot = self.cpu.snapshot();
        log::error!("fatal error at {origin:03X}\n{snapshot}");
        kind(Box::new(snapshot))
    }

    /// Execute an arithmetic instruction
    ///
    /// When `vx` is the flag register, the flag is written last and wins.
    #[inline]
    fn exec_math(&mut self, op: MathOp, vx: usize, vy: usize) {
        let (x, y) = (self.cpu.registers[vx], self.cpu.registers[vy]);

        match op {
            // 8XY0 (LD Vx, Vy)
            //
            // Store the value of register VY in register VX.
            MathOp::Load => self.cpu.registers[vx] = y,
            // 8XY1 (OR Vx, Vy)
            MathOp::Or => self.cpu.registers[vx] = x | y,
            // 8XY2 (AND Vx, Vy)
            MathOp::And => self.cpu.registers[vx] = x & y,
            // 8XY3 (XOR Vx, Vy)
            MathOp::Xor => self.cpu.registers[vx] = x ^ y,
            // 8XY4 (ADD Vx, Vy)
            //
            // ADDs VX to VY, and stores the result in VX.
            // Overflow is wrapped.
            // If overflow, set VF to 1, else 0.
            MathOp::Add => {
                let (result, carry) = x.overflowing_add(y);
                self.cpu.registers[vx] = result;
                self.cpu.registers[FLAG_REGISTER] = carry as u8;
            }
            // 8XY5 (SUB Vx, Vy)
            //
            // Subtracts VY from VX, and stores the result in VX.
            // VF is set to 1 when VX is strictly greater than VY, else 0.
            MathOp::Sub => {
                self.cpu.registers[vx] = x.wrapping_sub(y);
                self.cpu.registers[FLAG_REGISTER] = (x > y) as u8;
            }
            // 8XY6 (SHR Vx)
            //
            // VF is set to the least-significant bit of Vx, then Vx is shifted right by 1.
            // VY is unused.
            MathOp::Shr => {
                self.cpu.registers[vx] = x >> 1;
                self.cpu.registers[FLAG_REGISTER] = x & 1;
            }
            // 8XY7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            // VF is set to 1 when VY is strictly greater than VX, else 0.
            MathOp::SubN => {
                self.cpu.registers[vx] = y.wrapping_sub(x);
                self.cpu.registers[FLAG_REGISTER] = (y > x) as u8;
            }
            // 8XYE (SHL Vx)
            //
            // VF is set to the most-significant bit of Vx, then Vx is shifted left by 1.
            // VY is unused.
            MathOp::Shl => {
                self.cpu.registers[vx] = x << 1;
                self.cpu.registers[FLAG_REGISTER] = (x >> 7) & 1;
            }
        }
    }

    /// Execute a decoded instruction.
    ///
    /// The program counter has already been advanced past the instruction,
    /// `origin` is its address.
    fn exec(&mut self, origin: usize, instr: Instr) -> Chip8Result<Flow> {
        let mut control_flow = Flow::Ok;

        match instr {
            // 0NNN (SYS addr)
            //
            // Jump to a machine code routine of the host computer. Ignored.
            Instr::Sys(_) => {}
            // 00E0 (CLS)
            //
            // Clear display
            Instr::Cls => {
                self.cpu.clear_display();
                control_flow = Flow::Draw;
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Set the program counter to the value at the top of the stack.
            Instr::Ret => match self.cpu.pop_stack() {
                Some(address) => {
                    self.cpu.pc = address as usize;
                    control_flow = Flow::Jump;
                }
                None => return Err(self.trap(origin, Chip8Error::StackUnderflow)),
            },
            // 1NNN (JP addr)
            //
            // Jump to address.
            Instr::Jump(nnn) => {
                self.cpu.pc = nnn as usize;
                control_flow = Flow::Jump;
            }
            // 2NNN (CALL addr)
            //
            // Call subroutine at NNN.
            // The return address is the instruction following the call.
            Instr::Call(nnn) => {
                let ret = self.cpu.pc as Address;
                if !self.cpu.push_stack(ret) {
                    return Err(self.trap(origin, Chip8Error::StackOverflow));
                }
                self.cpu.pc = nnn as usize;
                control_flow = Flow::Jump;
            }
            // BNNN (JP V0, addr)
            //
            // Jump to address NNN plus the value of register V0.
            Instr::JumpOffset(nnn) => {
                self.cpu.pc = nnn as usize + self.cpu.registers[0] as usize;
                control_flow = Flow::Jump;
            }
            // 3XNN (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value NN.
            Instr::SkipEqImm { vx, nn } => {
                if self.cpu.registers[vx as usize] == nn {
                    self.cpu.pc += 2;
                }
            }
            // 4XNN (SNE Vx, byte)
            //
            // Skip the next instruction if register VX does not equal value NN.
            Instr::SkipNeImm { vx, nn } => {
                if self.cpu.registers[vx as usize] != nn {
                    self.cpu.pc += 2;
                }
            }
            // 5XY0 (SE Vx, Vy)
            //
            // Skip the next instruction if register VX equals value VY.
            Instr::SkipEqReg { vx, vy } => {
                if self.cpu.registers[vx as usize] == self.cpu.registers[vy as usize] {
                    self.cpu.pc += 2;
                }
            }
            // 6XNN (LD Vx, byte)
            Instr::LoadImm { vx, nn } => {
                self.cpu.registers[vx as usize] = nn;
            }
            // 7XNN (ADD Vx, byte)
            //
            // Add value NN to register VX. Carry flag is not set.
            Instr::AddImm { vx, nn } => {
                let x = self.cpu.registers[vx as usize];
                self.cpu.registers[vx as usize] = x.wrapping_add(nn);
            }
            // Arithmetic instructions indentified by n
            Instr::Math { op, vx, vy } => self.exec_math(op, vx as usize, vy as usize),
            // 9XY0 (SNE Vx, Vy)
            //
            // Skip next instruction if Vx != Vy.
            Instr::SkipNeReg { vx, vy } => {
                if self.cpu.registers[vx as usize] != self.cpu.registers[vy as usize] {
                    self.cpu.pc += 2;
                }
            }
            // ANNN (LD I, addr)
            //
            // Set address register I to value NNN.
            Instr::LoadIndex(nnn) => {
                self.cpu.address = nnn;
            }
            // CXNN (RND Vx, byte)
            //
            // Set register VX to the result of bitwise AND between a random number and NN.
            Instr::Random { vx, nn } => {
                self.cpu.registers[vx as usize] = nn & self.rng.gen::<u8>();
            }
            Instr::Draw { vx, vy, n } => {
                self.draw(vx as usize, vy as usize, n as usize);
                control_flow = Flow::Draw;
            }
            // ----------------------------------------------------------------
            // Ex9E (SKP Vx)
            Instr::SkipKey { vx } => {
                if self.cpu.key_state(self.cpu.registers[vx as usize] & 0xF) {
                    self.cpu.pc += 2;
                }
            }
            // ExA1 (SKNP Vx)
            Instr::SkipNotKey { vx } => {
                if !self.cpu.key_state(self.cpu.registers[vx as usize] & 0xF) {
                    self.cpu.pc += 2;
                }
            }
            // ----------------------------------------------------------------
            // Fx07 (LD Vx, DT)
            //
            // Set Vx = delay timer value.
            Instr::LoadDelay { vx } => {
                self.cpu.registers[vx as usize] = self.cpu.delay_timer;
            }
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // All execution stops until a key is pressed, then the value of that key is stored in Vx.
            Instr::WaitKey { vx } => {
                if let Some(k) = self.cpu.first_key() {
                    self.cpu.registers[vx as usize] = k;
                    self.cpu.key_wait = false;
                } else {
                    // rewind the program counter to stall the machine
                    self.cpu.pc = origin;
                    self.cpu.key_wait = true;
                    control_flow = Flow::KeyWait;
                }
            }
            // Fx15 (LD DT, Vx)
            Instr::SetDelay { vx } => {
                self.cpu.delay_timer = self.cpu.registers[vx as usize];
            }
            // Fx18 (LD ST, Vx)
            Instr::SetSound { vx } => {
                self.cpu.sound_timer = self.cpu.registers[vx as usize];
                control_flow = Flow::Sound;
            }
            // Fx1E (ADD I, Vx)
            //
            // Add Vx to I. The overflow flag is not set.
            Instr::AddIndex { vx } => {
                let x = self.cpu.registers[vx as usize] as Address;
                self.cpu.address = self.cpu.address.wrapping_add(x);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            Instr::LoadFont { vx } => {
                let x = self.cpu.registers[vx as usize] as Address;
                self.cpu.address = FONTSET_START as Address + x * FONTSET_HEIGHT as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            Instr::StoreBcd { vx } => {
                let addr = self.cpu.address as usize;
                let x = self.cpu.registers[vx as usize];
                self.cpu.write(addr,     x / 100);
                self.cpu.write(addr + 1, x / 10 % 10);
                self.cpu.write(addr + 2, x % 10);
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            // I itself is left unchanged.
            Instr::StoreRegs { vx } => {
                let addr = self.cpu.address as usize;
                for v in 0..=vx as usize {
                    let x = self.cpu.registers[v];
                    self.cpu.write(addr + v, x);
                }
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            Instr::LoadRegs { vx } => {
                let addr = self.cpu.address as usize;
                for v in 0..=vx as usize {
                    self.cpu.registers[v] = self.cpu.read(addr + v);
                }
            }
        }

        Ok(control_flow)
    }

    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
    /// Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
    /// memory pointed to by address register I.
    ///
    /// Pixels drawn outside of the display area wrap around to the other side.
    ///
    /// If the drawing operation erases an existing pixel, register VF is set to 1.
    /// VF is never cleared by this instruction, matching the COSMAC VIP.
    fn draw(&mut self, vx: usize, vy: usize, n: usize) {
        let x = self.cpu.registers[vx] as usize % DISPLAY_WIDTH;
        let y = self.cpu.registers[vy] as usize % DISPLAY_HEIGHT;
        let address = self.cpu.address as usize;

        for r in 0..n {
            // Each row is 8 bits representing the 8 pixels of the sprite.
            let row = self.cpu.read(address + r);

            for c in 0..8 {
                if (row >> (7 - c)) & 1 == 0 {
                    continue;
                }

                let d = (x + c) % DISPLAY_WIDTH + ((y + r) % DISPLAY_HEIGHT) * DISPLAY_WIDTH;

                // XOR erases a pixel that is already set.
                if self.cpu.display[d] {
                    self.cpu.registers[FLAG_REGISTER] = 1;
                }
                self.cpu.display[d] ^= true;
            }
        }

        self.cpu.redraw = true;
    }
}

impl Default for Chip8Vm {
    fn default() -> Self {
        Self::new(Chip8Conf::default())
    }
}

/// Troubleshooting
impl Chip8Vm {
    /// Returns the contents of the memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let iter = self
            .cpu
            .ram
            .iter()
            .enumerate()
            .skip(MEM_START)
            .take(count)
            .step_by(2);
        let mut buf = String::new();

        for (i, op) in iter {
            writeln!(buf, "{:04X}: {:02X}{:02X}", i, op, self.cpu.read(i + 1))?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if self.cpu.display[x + y * DISPLAY_WIDTH] {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.any_key() {
            write!(buf, "keys:")?;
            for key in KeyCode::all().filter(|k| self.is_pressed(*k)) {
                write!(buf, " {key}")?;
            }
        }

        Ok(buf)
    }
}

#[inline(always)]
fn check_program_size(bytecode: &[u8]) -> bool {
    bytecode.len() <= MAX_PROGRAM_SIZE
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(cpu: &Chip8Cpu, instr: &Instr) {
    log::trace!("{:04X}: {:04X}  {}", cpu.pc, cpu.opcode, instr);
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: &Chip8Cpu, _: &Instr) {}
