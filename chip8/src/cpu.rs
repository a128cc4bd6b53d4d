//! CPU and memory state.
use crate::{constants::*, error::Snapshot};

/// Core state for a chip8 interpreter.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the current position in the bytecode.
    pub(crate) pc: usize,
    /// Stack pointer, the number of return addresses on the stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address. Since addresses are 12 bits, only the
    /// lowest (rightmost) bits are used.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Instruction word fetched by the most recent step.
    pub(crate) opcode: u16,
    /// Indicates that the machine is waiting for a keypress.
    pub(crate) key_wait: bool,
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    pub(crate) key_state: u16,
    /// Display buffer changed since the host last took a frame.
    pub(crate) redraw: bool,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
    /// Screen buffer that is drawn too.
    pub(crate) display: Box<[bool; DISPLAY_BUFFER_SIZE]>,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self {
            pc: MEM_START,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            opcode: 0,
            key_wait: false,
            key_state: 0,
            redraw: false,

            ram: Box::new([0; MEM_SIZE]),
            stack: [0; STACK_SIZE],
            display: Box::new([false; DISPLAY_BUFFER_SIZE]),
        }
    }
}

impl Chip8Cpu {
    /// Zeroed machine with the builtin font resident in low memory.
    pub fn new() -> Self {
        let mut cpu = Self::default();
        cpu.ram[FONTSET_START..FONTSET_START + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
        cpu
    }

    pub fn clear_display(&mut self) {
        self.display.fill(false);
        self.redraw = true;
    }

    pub fn set_key_state(&mut self, key_id: u8, state: bool) {
        if key_id < KEY_COUNT {
            if state {
                self.key_state |= 1 << key_id;
            } else {
                self.key_state &= !(1 << key_id);
            }
        }
    }

    pub fn key_state(&self, key_id: u8) -> bool {
        if key_id < KEY_COUNT {
            self.key_state & (1 << key_id) > 0
        } else {
            false
        }
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.key_state > 0
    }

    /// Retrieve the value of the first key that is pressed down.
    #[inline]
    pub fn first_key(&self) -> Option<u8> {
        if self.any_key() {
            Some(self.key_state.trailing_zeros() as u8)
        } else {
            None
        }
    }

    /// Clear the keyboard input state, setting all keys to up.
    #[inline(always)]
    pub fn clear_keys(&mut self) {
        self.key_state = 0;
    }

    /// Count down the delay timer.
    #[inline]
    pub fn tick_delay(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
    }

    #[inline]
    pub fn tick_sound(&mut self) {
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Push a return address onto the call stack.
    ///
    /// Returns `false` when the stack is full, leaving it untouched.
    #[must_use]
    pub(crate) fn push_stack(&mut self, address: Address) -> bool {
        if self.sp >= STACK_SIZE {
            return false;
        }
        self.stack[self.sp] = address;
        self.sp += 1;
        true
    }

    /// Pop the most recent return address, or `None` if the stack is empty.
    pub(crate) fn pop_stack(&mut self) -> Option<Address> {
        let sp = self.sp.checked_sub(1)?;
        self.sp = sp;
        Some(self.stack[sp])
    }

    /// Read a byte of memory. Addresses wrap around the 4K address space.
    #[inline(always)]
    pub fn read(&self, address: usize) -> u8 {
        self.ram[address & MEM_MASK]
    }

    /// Write a byte of memory. Addresses wrap around the 4K address space.
    #[inline(always)]
    pub fn write(&mut self, address: usize, value: u8) {
        self.ram[address & MEM_MASK] = value;
    }

    /// Extract the big-endian instruction word at the current program counter.
    #[inline(always)]
    pub fn instr(&self) -> u16 {
        u16::from_be_bytes([self.read(self.pc), self.read(self.pc + 1)])
    }

    /// Copy the registers for diagnostics.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            opcode: self.opcode,
            pc: self.pc as Address,
            index: self.address,
            sp: self.sp,
            stack: self.stack,
            registers: self.registers,
            delay_timer: self.delay_timer,
            sound_timer: self.sound_timer,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_state() {
        let mut cpu = Chip8Cpu::default();

        cpu.set_key_state(0, true);
        assert_eq!(cpu.key_state, 0b00000000_00000001);
        assert!(cpu.key_state(0));
        assert!(!cpu.key_state(1));
        assert!(!cpu.key_state(7));

        cpu.set_key_state(7, true);
        assert_eq!(cpu.key_state, 0b00000000_10000001);
        assert!(cpu.key_state(0));
        assert!(!cpu.key_state(1));
        assert!(cpu.key_state(7));

        cpu.set_key_state(0, false);
        assert_eq!(cpu.key_state, 0b00000000_10000000);
        assert!(!cpu.key_state(0));
        assert!(!cpu.key_state(1));
        assert!(cpu.key_state(7));

        cpu.set_key_state(15, true);
        assert_eq!(cpu.key_state, 0b10000000_10000000);
        assert!(!cpu.key_state(0));
        assert!(!cpu.key_state(1));
        assert!(cpu.key_state(7));
        assert!(cpu.key_state(15));

        // Out of range keys are ignored
        cpu.set_key_state(16, true);
        assert_eq!(cpu.key_state, 0b10000000_10000000);
        assert!(!cpu.key_state(16));
    }

    #[test]
    fn test_first_key() {
        let mut cpu = Chip8Cpu::default();
        assert_eq!(cpu.first_key(), None);

        cpu.set_key_state(0xC, true);
        cpu.set_key_state(0x3, true);
        assert_eq!(cpu.first_key(), Some(0x3));

        cpu.clear_keys();
        assert!(!cpu.any_key());
    }

    #[test]
    fn test_fresh_state() {
        let cpu = Chip8Cpu::new();

        assert_eq!(cpu.pc, MEM_START);
        assert_eq!(cpu.sp, 0);
        assert!(cpu.registers.iter().all(|v| *v == 0));
        assert!(cpu.display.iter().all(|px| !px));
        assert_eq!(&cpu.ram[FONTSET_START..FONTSET_START + 5], &[0xF0, 0x90, 0x90, 0x90, 0xF0]);
        assert!(cpu.ram[..FONTSET_START].iter().all(|b| *b == 0));
        assert!(cpu.ram[MEM_START..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_stack_bounds() {
        let mut cpu = Chip8Cpu::default();
        assert_eq!(cpu.pop_stack(), None);

        for i in 0..STACK_SIZE {
            assert!(cpu.push_stack(0x200 + i as Address * 2));
        }
        assert!(!cpu.push_stack(0xFFF));
        assert_eq!(cpu.sp, STACK_SIZE);

        assert_eq!(cpu.pop_stack(), Some(0x200 + (STACK_SIZE as Address - 1) * 2));
        assert_eq!(cpu.sp, STACK_SIZE - 1);
    }

    #[test]
    fn test_timers_stop_at_zero() {
        let mut cpu = Chip8Cpu::default();
        cpu.delay_timer = 1;
        cpu.tick_delay();
        cpu.tick_delay();
        cpu.tick_sound();
        assert_eq!(cpu.delay_timer, 0);
        assert_eq!(cpu.sound_timer, 0);
    }

    #[test]
    fn test_memory_wraps() {
        let mut cpu = Chip8Cpu::default();
        cpu.write(MEM_SIZE + 3, 0xAB);
        assert_eq!(cpu.read(3), 0xAB);

        cpu.pc = MEM_SIZE - 1;
        cpu.ram[MEM_SIZE - 1] = 0x12;
        cpu.ram[0] = 0x34;
        assert_eq!(cpu.instr(), 0x1234);
    }
}
