//! Headless host loop.
use std::{io::Write, path::Path};

use chip8::prelude::*;
use log::{debug, info, warn};

use crate::{clock::Clock, config::HostConfig, error::CliError};

/// Drives the virtual machine without a window.
///
/// The instruction clock and the 60Hz timer clock run independently.
/// The display is rendered as text to the given output, and keyboard
/// input is replaced by the keys held down in the configuration.
pub struct Host {
    vm: Chip8Vm,
    conf: HostConfig,
    clock: Clock,
    timer: Clock,
    steps: u64,
}

/// Reason the host loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Reached the configured `max_steps`.
    StepLimit,
    /// Program is waiting for a key, and no input can arrive.
    KeyWait,
}

impl Host {
    pub fn new(conf: HostConfig) -> Self {
        let mut vm = Chip8Vm::new(conf.vm_conf());
        for key in &conf.held_keys {
            vm.set_key(*key, true);
        }

        Self {
            vm,
            clock: Clock::from_hz(conf.clock_hz()),
            timer: Clock::from_hz(conf.timer_hz()),
            conf,
            steps: 0,
        }
    }

    pub fn load_rom(&mut self, filepath: impl AsRef<Path>) -> Result<(), CliError> {
        let filepath = filepath.as_ref();
        self.vm.load_file(filepath)?;
        info!("loaded rom {}", filepath.display());
        Ok(())
    }

    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Result<(), CliError> {
        self.vm.load_bytecode(bytecode)?;
        Ok(())
    }

    pub fn vm(&self) -> &Chip8Vm {
        &self.vm
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Run the machine until it halts or traps.
    pub fn run(&mut self, out: &mut impl Write) -> Result<Halt, CliError> {
        self.clock.reset();
        self.timer.reset();

        loop {
            if let Some(max_steps) = self.conf.max_steps {
                if self.steps >= max_steps {
                    info!("step limit of {max_steps} reached");
                    return Ok(Halt::StepLimit);
                }
            }

            self.clock.wait();

            // Count down timers, catching up on the periods that
            // elapsed while waiting on a slow instruction clock.
            let timer_cycles = self.timer.elapsed_cycles().min(u8::MAX as u32);
            for _ in 0..timer_cycles {
                self.vm.tick_timers();
            }

            let flow = self.vm.step()?;
            self.steps += 1;

            if self.conf.render && self.vm.take_redraw() {
                self.render(out)?;
            }

            match flow {
                Flow::KeyWait if self.conf.held_keys.is_empty() => {
                    warn!(
                        "program is waiting for a key at {:03X}, but no keys are held",
                        self.vm.pc()
                    );
                    return Ok(Halt::KeyWait);
                }
                Flow::Sound => debug!("buzzer {}", if self.vm.buzzer() { "on" } else { "off" }),
                _ => {}
            }
        }
    }

    /// Write the display buffer as text.
    pub fn render(&self, out: &mut impl Write) -> Result<(), CliError> {
        writeln!(out, "{}", self.vm.dump_display()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MAZE: &[u8] = include_bytes!("../../chip8/programs/maze");

    fn headless(max_steps: Option<u64>, render: bool) -> HostConfig {
        HostConfig {
            clock_frequency: 0,
            seed: Some(3),
            max_steps,
            render,
            ..HostConfig::default()
        }
    }

    #[test]
    fn test_step_limit() {
        let mut host = Host::new(headless(Some(100), false));
        host.load_bytecode(MAZE).unwrap();

        let mut out = Vec::new();
        assert_eq!(host.run(&mut out).unwrap(), Halt::StepLimit);
        assert_eq!(host.steps(), 100);
        assert!(out.is_empty());
    }

    #[test]
    fn test_render_frames() {
        let mut host = Host::new(headless(Some(20), true));
        host.load_bytecode(MAZE).unwrap();

        let mut out = Vec::new();
        host.run(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains('#'));
        assert!(text.lines().all(|line| line.is_empty() || line.len() == 64));
    }

    #[test]
    #[rustfmt::skip]
    fn test_key_wait_without_input() {
        let mut host = Host::new(headless(Some(100), false));
        host.load_bytecode(&[
            0xF1, 0x0A, // LD v1, K
        ]).unwrap();

        assert_eq!(host.run(&mut Vec::new()).unwrap(), Halt::KeyWait);
        assert_eq!(host.steps(), 1);
    }

    #[test]
    #[rustfmt::skip]
    fn test_held_keys() {
        let mut conf = headless(Some(2), false);
        conf.held_keys = vec![KeyCode::Key9];

        let mut host = Host::new(conf);
        host.load_bytecode(&[
            0xF1, 0x0A, // LD v1, K
            0x12, 0x02, // JP 0x202
        ]).unwrap();

        assert_eq!(host.run(&mut Vec::new()).unwrap(), Halt::StepLimit);
        assert_eq!(host.vm().registers()[1], 9);
    }

    #[test]
    fn test_fatal_error() {
        let mut host = Host::new(headless(None, false));
        host.load_bytecode(&[0x00, 0xEE]).unwrap();

        let err = host.run(&mut Vec::new()).unwrap_err();
        let snapshot = err.snapshot().unwrap();
        assert_eq!(snapshot.opcode, 0x00EE);
        assert_eq!(snapshot.pc, 0x200);
    }

    #[test]
    #[rustfmt::skip]
    fn test_timers_independent_of_clock() {
        // 20 instructions per second, 60 timer ticks per second
        let mut conf = headless(Some(10), false);
        conf.clock_frequency = 20;

        let mut host = Host::new(conf);
        host.load_bytecode(&[
            0x61, 0xFF, // LD v1, 0xFF
            0xF1, 0x15, // LD DT, v1
            0x12, 0x04, // JP 0x204
        ]).unwrap();

        host.run(&mut Vec::new()).unwrap();

        // The delay timer is set on the second step, and the remaining
        // eight steps take at least 400ms, which is 24 timer periods.
        let ticks = 0xFF - host.vm().delay_timer();
        assert!(ticks >= 20, "delay timer only ticked {ticks} times");
    }

    #[test]
    #[rustfmt::skip]
    fn test_timers_count_down() {
        let mut conf = headless(Some(1000), false);
        conf.timer_frequency = 0;

        let mut host = Host::new(conf);
        host.load_bytecode(&[
            0x61, 0x05, // LD v1, 5
            0xF1, 0x15, // LD DT, v1
            0x12, 0x04, // JP 0x204
        ]).unwrap();

        host.run(&mut Vec::new()).unwrap();
        assert_eq!(host.vm().delay_timer(), 0);
    }
}
