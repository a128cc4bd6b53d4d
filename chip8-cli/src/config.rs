//! Host configuration.
use std::path::Path;

use chip8::{prelude::*, Hz};
use serde::Deserialize;

use crate::error::CliError;

/// Settings for the headless host loop, read from a YAML file.
///
/// ```yaml
/// clock_frequency: 700
/// seed: 1234
/// max_steps: 10000
/// held_keys: [5]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Instructions executed per second. Zero runs as fast as possible.
    pub clock_frequency: u64,
    /// Rate at which the delay and sound timers count down.
    pub timer_frequency: u64,
    /// Seed for the VM random number generator.
    pub seed: Option<u64>,
    /// Stop after executing this many instructions.
    pub max_steps: Option<u64>,
    /// Print the display to the output whenever it changes.
    pub render: bool,
    /// Keys held down for the whole run, standing in for keyboard input.
    pub held_keys: Vec<KeyCode>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            clock_frequency: 500,
            timer_frequency: chip8::constants::DELAY_FREQUENCY,
            seed: None,
            max_steps: None,
            render: true,
            held_keys: Vec::new(),
        }
    }
}

impl HostConfig {
    pub fn from_file(filepath: impl AsRef<Path>) -> Result<Self, CliError> {
        let file = std::fs::File::open(filepath.as_ref())?;
        let config: Self = serde_yaml::from_reader(file)?;
        log::debug!("loaded host config: {:#?}", config);
        Ok(config)
    }

    pub fn parse(source: &str) -> Result<Self, CliError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn clock_hz(&self) -> Hz {
        Hz(self.clock_frequency)
    }

    pub fn timer_hz(&self) -> Hz {
        Hz(self.timer_frequency)
    }

    /// Configuration for the virtual machine itself.
    pub fn vm_conf(&self) -> Chip8Conf {
        Chip8Conf { seed: self.seed }
    }
}
