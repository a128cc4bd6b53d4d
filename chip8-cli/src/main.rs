//! Entrypoint for CLI
use std::{env, error::Error, io};

use chip8::IMPL_VERSION;
use chip8_cli::{CliError, Halt, Host, HostConfig};
use log::{error, info};

static USAGE: &str = r#"
usage: chip8 CMD ROM [CONFIG]

commands:
    run     Run the target ROM file, printing the display as it changes
    dump    Run the target ROM unthrottled, then print the final display

options:
    CONFIG  YAML host configuration file

examples:
    chip8 run maze.ch8
    chip8 run breakout.ch8 chip8.yaml
    chip8 dump maze.ch8
"#;

/// Step limit for `dump` when the configuration doesn't set one.
const DUMP_STEPS: u64 = 10_000;

fn run_rom(filepath: &str, config: HostConfig) -> Result<(), CliError> {
    info!("running {filepath}");

    if config.clock_frequency == 0 {
        info!("clock is unthrottled");
    }

    let mut host = Host::new(config);
    host.load_rom(filepath)?;

    let stdout = io::stdout();
    let halt = host.run(&mut stdout.lock())?;
    info!("halted after {} steps: {halt:?}", host.steps());

    Ok(())
}

fn dump_rom(filepath: &str, mut config: HostConfig) -> Result<(), CliError> {
    config.clock_frequency = 0;
    config.render = false;
    config.max_steps = config.max_steps.or(Some(DUMP_STEPS));

    let mut host = Host::new(config);
    host.load_rom(filepath)?;

    let halt = host.run(&mut io::sink())?;
    if halt == Halt::KeyWait {
        info!("stopped early, program waits for input");
    }

    println!("{}", host.vm().dump_display()?);
    println!("{}", host.vm().snapshot());

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init()?;

    let result = match parse_args() {
        Some(Cmd::Run { filepath, config }) => {
            load_config(config).and_then(|config| run_rom(&filepath, config))
        }
        Some(Cmd::Dump { filepath, config }) => {
            load_config(config).and_then(|config| dump_rom(&filepath, config))
        }
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        if let Some(snapshot) = err.snapshot() {
            eprintln!("{snapshot}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn load_config(filepath: Option<String>) -> Result<HostConfig, CliError> {
    match filepath {
        Some(filepath) => HostConfig::from_file(filepath),
        None => Ok(HostConfig::default()),
    }
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(cmd) => {
            // don't format me T.T
            match cmd.as_str() {
                "run" => Some(Cmd::Run {
                    filepath: args.next()?,
                    config: args.next(),
                }),
                "dump" => Some(Cmd::Dump {
                    filepath: args.next()?,
                    config: args.next(),
                }),
                _ => None,
            }
        }
        None => None,
    }
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run file
    Run {
        filepath: String,
        config: Option<String>,
    },
    /// Run file and dump the final state
    Dump {
        filepath: String,
        config: Option<String>,
    },
}
