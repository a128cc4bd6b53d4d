mod clock;
mod config;
mod error;
mod host;

pub use self::{
    clock::Clock,
    config::HostConfig,
    error::{CliError, ErrorKind},
    host::{Halt, Host},
};
