use std::io;
use std::path::PathBuf;

use nix::unistd::Pid;
use thiserror::Error;

use crate::namespace::NsKind;

/// Exit codes reserved for setup stages. Anything else the program exits
/// with is the command's own status.
pub mod exit_code {
    pub const INPUT: i32 = 1;
    pub const SUSPEND: i32 = 2;
    pub const RESOLVE: i32 = 3;
    pub const JOIN: i32 = 4;
    pub const ENVIRON: i32 = 5;
    pub const SPAWN: i32 = 6;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0:?} is not a valid process ID")]
    InvalidTarget(String),

    #[error("command is empty")]
    EmptyCommand,

    #[error("command contains a NUL byte")]
    CommandNul,

    #[error("stop process error: {0}")]
    Suspend(#[source] nix::Error),

    #[error("stat {kind} namespace file {}: {source}", .path.display())]
    Resolve {
        kind: NsKind,
        path: PathBuf,
        source: io::Error,
    },

    #[error("open target {kind} namespace file {}: {source}", .path.display())]
    OpenHandle {
        kind: NsKind,
        path: PathBuf,
        source: io::Error,
    },

    #[error("setns into {kind} namespace of process {target}: {source}")]
    Join {
        kind: NsKind,
        target: Pid,
        source: io::Error,
    },

    #[error("read environment of process {target} from {}: {source}", .path.display())]
    EnvironRead {
        target: Pid,
        path: PathBuf,
        source: io::Error,
    },

    #[error("environment of process {target} exceeds {limit} bytes")]
    EnvironTooLarge { target: Pid, limit: usize },

    #[error("malformed environment entry #{index} of process {target}: {entry:?}")]
    EnvironMalformed {
        target: Pid,
        index: usize,
        entry: String,
    },

    #[error("failed to set environment variable [{key}]: {source}")]
    EnvironInstall { key: String, source: io::Error },

    #[error("fork() failed: {0}")]
    Spawn(#[source] nix::Error),

    #[error("exec {shell} failed: {source}")]
    Exec { shell: String, source: io::Error },

    #[error("waitpid() failed: {0}")]
    Wait(#[source] nix::Error),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidTarget(_) | Error::EmptyCommand | Error::CommandNul => exit_code::INPUT,
            Error::Suspend(_) => exit_code::SUSPEND,
            Error::Resolve { .. } => exit_code::RESOLVE,
            Error::OpenHandle { .. } | Error::Join { .. } => exit_code::JOIN,
            Error::EnvironRead { .. }
            | Error::EnvironTooLarge { .. }
            | Error::EnvironMalformed { .. }
            | Error::EnvironInstall { .. } => exit_code::ENVIRON,
            Error::Spawn(_) | Error::Exec { .. } | Error::Wait(_) => exit_code::SPAWN,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
