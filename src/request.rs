use std::ffi::CString;

use nix::sched::CloneFlags;
use nix::unistd::Pid;

use crate::error::{Error, Result};

/// One invocation: which process to join and what to run there.
#[derive(Clone, Debug)]
pub struct Request {
    pub target: Pid,
    pub namespaces: CloneFlags,
    pub clone_env: bool,
    pub suspend: bool,
    pub command: CString,
}

impl Request {
    /// Validates the target and command. Nothing else is touched.
    pub fn new(target: &str, command: &str) -> Result<Self> {
        let target = parse_target(target)?;
        if command.is_empty() {
            return Err(Error::EmptyCommand);
        }
        let command = CString::new(command).map_err(|_| Error::CommandNul)?;
        Ok(Request {
            target,
            namespaces: CloneFlags::empty(),
            clone_env: false,
            suspend: false,
            command,
        })
    }
}

pub fn parse_target(value: &str) -> Result<Pid> {
    match value.parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(Pid::from_raw(pid)),
        _ => Err(Error::InvalidTarget(value.to_string())),
    }
}
