//! Running the command through the shell and collecting its status.

use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, execv, fork, pipe2, read, write, ForkResult, Pid};
use tracing::debug;

use crate::error::{Error, Result};

pub const SHELL: &str = "/bin/sh";

const EXEC_FAILED: i32 = 127;

fn shell_arg(shell: &str, arg: &str) -> Result<CString> {
    CString::new(arg).map_err(|err| Error::Exec {
        shell: shell.to_string(),
        source: err.into(),
    })
}

/// Runs `/bin/sh -c <command>` in a child process, waits for it, and
/// returns the exit code to report for it.
pub fn run_shell(command: &CStr) -> Result<i32> {
    run_in(SHELL, command)
}

/// Like `run_shell`, with `shell` in place of `/bin/sh`. A shell that
/// cannot be executed is an `Error::Exec`, never an exit code.
pub fn run_in(shell: &str, command: &CStr) -> Result<i32> {
    let path = shell_arg(shell, shell)?;
    let argv0 = shell_arg(shell, "sh")?;
    let flag = shell_arg(shell, "-c")?;
    let argv = [argv0.as_c_str(), flag.as_c_str(), command];

    // The child reports a failed exec through this pipe; a successful exec
    // closes the write end and the parent reads EOF.
    let (reader, writer) = pipe2(OFlag::O_CLOEXEC).map_err(Error::Spawn)?;

    match fork().map_err(Error::Spawn)? {
        ForkResult::Parent { child } => {
            let _ = close(writer);
            let exec_errno = read_exec_errno(reader);
            let _ = close(reader);

            match exec_errno? {
                None => {
                    debug!(%child, command = %command.to_string_lossy(), "spawned shell");
                    wait_for(child)
                }
                Some(errno) => {
                    wait_for(child)?;
                    Err(Error::Exec {
                        shell: shell.to_string(),
                        source: io::Error::from_raw_os_error(errno),
                    })
                }
            }
        }
        ForkResult::Child => {
            let _ = close(reader);
            if let Err(err) = execv(&path, &argv) {
                let errno = match err {
                    nix::Error::Sys(errno) => errno as i32,
                    _ => libc::EINVAL,
                };
                // If this write fails the parent only sees the 127.
                let _ = write(writer, &errno.to_ne_bytes());
            }
            unsafe { libc::_exit(EXEC_FAILED) }
        }
    }
}

fn read_exec_errno(reader: RawFd) -> Result<Option<i32>> {
    let mut buf = [0u8; 4];
    loop {
        match read(reader, &mut buf) {
            Ok(0) => return Ok(None),
            Ok(n) if n == buf.len() => return Ok(Some(i32::from_ne_bytes(buf))),
            Ok(_) => return Ok(Some(libc::EIO)),
            Err(nix::Error::Sys(Errno::EINTR)) => continue,
            Err(err) => return Err(Error::Spawn(err)),
        }
    }
}

fn wait_for(child: Pid) -> Result<i32> {
    loop {
        match waitpid(child, None) {
            Ok(status) => {
                if let Some(code) = exit_code(status) {
                    debug!(%child, ?status, code, "shell terminated");
                    return Ok(code);
                }
            }
            Err(nix::Error::Sys(Errno::EINTR)) => continue,
            Err(err) => return Err(Error::Wait(err)),
        }
    }
}

/// Maps a terminal wait status to an exit code in `0..=255`. Death by
/// signal becomes `128 + signal`, as in the shell.
pub fn exit_code(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code & 0xff),
        WaitStatus::Signaled(_, signal, _) => Some((128 + signal as i32) & 0xff),
        _ => None,
    }
}
