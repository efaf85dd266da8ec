//! Stopping the current process until a supervisor resumes it.

use nix::sys::signal::{kill, Signal};
use nix::unistd::getpid;
use tracing::debug;

use crate::error::{Error, Result};

/// Sends SIGSTOP to the calling process. Returns once another process has
/// delivered SIGCONT.
pub fn stop_self() -> Result<()> {
    let me = getpid();
    debug!(pid = %me, "stopping until SIGCONT");
    kill(me, Signal::SIGSTOP).map_err(Error::Suspend)?;
    debug!(pid = %me, "resumed");
    Ok(())
}
