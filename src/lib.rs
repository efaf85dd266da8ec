//! Run a shell command inside the namespaces of another process.
//!
//! The setup happens in a fixed sequence: optionally stop until resumed,
//! optionally copy the target's environment, join the requested
//! namespaces, then run the command with `/bin/sh -c`. Any setup failure
//! aborts the whole run before the command starts.

pub mod cli;
pub mod environ;
pub mod error;
pub mod exec;
pub mod namespace;
pub mod request;
pub mod suspend;

use std::path::PathBuf;

use tracing::info;

pub use crate::environ::{EnvSink, ProcessEnv};
pub use crate::error::{Error, Result};
pub use crate::namespace::{NamespaceOps, NsKind, ProcNamespaces};
pub use crate::request::Request;

pub const PROC_ROOT: &str = "/proc";

/// Carries out a `Request` against the given collaborators.
pub struct Executor<N = ProcNamespaces, S = ProcessEnv> {
    proc_root: PathBuf,
    namespaces: N,
    env: S,
}

impl Executor {
    pub fn new() -> Self {
        Executor::with_parts(PROC_ROOT, ProcNamespaces::default(), ProcessEnv)
    }
}

impl Default for Executor {
    fn default() -> Self {
        Executor::new()
    }
}

impl<N: NamespaceOps, S: EnvSink> Executor<N, S> {
    pub fn with_parts<P: Into<PathBuf>>(proc_root: P, namespaces: N, env: S) -> Self {
        Executor {
            proc_root: proc_root.into(),
            namespaces,
            env,
        }
    }

    pub fn namespaces(&self) -> &N {
        &self.namespaces
    }

    pub fn env(&self) -> &S {
        &self.env
    }

    /// Performs every setup step of `request` without running its command.
    pub fn prepare(&mut self, request: &Request) -> Result<()> {
        if request.suspend {
            suspend::stop_self()?;
        }

        if request.clone_env {
            let count = environ::replicate(&self.proc_root, request.target, &mut self.env)?;
            info!(pid = %request.target, count, "cloned environment");
        }

        if !request.namespaces.is_empty() {
            namespace::check_privileges();
            let steps =
                namespace::join_all(&mut self.namespaces, request.target, request.namespaces)?;
            for step in steps {
                info!(pid = %request.target, kind = %step.kind, outcome = ?step.outcome, "namespace ready");
            }
        }
        Ok(())
    }

    /// Performs the setup, then runs the command and returns the exit code
    /// to report for it.
    pub fn run(&mut self, request: &Request) -> Result<i32> {
        self.prepare(request)?;
        exec::run_shell(&request.command)
    }
}
