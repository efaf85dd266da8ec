//! Resolving and joining the namespaces of a target process.
//!
//! Every namespace a process belongs to is exposed as a handle file under
//! `/proc/<pid>/ns/<kind>`. Two processes share a namespace exactly when
//! stat(2) on their handles yields the same device and inode.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::sched::CloneFlags;
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NsKind {
    Ipc,
    Uts,
    Net,
    Pid,
    Mnt,
}

/// Order in which requested namespaces are joined.
///
/// `Mnt` must stay last: once the mount namespace changes, `/proc` may no
/// longer show the handles of the remaining kinds.
pub const JOIN_ORDER: [NsKind; 5] = [
    NsKind::Ipc,
    NsKind::Uts,
    NsKind::Net,
    NsKind::Pid,
    NsKind::Mnt,
];

impl NsKind {
    pub fn name(self) -> &'static str {
        match self {
            NsKind::Ipc => "ipc",
            NsKind::Uts => "uts",
            NsKind::Net => "net",
            NsKind::Pid => "pid",
            NsKind::Mnt => "mnt",
        }
    }

    pub fn clone_flag(self) -> CloneFlags {
        match self {
            NsKind::Ipc => CloneFlags::CLONE_NEWIPC,
            NsKind::Uts => CloneFlags::CLONE_NEWUTS,
            NsKind::Net => CloneFlags::CLONE_NEWNET,
            NsKind::Pid => CloneFlags::CLONE_NEWPID,
            NsKind::Mnt => CloneFlags::CLONE_NEWNS,
        }
    }
}

impl fmt::Display for NsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether the caller already belongs to the target's namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Identity {
    Identical,
    Different,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Joined,
    AlreadyMember,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinStep {
    pub kind: NsKind,
    pub outcome: Outcome,
}

pub trait NamespaceOps {
    fn resolve(&mut self, kind: NsKind, target: Pid) -> Result<Identity>;
    fn join(&mut self, kind: NsKind, target: Pid) -> Result<()>;
}

/// `NamespaceOps` backed by a procfs mount and setns(2).
#[derive(Clone, Debug)]
pub struct ProcNamespaces {
    proc_root: PathBuf,
}

impl ProcNamespaces {
    pub fn new<P: Into<PathBuf>>(proc_root: P) -> Self {
        ProcNamespaces {
            proc_root: proc_root.into(),
        }
    }

    fn self_handle(&self, kind: NsKind) -> PathBuf {
        self.proc_root.join("self").join("ns").join(kind.name())
    }

    fn target_handle(&self, kind: NsKind, target: Pid) -> PathBuf {
        self.proc_root
            .join(target.to_string())
            .join("ns")
            .join(kind.name())
    }
}

impl Default for ProcNamespaces {
    fn default() -> Self {
        ProcNamespaces::new(crate::PROC_ROOT)
    }
}

fn stat_handle(kind: NsKind, path: &Path) -> Result<(u64, u64)> {
    let meta = fs::metadata(path).map_err(|source| Error::Resolve {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    Ok((meta.dev(), meta.ino()))
}

impl NamespaceOps for ProcNamespaces {
    fn resolve(&mut self, kind: NsKind, target: Pid) -> Result<Identity> {
        let current = stat_handle(kind, &self.self_handle(kind))?;
        let wanted = stat_handle(kind, &self.target_handle(kind, target))?;
        debug!(%kind, ?current, ?wanted, "resolved namespace handles");
        if current == wanted {
            Ok(Identity::Identical)
        } else {
            Ok(Identity::Different)
        }
    }

    fn join(&mut self, kind: NsKind, target: Pid) -> Result<()> {
        let path = self.target_handle(kind, target);

        // Get descriptor for namespace; closed when `handle` drops.
        let handle = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|source| Error::OpenHandle {
                kind,
                path: path.clone(),
                source,
            })?;

        let res = unsafe { libc::setns(handle.as_raw_fd(), kind.clone_flag().bits()) };
        if res != 0 {
            return Err(Error::Join {
                kind,
                target,
                source: io::Error::last_os_error(),
            });
        }
        debug!(%kind, path = %path.display(), "joined namespace");
        Ok(())
    }
}

/// Joins every kind in `wanted`, in `JOIN_ORDER`, stopping at the first
/// failure. Kinds the caller already shares with `target` are skipped.
pub fn join_all<N: NamespaceOps>(
    ops: &mut N,
    target: Pid,
    wanted: CloneFlags,
) -> Result<Vec<JoinStep>> {
    let mut steps = Vec::new();
    for kind in JOIN_ORDER.iter().copied() {
        if !wanted.contains(kind.clone_flag()) {
            continue;
        }
        let outcome = match ops.resolve(kind, target)? {
            Identity::Identical => {
                debug!(%kind, pid = %target, "already a member, skipping join");
                Outcome::AlreadyMember
            }
            Identity::Different => {
                ops.join(kind, target)?;
                Outcome::Joined
            }
        };
        steps.push(JoinStep { kind, outcome });
    }
    Ok(steps)
}

/// Warns when the effective capability set lacks CAP_SYS_ADMIN, which
/// setns(2) requires for every kind handled here.
pub fn check_privileges() {
    report_privileges(caps::has_cap(
        None,
        caps::CapSet::Effective,
        caps::Capability::CAP_SYS_ADMIN,
    ));
}

fn report_privileges<E: fmt::Display>(effective: std::result::Result<bool, E>) {
    match effective {
        Ok(true) => {}
        Ok(false) => warn!("CAP_SYS_ADMIN is not effective, setns() will likely fail"),
        Err(err) => debug!("cannot read effective capabilities: {}", err),
    }
}
