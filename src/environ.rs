//! Copying the environment of another process into this one.
//!
//! `/proc/<pid>/environ` holds the target's initial environment as a
//! sequence of NUL-terminated `KEY=VALUE` records. The whole block is
//! parsed and checked before the first variable is installed, so a bad
//! record leaves the current environment untouched.

use std::ffi::CString;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use nix::unistd::Pid;
use tracing::debug;

use crate::error::{Error, Result};

pub const MAX_ENVIRON_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvEntry<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

impl<'a> EnvEntry<'a> {
    /// Splits a record at its first `=`. The key must be non-empty; the
    /// value may be empty or contain further `=`.
    pub fn parse(record: &'a [u8]) -> Option<Self> {
        let eq = record.iter().position(|b| *b == b'=')?;
        if eq == 0 {
            return None;
        }
        Some(EnvEntry {
            key: &record[..eq],
            value: &record[eq + 1..],
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Malformed {
    pub index: usize,
    pub record: String,
}

pub struct Records<'a> {
    inner: std::iter::Enumerate<std::slice::Split<'a, u8, fn(&u8) -> bool>>,
}

fn is_nul(b: &u8) -> bool {
    *b == 0
}

/// Yields the records of `block` in order. Empty records, such as the
/// one after the final terminator, are not reported.
pub fn records(block: &[u8]) -> Records<'_> {
    Records {
        inner: block.split(is_nul as fn(&u8) -> bool).enumerate(),
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = std::result::Result<EnvEntry<'a>, Malformed>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, record) = self.inner.next()?;
            if record.is_empty() {
                continue;
            }
            return Some(EnvEntry::parse(record).ok_or_else(|| Malformed {
                index,
                record: String::from_utf8_lossy(record).into_owned(),
            }));
        }
    }
}

/// Receives the variables copied from the target.
pub trait EnvSink {
    fn install(&mut self, entry: &EnvEntry<'_>) -> io::Result<()>;
}

/// `EnvSink` writing to the environment of the current process.
///
/// The process environment is populated once here, before the command is
/// spawned, and never cleared. It is only safe to use while the process
/// has a single thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvSink for ProcessEnv {
    fn install(&mut self, entry: &EnvEntry<'_>) -> io::Result<()> {
        let key = CString::new(entry.key)?;
        let value = CString::new(entry.value)?;
        let res = unsafe { libc::setenv(key.as_ptr(), value.as_ptr(), 1) };
        if res != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

pub fn read_block(proc_root: &Path, target: Pid) -> Result<Vec<u8>> {
    let path = proc_root.join(target.to_string()).join("environ");
    let read_err = |source| Error::EnvironRead {
        target,
        path: path.clone(),
        source,
    };

    let file = File::open(&path).map_err(read_err)?;
    let mut block = Vec::new();
    file.take(MAX_ENVIRON_BYTES as u64 + 1)
        .read_to_end(&mut block)
        .map_err(read_err)?;
    if block.len() > MAX_ENVIRON_BYTES {
        return Err(Error::EnvironTooLarge {
            target,
            limit: MAX_ENVIRON_BYTES,
        });
    }
    Ok(block)
}

/// Parses `block` completely, failing on the first malformed record.
pub fn parse_block(target: Pid, block: &[u8]) -> Result<Vec<EnvEntry<'_>>> {
    records(block)
        .map(|rec| {
            rec.map_err(|bad| Error::EnvironMalformed {
                target,
                index: bad.index,
                entry: bad.record,
            })
        })
        .collect()
}

/// Copies the environment of `target` into `sink`, returning the number of
/// variables installed.
pub fn replicate<S: EnvSink>(proc_root: &Path, target: Pid, sink: &mut S) -> Result<usize> {
    let block = read_block(proc_root, target)?;
    let entries = parse_block(target, &block)?;
    for entry in &entries {
        sink.install(entry).map_err(|source| Error::EnvironInstall {
            key: String::from_utf8_lossy(entry.key).into_owned(),
            source,
        })?;
    }
    debug!(pid = %target, count = entries.len(), "replicated environment");
    Ok(entries.len())
}
