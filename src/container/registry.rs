//! Open-Root Registry
//!
//! Tracks every root currently bound to a backing file in this process and
//! admits new roots according to their sharing policy.
//!
//! ## Admission Rules
//! - `Exclusive`: the file must have no other root; blocks all later roots
//! - `DenyWrite`: any number of readers, at most one writer overall
//! - `DenyNone`: at most `max_shared_roots` concurrent roots of the file
//!
//! A [`RootLease`] is held for as long as the root is bound; dropping it
//! releases the slot exactly once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{Result, StrataError};
use crate::mode::{AccessMode, Sharing};

/// Counters for one backing file
#[derive(Debug, Default)]
struct OpenRoots {
    total: usize,
    writers: usize,
    exclusive: bool,
    deny_write: usize,
}

fn registry() -> &'static Mutex<HashMap<PathBuf, OpenRoots>> {
    static OPEN_ROOTS: OnceLock<Mutex<HashMap<PathBuf, OpenRoots>>> = OnceLock::new();
    OPEN_ROOTS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registry key for a path: canonical when the file or its directory exists
fn registry_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// Admission of one root to one backing file
#[derive(Debug)]
pub(crate) struct RootLease {
    key: PathBuf,
    sharing: Sharing,
    writer: bool,
}

impl RootLease {
    /// Admit a root opened with `mode` on `path`
    pub fn acquire(path: &Path, mode: &AccessMode, max_shared_roots: usize) -> Result<Self> {
        let key = registry_key(path);
        let sharing = mode.sharing();
        let writer = mode.is_writable();

        let mut roots = registry().lock();
        let entry = roots.entry(key.clone()).or_default();

        let admitted = if entry.exclusive {
            Err(StrataError::SharingViolation(key.clone()))
        } else {
            match sharing {
                Sharing::Exclusive if entry.total > 0 => {
                    Err(StrataError::SharingViolation(key.clone()))
                }
                Sharing::DenyNone if entry.total >= max_shared_roots => {
                    Err(StrataError::TooManyOpenRoots {
                        path: key.clone(),
                        limit: max_shared_roots,
                    })
                }
                _ => {
                    let writers = entry.writers + usize::from(writer);
                    let deny_write = entry.deny_write > 0 || sharing == Sharing::DenyWrite;
                    if deny_write && writers > 1 {
                        Err(StrataError::SharingViolation(key.clone()))
                    } else {
                        Ok(())
                    }
                }
            }
        };

        if let Err(e) = admitted {
            if entry.total == 0 {
                roots.remove(&key);
            }
            warn!(path = %key.display(), mode = %mode, error = %e, "root open refused");
            return Err(e);
        }

        entry.total += 1;
        entry.writers += usize::from(writer);
        entry.exclusive |= sharing == Sharing::Exclusive;
        entry.deny_write += usize::from(sharing == Sharing::DenyWrite);
        trace!(path = %key.display(), open = entry.total, "root admitted");

        Ok(Self {
            key,
            sharing,
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.key
    }
}

impl Drop for RootLease {
    fn drop(&mut self) {
        let mut roots = registry().lock();
        if let Some(entry) = roots.get_mut(&self.key) {
            entry.total = entry.total.saturating_sub(1);
            entry.writers = entry.writers.saturating_sub(usize::from(self.writer));
            if self.sharing == Sharing::Exclusive {
                entry.exclusive = false;
            }
            if self.sharing == Sharing::DenyWrite {
                entry.deny_write = entry.deny_write.saturating_sub(1);
            }
            if entry.total == 0 {
                roots.remove(&self.key);
            }
        }
    }
}
