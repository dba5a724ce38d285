//! Transaction Layers
//!
//! A layer is the unit of visibility. Every root owns one; every storage
//! opened `Transacted` below it gets its own, holding a private working copy
//! of its subtree. `Direct` storages reuse the layer of their parent.
//!
//! ```text
//!   backing file ◄── commit ── root layer (Direct: write-through)
//!                                 ▲
//!                                 │ commit: replace node at `path`
//!                                 │
//!                           child layer (Transacted "Orders")
//! ```
//!
//! ## Guarantees
//! - A transacted layer's `committed` snapshot is untouched until `commit`,
//!   so `revert` always has a consistent state to return to, even after a
//!   failed write to the backing file.
//! - A direct root writes the whole tree through on every mutation. When
//!   that write fails the root reloads the last tree the file holds; if the
//!   reload fails too, memory stays ahead of the file. There is no rollback
//!   for direct mode beyond that.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::container::{ContainerReader, ContainerWriter, RootLease, SectorSize};
use crate::error::{Result, StrataError};
use crate::tree::{wrong_kind, Element, ElementKind, NameKey, StorageNode};

/// Shared handle to a layer
pub(crate) type SharedLayer = Arc<Mutex<Layer>>;

/// How a commit treats concurrent changes to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitConditions {
    /// Publish unconditionally; the last committer wins
    #[default]
    Default,
    /// Refuse with `CommitConflict` if the target changed since this storage
    /// last synchronized with it, so nothing is overwritten destructively
    OnlyIfCurrent,
}

/// The backing file of a root layer
pub(crate) struct Backing {
    pub path: PathBuf,
    pub sector_size: SectorSize,
    /// Generation of the file as this root last wrote or read it
    pub generation: u64,
    pub sync: bool,
    pub lease: RootLease,
}

/// Link from a child layer to the layer it commits into
struct ParentLink {
    layer: SharedLayer,
    path: Vec<NameKey>,
}

/// Revert scope of a layer's working state
///
/// Reverting a layer retires its current scope. Layers opened beneath it
/// hold that scope as an ancestor and refuse further use once it is retired.
struct Scope {
    retired: AtomicBool,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    fn new(parent: Option<Arc<Scope>>) -> Arc<Self> {
        Arc::new(Self {
            retired: AtomicBool::new(false),
            parent,
        })
    }

    fn ancestors_live(&self) -> bool {
        let mut next = self.parent.as_deref();
        while let Some(scope) = next {
            if scope.retired.load(Ordering::Acquire) {
                return false;
            }
            next = scope.parent.as_deref();
        }
        true
    }
}

pub(crate) struct Layer {
    /// Working view of this layer's subtree
    tree: StorageNode,
    /// Last committed view; `None` for direct layers, whose working view is
    /// always the committed one
    committed: Option<StorageNode>,
    dirty: bool,
    parent: Option<ParentLink>,
    backing: Option<Backing>,
    scope: Arc<Scope>,
}

impl Layer {
    /// Layer for a root bound to `backing`
    pub fn root(tree: StorageNode, transacted: bool, backing: Backing) -> SharedLayer {
        let committed = transacted.then(|| tree.clone());
        Arc::new(Mutex::new(Self {
            tree,
            committed,
            dirty: false,
            parent: None,
            backing: Some(backing),
            scope: Scope::new(None),
        }))
    }

    /// Transacted layer over the storage at `path` in `parent`
    pub fn child(parent: &SharedLayer, path: Vec<NameKey>) -> Result<SharedLayer> {
        let (tree, scope) = {
            let guard = parent.lock();
            let tree = guard.tree()?.descend(&path)?.clone();
            (tree, Scope::new(Some(Arc::clone(&guard.scope))))
        };
        Ok(Arc::new(Mutex::new(Self {
            committed: Some(tree.clone()),
            tree,
            dirty: false,
            parent: Some(ParentLink {
                layer: Arc::clone(parent),
                path,
            }),
            backing: None,
            scope,
        })))
    }

    /// True if `path` in `layer` lies at or below `prefix` in `ancestor`,
    /// following parent links up from `layer`
    pub fn lies_within(
        layer: &SharedLayer,
        path: &[NameKey],
        ancestor: &SharedLayer,
        prefix: &[NameKey],
    ) -> bool {
        let mut layer = Arc::clone(layer);
        let mut path = path.to_vec();
        loop {
            if Arc::ptr_eq(&layer, ancestor) {
                return path.starts_with(prefix);
            }
            let link = layer
                .lock()
                .parent
                .as_ref()
                .map(|link| (Arc::clone(&link.layer), link.path.clone()));
            match link {
                Some((parent, mut absolute)) => {
                    absolute.extend(path);
                    layer = parent;
                    path = absolute;
                }
                None => return false,
            }
        }
    }

    /// Fails once an enclosing transaction has been reverted
    fn ensure_live(&self) -> Result<()> {
        if self.scope.ancestors_live() {
            Ok(())
        } else {
            Err(StrataError::InvalidOperation(
                "storage was invalidated by a revert of an enclosing transaction".into(),
            ))
        }
    }

    pub fn tree(&self) -> Result<&StorageNode> {
        self.ensure_live()?;
        Ok(&self.tree)
    }

    pub fn is_transacted(&self) -> bool {
        self.committed.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn backing(&self) -> Option<&Backing> {
        self.backing.as_ref()
    }

    /// Content that counts as committed for this layer
    pub fn committed_view(&self) -> Result<&StorageNode> {
        self.ensure_live()?;
        Ok(self.committed.as_ref().unwrap_or(&self.tree))
    }

    /// Apply `f` to the working tree and publish it if the layer is direct
    ///
    /// `f` must validate before it modifies anything: when it returns an
    /// error the tree is assumed unchanged.
    pub fn mutate<T>(&mut self, f: impl FnOnce(&mut StorageNode) -> Result<T>) -> Result<T> {
        self.ensure_live()?;
        let out = f(&mut self.tree)?;
        self.dirty = true;
        if !self.is_transacted() {
            if let Err(e) = self.write_through() {
                self.reload_backing();
                return Err(e);
            }
        }
        Ok(out)
    }

    /// Put a direct root back in step with its file after a failed write
    fn reload_backing(&mut self) {
        let backing = match self.backing.as_mut() {
            Some(backing) => backing,
            None => return,
        };
        match ContainerReader::load(&backing.path) {
            Ok((header, tree)) => {
                self.tree = tree;
                self.dirty = false;
                backing.generation = header.generation;
                debug!(path = %backing.path.display(), "direct root reloaded after failed write");
            }
            Err(e) => warn!(
                path = %backing.path.display(),
                error = %e,
                "direct root could not be reloaded; memory is ahead of the file"
            ),
        }
    }

    /// Direct layers are always roots: publish the tree to the backing file
    fn write_through(&mut self) -> Result<()> {
        if let Some(backing) = self.backing.as_mut() {
            let generation = backing.generation + 1;
            ContainerWriter::write(
                &backing.path,
                &self.tree,
                backing.sector_size,
                generation,
                backing.sync,
            )?;
            backing.generation = generation;
        }
        self.dirty = false;
        Ok(())
    }

    /// Publish the working tree to the parent layer or the backing file
    pub fn commit(&mut self, conditions: CommitConditions) -> Result<()> {
        self.ensure_live()?;
        if !self.is_transacted() || !self.dirty {
            return Ok(());
        }

        if let Some(link) = self.parent.as_ref() {
            let mut parent = link.layer.lock();
            let base = self.committed.as_ref();
            let path = link.path.clone();
            let tree = &self.tree;
            parent.mutate(|root| {
                let (last, ancestors) = path.split_last().ok_or_else(|| {
                    StrataError::InvalidOperation("child layer without a path".into())
                })?;
                let holder = root.descend_mut(ancestors)?;
                let slot = match holder.children.get_mut(last) {
                    Some(Element::Storage(node)) => node,
                    Some(Element::Stream(_)) => {
                        return Err(wrong_kind(last.as_str(), ElementKind::Storage))
                    }
                    None => return Err(StrataError::NotFound(format!("storage {}", last))),
                };
                if conditions == CommitConditions::OnlyIfCurrent && Some(&*slot) != base {
                    return Err(StrataError::CommitConflict(format!(
                        "storage {} changed in its parent since it was opened",
                        slot.name
                    )));
                }
                let name = slot.name.clone();
                *slot = tree.clone();
                slot.name = name;
                Ok(())
            })?;
            debug!(path = ?link.path, "layer committed to parent");
        } else if let Some(backing) = self.backing.as_mut() {
            let on_disk = match ContainerReader::read_header(&backing.path) {
                Ok(header) => header.generation,
                Err(_) if conditions == CommitConditions::Default => backing.generation,
                Err(e) => return Err(e),
            };
            if conditions == CommitConditions::OnlyIfCurrent && on_disk != backing.generation {
                warn!(
                    path = %backing.path.display(),
                    expected = backing.generation,
                    found = on_disk,
                    "commit refused, file changed underneath"
                );
                return Err(StrataError::CommitConflict(format!(
                    "{} was committed by another root (generation {} != {})",
                    backing.path.display(),
                    on_disk,
                    backing.generation
                )));
            }
            let generation = on_disk.max(backing.generation) + 1;
            ContainerWriter::write(
                &backing.path,
                &self.tree,
                backing.sector_size,
                generation,
                backing.sync,
            )?;
            backing.generation = generation;
            info!(path = %backing.path.display(), generation, "root committed");
        }

        self.committed = Some(self.tree.clone());
        self.dirty = false;
        Ok(())
    }

    /// Discard uncommitted changes
    ///
    /// Every transacted layer opened beneath this one is invalidated, along
    /// with the storages, streams and property sets that live in it.
    pub fn revert(&mut self) {
        if let Some(committed) = &self.committed {
            self.tree = committed.clone();
            self.dirty = false;
            self.scope.retired.store(true, Ordering::Release);
            self.scope = Scope::new(self.scope.parent.clone());
            debug!("layer reverted");
        }
    }

    /// Write the committed view to `path` and rebind this root to it
    pub fn switch_to(&mut self, path: &Path, lease: RootLease) -> Result<()> {
        let committed = self.committed_view()?.clone();
        let backing = self.backing.as_mut().ok_or_else(|| {
            StrataError::InvalidOperation("only a root storage can switch files".into())
        })?;

        ContainerWriter::write(path, &committed, backing.sector_size, 1, backing.sync)?;

        info!(
            from = %backing.path.display(),
            to = %lease.path().display(),
            "root switched to new file"
        );
        backing.path = path.to_path_buf();
        backing.generation = 1;
        backing.lease = lease;
        Ok(())
    }
}
