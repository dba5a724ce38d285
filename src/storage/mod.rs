//! Storage Module
//!
//! Directory nodes of the container and the file they are bound to.
//!
//! ## Responsibilities
//! - Create, open, destroy, rename, move and copy child elements
//! - Attach property sets
//! - Commit / revert transacted changes
//! - Bind the root to its backing file ([`RootFile`])
//!
//! ## Handles
//! A [`Storage`] is a handle: a transaction layer plus the path of the node
//! inside that layer. Direct children share their parent's layer; transacted
//! children get a layer of their own (see `layer`). Handles are addressed by
//! path, so renaming or destroying an ancestor makes later calls on the
//! handle fail with `NotFound`.
//!
//! ## Fault Model
//! Validation (`InvalidArgument`, `InvalidName`, mode checks) happens before
//! any mutation. A transacted storage can always `revert` to its last
//! committed snapshot after a fault. A direct root writes through on every
//! change and has no such guarantee: after a failed write it reloads the
//! file's last tree, and if that fails as well the in-memory tree stays ahead
//! of the file.

mod enumerator;
mod layer;
mod root;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::container::{RootLease, SectorSize};
use crate::enumerate::Batched;
use crate::error::{Result, StrataError};
use crate::mode::{AccessMode, Creation, ModeOperation, ModeTarget};
use crate::property::{PropertySet, PropertySetData, PropertySetEnumerator, PropertySetFlags, PropertySets};
use crate::stats::ElementStatistics;
use crate::stream::Stream;
use crate::tree::{
    wrong_kind, ClassId, Element, ElementKind, ElementTimes, FormatId, NameKey, StorageNode,
    StreamNode,
};

pub use enumerator::{ElementEnumerator, Elements};
pub use layer::CommitConditions;
pub use root::RootFile;

pub(crate) use layer::{Backing, Layer, SharedLayer};

/// A directory node in the container
pub struct Storage {
    layer: SharedLayer,
    /// Path of this node inside `layer`
    path: Vec<NameKey>,
    mode: AccessMode,
    is_root: bool,
    config: Arc<Config>,
}

impl Storage {
    pub(crate) fn bind_root(layer: SharedLayer, mode: AccessMode, config: Arc<Config>) -> Self {
        Self {
            layer,
            path: Vec::new(),
            mode,
            is_root: true,
            config,
        }
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn with_node<T>(&self, f: impl FnOnce(&StorageNode) -> Result<T>) -> Result<T> {
        let layer = self.layer.lock();
        f(layer.tree()?.descend(&self.path)?)
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut StorageNode) -> Result<T>) -> Result<T> {
        self.require_writable()?;
        let path = &self.path;
        self.layer
            .lock()
            .mutate(|root| f(root.descend_mut(path)?))
    }

    fn require_writable(&self) -> Result<()> {
        if !self.mode.is_writable() {
            return Err(StrataError::AccessDenied(
                "storage was opened read-only".to_string(),
            ));
        }
        Ok(())
    }

    /// Handle for the child storage `key`, which must already exist
    fn child_storage(&self, key: NameKey, mode: AccessMode) -> Result<Storage> {
        let mut path = self.path.clone();
        path.push(key);

        let (layer, path) = if mode.is_transacted() {
            (Layer::child(&self.layer, path)?, Vec::new())
        } else {
            (Arc::clone(&self.layer), path)
        };

        Ok(Storage {
            layer,
            path,
            mode,
            is_root: false,
            config: Arc::clone(&self.config),
        })
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Name of this storage (`"Root Entry"` for a root)
    pub fn name(&self) -> Result<String> {
        self.with_node(|node| Ok(node.name.clone()))
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// True when changes are pending in this storage's transaction
    pub fn is_dirty(&self) -> bool {
        self.mode.is_transacted() && self.layer.lock().is_dirty()
    }

    /// Backing file of a root storage
    pub fn file_path(&self) -> Option<PathBuf> {
        if !self.is_root {
            return None;
        }
        self.layer.lock().backing().map(|b| b.path.clone())
    }

    /// Sector size of a root storage's backing file
    pub fn sector_size(&self) -> Option<SectorSize> {
        if !self.is_root {
            return None;
        }
        self.layer.lock().backing().map(|b| b.sector_size)
    }

    /// Fresh statistics snapshot of this storage
    pub fn stat(&self) -> Result<ElementStatistics> {
        self.with_node(|node| Ok(ElementStatistics::of_storage(node, Some(self.mode))))
    }

    pub fn class_id(&self) -> Result<ClassId> {
        self.with_node(|node| Ok(node.class_id))
    }

    pub fn set_class_id(&self, class_id: ClassId) -> Result<()> {
        self.mutate(|node| {
            node.class_id = class_id;
            Ok(())
        })
    }

    pub fn state_bits(&self) -> Result<u32> {
        self.with_node(|node| Ok(node.state_bits))
    }

    /// Replace the bits selected by `mask` with those of `bits`
    pub fn set_state_bits(&self, bits: u32, mask: u32) -> Result<()> {
        self.mutate(|node| {
            node.state_bits = (node.state_bits & !mask) | (bits & mask);
            Ok(())
        })
    }

    /// Does a child named `name` exist (case-insensitively)?
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.element_kind(name)?.is_some())
    }

    pub fn element_kind(&self, name: &str) -> Result<Option<ElementKind>> {
        let key = NameKey::parse(name)?;
        self.with_node(|node| Ok(node.children.get(&key).map(Element::kind)))
    }

    // =========================================================================
    // Child Storages
    // =========================================================================

    /// Create a child storage
    ///
    /// With the default `FailIfExists` creation an existing element of the
    /// same name (compared case-insensitively) fails with `DuplicateName`.
    pub fn create_storage(&self, name: &str, mode: AccessMode) -> Result<Storage> {
        let key = NameKey::parse(name)?;
        mode.validate(ModeTarget::Storage, ModeOperation::Create)?;
        self.mode.check_child_intent(&mode, name)?;

        let creation = mode.creation();
        self.mutate(|node| {
            if let Some(existing) = node.children.get(&key) {
                match creation {
                    Creation::FailIfExists | Creation::OpenExisting => {
                        return Err(StrataError::DuplicateName(name.to_string()))
                    }
                    Creation::CreateOrOpen if existing.kind() == ElementKind::Storage => {
                        return Ok(())
                    }
                    Creation::CreateOrOpen => return Err(wrong_kind(name, ElementKind::Storage)),
                    Creation::CreateNew => {}
                }
            }
            node.children
                .insert(key.clone(), Element::Storage(StorageNode::new(name)));
            node.times.touch();
            Ok(())
        })?;

        debug!(name, mode = %mode, "storage created");
        self.child_storage(key, mode)
    }

    /// Open an existing child storage
    pub fn open_storage(&self, name: &str, mode: AccessMode) -> Result<Storage> {
        let key = NameKey::parse(name)?;
        mode.validate(ModeTarget::Storage, ModeOperation::Open)?;
        self.mode.check_child_intent(&mode, name)?;

        self.with_node(|node| match node.element(name, &key)? {
            Element::Storage(_) => Ok(()),
            Element::Stream(_) => Err(wrong_kind(name, ElementKind::Storage)),
        })?;
        self.child_storage(key, mode)
    }

    /// Open a child storage with this storage's own mode
    pub fn open_storage_inherit(&self, name: &str) -> Result<Storage> {
        self.open_storage(name, self.mode.with_creation(Creation::OpenExisting))
    }

    // =========================================================================
    // Streams
    // =========================================================================

    /// Create a stream; same naming and duplicate rules as `create_storage`
    pub fn create_stream(&self, name: &str, mode: AccessMode) -> Result<Stream> {
        let key = NameKey::parse(name)?;
        mode.validate(ModeTarget::Stream, ModeOperation::Create)?;
        self.mode.check_child_intent(&mode, name)?;

        let creation = mode.creation();
        self.mutate(|node| {
            if let Some(existing) = node.children.get(&key) {
                match creation {
                    Creation::FailIfExists | Creation::OpenExisting => {
                        return Err(StrataError::DuplicateName(name.to_string()))
                    }
                    Creation::CreateOrOpen if existing.kind() == ElementKind::Stream => {
                        return Ok(())
                    }
                    Creation::CreateOrOpen => return Err(wrong_kind(name, ElementKind::Stream)),
                    Creation::CreateNew => {}
                }
            }
            node.children
                .insert(key.clone(), Element::Stream(StreamNode::new(name)));
            node.times.touch();
            Ok(())
        })?;

        debug!(name, "stream created");
        let name = self.with_node(|node| Ok(node.element(name, &key)?.name().to_string()))?;
        Ok(Stream::new(
            Arc::clone(&self.layer),
            self.path.clone(),
            key,
            name,
            mode,
        ))
    }

    /// Open an existing stream
    pub fn open_stream(&self, name: &str, mode: AccessMode) -> Result<Stream> {
        let key = NameKey::parse(name)?;
        mode.validate(ModeTarget::Stream, ModeOperation::Open)?;
        self.mode.check_child_intent(&mode, name)?;

        let stored = self.with_node(|node| Ok(node.stream(name, &key)?.name.clone()))?;
        Ok(Stream::new(
            Arc::clone(&self.layer),
            self.path.clone(),
            key,
            stored,
            mode,
        ))
    }

    // =========================================================================
    // Element Management
    // =========================================================================

    /// Remove a child stream, or a child storage with all its descendants
    pub fn destroy_element(&self, name: &str) -> Result<()> {
        let key = NameKey::parse(name)?;
        let removed = self.mutate(|node| {
            let removed = node
                .children
                .remove(&key)
                .ok_or_else(|| StrataError::NotFound(format!("element {:?}", name)))?;
            node.times.touch();
            Ok(removed)
        })?;
        debug!(name, kind = %removed.kind(), "element destroyed");
        Ok(())
    }

    pub fn rename_element(&self, old_name: &str, new_name: &str) -> Result<()> {
        let old_key = NameKey::parse(old_name)?;
        let new_key = NameKey::parse(new_name)?;

        self.mutate(|node| {
            if !node.children.contains_key(&old_key) {
                return Err(StrataError::NotFound(format!("element {:?}", old_name)));
            }
            if new_key != old_key && node.children.contains_key(&new_key) {
                return Err(StrataError::DuplicateName(new_name.to_string()));
            }
            if let Some(mut element) = node.children.remove(&old_key) {
                element.rename(new_name);
                node.children.insert(new_key, element);
            }
            node.times.touch();
            Ok(())
        })?;
        debug!(old_name, new_name, "element renamed");
        Ok(())
    }

    /// Move (or, with `copy`, duplicate) the child `name` into `destination`
    /// under `new_name`, carrying its whole subtree
    ///
    /// Copying an element onto itself (same storage, same name) is a caller
    /// contract violation; the result is unspecified. Moving a storage into
    /// its own subtree fails with `InvalidOperation`.
    pub fn move_element_to(
        &self,
        name: &str,
        destination: &Storage,
        new_name: &str,
        copy: bool,
    ) -> Result<()> {
        let key = NameKey::parse(name)?;
        let new_key = NameKey::parse(new_name)?;
        destination.require_writable()?;
        if !copy {
            self.require_writable()?;
        }

        let mut source_path = self.path.clone();
        source_path.push(key.clone());

        if !copy
            && Layer::lies_within(
                &destination.layer,
                &destination.path,
                &self.layer,
                &source_path,
            )
        {
            return Err(StrataError::InvalidOperation(format!(
                "cannot move {:?} into its own subtree",
                name
            )));
        }

        if Arc::ptr_eq(&self.layer, &destination.layer) {
            let parent_path = &self.path;
            let dest_path = &destination.path;
            self.layer.lock().mutate(|root| {
                let mut element = root.descend(parent_path)?.element(name, &key)?.clone();
                let dest = root.descend_mut(dest_path)?;
                if dest.children.contains_key(&new_key) {
                    return Err(StrataError::DuplicateName(new_name.to_string()));
                }
                element.rename(new_name);
                dest.children.insert(new_key.clone(), element);
                dest.times.touch();
                if !copy {
                    let source = root.descend_mut(parent_path)?;
                    source.children.remove(&key);
                    source.times.touch();
                }
                Ok(())
            })?;
        } else {
            let mut element = self.with_node(|node| Ok(node.element(name, &key)?.clone()))?;
            element.rename(new_name);
            destination.mutate(|dest| {
                if dest.children.contains_key(&new_key) {
                    return Err(StrataError::DuplicateName(new_name.to_string()));
                }
                dest.children.insert(new_key.clone(), element);
                dest.times.touch();
                Ok(())
            })?;
            if !copy {
                self.mutate(|node| {
                    node.children.remove(&key);
                    node.times.touch();
                    Ok(())
                })?;
            }
        }

        debug!(name, new_name, copy, "element moved");
        Ok(())
    }

    /// Set timestamps of the child `name`, or of this storage when `None`
    ///
    /// `None` fields of `times` are left unchanged.
    pub fn set_element_times(&self, name: Option<&str>, times: ElementTimes) -> Result<()> {
        let key = name.map(NameKey::parse).transpose()?;
        self.mutate(|node| {
            match (&key, name) {
                (Some(key), Some(name)) => node
                    .children
                    .get_mut(key)
                    .ok_or_else(|| StrataError::NotFound(format!("element {:?}", name)))?
                    .times_mut()
                    .update(times),
                _ => node.times.update(times),
            }
            Ok(())
        })
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    /// Paged enumerator over this storage's children
    pub fn enumerator(&self) -> ElementEnumerator {
        ElementEnumerator::new(Arc::clone(&self.layer), self.path.clone())
    }

    /// Lazy sequence of all children
    pub fn elements(&self) -> Elements {
        Batched::new(self.enumerator(), self.config.enumeration_batch)
    }

    /// Lazy sequence of child storages
    pub fn storages(&self) -> impl Iterator<Item = Result<ElementStatistics>> {
        self.elements()
            .filter(|item| item.as_ref().map_or(true, ElementStatistics::is_storage))
    }

    /// Lazy sequence of child streams
    pub fn streams(&self) -> impl Iterator<Item = Result<ElementStatistics>> {
        self.elements()
            .filter(|item| item.as_ref().map_or(true, ElementStatistics::is_stream))
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Publish pending changes
    ///
    /// A transacted child publishes into its parent; a transacted root
    /// publishes to the backing file. Direct storages have nothing pending,
    /// so this is a no-op for them.
    pub fn commit(&self, conditions: CommitConditions) -> Result<()> {
        if !self.mode.is_transacted() {
            return Ok(());
        }
        self.layer.lock().commit(conditions)
    }

    /// Discard changes since the last commit; a no-op for direct storages
    ///
    /// Transacted storages opened beneath this one are invalidated: later
    /// calls on them, and on streams or property sets opened through them,
    /// fail with `InvalidOperation`.
    pub fn revert(&self) -> Result<()> {
        if self.mode.is_transacted() {
            self.layer.lock().revert();
        }
        Ok(())
    }

    /// Deep-copy this storage's committed content into `destination`
    ///
    /// Children, property sets and the class id are copied; same-named
    /// entries already in `destination` are replaced.
    pub fn copy_to(&self, destination: &Storage) -> Result<()> {
        destination.require_writable()?;
        let source = {
            let layer = self.layer.lock();
            let view = if self.path.is_empty() {
                layer.committed_view()?
            } else {
                layer.tree()?
            };
            view.descend(&self.path)?.clone()
        };
        destination.mutate(|node| {
            node.absorb(&source);
            Ok(())
        })?;
        debug!(elements = source.descendant_count(), "storage copied");
        Ok(())
    }

    /// Copy the committed content to `path` (or an auto-named temp file) and
    /// rebind this root to it; later commits land in the new file and the
    /// old file is left untouched
    pub fn switch_to_file(&self, path: Option<&Path>) -> Result<PathBuf> {
        if !self.is_root {
            return Err(StrataError::InvalidOperation(
                "only a root storage can switch files".to_string(),
            ));
        }
        let target = match path {
            Some(path) => path.to_path_buf(),
            None => root::temp_path(&self.config)?,
        };
        let lease = RootLease::acquire(&target, &self.mode, self.config.max_shared_roots)?;
        self.layer.lock().switch_to(&target, lease)?;
        Ok(target)
    }

    // =========================================================================
    // Property Sets
    // =========================================================================

    /// Attach a new property set; fails `AlreadyExists` if `format_id` is
    /// already attached (unless the mode asks for `CreateNew`/`CreateOrOpen`)
    pub fn create_property_set(
        &self,
        format_id: FormatId,
        flags: PropertySetFlags,
        mode: AccessMode,
    ) -> Result<PropertySet> {
        mode.validate(ModeTarget::PropertySet, ModeOperation::Create)?;
        self.mode.check_child_intent(&mode, &format_id.to_string())?;

        let creation = mode.creation();
        self.mutate(|node| {
            if node.property_sets.contains_key(&format_id) {
                match creation {
                    Creation::CreateOrOpen => return Ok(()),
                    Creation::CreateNew => {}
                    _ => {
                        return Err(StrataError::AlreadyExists(format!(
                            "property set {}",
                            format_id
                        )))
                    }
                }
            }
            node.property_sets
                .insert(format_id, PropertySetData::new(format_id, flags));
            node.times.touch();
            Ok(())
        })?;

        debug!(%format_id, "property set created");
        PropertySet::open(Arc::clone(&self.layer), self.path.clone(), format_id, mode)
    }

    /// Open an attached property set; `NotFound` if absent
    pub fn open_property_set(&self, format_id: FormatId, mode: AccessMode) -> Result<PropertySet> {
        mode.validate(ModeTarget::PropertySet, ModeOperation::Open)?;
        self.mode.check_child_intent(&mode, &format_id.to_string())?;
        PropertySet::open(Arc::clone(&self.layer), self.path.clone(), format_id, mode)
    }

    /// Like `open_property_set`, but a missing set is `Ok(None)`
    pub fn try_open_property_set(
        &self,
        format_id: FormatId,
        mode: AccessMode,
    ) -> Result<Option<PropertySet>> {
        match self.open_property_set(format_id, mode) {
            Ok(set) => Ok(Some(set)),
            Err(StrataError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove a property set with all its properties
    pub fn delete_property_set(&self, format_id: FormatId) -> Result<()> {
        self.mutate(|node| {
            node.property_sets
                .remove(&format_id)
                .ok_or_else(|| StrataError::NotFound(format!("property set {}", format_id)))?;
            node.times.touch();
            Ok(())
        })?;
        debug!(%format_id, "property set deleted");
        Ok(())
    }

    /// Paged enumerator over attached property sets
    pub fn property_set_enumerator(&self) -> PropertySetEnumerator {
        PropertySetEnumerator::new(Arc::clone(&self.layer), self.path.clone())
    }

    /// Lazy sequence of attached property sets
    pub fn property_sets(&self) -> PropertySets {
        Batched::new(self.property_set_enumerator(), self.config.enumeration_batch)
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("is_root", &self.is_root)
            .finish()
    }
}
