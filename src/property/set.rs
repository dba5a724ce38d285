//! Property Set Handle

use tracing::debug;

use crate::error::{Result, StrataError};
use crate::mode::AccessMode;
use crate::stats::{PropertySetStatistics, PropertyStatistics};
use crate::storage::SharedLayer;
use crate::tree::{ClassId, FormatId, NameKey};

use super::{Property, PropertyKey, PropertySetData, PropertySetFlags, PropertyValue};

/// An open property set
///
/// A `Direct` handle reads and writes the owning storage's working view.
/// A `Transacted` handle works on a private copy taken at open (or at the
/// last `commit`/`revert`) and publishes it to the storage on `commit`.
pub struct PropertySet {
    layer: SharedLayer,
    /// Path of the owning storage inside `layer`
    path: Vec<NameKey>,
    format_id: FormatId,
    mode: AccessMode,
    pending: Option<PropertySetData>,
}

impl PropertySet {
    pub(crate) fn open(
        layer: SharedLayer,
        path: Vec<NameKey>,
        format_id: FormatId,
        mode: AccessMode,
    ) -> Result<Self> {
        let snapshot = {
            let guard = layer.lock();
            guard
                .tree()?
                .descend(&path)?
                .property_set(&format_id)?
                .clone()
        };
        Ok(Self {
            layer,
            path,
            format_id,
            mode,
            pending: mode.is_transacted().then_some(snapshot),
        })
    }

    fn read<T>(&self, f: impl FnOnce(&PropertySetData) -> T) -> Result<T> {
        if let Some(pending) = &self.pending {
            return Ok(f(pending));
        }
        let layer = self.layer.lock();
        let set = layer
            .tree()?
            .descend(&self.path)?
            .property_set(&self.format_id)?;
        Ok(f(set))
    }

    fn write<T>(&mut self, f: impl FnOnce(&mut PropertySetData) -> Result<T>) -> Result<T> {
        if !self.mode.is_writable() {
            return Err(StrataError::AccessDenied(format!(
                "property set {} was opened read-only",
                self.format_id
            )));
        }
        if let Some(pending) = self.pending.as_mut() {
            return f(pending);
        }
        let path = &self.path;
        let format_id = &self.format_id;
        self.layer.lock().mutate(|root| {
            let set = root.descend_mut(path)?.property_set_mut(format_id)?;
            f(set)
        })
    }

    pub fn format_id(&self) -> FormatId {
        self.format_id
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn flags(&self) -> Result<PropertySetFlags> {
        self.read(|set| set.flags)
    }

    /// Look up a property by id or name; `None` if absent
    pub fn get(&self, key: impl Into<PropertyKey>) -> Result<Option<Property>> {
        let key = key.into();
        self.read(|set| set.get(&key))
    }

    /// Look up a property and convert its value to `T`
    pub fn get_as<T: super::FromPropertyValue>(
        &self,
        key: impl Into<PropertyKey>,
    ) -> Result<Option<T>> {
        self.get(key)?.map(|property| property.get()).transpose()
    }

    /// Insert or replace a property
    ///
    /// A simple set rejects `Vector` values with `InvalidArgument` and is
    /// left unchanged.
    pub fn set(&mut self, key: impl Into<PropertyKey>, value: impl Into<PropertyValue>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        debug!(format_id = %self.format_id, %key, kind = value.kind().name(), "property set");
        self.write(|set| set.set(key, value))
    }

    /// Remove a property, returning whether it existed
    pub fn delete(&mut self, key: impl Into<PropertyKey>) -> Result<bool> {
        let key = key.into();
        self.write(|set| Ok(set.remove(&key)))
    }

    /// Key and type of every property
    pub fn properties(&self) -> Result<Vec<PropertyStatistics>> {
        self.read(PropertySetData::properties)
    }

    pub fn stat(&self) -> Result<PropertySetStatistics> {
        self.read(PropertySetStatistics::of)
    }

    pub fn class_id(&self) -> Result<ClassId> {
        self.read(|set| set.class_id)
    }

    pub fn set_class_id(&mut self, class_id: ClassId) -> Result<()> {
        self.write(|set| {
            set.class_id = class_id;
            set.times.touch();
            Ok(())
        })
    }

    /// Publish a transacted handle's changes to its storage; a no-op for
    /// direct handles
    ///
    /// Fails with `NotFound` if the set was deleted from the storage in the
    /// meantime.
    pub fn commit(&mut self) -> Result<()> {
        let Some(pending) = &self.pending else {
            return Ok(());
        };
        if !self.mode.is_writable() {
            return Ok(());
        }
        let path = &self.path;
        let format_id = self.format_id;
        self.layer.lock().mutate(|root| {
            let slot = root.descend_mut(path)?.property_set_mut(&format_id)?;
            *slot = pending.clone();
            Ok(())
        })?;
        debug!(%format_id, "property set committed");
        Ok(())
    }

    /// Discard a transacted handle's changes; a no-op for direct handles
    pub fn revert(&mut self) -> Result<()> {
        if self.pending.is_none() {
            return Ok(());
        }
        let fresh = {
            let layer = self.layer.lock();
            layer
                .tree()?
                .descend(&self.path)?
                .property_set(&self.format_id)?
                .clone()
        };
        self.pending = Some(fresh);
        Ok(())
    }
}

impl std::fmt::Debug for PropertySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertySet")
            .field("format_id", &self.format_id)
            .field("mode", &self.mode)
            .field("transacted", &self.pending.is_some())
            .finish()
    }
}
