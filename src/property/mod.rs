//! Property Set Module
//!
//! Typed key/value metadata dictionaries attached to storages.
//!
//! ## Responsibilities
//! - Keep one dictionary per format identifier on a storage
//! - Two independent keyspaces: numeric ids and string names
//! - Enforce the simple / non-simple value restriction
//! - Case-insensitive name keys unless the set was created case-sensitive
//!
//! ## Layout
//! ```text
//! PropertySetData (FormatId)
//!   ├── class_id, flags, times
//!   ├── by_id:   u32            → PropertyValue
//!   └── by_name: folded name    → (original name, PropertyValue)
//! ```

mod enumerator;
mod set;
mod value;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StrataError};
use crate::stats::PropertyStatistics;
use crate::tree::{ClassId, ElementTimes, FormatId};

pub use enumerator::{PropertySetEnumerator, PropertySets};
pub use set::PropertySet;
pub use value::{unix_time, FromPropertyValue, PropertyValue, ValueKind};

/// Key of a property: numeric id or string name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKey {
    Id(u32),
    Name(String),
}

impl From<u32> for PropertyKey {
    fn from(id: u32) -> Self {
        PropertyKey::Id(id)
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::Name(name.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        PropertyKey::Name(name)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Id(id) => write!(f, "#{}", id),
            PropertyKey::Name(name) => f.write_str(name),
        }
    }
}

/// Creation characteristics of a property set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertySetFlags {
    /// Name keys compare case-sensitively
    pub case_sensitive: bool,
    /// Allows multi-valued (`Vector`) properties
    pub non_simple: bool,
}

impl PropertySetFlags {
    pub const SIMPLE: PropertySetFlags = PropertySetFlags {
        case_sensitive: false,
        non_simple: false,
    };

    pub const NON_SIMPLE: PropertySetFlags = PropertySetFlags {
        case_sensitive: false,
        non_simple: true,
    };

    pub const fn case_sensitive(self) -> Self {
        Self {
            case_sensitive: true,
            ..self
        }
    }
}

/// A property read back from a set
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: PropertyKey,
    pub value: PropertyValue,
}

impl Property {
    /// Read the value as `T`; see [`FromPropertyValue`]
    pub fn get<T: FromPropertyValue>(&self) -> Result<T> {
        self.value.get()
    }
}

/// Stored contents of one property set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PropertySetData {
    pub format_id: FormatId,
    pub class_id: ClassId,
    pub flags: PropertySetFlags,
    pub times: ElementTimes,
    by_id: BTreeMap<u32, PropertyValue>,
    by_name: BTreeMap<String, (String, PropertyValue)>,
}

impl PropertySetData {
    pub fn new(format_id: FormatId, flags: PropertySetFlags) -> Self {
        Self {
            format_id,
            class_id: Uuid::nil(),
            flags,
            times: ElementTimes::created_now(),
            by_id: BTreeMap::new(),
            by_name: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len() + self.by_name.len()
    }

    fn fold(&self, name: &str) -> String {
        if self.flags.case_sensitive {
            name.to_string()
        } else {
            name.to_uppercase()
        }
    }

    pub fn get(&self, key: &PropertyKey) -> Option<Property> {
        match key {
            PropertyKey::Id(id) => self.by_id.get(id).map(|value| Property {
                key: key.clone(),
                value: value.clone(),
            }),
            PropertyKey::Name(name) => {
                self.by_name
                    .get(&self.fold(name))
                    .map(|(original, value)| Property {
                        key: PropertyKey::Name(original.clone()),
                        value: value.clone(),
                    })
            }
        }
    }

    /// Validate and store a value
    pub fn set(&mut self, key: PropertyKey, value: PropertyValue) -> Result<()> {
        if !self.flags.non_simple && !value.is_simple() {
            return Err(StrataError::InvalidArgument(format!(
                "property {}: a simple property set cannot hold a {} value",
                key,
                value.kind().name()
            )));
        }
        match key {
            PropertyKey::Id(id) => {
                self.by_id.insert(id, value);
            }
            PropertyKey::Name(name) => {
                if name.is_empty() {
                    return Err(StrataError::InvalidArgument(
                        "property name is empty".to_string(),
                    ));
                }
                let folded = self.fold(&name);
                self.by_name.insert(folded, (name, value));
            }
        }
        self.times.touch();
        Ok(())
    }

    pub fn remove(&mut self, key: &PropertyKey) -> bool {
        let removed = match key {
            PropertyKey::Id(id) => self.by_id.remove(id).is_some(),
            PropertyKey::Name(name) => {
                let folded = self.fold(name);
                self.by_name.remove(&folded).is_some()
            }
        };
        if removed {
            self.times.touch();
        }
        removed
    }

    /// Id-keyed properties in id order, then name-keyed ones in name order
    pub fn properties(&self) -> Vec<PropertyStatistics> {
        let ids = self.by_id.iter().map(|(id, value)| PropertyStatistics {
            key: PropertyKey::Id(*id),
            kind: value.kind(),
        });
        let names = self.by_name.values().map(|(name, value)| PropertyStatistics {
            key: PropertyKey::Name(name.clone()),
            kind: value.kind(),
        });
        ids.chain(names).collect()
    }
}
