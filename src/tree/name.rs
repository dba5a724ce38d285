//! Element Names
//!
//! Names are 1..=31 UTF-16 code units, must not start with a control
//! character in `0x00..=0x1F`, and may not contain `/ \ : !`.
//! Lookup is case-insensitive: every name is folded, one character at a
//! time, to a [`NameKey`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Longest legal element name, in UTF-16 code units
pub const MAX_NAME_LEN: usize = 31;

const RESERVED_CHARS: [char; 4] = ['/', '\\', ':', '!'];

/// Case-folded lookup key for an element name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NameKey(String);

impl NameKey {
    /// Fold a name without validating it
    ///
    /// Folding is per character: a character whose uppercase form is a
    /// single character maps to it, any other character is kept as is. So
    /// `"ß"` and `"SS"` stay distinct names.
    pub fn fold(name: &str) -> Self {
        NameKey(name.chars().map(fold_char).collect())
    }

    /// Validate `name` and fold it
    pub fn parse(name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self::fold(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn fold_char(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

/// Check the naming invariant
pub fn validate_name(name: &str) -> Result<()> {
    let units = name.encode_utf16().count();
    if units == 0 {
        return Err(bad(name, "name is empty"));
    }
    if units > MAX_NAME_LEN {
        return Err(bad(name, "name is longer than 31 UTF-16 code units"));
    }
    if let Some(first) = name.encode_utf16().next() {
        if first < 0x20 {
            return Err(bad(name, "first character is a reserved control character"));
        }
    }
    if name.contains(&RESERVED_CHARS[..]) {
        return Err(bad(name, "name contains one of / \\ : !"));
    }
    Ok(())
}

fn bad(name: &str, reason: &'static str) -> StrataError {
    StrataError::InvalidName {
        name: name.to_string(),
        reason,
    }
}
