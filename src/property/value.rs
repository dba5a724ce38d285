//! Property Values
//!
//! A tagged variant covering the scalar types a property set can hold, plus
//! `Vector` for multi-valued properties in non-simple sets.
//!
//! Reading a value as a concrete type goes through [`FromPropertyValue`]:
//! widening always succeeds, narrowing fails with `Overflow`, strings are
//! parsed invariantly and fail with `FormatError`. An integer read as a float
//! must be exactly representable, or it fails with `Overflow` too. Nothing
//! truncates silently.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StrataError};

/// A property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Empty,
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Time(#[serde(with = "crate::tree::timestamp")] SystemTime),
    Guid(Uuid),
    Blob(Vec<u8>),
    /// Multi-valued property; only legal in non-simple property sets
    Vector(Vec<PropertyValue>),
}

/// Type tag of a [`PropertyValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Empty,
    Null,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
    Time,
    Guid,
    Blob,
    Vector,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Empty => "empty",
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::I8 => "i8",
            ValueKind::U8 => "u8",
            ValueKind::I16 => "i16",
            ValueKind::U16 => "u16",
            ValueKind::I32 => "i32",
            ValueKind::U32 => "u32",
            ValueKind::I64 => "i64",
            ValueKind::U64 => "u64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::String => "string",
            ValueKind::Time => "time",
            ValueKind::Guid => "guid",
            ValueKind::Blob => "blob",
            ValueKind::Vector => "vector",
        }
    }
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Empty => ValueKind::Empty,
            PropertyValue::Null => ValueKind::Null,
            PropertyValue::Bool(_) => ValueKind::Bool,
            PropertyValue::I8(_) => ValueKind::I8,
            PropertyValue::U8(_) => ValueKind::U8,
            PropertyValue::I16(_) => ValueKind::I16,
            PropertyValue::U16(_) => ValueKind::U16,
            PropertyValue::I32(_) => ValueKind::I32,
            PropertyValue::U32(_) => ValueKind::U32,
            PropertyValue::I64(_) => ValueKind::I64,
            PropertyValue::U64(_) => ValueKind::U64,
            PropertyValue::F32(_) => ValueKind::F32,
            PropertyValue::F64(_) => ValueKind::F64,
            PropertyValue::String(_) => ValueKind::String,
            PropertyValue::Time(_) => ValueKind::Time,
            PropertyValue::Guid(_) => ValueKind::Guid,
            PropertyValue::Blob(_) => ValueKind::Blob,
            PropertyValue::Vector(_) => ValueKind::Vector,
        }
    }

    pub fn is_empty_or_null(&self) -> bool {
        matches!(self, PropertyValue::Empty | PropertyValue::Null)
    }

    /// True when the value is legal in a simple property set
    pub fn is_simple(&self) -> bool {
        !matches!(self, PropertyValue::Vector(_))
    }

    /// Read this value as `T`, converting where a lossless rule exists
    pub fn get<T: FromPropertyValue>(&self) -> Result<T> {
        T::from_value(self)
    }

    fn integer(&self) -> Option<i128> {
        match *self {
            PropertyValue::I8(v) => Some(v as i128),
            PropertyValue::U8(v) => Some(v as i128),
            PropertyValue::I16(v) => Some(v as i128),
            PropertyValue::U16(v) => Some(v as i128),
            PropertyValue::I32(v) => Some(v as i128),
            PropertyValue::U32(v) => Some(v as i128),
            PropertyValue::I64(v) => Some(v as i128),
            PropertyValue::U64(v) => Some(v as i128),
            _ => None,
        }
    }

    fn mismatch(&self, target: &'static str) -> StrataError {
        StrataError::TypeMismatch {
            found: self.kind().name(),
            target,
        }
    }
}

/// Conversion out of a [`PropertyValue`]
pub trait FromPropertyValue: Sized {
    /// Name of the target type, for error messages
    const TARGET: &'static str;

    fn from_value(value: &PropertyValue) -> Result<Self>;
}

macro_rules! integer_target {
    ($($ty:ty),*) => {
        $(
            impl FromPropertyValue for $ty {
                const TARGET: &'static str = stringify!($ty);

                fn from_value(value: &PropertyValue) -> Result<Self> {
                    let wide: i128 = match value {
                        PropertyValue::Bool(b) => *b as i128,
                        PropertyValue::F32(f) => exact_integer(*f as f64, Self::TARGET)?,
                        PropertyValue::F64(f) => exact_integer(*f, Self::TARGET)?,
                        PropertyValue::String(s) => {
                            s.trim().parse::<i128>().map_err(|_| StrataError::FormatError {
                                value: s.clone(),
                                target: Self::TARGET,
                            })?
                        }
                        other => other.integer().ok_or_else(|| other.mismatch(Self::TARGET))?,
                    };
                    <$ty>::try_from(wide).map_err(|_| StrataError::Overflow {
                        value: wide.to_string(),
                        target: Self::TARGET,
                    })
                }
            }
        )*
    };
}

integer_target!(i8, u8, i16, u16, i32, u32, i64, u64);

/// Floats convert to integers only when they hold an integral value
fn exact_integer(f: f64, target: &'static str) -> Result<i128> {
    if !f.is_finite() || f.fract() != 0.0 || f.abs() > i128::MAX as f64 {
        return Err(StrataError::Overflow {
            value: f.to_string(),
            target,
        });
    }
    Ok(f as i128)
}

impl FromPropertyValue for f64 {
    const TARGET: &'static str = "f64";

    fn from_value(value: &PropertyValue) -> Result<Self> {
        match value {
            PropertyValue::F32(f) => Ok(*f as f64),
            PropertyValue::F64(f) => Ok(*f),
            PropertyValue::String(s) => s.trim().parse().map_err(|_| StrataError::FormatError {
                value: s.clone(),
                target: Self::TARGET,
            }),
            other => {
                let i = other.integer().ok_or_else(|| other.mismatch(Self::TARGET))?;
                let f = i as f64;
                if f as i128 != i {
                    return Err(inexact(i, Self::TARGET));
                }
                Ok(f)
            }
        }
    }
}

/// Integers convert to floats only when the float holds them exactly
fn inexact(i: i128, target: &'static str) -> StrataError {
    StrataError::Overflow {
        value: i.to_string(),
        target,
    }
}

impl FromPropertyValue for f32 {
    const TARGET: &'static str = "f32";

    fn from_value(value: &PropertyValue) -> Result<Self> {
        if let PropertyValue::F32(f) = value {
            return Ok(*f);
        }
        if let Some(i) = value.integer() {
            let f = i as f32;
            if f as i128 != i {
                return Err(inexact(i, Self::TARGET));
            }
            return Ok(f);
        }
        let wide = f64::from_value(value).map_err(|e| match e {
            StrataError::FormatError { value, .. } => StrataError::FormatError {
                value,
                target: Self::TARGET,
            },
            StrataError::TypeMismatch { found, .. } => StrataError::TypeMismatch {
                found,
                target: Self::TARGET,
            },
            other => other,
        })?;
        if wide.is_finite() && wide.abs() > f32::MAX as f64 {
            return Err(StrataError::Overflow {
                value: wide.to_string(),
                target: Self::TARGET,
            });
        }
        Ok(wide as f32)
    }
}

impl FromPropertyValue for bool {
    const TARGET: &'static str = "bool";

    fn from_value(value: &PropertyValue) -> Result<Self> {
        match value {
            PropertyValue::Bool(b) => Ok(*b),
            PropertyValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(StrataError::FormatError {
                    value: s.clone(),
                    target: Self::TARGET,
                }),
            },
            other => match other.integer() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                Some(i) => Err(StrataError::Overflow {
                    value: i.to_string(),
                    target: Self::TARGET,
                }),
                None => Err(other.mismatch(Self::TARGET)),
            },
        }
    }
}

impl FromPropertyValue for String {
    const TARGET: &'static str = "string";

    fn from_value(value: &PropertyValue) -> Result<Self> {
        match value {
            PropertyValue::String(s) => Ok(s.clone()),
            PropertyValue::Empty
            | PropertyValue::Null
            | PropertyValue::Blob(_)
            | PropertyValue::Vector(_) => Err(value.mismatch(Self::TARGET)),
            scalar => Ok(scalar.to_string()),
        }
    }
}

impl FromPropertyValue for Uuid {
    const TARGET: &'static str = "guid";

    fn from_value(value: &PropertyValue) -> Result<Self> {
        match value {
            PropertyValue::Guid(g) => Ok(*g),
            PropertyValue::String(s) => {
                Uuid::parse_str(s.trim()).map_err(|_| StrataError::FormatError {
                    value: s.clone(),
                    target: Self::TARGET,
                })
            }
            other => Err(other.mismatch(Self::TARGET)),
        }
    }
}

impl FromPropertyValue for SystemTime {
    const TARGET: &'static str = "time";

    fn from_value(value: &PropertyValue) -> Result<Self> {
        match value {
            PropertyValue::Time(t) => Ok(*t),
            other => Err(other.mismatch(Self::TARGET)),
        }
    }
}

impl FromPropertyValue for Vec<u8> {
    const TARGET: &'static str = "blob";

    fn from_value(value: &PropertyValue) -> Result<Self> {
        match value {
            PropertyValue::Blob(b) => Ok(b.clone()),
            other => Err(other.mismatch(Self::TARGET)),
        }
    }
}

impl FromPropertyValue for PropertyValue {
    const TARGET: &'static str = "value";

    fn from_value(value: &PropertyValue) -> Result<Self> {
        Ok(value.clone())
    }
}

// =============================================================================
// Conversions Into PropertyValue
// =============================================================================

macro_rules! from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(v: $ty) -> Self {
                    PropertyValue::$variant(v)
                }
            }
        )*
    };
}

from_scalar!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    SystemTime => Time,
    Uuid => Guid,
    Vec<u8> => Blob,
    Vec<PropertyValue> => Vector,
);

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<&[u8]> for PropertyValue {
    fn from(v: &[u8]) -> Self {
        PropertyValue::Blob(v.to_vec())
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(PropertyValue::Null)
    }
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Empty => f.write_str("<empty>"),
            PropertyValue::Null => f.write_str("<null>"),
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::I8(v) => write!(f, "{}", v),
            PropertyValue::U8(v) => write!(f, "{}", v),
            PropertyValue::I16(v) => write!(f, "{}", v),
            PropertyValue::U16(v) => write!(f, "{}", v),
            PropertyValue::I32(v) => write!(f, "{}", v),
            PropertyValue::U32(v) => write!(f, "{}", v),
            PropertyValue::I64(v) => write!(f, "{}", v),
            PropertyValue::U64(v) => write!(f, "{}", v),
            // `{:?}` on floats prints the shortest string that round-trips
            PropertyValue::F32(v) => write!(f, "{:?}", v),
            PropertyValue::F64(v) => write!(f, "{:?}", v),
            PropertyValue::String(v) => f.write_str(v),
            PropertyValue::Time(t) => {
                let (sign, d) = match t.duration_since(SystemTime::UNIX_EPOCH) {
                    Ok(d) => ("", d),
                    Err(e) => ("-", e.duration()),
                };
                write!(f, "{}{}.{:09}", sign, d.as_secs(), d.subsec_nanos())
            }
            PropertyValue::Guid(g) => write!(f, "{}", g.hyphenated()),
            PropertyValue::Blob(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            PropertyValue::Vector(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Instant `secs` seconds after the Unix epoch
pub fn unix_time(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}
