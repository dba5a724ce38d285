//! Timestamp Encoding
//!
//! `SystemTime` is stored as signed seconds from the Unix epoch plus a
//! non-negative nanosecond part, so instants before 1970 survive a round
//! trip through the container. Used through `#[serde(with = ...)]`.
//!
//! ```text
//! 1969-12-31T23:59:59.25Z  →  (secs: -1, nanos: 250_000_000)
//! ```

use std::time::{Duration, SystemTime};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Split `t` into floor seconds and the nanoseconds after them
pub(crate) fn to_parts(t: SystemTime) -> Option<(i64, u32)> {
    match t.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(after) => Some((i64::try_from(after.as_secs()).ok()?, after.subsec_nanos())),
        Err(before) => {
            let before = before.duration();
            let secs = i64::try_from(before.as_secs()).ok()?;
            match before.subsec_nanos() {
                0 => Some((-secs, 0)),
                nanos => Some((-secs - 1, NANOS_PER_SEC - nanos)),
            }
        }
    }
}

pub(crate) fn from_parts(secs: i64, nanos: u32) -> Option<SystemTime> {
    if nanos >= NANOS_PER_SEC {
        return None;
    }
    let whole = if secs >= 0 {
        SystemTime::UNIX_EPOCH.checked_add(Duration::from_secs(secs.unsigned_abs()))?
    } else {
        SystemTime::UNIX_EPOCH.checked_sub(Duration::from_secs(secs.unsigned_abs()))?
    };
    whole.checked_add(Duration::from_nanos(u64::from(nanos)))
}

pub fn serialize<S: Serializer>(t: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let parts = to_parts(*t).ok_or_else(|| {
        <S::Error as serde::ser::Error>::custom("timestamp outside the i64 second range")
    })?;
    parts.serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
    let (secs, nanos) = <(i64, u32)>::deserialize(deserializer)?;
    from_parts(secs, nanos).ok_or_else(|| D::Error::custom("timestamp out of range"))
}

/// The same encoding for `Option<SystemTime>`
pub mod option {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Wrapped(#[serde(with = "super")] SystemTime);

    pub fn serialize<S: Serializer>(t: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error> {
        t.map(Wrapped).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SystemTime>, D::Error> {
        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
    }
}
