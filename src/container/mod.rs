//! Container Module
//!
//! The single backing file a root storage is bound to.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header sector (512 or 4096 bytes)                       │
//! │   Magic: "STRA" (4) | Version: u16 (2)                  │
//! │   SectorShift: u16 (2) | Generation: u64 (8)            │
//! │   PayloadLen: u64 (8) | PayloadCRC: u32 (4)             │
//! │   ... zero padding to the end of the sector ...         │
//! ├─────────────────────────────────────────────────────────┤
//! │ Payload sectors                                         │
//! │   bincode(StorageNode "Root Entry")                     │
//! │   ... zero padding to a whole number of sectors ...     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write replaces the whole file atomically (temp file + rename), so a
//! failure part-way leaves the previous committed content in place.

mod reader;
mod registry;
mod writer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

pub(crate) use reader::ContainerReader;
pub(crate) use registry::RootLease;
pub(crate) use writer::ContainerWriter;

// =============================================================================
// Shared Constants (used by writer and reader)
// =============================================================================

/// Magic bytes identifying a Strata container file
pub(crate) const MAGIC: &[u8; 4] = b"STRA";

/// Current container format version
pub(crate) const VERSION: u16 = 1;

/// Header fields: Magic (4) + Version (2) + SectorShift (2) + Generation (8)
/// + PayloadLen (8) + PayloadCRC (4) = 28 bytes
pub(crate) const HEADER_SIZE: usize = 28;

/// Largest file a 512-byte-sector container may grow to (2 GiB)
pub const SMALL_SECTOR_FILE_LIMIT: u64 = 2 * 1024 * 1024 * 1024;

// =============================================================================
// Sector Size
// =============================================================================

/// Sector size of a container, fixed for the life of the file
///
/// - `Small` (512): file size capped at 2 GiB; enumeration slows down once a
///   directory holds a few thousand elements
/// - `Large` (4096): bounded only by the host filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectorSize {
    Small,
    Large,
}

impl SectorSize {
    pub fn bytes(self) -> u64 {
        match self {
            SectorSize::Small => 512,
            SectorSize::Large => 4096,
        }
    }

    pub(crate) fn shift(self) -> u16 {
        match self {
            SectorSize::Small => 9,
            SectorSize::Large => 12,
        }
    }

    pub(crate) fn from_shift(shift: u16) -> Option<Self> {
        match shift {
            9 => Some(SectorSize::Small),
            12 => Some(SectorSize::Large),
            _ => None,
        }
    }

    /// Total file size ceiling, if the sector size imposes one
    pub fn file_limit(self) -> Option<u64> {
        match self {
            SectorSize::Small => Some(SMALL_SECTOR_FILE_LIMIT),
            SectorSize::Large => None,
        }
    }

    /// Round `len` up to a whole number of sectors
    pub(crate) fn pad(self, len: u64) -> u64 {
        let sector = self.bytes();
        len.div_ceil(sector) * sector
    }
}

impl TryFrom<u32> for SectorSize {
    type Error = StrataError;

    fn try_from(bytes: u32) -> Result<Self> {
        match bytes {
            512 => Ok(SectorSize::Small),
            4096 => Ok(SectorSize::Large),
            other => Err(StrataError::InvalidArgument(format!(
                "sector size must be 512 or 4096, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SectorSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

// =============================================================================
// Header
// =============================================================================

/// Decoded container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContainerHeader {
    pub sector_size: SectorSize,
    pub generation: u64,
    pub payload_len: u64,
    pub payload_crc: u32,
}

impl ContainerHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(MAGIC);
        out[4..6].copy_from_slice(&VERSION.to_le_bytes());
        out[6..8].copy_from_slice(&self.sector_size.shift().to_le_bytes());
        out[8..16].copy_from_slice(&self.generation.to_le_bytes());
        out[16..24].copy_from_slice(&self.payload_len.to_le_bytes());
        out[24..28].copy_from_slice(&self.payload_crc.to_le_bytes());
        out
    }

    /// Decode a header
    ///
    /// Returns `Ok(None)` when the bytes do not start with the container
    /// signature, and `Corrupted` when the signature matches but the rest of
    /// the header is unusable.
    pub fn decode(bytes: &[u8]) -> Result<Option<Self>> {
        if bytes.len() < MAGIC.len() || &bytes[0..4] != MAGIC {
            return Ok(None);
        }
        if bytes.len() < HEADER_SIZE {
            return Err(StrataError::Corrupted("truncated container header".to_string()));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(StrataError::Corrupted(format!(
                "unsupported container version: {}",
                version
            )));
        }

        let shift = u16::from_le_bytes([bytes[6], bytes[7]]);
        let sector_size = SectorSize::from_shift(shift).ok_or_else(|| {
            StrataError::Corrupted(format!("invalid sector shift: {}", shift))
        })?;

        Ok(Some(Self {
            sector_size,
            generation: read_u64(&bytes[8..16]),
            payload_len: read_u64(&bytes[16..24]),
            payload_crc: u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
        }))
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
