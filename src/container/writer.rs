//! Container Writer
//!
//! Serializes a committed tree into a new container file and swaps it in
//! place of the old one.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, StrataError};
use crate::tree::StorageNode;

use super::{ContainerHeader, SectorSize, HEADER_SIZE};

/// Writes whole container files
pub(crate) struct ContainerWriter;

impl ContainerWriter {
    /// Write `root` to `path` as generation `generation`
    ///
    /// The bytes go to a temporary sibling first and are renamed over `path`
    /// only once complete, so readers never see a half-written file.
    /// Returns the size of the file written.
    pub fn write(
        path: &Path,
        root: &StorageNode,
        sector_size: SectorSize,
        generation: u64,
        sync: bool,
    ) -> Result<u64> {
        let payload = bincode::serialize(root)?;
        let payload_len = payload.len() as u64;

        let file_size = sector_size.bytes() + sector_size.pad(payload_len);
        if let Some(limit) = sector_size.file_limit() {
            if file_size > limit {
                return Err(StrataError::CapacityExceeded {
                    size: file_size,
                    limit,
                });
            }
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let header = ContainerHeader {
            sector_size,
            generation,
            payload_len,
            payload_crc: hasher.finalize(),
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)?;

        {
            let mut writer = BufWriter::new(temp.as_file());

            // Header sector
            writer.write_all(&header.encode())?;
            writer.write_all(&vec![0u8; sector_size.bytes() as usize - HEADER_SIZE])?;

            // Payload sectors
            writer.write_all(&payload)?;
            let padding = sector_size.pad(payload_len) - payload_len;
            writer.write_all(&vec![0u8; padding as usize])?;

            writer.flush()?;
        }

        if sync {
            temp.as_file().sync_all()?;
        }
        temp.persist(path).map_err(|e| StrataError::Io(e.error))?;

        debug!(
            path = %path.display(),
            generation,
            file_size,
            "container written"
        );

        Ok(file_size)
    }

    /// Create an empty container holding only a root storage
    pub fn create_empty(path: &Path, sector_size: SectorSize, sync: bool) -> Result<StorageNode> {
        let root = StorageNode::new(crate::tree::ROOT_NAME);
        Self::write(path, &root, sector_size, 1, sync)?;
        Ok(root)
    }
}
