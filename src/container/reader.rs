//! Container Reader
//!
//! Detects container files and loads their committed tree.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, StrataError};
use crate::tree::StorageNode;

use super::{ContainerHeader, HEADER_SIZE};

/// Reads container files
pub(crate) struct ContainerReader;

impl ContainerReader {
    /// Open `path`, mapping a missing file to `NotFound`
    fn open_file(path: &Path) -> Result<File> {
        File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                StrataError::NotFound(format!("file {}", path.display()))
            }
            _ => StrataError::Io(e),
        })
    }

    /// Read as much of the header as the file holds
    fn read_header_bytes(file: &mut File) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        file.take(HEADER_SIZE as u64).read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Does `path` carry the container signature?
    ///
    /// A missing file is an error; a file with some other format is `false`.
    pub fn probe(path: &Path) -> Result<bool> {
        let mut file = Self::open_file(path)?;
        let bytes = Self::read_header_bytes(&mut file)?;
        Ok(!bytes.is_empty() && ContainerHeader::decode(&bytes).map_or(true, |h| h.is_some()))
    }

    /// Read only the header (used to check the on-disk generation)
    pub fn read_header(path: &Path) -> Result<ContainerHeader> {
        let mut file = Self::open_file(path)?;
        let bytes = Self::read_header_bytes(&mut file)?;
        ContainerHeader::decode(&bytes)?
            .ok_or_else(|| StrataError::NotAStructuredFile(path.to_path_buf()))
    }

    /// Load the header and the committed tree, verifying the payload CRC
    pub fn load(path: &Path) -> Result<(ContainerHeader, StorageNode)> {
        let mut file = Self::open_file(path)?;
        let file_size = file.metadata()?.len();

        let bytes = Self::read_header_bytes(&mut file)?;
        let header = ContainerHeader::decode(&bytes)?
            .ok_or_else(|| StrataError::NotAStructuredFile(path.to_path_buf()))?;

        let payload_start = header.sector_size.bytes();
        if payload_start + header.payload_len > file_size {
            return Err(StrataError::Corrupted(format!(
                "payload of {} bytes runs past the end of a {} byte file",
                header.payload_len, file_size
            )));
        }

        file.seek(SeekFrom::Start(payload_start))?;
        let mut payload = vec![0u8; header.payload_len as usize];
        BufReader::new(file).read_exact(&mut payload)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();
        if crc != header.payload_crc {
            return Err(StrataError::Corrupted(format!(
                "payload checksum mismatch: expected {:08x}, got {:08x}",
                header.payload_crc, crc
            )));
        }

        let root: StorageNode = bincode::deserialize(&payload)
            .map_err(|e| StrataError::Corrupted(format!("undecodable payload: {}", e)))?;

        Ok((header, root))
    }
}
