//! Stream Handle
//!
//! Byte content leaves of the tree with a seekable cursor.
//!
//! A stream always lives in the transaction layer of the storage it was
//! opened from: writes through a stream of a transacted storage become
//! visible to the parent only when that storage commits.

use std::io::{self, SeekFrom};

use tracing::debug;

use crate::error::{Result, StrataError};
use crate::mode::AccessMode;
use crate::stats::ElementStatistics;
use crate::storage::SharedLayer;
use crate::tree::{NameKey, StreamNode};

/// An open stream with its own position
pub struct Stream {
    layer: SharedLayer,
    /// Path of the owning storage inside `layer`
    parent: Vec<NameKey>,
    key: NameKey,
    name: String,
    mode: AccessMode,
    position: u64,
}

impl Stream {
    pub(crate) fn new(
        layer: SharedLayer,
        parent: Vec<NameKey>,
        key: NameKey,
        name: String,
        mode: AccessMode,
    ) -> Self {
        Self {
            layer,
            parent,
            key,
            name,
            mode,
            position: 0,
        }
    }

    fn with_node<T>(&self, f: impl FnOnce(&StreamNode) -> T) -> Result<T> {
        let layer = self.layer.lock();
        let node = layer.tree()?.descend(&self.parent)?.stream(&self.name, &self.key)?;
        Ok(f(node))
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut StreamNode) -> T) -> Result<T> {
        if !self.mode.is_writable() {
            return Err(StrataError::AccessDenied(format!(
                "stream {:?} was opened read-only",
                self.name
            )));
        }
        let (parent, name, key) = (&self.parent, &self.name, &self.key);
        self.layer.lock().mutate(|root| {
            let node = root.descend_mut(parent)?.stream_mut(name, key)?;
            let out = f(node);
            node.times.touch();
            Ok(out)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Current cursor position
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn len(&self) -> Result<u64> {
        self.with_node(|node| node.data.len() as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read into `buf` from the cursor; returns the number of bytes read,
    /// 0 at or past the end
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let position = self.position;
        let count = self.with_node(|node| {
            let len = node.data.len() as u64;
            if position >= len {
                return 0;
            }
            let start = position as usize;
            let count = buf.len().min(node.data.len() - start);
            buf[..count].copy_from_slice(&node.data[start..start + count]);
            count
        })?;
        self.position += count as u64;
        Ok(count)
    }

    /// Write `buf` at the cursor, growing the stream as needed; a cursor past
    /// the end zero-fills the gap
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let start = usize::try_from(self.position).map_err(|_| {
            StrataError::InvalidArgument(format!("position {} is out of range", self.position))
        })?;
        let end = start.checked_add(buf.len()).ok_or_else(|| {
            StrataError::InvalidArgument("write runs past the addressable range".to_string())
        })?;
        self.mutate(|node| {
            if node.data.len() < end {
                node.data.resize(end, 0);
            }
            node.data[start..end].copy_from_slice(buf);
        })?;
        self.position = end as u64;
        Ok(buf.len())
    }

    /// Move the cursor; seeking before the start is `InvalidArgument`,
    /// seeking past the end is allowed
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len()?.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            StrataError::InvalidArgument(format!("seek to {:?} leaves the stream", pos))
        })?;
        self.position = target;
        Ok(target)
    }

    /// Truncate or zero-extend to `len` bytes; the cursor is not moved
    pub fn set_length(&mut self, len: u64) -> Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| StrataError::InvalidArgument(format!("length {} is out of range", len)))?;
        self.mutate(|node| node.data.resize(len, 0))?;
        debug!(stream = %self.name, len, "stream resized");
        Ok(())
    }

    /// Fresh statistics snapshot of this stream
    pub fn stat(&self) -> Result<ElementStatistics> {
        let mode = self.mode;
        self.with_node(|node| ElementStatistics::of_stream(node, Some(mode)))
    }

    /// Copy up to `count` bytes from this stream's cursor to `destination`'s
    /// cursor, advancing both; returns `(bytes_read, bytes_written)`
    pub fn copy_to(&mut self, destination: &mut Stream, count: u64) -> Result<(u64, u64)> {
        let available = self.len()?.saturating_sub(self.position);
        let wanted = usize::try_from(count.min(available)).map_err(|_| {
            StrataError::InvalidArgument(format!("copy of {} bytes is out of range", count))
        })?;
        let mut buf = vec![0u8; wanted];
        let read = self.read(&mut buf)?;
        let written = destination.write(&buf[..read])?;
        Ok((read as u64, written as u64))
    }

    /// Streams hold no private buffers; content is in the layer already
    pub fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl io::Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Stream::read(self, buf).map_err(Into::into)
    }
}

impl io::Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Stream::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for Stream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Stream::seek(self, pos).map_err(Into::into)
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("position", &self.position)
            .finish()
    }
}
