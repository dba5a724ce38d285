//! Root Files
//!
//! [`RootFile`] binds root storages to container files on disk: creating new
//! containers, opening existing ones and probing foreign files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::container::{ContainerReader, ContainerWriter, RootLease, SectorSize};
use crate::error::{Result, StrataError};
use crate::mode::{AccessMode, Creation, ModeOperation, ModeTarget};
use crate::tree::StorageNode;

use super::{Backing, Layer, Storage};

/// Auto-named, kept (not deleted on drop) file under the configured temp dir
pub(super) fn temp_path(config: &Config) -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("strata-")
        .suffix(".stg")
        .tempfile_in(&config.temp_dir)?;
    file.into_temp_path()
        .keep()
        .map_err(|e| StrataError::Io(e.error))
}

/// Factory for root storages
///
/// Holds the [`Config`] shared by every root it creates or opens.
#[derive(Debug, Clone, Default)]
pub struct RootFile {
    config: Arc<Config>,
}

impl RootFile {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn bind(&self, tree: StorageNode, mode: AccessMode, backing: Backing) -> Storage {
        let layer = Layer::root(tree, mode.is_transacted(), backing);
        Storage::bind_root(layer, mode, Arc::clone(&self.config))
    }

    /// Create a container file and return its root storage
    ///
    /// `path = None` creates an auto-named file in the configured temp dir.
    /// `sector_size` must be 512 or 4096. An existing file fails with
    /// `AlreadyExists` under `FailIfExists`, is replaced under `CreateNew`
    /// and is opened under `CreateOrOpen`.
    pub fn create(
        &self,
        path: Option<&Path>,
        mode: AccessMode,
        sector_size: u32,
    ) -> Result<Storage> {
        let sector_size = SectorSize::try_from(sector_size)?;
        mode.validate(ModeTarget::Root, ModeOperation::Create)?;

        let path = match path {
            None => temp_path(&self.config)?,
            Some(path) => {
                if path.exists() {
                    match mode.creation() {
                        Creation::CreateOrOpen => {
                            return self.open(path, mode.with_creation(Creation::OpenExisting))
                        }
                        Creation::CreateNew => {}
                        _ => {
                            return Err(StrataError::AlreadyExists(format!(
                                "file {}",
                                path.display()
                            )))
                        }
                    }
                }
                path.to_path_buf()
            }
        };

        let lease = RootLease::acquire(&path, &mode, self.config.max_shared_roots)?;
        let tree = ContainerWriter::create_empty(&path, sector_size, self.config.sync_on_commit)?;
        info!(path = %path.display(), %sector_size, "root created");

        Ok(self.bind(
            tree,
            mode,
            Backing {
                path,
                sector_size,
                generation: 1,
                sync: self.config.sync_on_commit,
                lease,
            },
        ))
    }

    /// `create` with the configured default sector size
    pub fn create_default(&self, path: Option<&Path>, mode: AccessMode) -> Result<Storage> {
        let bytes = self.config.default_sector_size.bytes() as u32;
        self.create(path, mode, bytes)
    }

    /// Open the root storage of an existing container
    ///
    /// Fails `NotFound` for a missing file, `NotAStructuredFile` for a
    /// foreign one, and `SharingViolation` / `TooManyOpenRoots` when the
    /// roots already open on the file do not admit `mode`.
    pub fn open(&self, path: &Path, mode: AccessMode) -> Result<Storage> {
        mode.validate(ModeTarget::Root, ModeOperation::Open)?;
        if !path.exists() {
            return Err(StrataError::NotFound(format!("file {}", path.display())));
        }

        let lease = RootLease::acquire(path, &mode, self.config.max_shared_roots)?;
        let (header, tree) = ContainerReader::load(path)?;
        info!(
            path = %path.display(),
            generation = header.generation,
            elements = tree.descendant_count(),
            "root opened"
        );

        Ok(self.bind(
            tree,
            mode,
            Backing {
                path: path.to_path_buf(),
                sector_size: header.sector_size,
                generation: header.generation,
                sync: self.config.sync_on_commit,
                lease,
            },
        ))
    }

    /// Does `path` carry the container signature?
    ///
    /// `NotFound` if the file does not exist; `Ok(false)` for any other
    /// format, including empty files.
    pub fn is_structured_file(path: &Path) -> Result<bool> {
        ContainerReader::probe(path)
    }

    /// Copy `storage`'s committed content to a new file and rebind it there;
    /// see [`Storage::switch_to_file`]
    pub fn switch_to_file(&self, storage: &Storage, path: Option<&Path>) -> Result<PathBuf> {
        storage.switch_to_file(path)
    }
}
