//! Configuration for Strata
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::container::SectorSize;

/// Main configuration for a [`RootFile`](crate::RootFile) factory
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Container Configuration
    // -------------------------------------------------------------------------
    /// Sector size used by [`RootFile::create_default`](crate::RootFile::create_default)
    pub default_sector_size: SectorSize,

    /// Directory for auto-named backing files (`path = None` on create and
    /// switch-to-file)
    pub temp_dir: PathBuf,

    /// fsync the replacement file before it is renamed over the old one
    pub sync_on_commit: bool,

    // -------------------------------------------------------------------------
    // Sharing Configuration
    // -------------------------------------------------------------------------
    /// Ceiling on concurrent root opens of one file under `ShareDenyNone`
    pub max_shared_roots: usize,

    // -------------------------------------------------------------------------
    // Enumeration Configuration
    // -------------------------------------------------------------------------
    /// Page size the lazy element/property-set sequences fetch per batch
    pub enumeration_batch: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_sector_size: SectorSize::Large,
            temp_dir: std::env::temp_dir(),
            sync_on_commit: true,
            max_shared_roots: 20,
            enumeration_batch: 16,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the sector size for files created without an explicit one
    pub fn default_sector_size(mut self, sector_size: SectorSize) -> Self {
        self.config.default_sector_size = sector_size;
        self
    }

    /// Set the directory for auto-named backing files
    pub fn temp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = path.into();
        self
    }

    /// Enable or disable fsync on commit
    pub fn sync_on_commit(mut self, sync: bool) -> Self {
        self.config.sync_on_commit = sync;
        self
    }

    /// Set the concurrent-open ceiling for non-deny-write sharing
    pub fn max_shared_roots(mut self, count: usize) -> Self {
        self.config.max_shared_roots = count;
        self
    }

    /// Set the enumeration page size (clamped to at least 1)
    pub fn enumeration_batch(mut self, count: usize) -> Self {
        self.config.enumeration_batch = count.max(1);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
