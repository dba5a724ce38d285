//! # Strata
//!
//! A hierarchical, transacted structured-storage engine that keeps a whole
//! tree of data in one container file:
//! - Storages (directories) and streams (byte content) in one name space
//! - Typed property sets attached to any storage
//! - Direct (write-through) or transacted (commit / revert) access, nested
//!   to any depth
//! - Sharing policies between roots opened on the same file
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         RootFile                             │
//! │           (create / open / probe / switch-to-file)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │               Storage / Stream / PropertySet                 │
//! │              (path-addressed handles, AccessMode)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Registry   │          │   Layers    │
//!   │ (sharing)   │          │ (Mutex)     │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ commit
//!                                   ▼
//!                           ┌─────────────┐
//!                           │  Container  │
//!                           │   (file)    │
//!                           └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use strata::{AccessMode, CommitConditions, PropertySetFlags, RootFile, Sharing};
//!
//! # fn main() -> strata::Result<()> {
//! let files = RootFile::default();
//! let mode = AccessMode::create().transacted().with_sharing(Sharing::DenyWrite);
//! let root = files.create(Some("orders.stg".as_ref()), mode, 4096)?;
//!
//! let orders = root.create_storage("Orders", AccessMode::create())?;
//! let mut invoice = orders.create_stream("Invoice-1", AccessMode::create())?;
//! invoice.write(&[0u8; 128])?;
//!
//! let mut props = root.create_property_set(
//!     uuid::Uuid::new_v4(),
//!     PropertySetFlags::SIMPLE,
//!     AccessMode::create(),
//! )?;
//! props.set(1u32, "Acme Corp")?;
//!
//! root.commit(CommitConditions::Default)?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod container;
pub mod enumerate;
pub mod mode;
pub mod property;
pub mod stats;
pub mod storage;
pub mod stream;
pub mod tree;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, Result, StrataError};
pub use config::{Config, ConfigBuilder};

pub use container::{SectorSize, SMALL_SECTOR_FILE_LIMIT};
pub use enumerate::{Batched, Enumerator};
pub use mode::{AccessMode, Creation, Intent, ModeOperation, ModeTarget, Sharing, Transaction};
pub use property::{
    unix_time, FromPropertyValue, Property, PropertyKey, PropertySet, PropertySetEnumerator,
    PropertySetFlags, PropertySets, PropertyValue, ValueKind,
};
pub use stats::{ElementStatistics, PropertySetStatistics, PropertyStatistics};
pub use storage::{CommitConditions, ElementEnumerator, Elements, RootFile, Storage};
pub use stream::Stream;
pub use tree::{ClassId, ElementKind, ElementTimes, FormatId, MAX_NAME_LEN, ROOT_NAME};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Strata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
