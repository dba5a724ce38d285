//! Access Modes
//!
//! An [`AccessMode`] bundles the four independent policies every open or
//! create call takes: sharing, transaction, intent and creation.
//!
//! ## Compatibility Table
//! Checked by [`AccessMode::validate`] before anything is touched:
//!
//! | Target        | Combination                                  | Result   |
//! |---------------|----------------------------------------------|----------|
//! | root          | `Transacted` + `ShareExclusive` + `ReadWrite` | rejected |
//! | root          | `Direct` + `ShareDenyNone` + `ReadWrite`      | rejected |
//! | stream        | `Transacted`                                 | rejected |
//! | any create    | `OpenExisting`                               | rejected |
//! | any open      | anything but `OpenExisting`                  | rejected |
//! | anything else |                                              | accepted |
//!
//! Sharing is only meaningful for roots; children live inside a root that has
//! already been admitted by the open-root registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// How other root opens of the same file are admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sharing {
    /// No other open of the file while this one is held
    Exclusive,
    /// Many readers, at most one writer
    DenyWrite,
    /// Readers and transacted writers, capped by `Config::max_shared_roots`
    DenyNone,
}

/// When writes become visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transaction {
    /// Writes are visible immediately
    Direct,
    /// Writes are buffered until `commit`
    Transacted,
}

/// What the caller intends to do with the element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    Read,
    ReadWrite,
}

/// What happens when the target already exists (or does not)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Creation {
    /// Open an element that must already exist
    OpenExisting,
    /// Create, replacing any existing element
    CreateNew,
    /// Open when present, create otherwise
    CreateOrOpen,
    /// Create, failing when the element already exists
    FailIfExists,
}

/// What kind of object a mode is being validated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTarget {
    Root,
    Storage,
    Stream,
    PropertySet,
}

/// Whether the call opens an existing object or creates one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeOperation {
    Open,
    Create,
}

/// Immutable composite of sharing, transaction, intent and creation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessMode {
    sharing: Sharing,
    transaction: Transaction,
    intent: Intent,
    creation: Creation,
}

impl AccessMode {
    pub const fn new(
        sharing: Sharing,
        transaction: Transaction,
        intent: Intent,
        creation: Creation,
    ) -> Self {
        Self {
            sharing,
            transaction,
            intent,
            creation,
        }
    }

    /// Direct, read-only, deny-write: the safe way to inspect a file
    pub const fn read() -> Self {
        Self::new(
            Sharing::DenyWrite,
            Transaction::Direct,
            Intent::Read,
            Creation::OpenExisting,
        )
    }

    /// Direct, read-write, exclusive
    pub const fn read_write() -> Self {
        Self::new(
            Sharing::Exclusive,
            Transaction::Direct,
            Intent::ReadWrite,
            Creation::OpenExisting,
        )
    }

    /// Direct, read-write, exclusive, failing if the target exists
    pub const fn create() -> Self {
        Self::new(
            Sharing::Exclusive,
            Transaction::Direct,
            Intent::ReadWrite,
            Creation::FailIfExists,
        )
    }

    /// Same mode, transacted. Exclusive sharing is relaxed to deny-write so
    /// the result is a legal root mode.
    pub const fn transacted(self) -> Self {
        let sharing = match self.sharing {
            Sharing::Exclusive => Sharing::DenyWrite,
            other => other,
        };
        Self {
            sharing,
            transaction: Transaction::Transacted,
            ..self
        }
    }

    pub const fn with_sharing(self, sharing: Sharing) -> Self {
        Self { sharing, ..self }
    }

    pub const fn with_transaction(self, transaction: Transaction) -> Self {
        Self {
            transaction,
            ..self
        }
    }

    pub const fn with_intent(self, intent: Intent) -> Self {
        Self { intent, ..self }
    }

    pub const fn with_creation(self, creation: Creation) -> Self {
        Self { creation, ..self }
    }

    pub fn sharing(&self) -> Sharing {
        self.sharing
    }

    pub fn transaction(&self) -> Transaction {
        self.transaction
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn creation(&self) -> Creation {
        self.creation
    }

    pub fn is_transacted(&self) -> bool {
        self.transaction == Transaction::Transacted
    }

    pub fn is_writable(&self) -> bool {
        self.intent == Intent::ReadWrite
    }

    /// Reject illegal combinations for `target` with a descriptive error
    pub fn validate(&self, target: ModeTarget, operation: ModeOperation) -> Result<()> {
        match (operation, self.creation) {
            (ModeOperation::Create, Creation::OpenExisting) => {
                return Err(invalid(self, "a create operation cannot use OpenExisting"));
            }
            (ModeOperation::Open, Creation::OpenExisting) => {}
            (ModeOperation::Open, _) => {
                return Err(invalid(
                    self,
                    "an open operation only accepts OpenExisting creation",
                ));
            }
            _ => {}
        }

        match target {
            ModeTarget::Root => {
                if self.is_transacted()
                    && self.is_writable()
                    && self.sharing == Sharing::Exclusive
                {
                    return Err(invalid(
                        self,
                        "transacted write access to a root requires ShareDenyWrite or ShareDenyNone",
                    ));
                }
                if !self.is_transacted()
                    && self.is_writable()
                    && self.sharing == Sharing::DenyNone
                {
                    return Err(invalid(
                        self,
                        "direct writers cannot share a root with other writers; use Transacted",
                    ));
                }
            }
            ModeTarget::Stream => {
                if self.is_transacted() {
                    return Err(invalid(
                        self,
                        "streams follow their storage's transaction and cannot be opened Transacted",
                    ));
                }
            }
            ModeTarget::Storage | ModeTarget::PropertySet => {}
        }

        Ok(())
    }

    /// A child of a storage opened with `self` may not ask for more access
    pub(crate) fn check_child_intent(&self, child: &AccessMode, name: &str) -> Result<()> {
        if child.is_writable() && !self.is_writable() {
            return Err(StrataError::AccessDenied(format!(
                "cannot open {:?} for writing from a read-only storage",
                name
            )));
        }
        Ok(())
    }
}

impl Default for AccessMode {
    fn default() -> Self {
        Self::read()
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}|{:?}|{:?}|{:?}",
            self.intent, self.transaction, self.sharing, self.creation
        )
    }
}

fn invalid(mode: &AccessMode, reason: &str) -> StrataError {
    StrataError::InvalidArgument(format!("access mode {}: {}", mode, reason))
}
