//! Error types for Strata
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::tree::ElementKind;

/// Result type alias using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Unified error type for Strata operations
#[derive(Debug, Error)]
pub enum StrataError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    /// Failure surfaced from the backing medium
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid element name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    // -------------------------------------------------------------------------
    // Tree Errors
    // -------------------------------------------------------------------------
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("An element named {0:?} already exists")]
    DuplicateName(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Element {name:?} is a {found}, expected a {expected}")]
    WrongElementKind {
        name: String,
        expected: ElementKind,
        found: ElementKind,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    // -------------------------------------------------------------------------
    // Sharing Errors
    // -------------------------------------------------------------------------
    #[error("Sharing violation on {}", .0.display())]
    SharingViolation(PathBuf),

    #[error("Too many concurrent root opens of {} (limit {limit})", .path.display())]
    TooManyOpenRoots { path: PathBuf, limit: usize },

    // -------------------------------------------------------------------------
    // Container File Errors
    // -------------------------------------------------------------------------
    #[error("Not a structured storage file: {}", .0.display())]
    NotAStructuredFile(PathBuf),

    #[error("Container corruption detected: {0}")]
    Corrupted(String),

    #[error("Container size {size} exceeds the sector-size limit of {limit} bytes")]
    CapacityExceeded { size: u64, limit: u64 },

    #[error("Commit refused: {0}")]
    CommitConflict(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Property Coercion Errors
    // -------------------------------------------------------------------------
    #[error("Value {value} does not fit in {target}")]
    Overflow { value: String, target: &'static str },

    #[error("Cannot parse {value:?} as {target}")]
    FormatError { value: String, target: &'static str },

    #[error("Cannot convert a {found} property to {target}")]
    TypeMismatch {
        found: &'static str,
        target: &'static str,
    },
}

/// Coarse classification of a [`StrataError`]
///
/// Request-handling code maps these to response statuses without matching on
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidName,
    NotFound,
    DuplicateName,
    AlreadyExists,
    WrongElementKind,
    InvalidOperation,
    AccessDenied,
    SharingViolation,
    TooManyOpenRoots,
    NotAStructuredFile,
    Corrupted,
    CommitConflict,
    Overflow,
    FormatError,
    TypeMismatch,
    StorageFault,
}

impl StrataError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::Io(_) | StrataError::Serialization(_) => ErrorKind::StorageFault,
            StrataError::CapacityExceeded { .. } => ErrorKind::StorageFault,
            StrataError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StrataError::InvalidName { .. } => ErrorKind::InvalidName,
            StrataError::NotFound(_) => ErrorKind::NotFound,
            StrataError::DuplicateName(_) => ErrorKind::DuplicateName,
            StrataError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StrataError::WrongElementKind { .. } => ErrorKind::WrongElementKind,
            StrataError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            StrataError::AccessDenied(_) => ErrorKind::AccessDenied,
            StrataError::SharingViolation(_) => ErrorKind::SharingViolation,
            StrataError::TooManyOpenRoots { .. } => ErrorKind::TooManyOpenRoots,
            StrataError::NotAStructuredFile(_) => ErrorKind::NotAStructuredFile,
            StrataError::Corrupted(_) => ErrorKind::Corrupted,
            StrataError::CommitConflict(_) => ErrorKind::CommitConflict,
            StrataError::Overflow { .. } => ErrorKind::Overflow,
            StrataError::FormatError { .. } => ErrorKind::FormatError,
            StrataError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
        }
    }

    /// True for errors raised by argument validation, before any mutation
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidArgument | ErrorKind::InvalidName
        )
    }
}

impl From<bincode::Error> for StrataError {
    fn from(e: bincode::Error) -> Self {
        StrataError::Serialization(e.to_string())
    }
}

impl From<StrataError> for std::io::Error {
    fn from(e: StrataError) -> Self {
        use std::io::ErrorKind as Io;

        match e {
            StrataError::Io(inner) => inner,
            other => {
                let kind = match other.kind() {
                    ErrorKind::NotFound => Io::NotFound,
                    ErrorKind::AccessDenied => Io::PermissionDenied,
                    ErrorKind::InvalidArgument | ErrorKind::InvalidName => Io::InvalidInput,
                    _ => Io::Other,
                };
                std::io::Error::new(kind, other)
            }
        }
    }
}
