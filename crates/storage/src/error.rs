//! Storage error types and the shared error taxonomy.
//!
//! Every failure surfaced by this workspace maps onto one of the four
//! [`ErrorKind`]s. Store operations report them through [`StorageError`];
//! the token validator in `mooover-common-authn` maps its own errors onto
//! the same kinds.
//!
//! # Error Types
//!
//! - [`StorageError::NotFound`] - No entity exists for the requested id
//! - [`StorageError::Duplicate`] - An entity with the same id already exists
//! - [`StorageError::NoContent`] - The resource exists but holds nothing
//! - [`StorageError::InvalidContent`] - Data failed structural or semantic validation
//!
//! # Example
//!
//! ```
//! use mooover_common_storage::{ErrorKind, StorageError, StorageResult};
//!
//! fn lookup(id: &str) -> StorageResult<String> {
//!     Err(StorageError::not_found(id))
//! }
//!
//! let err = lookup("42").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! ```

use std::{fmt, sync::Arc};

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The closed set of semantic failure kinds shared by every component.
///
/// Callers branch on the kind rather than on concrete error types, so a
/// store error and a validator error with the same kind are handled alike.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The requested entity or resource does not exist.
    NotFound,
    /// An entity or resource with that identity already exists.
    Duplicate,
    /// The resource is present but empty.
    NoContent,
    /// The resource data fails structural or semantic validation.
    InvalidContent,
}

impl ErrorKind {
    /// Returns a stable snake_case label for structured log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::NoContent => "no_content",
            ErrorKind::InvalidContent => "invalid_content",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during store operations.
///
/// Store errors are always reported to the immediate caller and never
/// retried internally.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions
/// must include a wildcard arm (`_ =>`); match on [`StorageError::kind`]
/// for a closed set.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// No entity is stored under the requested id.
    #[error("Entity not found: {id}")]
    NotFound {
        /// The id that was not found.
        id: String,
    },

    /// An entity with the same id is already stored.
    #[error("Entity already exists: {id}")]
    Duplicate {
        /// The id that collided.
        id: String,
    },

    /// The resource exists but is empty.
    #[error("Entity is empty: {message}")]
    NoContent {
        /// Which resource was empty.
        message: String,
    },

    /// The resource data is malformed or fails validation.
    #[error("Entity is invalid: {message}")]
    InvalidContent {
        /// Description of the validation failure.
        message: String,
        /// The underlying error (e.g. a deserialization failure).
        #[source]
        source: Option<BoxError>,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error for the given id.
    #[must_use]
    pub fn not_found(id: impl fmt::Display) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Creates a new `Duplicate` error for the given id.
    #[must_use]
    pub fn duplicate(id: impl fmt::Display) -> Self {
        Self::Duplicate { id: id.to_string() }
    }

    /// Creates a new `NoContent` error with the given message.
    #[must_use]
    pub fn no_content(message: impl Into<String>) -> Self {
        Self::NoContent { message: message.into() }
    }

    /// Creates a new `InvalidContent` error with the given message.
    #[must_use]
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent { message: message.into(), source: None }
    }

    /// Creates a new `InvalidContent` error with a message and source error.
    #[must_use]
    pub fn invalid_content_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::InvalidContent { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns the taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::Duplicate { .. } => ErrorKind::Duplicate,
            StorageError::NoContent { .. } => ErrorKind::NoContent,
            StorageError::InvalidContent { .. } => ErrorKind::InvalidContent,
        }
    }
}
