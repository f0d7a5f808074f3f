//! Shared test utilities for entity store testing.
//!
//! Provides a minimal fixture entity, a seeded store factory, and assertion
//! macros over [`StorageResult`](crate::StorageResult) values. Feature-gated
//! behind `testutil` so it never leaks into production builds.
//!
//! # Usage
//!
//! In a dependent crate's tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! mooover-common-storage = { path = "../storage", features = ["testutil"] }
//! ```

use serde::{Deserialize, Serialize};

use crate::{entity::Identifiable, store::MemoryEntityStore};

/// A fixture entity keyed by a string identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEntity {
    /// The entity id.
    pub identifier: String,
    /// Arbitrary content, used to tell versions of an entity apart.
    #[serde(default)]
    pub payload: String,
}

impl TestEntity {
    /// Creates an entity with an empty payload.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), payload: String::new() }
    }

    /// Creates an entity with the given payload.
    #[must_use]
    pub fn with_payload(identifier: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), payload: payload.into() }
    }
}

impl Identifiable for TestEntity {
    type Id = String;

    fn id(&self) -> &String {
        &self.identifier
    }
}

/// Creates a [`MemoryEntityStore`] holding one empty-payload entity per id.
///
/// # Panics
///
/// Panics if `ids` contains duplicates.
#[must_use]
pub fn seeded_store(ids: &[&str]) -> MemoryEntityStore<TestEntity> {
    MemoryEntityStore::from_entities(ids.iter().map(|id| TestEntity::new(*id)))
        .expect("seed ids must be unique")
}

/// Assert that a [`StorageResult`](crate::StorageResult) failed with the
/// given [`StorageError`](crate::StorageError) variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use mooover_common_storage::{StorageError, StorageResult, assert_storage_error};
///
/// let result: StorageResult<()> = Err(StorageError::not_found("missing"));
/// assert_storage_error!(result, NotFound);
/// ```
#[macro_export]
macro_rules! assert_storage_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::$variant { .. })),
            "expected StorageError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::$variant { .. })),
            "{}: expected StorageError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}

/// Assert that a [`StorageResult`](crate::StorageResult) is `Ok`, returning
/// the inner value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
}
