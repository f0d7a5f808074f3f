//! Keyed entity stores and the shared error taxonomy for Mooover services.
//!
//! This crate provides the [`EntityStore`] trait, a CRUD interface generic
//! over any [`Identifiable`] entity, and [`ErrorKind`], the closed set of
//! failure kinds every Mooover component reports through.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! │          (request handlers, token validation)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  mooover-common-storage                     │
//! │                  EntityStore<E> trait                       │
//! │        (get_one, get_all, add, update, delete)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  MemoryEntityStore<E>                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use mooover_common_storage::{EntityStore, ErrorKind, Group, MemoryEntityStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryEntityStore::new();
//!     store.add(Group::builder().nickname("hikers").name("Hikers").build()?).await?;
//!
//!     let err = store.add(Group::builder().nickname("hikers").name("Other").build()?).await;
//!     assert_eq!(err.unwrap_err().kind(), ErrorKind::Duplicate);
//!
//!     store.delete(&"hikers".to_owned()).await?;
//!     assert!(store.is_empty().await?);
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Match on
//! [`StorageError::kind`] to branch on the shared taxonomy.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with a fixture entity, a seeded store factory,
//!   and assertion macros. Enable this in `[dev-dependencies]` of dependent crates.

#![deny(unsafe_code)]

pub mod entity;
pub mod error;
pub mod models;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

// Re-export primary types at crate root for convenience
pub use entity::Identifiable;
pub use error::{BoxError, ErrorKind, StorageError, StorageResult};
pub use models::{Group, User};
pub use store::{EntityStore, MemoryEntityStore};
