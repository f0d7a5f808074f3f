//! Keyed entity stores.
//!
//! This module provides the [`EntityStore`] trait, a CRUD interface over
//! entities keyed by their [`Identifiable::id`], and [`MemoryEntityStore`],
//! its in-memory implementation.
//!
//! # Invariants
//!
//! - At most one entity is stored per id.
//! - `add` fails with [`StorageError::Duplicate`] when the id is taken.
//! - `get_one`, `update` and `delete` fail with [`StorageError::NotFound`]
//!   when the id is absent.
//! - A failed call leaves the store unchanged.
//!
//! # Usage
//!
//! ```no_run
//! // Demonstrates the trait interface; works with any store implementation.
//! use mooover_common_storage::{EntityStore, Identifiable, StorageResult};
//!
//! async fn rename<E, S>(store: &S, entity: E) -> StorageResult<()>
//! where
//!     E: Identifiable + Clone + Send + Sync + 'static,
//!     S: EntityStore<E>,
//! {
//!     store.update(entity).await
//! }
//! ```

use std::{
    collections::{HashMap, hash_map::Entry},
    fmt,
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use crate::{
    entity::Identifiable,
    error::{StorageError, StorageResult},
};

/// CRUD operations over entities keyed by their identifier.
///
/// Abstracts entity storage so in-memory stores (tests, caches, small
/// services) and persistent backends share the same interface. Persistence
/// itself is a concern of the implementation, not of this trait.
///
/// # Error Handling
///
/// Errors are reported to the immediate caller and never retried
/// internally; any retry policy belongs to the caller.
#[async_trait]
pub trait EntityStore<E>: Send + Sync
where
    E: Identifiable + Clone + Send + Sync + 'static,
{
    /// Returns the entity stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no entity has that id.
    async fn get_one(&self, id: &E::Id) -> StorageResult<E>;

    /// Returns every stored entity, in no particular order.
    ///
    /// An empty store yields an empty vector, not an error.
    async fn get_all(&self) -> StorageResult<Vec<E>>;

    /// Inserts a new entity.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Duplicate`] if an entity with the same id is
    /// already stored. The store is unchanged on failure.
    async fn add(&self, entity: E) -> StorageResult<()>;

    /// Replaces the entity stored under `entity.id()`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no entity has that id. The
    /// store is unchanged on failure.
    async fn update(&self, entity: E) -> StorageResult<()>;

    /// Removes the entity stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no entity has that id.
    async fn delete(&self, id: &E::Id) -> StorageResult<()>;

    /// Returns the number of stored entities.
    ///
    /// The default implementation counts the result of
    /// [`get_all`](Self::get_all). Implementations may override this.
    async fn len(&self) -> StorageResult<usize> {
        Ok(self.get_all().await?.len())
    }

    /// Returns `true` if the store holds no entities.
    async fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Returns `true` if an entity is stored under `id`.
    async fn contains(&self, id: &E::Id) -> StorageResult<bool> {
        match self.get_one(id).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// In-memory implementation of [`EntityStore`].
///
/// Entities live in a hash map keyed by id. Nothing is persisted; the
/// contents last as long as the last clone of the store.
///
/// # Thread Safety
///
/// Uses [`parking_lot::RwLock`]. Every write holds the write lock across its
/// existence check and mutation, so concurrent `add`/`update`/`delete`
/// calls on the same id are serialized. Reads take the read lock and clone
/// entities out, so no reader observes a half-applied write.
///
/// # Cloning
///
/// `MemoryEntityStore` is cheaply cloneable via [`Arc`]. All clones share
/// the same entities.
///
/// # Examples
///
/// ```
/// use mooover_common_storage::{EntityStore, Group, MemoryEntityStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryEntityStore::new();
///     let group = Group::builder().nickname("walkers").name("Morning Walkers").build()?;
///
///     store.add(group.clone()).await?;
///
///     let retrieved = store.get_one(&"walkers".to_owned()).await?;
///     assert_eq!(retrieved, group);
///     Ok(())
/// }
/// ```
pub struct MemoryEntityStore<E: Identifiable> {
    /// Entities indexed by id.
    entities: Arc<RwLock<HashMap<E::Id, E>>>,
}

impl<E: Identifiable> MemoryEntityStore<E> {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self { entities: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Creates a store from an initial id-to-entity mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContent`] if any key differs from the
    /// id of the entity stored under it.
    pub fn from_entries(entries: HashMap<E::Id, E>) -> StorageResult<Self> {
        if let Some((key, entity)) = entries.iter().find(|(key, entity)| *key != entity.id()) {
            return Err(StorageError::invalid_content(format!(
                "entry '{key}' holds an entity with id '{}'",
                entity.id()
            )));
        }
        Ok(Self { entities: Arc::new(RwLock::new(entries)) })
    }

    /// Creates a store from a sequence of entities.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Duplicate`] if two entities share an id.
    pub fn from_entities(entities: impl IntoIterator<Item = E>) -> StorageResult<Self> {
        let mut map = HashMap::new();
        for entity in entities {
            match map.entry(entity.id().clone()) {
                Entry::Occupied(_) => return Err(StorageError::duplicate(entity.id())),
                Entry::Vacant(slot) => {
                    slot.insert(entity);
                },
            }
        }
        Ok(Self { entities: Arc::new(RwLock::new(map)) })
    }

    /// Creates a store from a JSON snapshot shaped `{"<id>": <entity>, ...}`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContent`] if:
    /// - The snapshot is not a JSON object
    /// - An entry cannot be decoded as `E`
    /// - An entry's key differs from the decoded entity's id
    pub fn from_json_snapshot(snapshot: serde_json::Value) -> StorageResult<Self>
    where
        E: DeserializeOwned,
    {
        let serde_json::Value::Object(map) = snapshot else {
            return Err(StorageError::invalid_content("store contents have to be a JSON object"));
        };

        let mut entities = HashMap::with_capacity(map.len());
        for (key, value) in map {
            let entity: E = serde_json::from_value(value).map_err(|e| {
                StorageError::invalid_content_with_source(
                    format!("entry '{key}' could not be decoded"),
                    e,
                )
            })?;
            if entity.id().to_string() != key {
                return Err(StorageError::invalid_content(format!(
                    "entry '{key}' holds an entity with id '{}'",
                    entity.id()
                )));
            }
            entities.insert(entity.id().clone(), entity);
        }

        Ok(Self { entities: Arc::new(RwLock::new(entities)) })
    }
}

impl<E: Identifiable> Default for MemoryEntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Identifiable> Clone for MemoryEntityStore<E> {
    fn clone(&self) -> Self {
        Self { entities: Arc::clone(&self.entities) }
    }
}

impl<E: Identifiable> fmt::Debug for MemoryEntityStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEntityStore").field("len", &self.entities.read().len()).finish()
    }
}

#[async_trait]
impl<E> EntityStore<E> for MemoryEntityStore<E>
where
    E: Identifiable + Clone + Send + Sync + 'static,
{
    #[tracing::instrument(skip_all, fields(id = %id))]
    async fn get_one(&self, id: &E::Id) -> StorageResult<E> {
        let entities = self.entities.read();
        entities.get(id).cloned().ok_or_else(|| StorageError::not_found(id))
    }

    #[tracing::instrument(skip_all)]
    async fn get_all(&self) -> StorageResult<Vec<E>> {
        let entities = self.entities.read();
        Ok(entities.values().cloned().collect())
    }

    #[tracing::instrument(skip_all, fields(id = %entity.id()))]
    async fn add(&self, entity: E) -> StorageResult<()> {
        let mut entities = self.entities.write();

        match entities.entry(entity.id().clone()) {
            Entry::Occupied(_) => {
                tracing::debug!("add rejected: id already present");
                Err(StorageError::duplicate(entity.id()))
            },
            Entry::Vacant(slot) => {
                slot.insert(entity);
                Ok(())
            },
        }
    }

    #[tracing::instrument(skip_all, fields(id = %entity.id()))]
    async fn update(&self, entity: E) -> StorageResult<()> {
        let mut entities = self.entities.write();

        if let Some(slot) = entities.get_mut(entity.id()) {
            *slot = entity;
            return Ok(());
        }

        tracing::debug!("update rejected: id not present");
        Err(StorageError::not_found(entity.id()))
    }

    #[tracing::instrument(skip_all, fields(id = %id))]
    async fn delete(&self, id: &E::Id) -> StorageResult<()> {
        let mut entities = self.entities.write();

        if entities.remove(id).is_none() {
            tracing::debug!("delete rejected: id not present");
            return Err(StorageError::not_found(id));
        }
        Ok(())
    }

    /// Reads the map length directly under the read lock.
    async fn len(&self) -> StorageResult<usize> {
        Ok(self.entities.read().len())
    }

    async fn contains(&self, id: &E::Id) -> StorageResult<bool> {
        Ok(self.entities.read().contains_key(id))
    }
}
