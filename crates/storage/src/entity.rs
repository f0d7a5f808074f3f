//! The identifier capability that keyed stores are generic over.

use std::{fmt::Display, hash::Hash};

/// A value exposing a stable, comparable identifier.
///
/// [`EntityStore`](crate::EntityStore) holds no knowledge of an entity's
/// shape beyond this accessor. The identifier must not change while the
/// entity is stored; replacing an entity under a new id is a `delete`
/// followed by an `add`.
///
/// # Examples
///
/// ```
/// use mooover_common_storage::Identifiable;
///
/// struct Device {
///     serial: String,
/// }
///
/// impl Identifiable for Device {
///     type Id = String;
///
///     fn id(&self) -> &String {
///         &self.serial
///     }
/// }
///
/// let device = Device { serial: "SN-001".to_owned() };
/// assert_eq!(device.id(), "SN-001");
/// ```
pub trait Identifiable {
    /// The identifier type. `Display` is used in error messages and logs.
    type Id: Clone + Eq + Hash + Display + Send + Sync + 'static;

    /// Returns this entity's identifier.
    fn id(&self) -> &Self::Id;
}
