//! # Store collaborator.
//!
//! The pool persists through any type implementing [`Store`]. Each call is
//! self-contained; the backend's own concurrency safety is assumed. The pool
//! guarantees that `save` is never called concurrently for the same key.
//!
//! [`MemoryStore`] is the in-memory reference backend.

mod memory;
#[cfg(test)]
pub(crate) mod probe;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::MemoryStore;

/// # External key/value store.
///
/// # Example
/// ```
/// use writevisor::{Store, StoreError};
///
/// struct Discard;
///
/// #[async_trait::async_trait]
/// impl Store for Discard {
///     async fn save(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
///         Ok(())
///     }
///     async fn get(&self, key: &str) -> Result<String, StoreError> {
///         Err(StoreError::NotFound { key: key.to_string() })
///     }
/// }
/// ```
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Persists `value` under `key`, overwriting any previous value.
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Loads the value stored under `key`.
    async fn get(&self, key: &str) -> Result<String, StoreError>;
}
