use crate::error::Result;

/// Durable local key-value storage for the session blobs.
///
/// Values are JSON text. Implementors must be `Send + Sync` so the store can
/// be shared between the session and background sync tasks. Every call is
/// synchronous; a `set` that returns `Ok` is expected to be durable.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `None` if the key was never written or was removed.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace a value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
