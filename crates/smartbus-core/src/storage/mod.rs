//! Local key-value persistence.
//!
//! The session manager and preferences only see the `KeyValueStore` trait,
//! so the backend can be swapped without touching them:
//! - `MemoryStore`: volatile, for tests
//! - `FileStore`: a JSON document in the data directory
//! - `EncryptedStore`: wraps another store and seals every value with
//!   ChaCha20-Poly1305 under a key kept in the OS keyring
//!
//! All values are strings, like browser local storage.

pub mod device_key;
pub mod encrypted;
pub mod error;
pub mod file;
pub mod keys;
pub mod memory;

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

pub use device_key::DeviceKey;
pub use encrypted::EncryptedStore;
pub use error::StorageError;
pub use file::FileStore;
pub use keys::{StorageKey, STORAGE_PREFIX};
pub use memory::MemoryStore;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError>;

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: StorageKey) -> Result<(), StorageError>;

    /// Read and deserialize a JSON value.
    fn get_json<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>, StorageError>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize a value as JSON and store it.
    fn set_json<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> Result<(), StorageError>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}
