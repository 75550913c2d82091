use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use super::{KeyValueStore, StorageError, StorageKey};

/// Store file name in the data directory
const STORE_FILE: &str = "storage.json";

/// Extension given to an unreadable store file when it is set aside
const CORRUPT_EXTENSION: &str = "corrupt";

/// Key-value store persisted as one JSON object on disk.
///
/// Every write rewrites the whole document. Keys that this build does not
/// know are kept as-is. Reads of an unparseable document fail; the next
/// write moves it aside and starts a fresh one.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self::at_path(data_dir.as_ref().join(STORE_FILE))
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    /// Path an unreadable store file is renamed to.
    pub fn corrupt_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".");
        name.push(CORRUPT_EXTENSION);
        PathBuf::from(name)
    }

    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StorageError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StorageError::Unavailable("file store lock poisoned".to_string()))?;
        let mut values = match self.load() {
            Ok(values) => values,
            Err(StorageError::Serialization(e)) => {
                let aside = self.corrupt_path();
                warn!(
                    path = ?self.path,
                    moved_to = ?aside,
                    error = %e,
                    "Store file is unreadable, starting a new one"
                );
                std::fs::rename(&self.path, &aside)?;
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        f(&mut values);
        self.save(&values)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StorageError::Unavailable("file store lock poisoned".to_string()))?;
        Ok(self.load()?.remove(key.as_str()))
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        debug!(key = %key, path = ?self.path, "Writing stored value");
        self.update(|values| {
            values.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        self.update(|values| {
            values.remove(key.as_str());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set(StorageKey::RememberedUsername, "Julissa").unwrap();
        store.set(StorageKey::Balance, "50").unwrap();
        store.remove(StorageKey::Balance).unwrap();

        let reopened = FileStore::new(dir.path());
        assert_eq!(
            reopened.get(StorageKey::RememberedUsername).unwrap().as_deref(),
            Some("Julissa")
        );
        assert_eq!(reopened.get(StorageKey::Balance).unwrap(), None);
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert_eq!(store.get(StorageKey::User).unwrap(), None);
    }

    #[test]
    fn test_write_replaces_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::write(store.path(), r#"{"smartbus_user": "{trunc"#).unwrap();
        assert!(matches!(
            store.get(StorageKey::User),
            Err(StorageError::Serialization(_))
        ));

        store.set(StorageKey::RememberedUsername, "Julissa").unwrap();
        assert_eq!(store.get(StorageKey::User).unwrap(), None);
        assert_eq!(
            store.get(StorageKey::RememberedUsername).unwrap().as_deref(),
            Some("Julissa")
        );
        assert_eq!(
            std::fs::read_to_string(store.corrupt_path()).unwrap(),
            r#"{"smartbus_user": "{trunc"#
        );
    }
}
