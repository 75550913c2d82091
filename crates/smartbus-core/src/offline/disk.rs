//! Cache partitions persisted under the cache directory.
//!
//! Layout:
//! - `index.json`: partitions in creation order, with the file and size of
//!   every entry
//! - `<partition>/<n>.json`: one serialized `Response` per entry
//!
//! A write touches only the entry files it stores plus the index, so a
//! partition never has to be re-read to add to it.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::error::OfflineError;
use super::request::{cache_key, Response};
use super::storage::CacheStorage;

const INDEX_FILE: &str = "index.json";

/// Partition names may not start with this, so they never collide with the index
const INDEX_STEM: &str = "index";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryRecord {
    file: String,
    bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PartitionRecord {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    next_file: u64,
    entries: BTreeMap<String, EntryRecord>,
}

impl PartitionRecord {
    fn new(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            next_file: 0,
            entries: BTreeMap::new(),
        }
    }

    /// File for `key`, reusing the one already holding it.
    fn file_for(&mut self, key: &str) -> String {
        if let Some(entry) = self.entries.get(key) {
            return entry.file.clone();
        }
        let file = format!("{:08}.json", self.next_file);
        self.next_file += 1;
        file
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    partitions: Vec<PartitionRecord>,
}

impl CacheIndex {
    fn get(&self, name: &str) -> Option<&PartitionRecord> {
        self.partitions.iter().find(|p| p.name == name)
    }

    fn get_or_create(&mut self, name: &str) -> &mut PartitionRecord {
        let index = match self.partitions.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.partitions.push(PartitionRecord::new(name, Utc::now()));
                self.partitions.len() - 1
            }
        };
        &mut self.partitions[index]
    }
}

/// Partition summary for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub name: String,
    pub entries: usize,
    /// Total size of the cached response bodies.
    pub bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Last time an entry was written.
    pub updated_at: DateTime<Utc>,
}

pub struct DiskCacheStorage {
    cache_dir: PathBuf,
    /// Loaded on first use.
    index: Mutex<Option<CacheIndex>>,
}

impl DiskCacheStorage {
    pub fn new(cache_dir: PathBuf) -> Result<Self, OfflineError> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            index: Mutex::new(None),
        })
    }

    fn partition_dir(&self, name: &str) -> Result<PathBuf, OfflineError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !name.starts_with('.')
            && !name.starts_with(INDEX_STEM);
        if !valid {
            return Err(OfflineError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid partition name: {}", name),
            )));
        }
        Ok(self.cache_dir.join(name))
    }

    async fn read_index(&self) -> Result<CacheIndex, OfflineError> {
        let path = self.cache_dir.join(INDEX_FILE);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CacheIndex::default()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&contents) {
            Ok(index) => Ok(index),
            Err(e) => {
                // Entry files without an index are unreachable; they are
                // overwritten as partitions are filled again
                warn!(path = ?path, error = %e, "Cache index unreadable, starting empty");
                Ok(CacheIndex::default())
            }
        }
    }

    async fn write_index(&self, index: &CacheIndex) -> Result<(), OfflineError> {
        let path = self.cache_dir.join(INDEX_FILE);
        let staging = self.cache_dir.join(format!("{}.tmp", INDEX_FILE));
        let contents = serde_json::to_vec(index)?;
        fs::write(&staging, contents).await?;
        fs::rename(&staging, &path).await?;
        Ok(())
    }

    /// Run `f` against the index, loading it first if needed.
    async fn with_index<T>(
        &self,
        f: impl FnOnce(&mut CacheIndex) -> T,
    ) -> Result<T, OfflineError> {
        let mut slot = self.index.lock().await;
        let index = match slot.take() {
            Some(index) => index,
            None => self.read_index().await?,
        };
        Ok(f(slot.insert(index)))
    }

    async fn read_entry(
        &self,
        partition: &str,
        entry: &EntryRecord,
    ) -> Result<Option<Response>, OfflineError> {
        let path = self.partition_dir(partition)?.join(&entry.file);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?path, "Cache entry file missing");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&contents) {
            Ok(response) => Ok(Some(response)),
            Err(e) => {
                warn!(path = ?path, error = %e, "Cache entry unreadable, treating as a miss");
                Ok(None)
            }
        }
    }

    /// Write entries to `name`, creating the partition if needed. The index
    /// is saved once, after every entry file is on disk.
    async fn store(
        &self,
        name: &str,
        new_entries: Vec<(String, Response)>,
    ) -> Result<(), OfflineError> {
        let dir = self.partition_dir(name)?;
        let mut slot = self.index.lock().await;
        let mut index = match slot.take() {
            Some(index) => index,
            None => self.read_index().await?,
        };
        if new_entries.is_empty() && index.get(name).is_some() {
            *slot = Some(index);
            return Ok(());
        }

        let result: Result<(), OfflineError> = async {
            fs::create_dir_all(&dir).await?;
            let partition = index.get_or_create(name);
            for (url, response) in new_entries {
                let key = cache_key(&url);
                let file = partition.file_for(&key);
                let contents = serde_json::to_vec(&response)?;
                fs::write(dir.join(&file), contents).await?;
                partition.entries.insert(
                    key,
                    EntryRecord {
                        file,
                        bytes: response.body.len() as u64,
                    },
                );
            }
            partition.updated_at = Utc::now();
            self.write_index(&index).await
        }
        .await;

        if result.is_err() {
            // Drop the in-memory copy so the next call reloads what is on disk
            return result;
        }
        *slot = Some(index);
        Ok(())
    }

    /// Entry counts, sizes and write times of every partition
    pub async fn partition_info(&self) -> Result<Vec<PartitionInfo>, OfflineError> {
        self.with_index(|index| {
            index
                .partitions
                .iter()
                .map(|p| PartitionInfo {
                    name: p.name.clone(),
                    entries: p.entries.len(),
                    bytes: p.entries.values().map(|e| e.bytes).sum(),
                    created_at: p.created_at,
                    updated_at: p.updated_at,
                })
                .collect()
        })
        .await
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<(), OfflineError> {
        self.store(name, Vec::new()).await
    }

    async fn keys(&self) -> Result<Vec<String>, OfflineError> {
        self.with_index(|index| index.partitions.iter().map(|p| p.name.clone()).collect())
            .await
    }

    async fn delete(&self, name: &str) -> Result<bool, OfflineError> {
        let dir = self.partition_dir(name)?;
        let mut slot = self.index.lock().await;
        let mut index = match slot.take() {
            Some(index) => index,
            None => self.read_index().await?,
        };

        let before = index.partitions.len();
        index.partitions.retain(|p| p.name != name);
        let removed = index.partitions.len() != before;
        if removed {
            self.write_index(&index).await?;
        }
        *slot = Some(index);

        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?dir, error = %e, "Failed to remove partition directory"),
        }
        Ok(removed)
    }

    async fn match_in(&self, name: &str, url: &str) -> Result<Option<Response>, OfflineError> {
        let key = cache_key(url);
        let entry = self
            .with_index(|index| index.get(name).and_then(|p| p.entries.get(&key).cloned()))
            .await?;
        match entry {
            Some(entry) => self.read_entry(name, &entry).await,
            None => Ok(None),
        }
    }

    async fn match_any(&self, url: &str) -> Result<Option<Response>, OfflineError> {
        let key = cache_key(url);
        let candidates: Vec<(String, EntryRecord)> = self
            .with_index(|index| {
                index
                    .partitions
                    .iter()
                    .filter_map(|p| p.entries.get(&key).map(|e| (p.name.clone(), e.clone())))
                    .collect()
            })
            .await?;
        for (partition, entry) in candidates {
            if let Some(response) = self.read_entry(&partition, &entry).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    async fn put(&self, name: &str, url: &str, response: Response) -> Result<(), OfflineError> {
        self.store(name, vec![(url.to_string(), response)]).await
    }

    async fn put_all(
        &self,
        name: &str,
        entries: Vec<(String, Response)>,
    ) -> Result<(), OfflineError> {
        self.store(name, entries).await
    }

    async fn len(&self, name: &str) -> Result<usize, OfflineError> {
        self.with_index(|index| index.get(name).map(|p| p.entries.len()).unwrap_or(0))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIC: &str = "smartbus-static-v1.0.0";
    const DYNAMIC: &str = "smartbus-dynamic-v1.0.0";

    fn entry_files(dir: &std::path::Path, partition: &str) -> usize {
        std::fs::read_dir(dir.join(partition)).unwrap().count()
    }

    #[tokio::test]
    async fn test_partitions_survive_reopen_in_creation_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        storage
            .put(
                STATIC,
                "http://localhost:5173/manifest.json",
                Response::ok("application/json", "{}"),
            )
            .await
            .unwrap();
        storage.open(DYNAMIC).await.unwrap();

        let reopened = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.keys().await.unwrap(), vec![STATIC, DYNAMIC]);
        let hit = reopened
            .match_any("http://localhost:5173/manifest.json")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.text(), "{}");

        let info = reopened.partition_info().await.unwrap();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].name, STATIC);
        assert_eq!(info[0].entries, 1);
        assert_eq!(info[0].bytes, 2);
        assert_eq!(info[1].entries, 0);
    }

    #[tokio::test]
    async fn test_match_any_prefers_first_created_partition() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        storage.open(STATIC).await.unwrap();
        storage
            .put(DYNAMIC, "http://a/x", Response::ok("text/plain", "dynamic"))
            .await
            .unwrap();
        storage
            .put(STATIC, "http://a/x", Response::ok("text/plain", "static"))
            .await
            .unwrap();

        let hit = storage.match_any("http://a/x").await.unwrap().unwrap();
        assert_eq!(hit.text(), "static");
    }

    #[tokio::test]
    async fn test_overwrite_reuses_entry_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        storage
            .put_all(
                DYNAMIC,
                vec![
                    ("http://a/one".to_string(), Response::ok("text/plain", "1")),
                    ("http://a/two".to_string(), Response::ok("text/plain", "2")),
                ],
            )
            .await
            .unwrap();
        storage
            .put(DYNAMIC, "http://a/one#frag", Response::ok("text/plain", "one again"))
            .await
            .unwrap();

        assert_eq!(storage.len(DYNAMIC).await.unwrap(), 2);
        assert_eq!(entry_files(dir.path(), DYNAMIC), 2);
        let hit = storage.match_in(DYNAMIC, "http://a/one").await.unwrap().unwrap();
        assert_eq!(hit.text(), "one again");
    }

    #[tokio::test]
    async fn test_delete_removes_partition_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        storage
            .put(STATIC, "http://a/x", Response::ok("text/plain", "x"))
            .await
            .unwrap();

        assert!(storage.delete(STATIC).await.unwrap());
        assert!(!storage.delete(STATIC).await.unwrap());
        assert!(!dir.path().join(STATIC).exists());
        assert_eq!(storage.match_any("http://a/x").await.unwrap(), None);
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_index_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), "{not json").unwrap();

        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        assert!(storage.keys().await.unwrap().is_empty());
        storage
            .put(STATIC, "http://a/x", Response::ok("text/plain", "x"))
            .await
            .unwrap();
        assert_eq!(storage.len(STATIC).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejects_path_like_partition_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        assert!(storage.open("../escape").await.is_err());
        assert!(storage.open("").await.is_err());
        assert!(storage.open("index.json").await.is_err());
    }
}
