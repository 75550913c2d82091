//! Named cache partitions.
//!
//! Entries are keyed by normalized request URL and replaced wholesale on
//! write; the last writer for a key wins.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::OfflineError;
use super::request::{cache_key, Response};

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the partition if it does not exist.
    async fn open(&self, name: &str) -> Result<(), OfflineError>;

    /// Partition names, in creation order.
    async fn keys(&self) -> Result<Vec<String>, OfflineError>;

    /// Delete a partition. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, OfflineError>;

    async fn match_in(&self, name: &str, url: &str) -> Result<Option<Response>, OfflineError>;

    /// First match across all partitions, checked in `keys()` order.
    async fn match_any(&self, url: &str) -> Result<Option<Response>, OfflineError>;

    async fn put(&self, name: &str, url: &str, response: Response) -> Result<(), OfflineError>;

    /// Write several entries in one step, creating the partition if needed.
    async fn put_all(
        &self,
        name: &str,
        entries: Vec<(String, Response)>,
    ) -> Result<(), OfflineError>;

    /// Number of entries in a partition; zero if it does not exist.
    async fn len(&self, name: &str) -> Result<usize, OfflineError>;
}

type Partition = HashMap<String, Response>;

/// In-memory cache partitions.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    partitions: RwLock<Vec<(String, Partition)>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition_mut<'a>(
        partitions: &'a mut Vec<(String, Partition)>,
        name: &str,
    ) -> &'a mut Partition {
        let index = match partitions.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                partitions.push((name.to_string(), Partition::new()));
                partitions.len() - 1
            }
        };
        &mut partitions[index].1
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), OfflineError> {
        let mut partitions = self.partitions.write().await;
        Self::partition_mut(&mut partitions, name);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, OfflineError> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, OfflineError> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|(n, _)| n != name);
        Ok(partitions.len() != before)
    }

    async fn match_in(&self, name: &str, url: &str) -> Result<Option<Response>, OfflineError> {
        let key = cache_key(url);
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, entries)| entries.get(&key).cloned()))
    }

    async fn match_any(&self, url: &str) -> Result<Option<Response>, OfflineError> {
        let key = cache_key(url);
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find_map(|(_, entries)| entries.get(&key).cloned()))
    }

    async fn put(&self, name: &str, url: &str, response: Response) -> Result<(), OfflineError> {
        let mut partitions = self.partitions.write().await;
        Self::partition_mut(&mut partitions, name).insert(cache_key(url), response);
        Ok(())
    }

    async fn put_all(
        &self,
        name: &str,
        entries: Vec<(String, Response)>,
    ) -> Result<(), OfflineError> {
        let mut partitions = self.partitions.write().await;
        let partition = Self::partition_mut(&mut partitions, name);
        for (url, response) in entries {
            partition.insert(cache_key(&url), response);
        }
        Ok(())
    }

    async fn len(&self, name: &str) -> Result<usize, OfflineError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entries)| entries.len())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_match() {
        let storage = MemoryCacheStorage::new();
        let response = Response::ok("text/html", "<h1>SMARTBUS</h1>");
        storage
            .put("dynamic", "http://localhost:5173/#top", response.clone())
            .await
            .unwrap();

        assert_eq!(
            storage.match_in("dynamic", "http://localhost:5173/").await.unwrap(),
            Some(response.clone())
        );
        assert_eq!(storage.match_in("static", "http://localhost:5173/").await.unwrap(), None);
        assert_eq!(
            storage.match_any("http://localhost:5173/").await.unwrap(),
            Some(response)
        );
    }

    #[tokio::test]
    async fn test_match_any_prefers_first_created_partition() {
        let storage = MemoryCacheStorage::new();
        storage.open("static").await.unwrap();
        storage
            .put("dynamic", "http://a/x", Response::ok("text/plain", "dynamic"))
            .await
            .unwrap();
        storage
            .put("static", "http://a/x", Response::ok("text/plain", "static"))
            .await
            .unwrap();

        let hit = storage.match_any("http://a/x").await.unwrap().unwrap();
        assert_eq!(hit.text(), "static");
    }

    #[tokio::test]
    async fn test_delete_and_keys() {
        let storage = MemoryCacheStorage::new();
        storage.open("a").await.unwrap();
        storage.open("b").await.unwrap();
        storage.open("a").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["a", "b"]);

        assert!(storage.delete("a").await.unwrap());
        assert!(!storage.delete("a").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["b"]);
        assert_eq!(storage.len("a").await.unwrap(), 0);
    }
}
