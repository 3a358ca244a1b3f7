use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::{Storage, StorageError, StorageOptions, StorageResult};

/// A file-based storage implementation
///
/// Each key maps to one file below `base_path`; key segments become
/// directories.
pub struct FileStorage {
    base_path: PathBuf,
    options: StorageOptions,
    cache: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl FileStorage {
    /// Create a new file storage instance
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = base_path.into();

        if !path.exists() {
            fs::create_dir_all(&path).await?;
        }

        Ok(Self {
            base_path: path,
            options: StorageOptions::default(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Set storage options
    pub fn with_options(mut self, options: StorageOptions) -> Self {
        self.options = options;
        self
    }

    /// Get the full path for a key
    fn get_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.base_path.clone(), |path, segment| path.join(segment))
    }

    /// Walk a directory tree and collect the keys of every file in it
    async fn list_directory(&self, dir_path: &Path) -> StorageResult<Vec<String>> {
        let mut result = Vec::new();
        let mut pending = vec![dir_path.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();

                if path.is_dir() {
                    pending.push(path);
                } else if let Ok(rel_path) = path.strip_prefix(&self.base_path) {
                    let key = rel_path
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    result.push(key);
                }
            }
        }

        result.sort();
        Ok(result)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.get_path(key);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;

        if self.options.sync_write {
            file.sync_all().await?;
        }

        if self.options.use_cache {
            let mut cache = self.cache.write().await;
            cache.insert(key.to_string(), data.to_vec());
        }

        debug!("Stored data at key: {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        if self.options.use_cache {
            let cache = self.cache.read().await;
            if let Some(data) = cache.get(key) {
                trace!("Retrieved data from cache for key: {}", key);
                return Ok(data.clone());
            }
        }

        let path = self.get_path(key);
        if !path.is_file() {
            return Err(StorageError::KeyNotFound(key.to_string()));
        }

        let mut file = fs::File::open(&path).await?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;

        if self.options.use_cache {
            let mut cache = self.cache.write().await;
            cache.insert(key.to_string(), data.clone());
        }

        debug!("Retrieved data for key: {}", key);
        Ok(data)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.get_path(key);
        if path.is_file() {
            fs::remove_file(path).await?;
            debug!("Deleted key: {}", key);
        }

        if self.options.use_cache {
            let mut cache = self.cache.write().await;
            cache.remove(key);
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        if self.options.use_cache {
            let cache = self.cache.read().await;
            if cache.contains_key(key) {
                return Ok(true);
            }
        }

        Ok(self.get_path(key).is_file())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // Prefixes are directory paths; list the deepest existing directory
        // and filter by the full prefix.
        let dir_prefix = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let path = self.get_path(dir_prefix);
        debug!("Listing keys with prefix: {}", prefix);

        if !path.exists() {
            return Ok(Vec::new());
        }

        if !path.is_dir() {
            return Err(StorageError::NotADirectory(prefix.to_string()));
        }

        let keys = self.list_directory(&path).await?;
        Ok(keys.into_iter().filter(|k| k.starts_with(prefix)).collect())
    }
}
