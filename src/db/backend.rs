use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use crate::error::{ AppError, Result };

/// String key/value storage with browser local-storage semantics.
pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;
}

/// Volatile storage, optionally bounded by a byte quota like a browser profile.
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn poisoned() -> AppError {
        AppError::Internal("storage lock poisoned".to_string())
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.read().map_err(|_| Self::poisoned())?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;

        if let Some(quota) = self.quota_bytes {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(
                    AppError::StorageWrite(format!("quota of {} bytes exceeded writing {}", quota, key))
                );
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;
        items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let items = self.items.read().map_err(|_| Self::poisoned())?;
        Ok(items.keys().cloned().collect())
    }
}

/// File-backed storage. sled takes an exclusive lock on the directory, so a store
/// has exactly one writer process.
pub struct SledStorage {
    db: sled::Db,
}

impl SledStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled
            ::open(path.as_ref())
            .map_err(|e|
                AppError::StorageRead(format!("cannot open {}: {}", path.as_ref().display(), e))
            )?;
        Ok(Self { db })
    }
}

impl StorageBackend for SledStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let Some(raw) = self.db.get(key).map_err(|e| AppError::StorageRead(e.to_string()))? else {
            return Ok(None);
        };

        String::from_utf8(raw.to_vec())
            .map(Some)
            .map_err(|e| AppError::StorageRead(format!("{} is not UTF-8: {}", key, e)))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.db.insert(key, value.as_bytes()).map_err(|e| AppError::StorageWrite(e.to_string()))?;
        self.db.flush().map_err(|e| AppError::StorageWrite(e.to_string()))?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.db.remove(key).map_err(|e| AppError::StorageWrite(e.to_string()))?;
        self.db.flush().map_err(|e| AppError::StorageWrite(e.to_string()))?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.db
            .iter()
            .keys()
            .map(|key| {
                let key = key.map_err(|e| AppError::StorageRead(e.to_string()))?;
                String::from_utf8(key.to_vec()).map_err(|e| AppError::StorageRead(e.to_string()))
            })
            .collect()
    }
}
