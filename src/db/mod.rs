use std::sync::{ Arc, Mutex };

use serde::{ de::DeserializeOwned, Serialize };
use serde_json::{ Map, Value };

use crate::config::{ StorageConfig, StorageKind };
use crate::error::{ AppError, Result };

pub mod entity;
pub use entity::*;

mod backend;
pub use backend::{ MemoryStorage, SledStorage, StorageBackend };

/// Logical storage keys shared by every service.
pub mod keys {
    pub const SESSION: &str = "session.currentUser";
    pub const REGISTERED_USERS: &str = "users.registered";
    pub const DELETED_USERS: &str = "users.deleted";
    pub const VERIFICATION_REQUESTS: &str = "verification.requests";
    pub const CHAT_INDEX: &str = "chat.index";
    pub const LOGIN_ACTIVITIES: &str = "admin.loginActivities";
    pub const USER_ACTIVITIES: &str = "admin.userActivities";
    pub const SITE_SETTINGS: &str = "site.settings";
    pub const RECENT_LOGINS: &str = "auth.recentLogins";

    pub fn transactions(user_id: &str) -> String {
        format!("ledger.transactions.{}", user_id)
    }

    pub fn investments(user_id: &str) -> String {
        format!("ledger.investments.{}", user_id)
    }

    pub fn chat_messages(thread_id: &str) -> String {
        format!("chat.messages.{}", thread_id)
    }
}

pub fn open_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.kind {
        StorageKind::Memory =>
            match config.quota_bytes {
                Some(quota) => Arc::new(MemoryStorage::with_quota(quota)),
                None => Arc::new(MemoryStorage::new()),
            }
        StorageKind::Sled => Arc::new(SledStorage::open(&config.path)?),
    };
    Ok(backend)
}

/// Namespaced JSON collections on top of a [`StorageBackend`].
///
/// A collection is one JSON object keyed by record id. Reads are lenient: a missing or
/// unparsable blob is an empty collection and a record that fails to decode is skipped.
/// The `try_*` variants surface those conditions as [`AppError::Decode`] instead.
/// Writes always propagate [`AppError::StorageWrite`]. Collection updates are
/// serialized per store, so two callers in one process never lose each other's entries;
/// writers in other processes are not coordinated.
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn StorageBackend>,
    write_lock: Arc<Mutex<()>>,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Insert or overwrite `record` under `id`.
    pub fn save<T: Serialize>(&self, collection: &str, id: &str, record: &T) -> Result<()> {
        let value = serde_json::to_value(record)?;
        let _guard = self.lock_writes()?;
        let mut map = self.read_object_lenient(collection);
        map.insert(id.to_string(), value);
        self.write_object(collection, &map)
    }

    pub fn remove(&self, collection: &str, id: &str) -> Result<()> {
        let _guard = self.lock_writes()?;
        let mut map = self.read_object_lenient(collection);
        if map.remove(id).is_none() {
            return Ok(());
        }
        self.write_object(collection, &map)
    }

    pub fn all<T: DeserializeOwned>(&self, collection: &str) -> Vec<T> {
        self.entries(collection)
            .into_iter()
            .map(|(_, record)| record)
            .collect()
    }

    /// Like [`RecordStore::all`] but keeps each record's id.
    pub fn entries<T: DeserializeOwned>(&self, collection: &str) -> Vec<(String, T)> {
        self.read_object_lenient(collection)
            .into_iter()
            .filter_map(|(id, value)| {
                match serde_json::from_value(value) {
                    Ok(record) => Some((id, record)),
                    Err(e) => {
                        tracing::warn!("Skipping undecodable record {}/{}: {}", collection, id, e);
                        None
                    }
                }
            })
            .collect()
    }

    pub fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Option<T> {
        match self.try_get(collection, id) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Treating {}/{} as absent: {}", collection, id, e);
                None
            }
        }
    }

    pub fn try_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        self.read_object(collection)?
            .into_iter()
            .map(|(id, value)| {
                serde_json::from_value(value).map_err(|e| AppError::Decode {
                    key: format!("{}/{}", collection, id),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    pub fn try_get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        let Some(value) = self.read_object(collection)?.remove(id) else {
            return Ok(None);
        };

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| AppError::Decode {
                key: format!("{}/{}", collection, id),
                reason: e.to_string(),
            })
    }

    /// Read a non-keyed blob such as the session or a message list.
    pub fn read_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_read_value(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Treating {} as absent: {}", key, e);
                None
            }
        }
    }

    pub fn try_read_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.backend.get_item(key)? else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AppError::Decode {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn write_value<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.set_item(key, &raw)
    }

    pub fn delete_value(&self, key: &str) -> Result<()> {
        self.backend.remove_item(key)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => {
                let mut keys: Vec<String> = keys
                    .into_iter()
                    .filter(|k| k.starts_with(prefix))
                    .collect();
                keys.sort();
                keys
            }
            Err(e) => {
                tracing::warn!("Could not list storage keys: {}", e);
                Vec::new()
            }
        }
    }

    fn read_object(&self, collection: &str) -> Result<Map<String, Value>> {
        match self.try_read_value::<Value>(collection)? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(other) =>
                Err(AppError::Decode {
                    key: collection.to_string(),
                    reason: format!("expected an object, found {}", json_kind(&other)),
                }),
        }
    }

    fn read_object_lenient(&self, collection: &str) -> Map<String, Value> {
        self.read_object(collection).unwrap_or_else(|e| {
            tracing::warn!("Treating collection {} as empty: {}", collection, e);
            Map::new()
        })
    }

    fn lock_writes(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| AppError::Internal("record store lock poisoned".to_string()))
    }

    fn write_object(&self, collection: &str, map: &Map<String, Value>) -> Result<()> {
        let raw = serde_json::to_string(map)?;
        self.backend.set_item(collection, &raw)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
