use std::sync::RwLock;

use crate::db::{ keys, RecordStore, UserProfile };
use crate::error::{ AppError, Result };

/// The active identity of one application shell (one browser tab in the original UI).
///
/// The cached profile and the persisted key are updated together: storage is written
/// first, so a failed write leaves both untouched.
pub struct SessionStore {
    store: RecordStore,
    current: RwLock<Option<UserProfile>>,
}

impl SessionStore {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    /// Cached profile, else whatever the session key holds. Absent or unreadable
    /// sessions mean "logged out".
    pub fn get_current_user(&self) -> Option<UserProfile> {
        if let Ok(current) = self.current.read() {
            if current.is_some() {
                return current.clone();
            }
        }

        let loaded: Option<UserProfile> = self.store.read_value(keys::SESSION);
        if let (Some(profile), Ok(mut current)) = (&loaded, self.current.write()) {
            *current = Some(profile.clone());
        }
        loaded
    }

    pub fn set_current_user(&self, profile: &UserProfile) -> Result<()> {
        self.store.write_value(keys::SESSION, profile)?;
        let mut current = self.current.write().map_err(|_| Self::poisoned())?;
        *current = Some(profile.clone());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.store.delete_value(keys::SESSION)?;
        let mut current = self.current.write().map_err(|_| Self::poisoned())?;
        *current = None;
        Ok(())
    }

    fn poisoned() -> AppError {
        AppError::Internal("session lock poisoned".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ MemoryStorage, StorageBackend };
    use crate::enums::{ Role, UserStatus, VerificationStatus };
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn profile(uid: &str) -> UserProfile {
        UserProfile {
            uid: uid.to_string(),
            email: format!("{}@example.com", uid),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            phone: "+3312345678".to_string(),
            country: "FR".to_string(),
            balance: Decimal::from(10_000),
            total_invested: Decimal::ZERO,
            total_earnings: Decimal::ZERO,
            is_verified: true,
            verification_status: VerificationStatus::Approved,
            status: UserStatus::Active,
            role: Role::User,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_set_get_clear() {
        let session = SessionStore::new(RecordStore::in_memory());
        assert!(session.get_current_user().is_none());

        session.set_current_user(&profile("u1")).unwrap();
        assert_eq!(session.get_current_user().unwrap().uid, "u1");
        assert_eq!(session.get_current_user(), session.get_current_user());

        session.clear().unwrap();
        assert!(session.get_current_user().is_none());
    }

    #[test]
    fn test_loads_persisted_session() {
        let store = RecordStore::in_memory();
        SessionStore::new(store.clone()).set_current_user(&profile("u2")).unwrap();

        let reopened = SessionStore::new(store);
        assert_eq!(reopened.get_current_user().unwrap().uid, "u2");
    }

    #[test]
    fn test_corrupt_session_is_logged_out() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set_item(keys::SESSION, "{\"uid\":").unwrap();
        let session = SessionStore::new(RecordStore::new(backend));

        assert!(session.get_current_user().is_none());
    }

    #[test]
    fn test_failed_write_keeps_cache_consistent() {
        let session = SessionStore::new(RecordStore::new(Arc::new(MemoryStorage::with_quota(4))));

        assert!(session.set_current_user(&profile("u3")).is_err());
        assert!(session.get_current_user().is_none());
    }
}
