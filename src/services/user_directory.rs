use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::PlatformPolicy;
use crate::crypto::{ hash_password, verify_password };
use crate::db::{ keys, DeletedUser, RecentLogin, RecordStore, UserProfile, UserRecord };
use crate::enums::{ Role, UserStatus, VerificationStatus };
use crate::error::{ AppError, Result };
use crate::services::registration::RegistrationForm;
use crate::services::session_store::SessionStore;
use crate::services::settings_service::SettingsService;

/// How a stored account is addressed.
#[derive(Debug, Clone, Copy)]
pub enum UserLookup<'a> {
    Email(&'a str),
    Id(&'a str),
}

/// Registration, login and account administration over the registered-users collection.
///
/// Every write to a stored user goes through [`UserDirectory::update_user`] (or holds the
/// same lock), so read-modify-write cycles inside one process never interleave.
pub struct UserDirectory {
    store: RecordStore,
    session: Arc<SessionStore>,
    settings: Arc<SettingsService>,
    policy: PlatformPolicy,
    write_lock: Mutex<()>,
}

impl UserDirectory {
    pub fn new(
        store: RecordStore,
        session: Arc<SessionStore>,
        settings: Arc<SettingsService>,
        policy: PlatformPolicy
    ) -> Self {
        Self {
            store,
            session,
            settings,
            policy,
            write_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &PlatformPolicy {
        &self.policy
    }

    pub async fn register(&self, form: RegistrationForm) -> Result<UserProfile> {
        form.validate()?;

        if !self.settings.current().allow_registrations {
            return Err(AppError::RegistrationsClosed);
        }

        self.simulate_latency().await;

        let email = form.email.trim().to_string();
        let password_hash = hash_password(&form.password)?;

        let record = {
            let _guard = self.write_lock.lock().await;

            if self.find_record(UserLookup::Email(&email)).is_some() {
                return Err(AppError::DuplicateEmail(email));
            }

            let now = Utc::now();
            let record = UserRecord {
                uid: Uuid::new_v4().to_string(),
                role: self.policy.roles.role_for(&email, self.policy.email_matching),
                email,
                password_hash,
                first_name: form.first_name.trim().to_string(),
                last_name: form.last_name.trim().to_string(),
                phone: form.phone.trim().to_string(),
                country: form.country.trim().to_string(),
                balance: self.policy.starter_balance,
                total_invested: rust_decimal::Decimal::ZERO,
                total_earnings: rust_decimal::Decimal::ZERO,
                // No KYC gate at sign-up.
                is_verified: true,
                verification_status: VerificationStatus::Approved,
                status: UserStatus::Active,
                created_at: now,
                last_login: Some(now),
                version: 1,
            };

            self.store.save(keys::REGISTERED_USERS, &record.uid, &record)?;
            record
        };

        tracing::info!("Registered user {} ({})", record.uid, record.email);

        let profile = UserProfile::from(&record);
        self.session.set_current_user(&profile)?;
        self.remember_recent_login(&record)?;

        Ok(profile)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let email = email.trim();
        let record = self.find_record(UserLookup::Email(email)).ok_or(AppError::UserNotFound)?;

        if !verify_password(password, &record.password_hash)? {
            tracing::info!("Rejected login for {}: password mismatch", record.email);
            return Err(AppError::InvalidCredentials);
        }

        if record.status == UserStatus::Blocked {
            return Err(AppError::AccountBlocked);
        }

        let role = self.policy.roles.role_for(&record.email, self.policy.email_matching);
        if role != Role::Admin && self.settings.current().maintenance_mode {
            return Err(AppError::MaintenanceMode);
        }

        let record = self.update_user(UserLookup::Id(&record.uid), |user| {
            user.last_login = Some(Utc::now());
            user.role = role;
            Ok(())
        }).await?;

        tracing::info!("User {} logged in as {}", record.email, record.role);

        let profile = UserProfile::from(&record);
        self.session.set_current_user(&profile)?;
        self.remember_recent_login(&record)?;

        Ok(profile)
    }

    pub fn logout(&self) -> Result<()> {
        if let Some(profile) = self.session.get_current_user() {
            tracing::info!("User {} logged out", profile.email);
        }
        self.session.clear()
    }

    pub fn get_current_user(&self) -> Option<UserProfile> {
        self.session.get_current_user()
    }

    pub fn list_users(&self) -> Vec<UserProfile> {
        let mut users: Vec<UserProfile> = self
            .all_records()
            .iter()
            .map(UserProfile::from)
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        users
    }

    pub fn get_user(&self, lookup: UserLookup<'_>) -> Result<UserProfile> {
        self.find_record(lookup)
            .map(|record| UserProfile::from(&record))
            .ok_or_else(|| Self::not_found(lookup))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<UserProfile> {
        self.get_user(UserLookup::Email(email))
    }

    /// Apply `change` to a stored user under the directory lock, bump its version and
    /// persist it. The session is refreshed when the change concerns the current user.
    pub async fn update_user<F>(&self, lookup: UserLookup<'_>, change: F) -> Result<UserRecord>
        where F: FnOnce(&mut UserRecord) -> Result<()>
    {
        let _guard = self.write_lock.lock().await;

        let mut record = self.find_record(lookup).ok_or_else(|| Self::not_found(lookup))?;
        change(&mut record)?;
        record.version += 1;
        self.store.save(keys::REGISTERED_USERS, &record.uid, &record)?;

        if let Some(current) = self.session.get_current_user() {
            if current.uid == record.uid {
                if let Err(e) = self.session.set_current_user(&UserProfile::from(&record)) {
                    tracing::warn!("Stored user {} but could not refresh session: {}", record.uid, e);
                }
            }
        }

        Ok(record)
    }

    pub async fn block_user(&self, email: &str, admin: &str) -> Result<UserProfile> {
        self.set_status(email, UserStatus::Blocked, admin).await
    }

    pub async fn unblock_user(&self, email: &str, admin: &str) -> Result<UserProfile> {
        self.set_status(email, UserStatus::Active, admin).await
    }

    /// Remove the account from the registered-users collection and keep a tombstone.
    pub async fn delete_user(&self, email: &str, admin: &str) -> Result<DeletedUser> {
        let tombstone = {
            let _guard = self.write_lock.lock().await;

            let record = self
                .find_record(UserLookup::Email(email))
                .ok_or_else(|| Self::not_found(UserLookup::Email(email)))?;

            let tombstone = DeletedUser {
                uid: record.uid.clone(),
                email: record.email.clone(),
                deleted_at: Utc::now(),
                deleted_by: admin.to_string(),
            };
            self.store.save(keys::DELETED_USERS, &tombstone.uid, &tombstone)?;
            self.store.remove(keys::REGISTERED_USERS, &record.uid)?;
            tombstone
        };

        if self.session.get_current_user().is_some_and(|current| current.uid == tombstone.uid) {
            self.session.clear()?;
        }
        self.forget_recent_login(&tombstone.email)?;

        tracing::info!("User {} deleted by {}", tombstone.email, admin);
        Ok(tombstone)
    }

    pub fn deleted_users(&self) -> Vec<DeletedUser> {
        self.store.all(keys::DELETED_USERS)
    }

    pub fn recent_logins(&self) -> Vec<RecentLogin> {
        self.store.read_value(keys::RECENT_LOGINS).unwrap_or_default()
    }

    pub fn forget_recent_login(&self, email: &str) -> Result<()> {
        let mut recent = self.recent_logins();
        let before = recent.len();
        recent.retain(|entry| !self.policy.email_matching.matches(&entry.email, email));
        if recent.len() == before {
            return Ok(());
        }
        self.store.write_value(keys::RECENT_LOGINS, &recent)
    }

    pub(crate) fn all_records(&self) -> Vec<UserRecord> {
        self.store.all(keys::REGISTERED_USERS)
    }

    pub(crate) fn try_all_records(&self) -> Result<Vec<UserRecord>> {
        self.store.try_all(keys::REGISTERED_USERS)
    }

    fn find_record(&self, lookup: UserLookup<'_>) -> Option<UserRecord> {
        match lookup {
            UserLookup::Id(uid) => self.store.get(keys::REGISTERED_USERS, uid),
            UserLookup::Email(email) =>
                self
                    .all_records()
                    .into_iter()
                    .find(|record| self.policy.email_matching.matches(&record.email, email)),
        }
    }

    async fn set_status(&self, email: &str, status: UserStatus, admin: &str) -> Result<UserProfile> {
        let record = self.update_user(UserLookup::Email(email), |user| {
            user.status = status;
            Ok(())
        }).await?;

        tracing::info!("User {} set to {} by {}", record.email, status, admin);
        Ok(UserProfile::from(&record))
    }

    fn remember_recent_login(&self, record: &UserRecord) -> Result<()> {
        let mut recent = self.recent_logins();
        recent.retain(|entry| !self.policy.email_matching.matches(&entry.email, &record.email));
        recent.insert(0, RecentLogin {
            email: record.email.clone(),
            display_name: record.display_name(),
            country: record.country.clone(),
            last_used: Utc::now(),
        });
        recent.truncate(self.policy.recent_logins_limit);
        self.store.write_value(keys::RECENT_LOGINS, &recent)
    }

    pub(crate) async fn simulate_latency(&self) {
        if !self.policy.simulated_latency.is_zero() {
            tokio::time::sleep(self.policy.simulated_latency).await;
        }
    }

    fn not_found(lookup: UserLookup<'_>) -> AppError {
        match lookup {
            UserLookup::Email(email) => AppError::NotFound(format!("User {} not found", email)),
            UserLookup::Id(uid) => AppError::NotFound(format!("User id {} not found", uid)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailMatching;
    use crate::db::SiteSettingsPatch;
    use crate::services::test_support::{ directory, directory_with, form };
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_register_then_login_roundtrip() {
        let (users, _) = directory();

        let registered = users.register(form("alice@example.com")).await.unwrap();
        assert_eq!(registered.balance, users.policy().starter_balance);
        assert!(registered.is_verified);
        assert_eq!(registered.verification_status, VerificationStatus::Approved);
        assert_eq!(registered.role, Role::User);

        users.logout().unwrap();
        assert!(users.get_current_user().is_none());

        let logged_in = users.login("alice@example.com", "Passw0rd!").await.unwrap();
        assert_eq!(logged_in.uid, registered.uid);
        assert_eq!(logged_in.email, registered.email);
        assert_eq!(logged_in.balance, registered.balance);
        assert!(logged_in.last_login >= registered.last_login);
        assert_eq!(users.get_current_user().unwrap().uid, registered.uid);
    }

    #[tokio::test]
    async fn test_password_is_never_stored_in_clear() {
        let (users, store) = directory();
        users.register(form("alice@example.com")).await.unwrap();

        let raw = store.all::<serde_json::Value>(keys::REGISTERED_USERS);
        let serialized = serde_json::to_string(&raw).unwrap();
        assert!(!serialized.contains("Passw0rd!"));
        assert!(!serialized.contains("\"password\""));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (users, _) = directory();
        users.register(form("alice@example.com")).await.unwrap();

        let err = users.register(form("alice@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail(_)));
        assert_eq!(users.list_users().len(), 1);
    }

    #[tokio::test]
    async fn test_email_matching_policy() {
        let (exact, _) = directory();
        exact.register(form("alice@example.com")).await.unwrap();
        exact.register(form("Alice@example.com")).await.unwrap();
        assert_eq!(exact.list_users().len(), 2);

        let mut policy = PlatformPolicy::default();
        policy.email_matching = EmailMatching::CaseInsensitive;
        let (relaxed, _) = directory_with(policy);
        relaxed.register(form("alice@example.com")).await.unwrap();
        assert!(matches!(
            relaxed.register(form("Alice@example.com")).await,
            Err(AppError::DuplicateEmail(_))
        ));
        assert!(relaxed.login("ALICE@example.com", "Passw0rd!").await.is_ok());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (users, _) = directory();
        users.register(form("alice@example.com")).await.unwrap();

        assert!(matches!(users.login("bob@example.com", "x").await, Err(AppError::UserNotFound)));
        assert!(matches!(
            users.login("alice@example.com", "wrong").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_admin_role_comes_from_policy() {
        let (users, _) = directory();
        let admin = users.register(form("admin@investdesk.local")).await.unwrap();
        assert_eq!(admin.role, Role::Admin);

        let user = users.register(form("carol@example.com")).await.unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn test_blocked_user_cannot_login() {
        let (users, _) = directory();
        users.register(form("alice@example.com")).await.unwrap();

        let blocked = users.block_user("alice@example.com", "admin").await.unwrap();
        assert_eq!(blocked.status, UserStatus::Blocked);
        assert!(matches!(
            users.login("alice@example.com", "Passw0rd!").await,
            Err(AppError::AccountBlocked)
        ));

        users.unblock_user("alice@example.com", "admin").await.unwrap();
        assert!(users.login("alice@example.com", "Passw0rd!").await.is_ok());
    }

    #[tokio::test]
    async fn test_site_switches() {
        let (users, _) = directory();
        users.register(form("alice@example.com")).await.unwrap();
        users.register(form("admin@investdesk.local")).await.unwrap();

        users.settings
            .update_site_settings(
                SiteSettingsPatch {
                    maintenance_mode: Some(true),
                    allow_registrations: Some(false),
                    ..Default::default()
                },
                "admin"
            )
            .unwrap();

        assert!(matches!(
            users.register(form("dave@example.com")).await,
            Err(AppError::RegistrationsClosed)
        ));
        assert!(matches!(
            users.login("alice@example.com", "Passw0rd!").await,
            Err(AppError::MaintenanceMode)
        ));
        assert!(users.login("admin@investdesk.local", "Passw0rd!").await.is_ok());
    }

    #[tokio::test]
    async fn test_recent_logins_are_mru_and_capped() {
        let (users, _) = directory();
        for email in ["a@example.com", "b@example.com", "c@example.com", "d@example.com"] {
            users.register(form(email)).await.unwrap();
        }
        users.login("b@example.com", "Passw0rd!").await.unwrap();

        let emails: Vec<String> = users
            .recent_logins()
            .into_iter()
            .map(|entry| entry.email)
            .collect();
        assert_eq!(emails, vec!["b@example.com", "d@example.com", "c@example.com"]);
    }

    #[tokio::test]
    async fn test_update_user_refreshes_session_and_version() {
        let (users, _) = directory();
        let profile = users.register(form("alice@example.com")).await.unwrap();

        let updated = users
            .update_user(UserLookup::Id(&profile.uid), |user| {
                user.balance += Decimal::from(5);
                Ok(())
            }).await
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(
            users.get_current_user().unwrap().balance,
            profile.balance + Decimal::from(5)
        );
    }

    #[tokio::test]
    async fn test_failed_change_is_not_persisted() {
        let (users, _) = directory();
        let profile = users.register(form("alice@example.com")).await.unwrap();

        let result = users.update_user(UserLookup::Id(&profile.uid), |user| {
            user.balance = Decimal::ZERO;
            Err(AppError::InsufficientBalance)
        }).await;

        assert!(result.is_err());
        assert_eq!(users.get_user_by_email("alice@example.com").unwrap().balance, profile.balance);
    }

    #[tokio::test]
    async fn test_delete_leaves_tombstone() {
        let (users, _) = directory();
        users.register(form("alice@example.com")).await.unwrap();

        let tombstone = users.delete_user("alice@example.com", "admin@investdesk.local").await.unwrap();

        assert!(users.list_users().is_empty());
        assert!(users.get_current_user().is_none());
        assert!(users.recent_logins().is_empty());
        assert_eq!(users.deleted_users(), vec![tombstone]);
        assert!(matches!(
            users.login("alice@example.com", "Passw0rd!").await,
            Err(AppError::UserNotFound)
        ));
    }
}
