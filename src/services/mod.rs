use std::sync::Arc;

use crate::config::PlatformPolicy;
use crate::db::RecordStore;

pub mod session_store;
pub mod registration;
pub mod settings_service;
pub mod user_directory;
pub mod sample_ledger;
pub mod ledger_service;
pub mod activity_service;
pub mod document_upload;
pub mod verification_service;
pub mod chat_service;

pub use session_store::SessionStore;
pub use registration::{ RegistrationForm, RegistrationStep };
pub use settings_service::SettingsService;
pub use user_directory::{ UserDirectory, UserLookup };
pub use ledger_service::{ investment_plans, BalanceChange, LedgerService };
pub use activity_service::{ ActivityService, ActivitySink, DisconnectedSink };
pub use document_upload::{ read_as_data_url, DocumentSlot, DocumentUploads };
pub use verification_service::VerificationService;
pub use chat_service::{ ChatChannel, ChatEvent, ThreadSnapshot, ThreadSummary, ThreadWatch };

/// Every service wired over one shared store.
#[derive(Clone)]
pub struct Platform {
    pub store: RecordStore,
    pub session: Arc<SessionStore>,
    pub settings: Arc<SettingsService>,
    pub users: Arc<UserDirectory>,
    pub ledger: Arc<LedgerService>,
    pub activity: Arc<ActivityService>,
    pub verification: Arc<VerificationService>,
    pub chat: Arc<ChatChannel>,
}

impl Platform {
    pub fn new(store: RecordStore, policy: PlatformPolicy) -> Self {
        Self::with_sink(store, policy, Arc::new(DisconnectedSink))
    }

    pub fn with_sink(store: RecordStore, policy: PlatformPolicy, sink: Arc<dyn ActivitySink>) -> Self {
        let session = Arc::new(SessionStore::new(store.clone()));
        let settings = Arc::new(SettingsService::new(store.clone()));
        let users = Arc::new(
            UserDirectory::new(store.clone(), session.clone(), settings.clone(), policy)
        );
        let ledger = Arc::new(LedgerService::new(store.clone(), users.clone(), settings.clone()));
        let activity = Arc::new(
            ActivityService::new(store.clone(), sink, users.clone(), ledger.clone())
        );
        let verification = Arc::new(VerificationService::new(store.clone(), users.clone()));
        let chat = Arc::new(ChatChannel::new(store.clone()));

        Self {
            store,
            session,
            settings,
            users,
            ledger,
            activity,
            verification,
            chat,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn form(email: &str) -> RegistrationForm {
        RegistrationForm {
            first_name: "Alice".to_string(),
            last_name: "Martin".to_string(),
            email: email.to_string(),
            phone: "+33 6 12 34 56 78".to_string(),
            country: "FR".to_string(),
            password: "Passw0rd!".to_string(),
            confirm_password: "Passw0rd!".to_string(),
            accept_terms: true,
        }
    }

    pub fn platform() -> Platform {
        platform_with(PlatformPolicy::default())
    }

    pub fn platform_with(policy: PlatformPolicy) -> Platform {
        Platform::new(RecordStore::in_memory(), policy)
    }

    pub fn directory() -> (Arc<UserDirectory>, RecordStore) {
        directory_with(PlatformPolicy::default())
    }

    pub fn directory_with(policy: PlatformPolicy) -> (Arc<UserDirectory>, RecordStore) {
        let platform = platform_with(policy);
        (platform.users, platform.store)
    }
}
