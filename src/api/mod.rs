use std::time::Duration;

use axum::{ http::{ header, HeaderMap }, routing::{ get, post, put }, Router };

pub mod auth;
pub mod ledger;
pub mod verification;
pub mod chat;
pub mod admin;

use crate::db::{ ClientInfo, UserProfile };
use crate::enums::UserStatus;
use crate::error::{ AppError, Result };
use crate::services::{ Platform, UserLookup };

#[derive(Clone)]
pub struct AppState {
    pub platform: Platform,
    pub chat_poll_interval: Duration,
}

impl AppState {
    pub fn new(platform: Platform, chat_poll_interval: Duration) -> Self {
        Self {
            platform,
            chat_poll_interval,
        }
    }

    /// The signed-in user, refreshed from storage so role and status changes apply at once.
    pub fn require_user(&self) -> Result<UserProfile> {
        let session = self.platform.users
            .get_current_user()
            .ok_or_else(|| AppError::Forbidden("Sign in first".to_string()))?;

        let profile = self.platform.users.get_user(UserLookup::Id(&session.uid))?;
        if profile.status == UserStatus::Blocked {
            return Err(AppError::AccountBlocked);
        }
        Ok(profile)
    }

    pub fn require_admin(&self) -> Result<UserProfile> {
        let profile = self.require_user()?;
        if !profile.is_admin() {
            return Err(AppError::Forbidden("Administrator access required".to_string()));
        }
        Ok(profile)
    }

    /// Record an already committed change. A failed audit write is logged, not returned.
    pub async fn audit(&self, actor: &UserProfile, action: &str, details: &str, headers: &HeaderMap) {
        let recorded = self.platform.activity.track_activity(
            &actor.uid,
            &actor.email,
            action,
            details,
            client_info(headers)
        ).await;

        if let Err(e) = recorded {
            tracing::warn!("Could not record {} by {}: {}", action, actor.email, e);
        }
    }
}

pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    ClientInfo {
        ip_address: header_value("x-forwarded-for").map(|forwarded| {
            forwarded.split(',').next().unwrap_or_default().trim().to_string()
        }),
        user_agent: header_value(header::USER_AGENT.as_str()),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::current_user))
        .route("/api/auth/recent", get(auth::recent_logins))
        // Ledger
        .route("/api/ledger/plans", get(ledger::list_plans))
        .route("/api/ledger/transactions", get(ledger::list_transactions))
        .route("/api/ledger/investments", get(ledger::list_investments))
        .route("/api/ledger/deposit", post(ledger::deposit))
        .route("/api/ledger/withdraw", post(ledger::withdraw))
        .route("/api/ledger/invest", post(ledger::invest))
        // Verification
        .route("/api/verification", get(verification::my_verifications).post(verification::submit))
        // Chat
        .route("/api/chat/messages", get(chat::my_messages).post(chat::send))
        .route("/api/chat/read", post(chat::mark_read))
        .route("/api/chat/unread", get(chat::my_unread))
        .route("/api/chat/poll", get(chat::poll))
        // Admin
        .route("/api/admin/stats", get(admin::dashboard_stats))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/deleted", get(admin::deleted_users))
        .route("/api/admin/users/{email}/block", post(admin::block_user))
        .route("/api/admin/users/{email}/unblock", post(admin::unblock_user))
        .route("/api/admin/users/{email}", axum::routing::delete(admin::delete_user))
        .route("/api/admin/users/{email}/profit", post(admin::add_profit))
        .route("/api/admin/users/{email}/deduct", post(admin::deduct_balance))
        .route(
            "/api/admin/transactions/{user_id}/{tx_id}/status",
            put(admin::update_transaction_status)
        )
        .route("/api/admin/verifications", get(admin::list_verifications))
        .route("/api/admin/verifications/{id}", get(admin::get_verification))
        .route("/api/admin/verifications/{id}/status", put(admin::update_verification_status))
        .route("/api/admin/verifications/{id}/notes", put(admin::update_verification_notes))
        .route("/api/admin/activity/logins", get(admin::login_activities))
        .route("/api/admin/activity/users", get(admin::user_activities))
        .route("/api/admin/settings", get(admin::get_settings).put(admin::update_settings))
        .route("/api/admin/chat", get(admin::list_threads))
        .route(
            "/api/admin/chat/{thread_id}",
            get(admin::thread_messages).post(admin::reply)
        )
        .route("/api/admin/chat/{thread_id}/open", post(admin::open_thread))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::{ signed_in, state };

    #[test]
    fn test_client_info_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert(header::USER_AGENT, "curl/8.0".parse().unwrap());

        let info = client_info(&headers);
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[tokio::test]
    async fn test_admin_gate_follows_session_role() {
        let state = state();
        assert!(matches!(state.require_user(), Err(AppError::Forbidden(_))));

        signed_in(&state, "alice@example.com").await;
        assert!(state.require_user().is_ok());
        assert!(matches!(state.require_admin(), Err(AppError::Forbidden(_))));

        signed_in(&state, "admin@investdesk.local").await;
        assert!(state.require_admin().unwrap().is_admin());
    }

    #[test]
    fn test_router_builds() {
        let _ = router(state());
    }
}
