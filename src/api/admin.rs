use axum::{ extract::{ Path, Query, State }, http::{ HeaderMap, StatusCode }, Json };
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::{
    ChatMessage,
    DashboardStats,
    DeletedUser,
    LoginActivity,
    SiteSettings,
    SiteSettingsPatch,
    Transaction,
    UserActivity,
    UserProfile,
    VerificationRequest,
};
use crate::enums::{ ReviewStatus, Sender, TxStatus };
use crate::error::Result;
use crate::services::{ BalanceChange, ThreadSummary };

use super::AppState;

const DEFAULT_ACTIVITY_LIMIT: usize = 50;

#[derive(Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
}

#[derive(Deserialize)]
pub struct StatusRequest<S> {
    pub status: S,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub status: ReviewStatus,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Deserialize)]
pub struct NotesRequest {
    pub notes: String,
}

#[derive(Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct VerificationFilter {
    #[serde(default)]
    pub pending: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub content: String,
    #[serde(default)]
    pub user_name: Option<String>,
}

pub async fn dashboard_stats(State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    state.require_admin()?;
    Ok(Json(state.platform.activity.get_dashboard_stats().await))
}

// ─── Users ──────────────────────────────────────────────────────────

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserProfile>>> {
    state.require_admin()?;
    Ok(Json(state.platform.users.list_users()))
}

pub async fn deleted_users(State(state): State<AppState>) -> Result<Json<Vec<DeletedUser>>> {
    state.require_admin()?;
    Ok(Json(state.platform.users.deleted_users()))
}

pub async fn block_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(email): Path<String>
) -> Result<Json<UserProfile>> {
    let admin = state.require_admin()?;
    let user = state.platform.users.block_user(&email, &admin.email).await?;
    state.audit(&admin, "block_user", &format!("Blocked {}", email), &headers).await;
    Ok(Json(user))
}

pub async fn unblock_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(email): Path<String>
) -> Result<Json<UserProfile>> {
    let admin = state.require_admin()?;
    let user = state.platform.users.unblock_user(&email, &admin.email).await?;
    state.audit(&admin, "unblock_user", &format!("Unblocked {}", email), &headers).await;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(email): Path<String>
) -> Result<Json<DeletedUser>> {
    let admin = state.require_admin()?;
    let tombstone = state.platform.users.delete_user(&email, &admin.email).await?;
    state.audit(&admin, "delete_user", &format!("Deleted {}", email), &headers).await;
    Ok(Json(tombstone))
}

pub async fn add_profit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(email): Path<String>,
    Json(request): Json<AmountRequest>
) -> Result<Json<BalanceChange>> {
    let admin = state.require_admin()?;
    let change = state.platform.ledger.add_profit(&email, request.amount).await?;
    state.audit(&admin, "add_profit", &format!("Credited {} to {}", request.amount, email), &headers).await;
    Ok(Json(change))
}

pub async fn deduct_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(email): Path<String>,
    Json(request): Json<AmountRequest>
) -> Result<Json<BalanceChange>> {
    let admin = state.require_admin()?;
    let change = state.platform.ledger.deduct_balance(&email, request.amount).await?;
    state.audit(
        &admin,
        "deduct_balance",
        &format!("Deducted {} from {}", request.amount, email),
        &headers
    ).await;
    Ok(Json(change))
}

pub async fn update_transaction_status(
    State(state): State<AppState>,
    Path((user_id, tx_id)): Path<(String, String)>,
    Json(request): Json<StatusRequest<TxStatus>>
) -> Result<Json<Transaction>> {
    state.require_admin()?;
    let transaction = state.platform.ledger.update_transaction_status(
        &user_id,
        &tx_id,
        request.status
    ).await?;
    Ok(Json(transaction))
}

// ─── Verification ───────────────────────────────────────────────────

pub async fn list_verifications(
    State(state): State<AppState>,
    Query(filter): Query<VerificationFilter>
) -> Result<Json<Vec<VerificationRequest>>> {
    state.require_admin()?;

    let requests = if filter.pending {
        state.platform.verification.get_pending_verifications()
    } else {
        state.platform.verification.get_verifications()
    };
    Ok(Json(requests))
}

pub async fn get_verification(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<VerificationRequest>> {
    state.require_admin()?;
    Ok(Json(state.platform.verification.get_verification_by_id(&id)?))
}

pub async fn update_verification_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReviewRequest>
) -> Result<Json<VerificationRequest>> {
    state.require_admin()?;
    let updated = state.platform.verification.update_verification_status(
        &id,
        request.status,
        request.admin_notes
    ).await?;
    Ok(Json(updated))
}

pub async fn update_verification_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<NotesRequest>
) -> Result<Json<VerificationRequest>> {
    state.require_admin()?;
    Ok(Json(state.platform.verification.update_verification_notes(&id, &request.notes)?))
}

// ─── Activity & settings ────────────────────────────────────────────

pub async fn login_activities(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>
) -> Result<Json<Vec<LoginActivity>>> {
    state.require_admin()?;
    let limit = params.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    Ok(Json(state.platform.activity.get_login_activities(limit).await))
}

pub async fn user_activities(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>
) -> Result<Json<Vec<UserActivity>>> {
    state.require_admin()?;
    let limit = params.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    Ok(Json(state.platform.activity.get_user_activities(limit).await))
}

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<SiteSettings>> {
    state.require_admin()?;
    Ok(Json(state.platform.settings.get_site_settings()?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(patch): Json<SiteSettingsPatch>
) -> Result<Json<SiteSettings>> {
    let admin = state.require_admin()?;
    Ok(Json(state.platform.settings.update_site_settings(patch, &admin.email)?))
}

// ─── Chat ───────────────────────────────────────────────────────────

pub async fn list_threads(State(state): State<AppState>) -> Result<Json<Vec<ThreadSummary>>> {
    state.require_admin()?;
    Ok(Json(state.platform.chat.list_thread_previews()))
}

pub async fn thread_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<String>
) -> Result<Json<Vec<ChatMessage>>> {
    state.require_admin()?;
    Ok(Json(state.platform.chat.list_thread_messages(&thread_id)))
}

pub async fn reply(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(request): Json<ReplyRequest>
) -> Result<(StatusCode, Json<ChatMessage>)> {
    state.require_admin()?;
    let message = state.platform.chat.send_message(
        &thread_id,
        Sender::Admin,
        request.user_name.as_deref(),
        &request.content
    )?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn open_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>
) -> Result<StatusCode> {
    state.require_admin()?;
    state.platform.chat.open_thread(&thread_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{ signed_in, state, state_rejecting };
    use crate::db::keys;
    use crate::error::AppError;

    #[tokio::test]
    async fn test_admin_routes_reject_regular_users() {
        let state = state();
        signed_in(&state, "alice@example.com").await;

        assert!(matches!(list_users(State(state.clone())).await, Err(AppError::Forbidden(_))));
        assert!(matches!(
            block_user(State(state), HeaderMap::new(), Path("alice@example.com".to_string())).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_manages_users_and_balances() {
        let state = state();
        signed_in(&state, "bob@example.com").await;
        signed_in(&state, "admin@investdesk.local").await;

        let Json(blocked) = block_user(
            State(state.clone()),
            HeaderMap::new(),
            Path("bob@example.com".to_string())
        ).await.unwrap();
        assert_eq!(blocked.status, crate::enums::UserStatus::Blocked);

        let Json(change) = add_profit(
            State(state.clone()),
            HeaderMap::new(),
            Path("bob@example.com".to_string()),
            Json(AmountRequest { amount: Decimal::from(500) })
        ).await.unwrap();
        assert_eq!(change.transaction.amount, Decimal::from(500));

        let Json(stats) = dashboard_stats(State(state.clone())).await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.blocked_users, 1);

        let Json(activities) = user_activities(
            State(state),
            Query(LimitParams { limit: Some(1) })
        ).await.unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].action, "add_profit");
    }

    #[tokio::test]
    async fn test_committed_profit_survives_failed_audit() {
        let state = state_rejecting(keys::USER_ACTIVITIES);
        let bob = signed_in(&state, "bob@example.com").await;
        signed_in(&state, "admin@investdesk.local").await;

        let Json(change) = add_profit(
            State(state.clone()),
            HeaderMap::new(),
            Path("bob@example.com".to_string()),
            Json(AmountRequest { amount: Decimal::from(500) })
        ).await.unwrap();

        assert_eq!(change.balance, bob.balance + Decimal::from(500));
        assert_eq!(
            state.platform.users.get_user_by_email("bob@example.com").unwrap().balance,
            change.balance
        );
        let recorded: Vec<Transaction> = state.platform.store.all(&keys::transactions(&bob.uid));
        assert_eq!(recorded.len(), 1);

        let Json(blocked) = block_user(
            State(state),
            HeaderMap::new(),
            Path("bob@example.com".to_string())
        ).await.unwrap();
        assert_eq!(blocked.status, crate::enums::UserStatus::Blocked);
    }
}
