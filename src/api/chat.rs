use std::time::Duration;

use axum::{ extract::{ Query, State }, http::StatusCode, Json };
use serde::{ Deserialize, Serialize };

use crate::db::ChatMessage;
use crate::enums::Sender;
use crate::error::Result;
use crate::services::ThreadSnapshot;

use super::AppState;

const MAX_POLL_WAIT_SECS: u64 = 30;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct PollParams {
    pub wait_secs: Option<u64>,
}

#[derive(Serialize)]
pub struct UnreadResponse {
    pub unread: bool,
}

/// The signed-in user's conversation with support. Threads are keyed by user id.
pub async fn my_messages(State(state): State<AppState>) -> Result<Json<Vec<ChatMessage>>> {
    let user = state.require_user()?;
    Ok(Json(state.platform.chat.list_thread_messages(&user.uid)))
}

pub async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>
) -> Result<(StatusCode, Json<ChatMessage>)> {
    let user = state.require_user()?;
    let message = state.platform.chat.send_message(
        &user.uid,
        Sender::User,
        Some(&user.display_name()),
        &request.content
    )?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read(State(state): State<AppState>) -> Result<StatusCode> {
    let user = state.require_user()?;
    state.platform.chat.mark_thread_read(&user.uid, Sender::User)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_unread(State(state): State<AppState>) -> Result<Json<UnreadResponse>> {
    let user = state.require_user()?;
    let unread = state.platform.chat
        .get_thread_preview(&user.uid)
        .is_some_and(|preview| preview.is_unread_for(Sender::User));

    Ok(Json(UnreadResponse { unread }))
}

/// Long poll: answers as soon as the thread changes, or with the current state after
/// `wait_secs`.
pub async fn poll(
    State(state): State<AppState>,
    Query(params): Query<PollParams>
) -> Result<Json<ThreadSnapshot>> {
    let user = state.require_user()?;
    let wait = Duration::from_secs(params.wait_secs.unwrap_or(MAX_POLL_WAIT_SECS).min(MAX_POLL_WAIT_SECS));

    let mut watch = state.platform.chat.watch_thread(&user.uid, state.chat_poll_interval);
    let snapshot = match tokio::time::timeout(wait, watch.changed()).await {
        Ok(changed) => changed?,
        Err(_) => watch.current(),
    };
    watch.stop();

    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{ signed_in, state };

    #[tokio::test]
    async fn test_admin_reply_shows_as_unread() {
        let state = state();
        let alice = signed_in(&state, "alice@example.com").await;

        send(State(state.clone()), Json(SendMessageRequest { content: "Hi".to_string() })).await.unwrap();
        state.platform.chat.send_message(&alice.uid, Sender::Admin, None, "Hello").unwrap();

        let Json(unread) = my_unread(State(state.clone())).await.unwrap();
        assert!(unread.unread);

        mark_read(State(state.clone())).await.unwrap();
        let Json(unread) = my_unread(State(state.clone())).await.unwrap();
        assert!(!unread.unread);

        let Json(messages) = my_messages(State(state)).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_poll_returns_current_state_on_timeout() {
        let state = state();
        let alice = signed_in(&state, "alice@example.com").await;
        state.platform.chat.send_message(&alice.uid, Sender::Admin, None, "Hello").unwrap();

        let Json(snapshot) = poll(State(state), Query(PollParams { wait_secs: Some(0) })).await.unwrap();
        assert_eq!(snapshot.messages.len(), 1);
    }
}
