use axum::{ extract::State, http::{ HeaderMap, StatusCode }, Json };
use serde::Deserialize;

use crate::db::{ RecentLogin, UserProfile };
use crate::error::{ AppError, Result };
use crate::services::{ RegistrationForm, UserLookup };

use super::{ client_info, AppState };

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<RegistrationForm>
) -> Result<(StatusCode, Json<UserProfile>)> {
    let profile = state.platform.users.register(form).await?;

    state.audit(&profile, "register", "Account created", &headers).await;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Every attempt lands in the login audit trail, including failures.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>
) -> Result<Json<UserProfile>> {
    let users = &state.platform.users;

    match users.login(&request.email, &request.password).await {
        Ok(profile) => {
            if
                let Err(track_err) = state.platform.activity.track_login(
                    &profile.uid,
                    &profile.email,
                    &profile.display_name(),
                    true,
                    client_info(&headers)
                ).await
            {
                tracing::warn!("Could not record login for {}: {}", profile.email, track_err);
            }
            Ok(Json(profile))
        }
        Err(e) => {
            if !matches!(e, AppError::StorageWrite(_)) {
                let known = users.get_user(UserLookup::Email(request.email.trim())).ok();
                let (uid, name) = known
                    .map(|user| (user.uid.clone(), user.display_name()))
                    .unwrap_or_default();

                if
                    let Err(track_err) = state.platform.activity.track_login(
                        &uid,
                        request.email.trim(),
                        &name,
                        false,
                        client_info(&headers)
                    ).await
                {
                    tracing::warn!("Could not record failed login: {}", track_err);
                }
            }
            Err(e)
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> Result<StatusCode> {
    state.platform.users.logout()?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn current_user(State(state): State<AppState>) -> Result<Json<UserProfile>> {
    Ok(Json(state.require_user()?))
}

pub async fn recent_logins(State(state): State<AppState>) -> Json<Vec<RecentLogin>> {
    Json(state.platform.users.recent_logins())
}
