use axum::{ extract::State, http::{ HeaderMap, StatusCode }, Json };
use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use serde::Deserialize;

use crate::db::{ NewVerification, VerificationRequest };
use crate::enums::DocumentType;
use crate::error::{ AppError, Result };
use crate::services::{ read_as_data_url, DocumentSlot, DocumentUploads };

use super::AppState;

/// One uploaded file, base64 in transit and re-encoded as a data-URL on arrival.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFile {
    pub slot: DocumentSlot,
    pub mime_type: String,
    pub content_base64: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVerificationRequest {
    pub document_type: Option<DocumentType>,
    pub document_number: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub files: Vec<DocumentFile>,
}

pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SubmitVerificationRequest>
) -> Result<(StatusCode, Json<VerificationRequest>)> {
    let user = state.require_user()?;

    let mut conversions = tokio::task::JoinSet::new();
    for file in request.files {
        let bytes = STANDARD.decode(file.content_base64.trim()).map_err(|e|
            AppError::validation(file.slot.field_name(), format!("Invalid base64: {}", e))
        )?;
        conversions.spawn(async move { read_as_data_url(file.slot, &file.mime_type, bytes).await });
    }

    let mut uploads = DocumentUploads::default();
    while let Some(done) = conversions.join_next().await {
        let (slot, data_url) = done.map_err(|e|
            AppError::Internal(format!("Upload task failed: {}", e))
        )??;
        uploads.apply(slot, data_url);
    }

    let mut new = NewVerification {
        user_email: user.email.clone(),
        user_name: user.display_name(),
        document_type: request.document_type,
        document_number: request.document_number,
        country: request.country,
        ..Default::default()
    };
    uploads.attach_to(&mut new);

    let submitted = state.platform.verification.submit_verification(new).await?;

    state.audit(
        &user,
        "verification",
        &format!("Submitted {} for review", submitted.document_type),
        &headers
    ).await;

    Ok((StatusCode::CREATED, Json(submitted)))
}

pub async fn my_verifications(State(state): State<AppState>) -> Result<Json<Vec<VerificationRequest>>> {
    let user = state.require_user()?;

    let mine: Vec<VerificationRequest> = state.platform.verification
        .get_verifications()
        .into_iter()
        .filter(|request| request.user_email == user.email)
        .collect();

    Ok(Json(mine))
}
