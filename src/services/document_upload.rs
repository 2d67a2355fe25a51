use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use serde::Deserialize;

use crate::db::NewVerification;
use crate::error::{ AppError, Result };

pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// Image field of a verification request an upload is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSlot {
    Front,
    Back,
    Selfie,
}

impl DocumentSlot {
    pub fn field_name(&self) -> &'static str {
        match self {
            DocumentSlot::Front => "frontImage",
            DocumentSlot::Back => "backImage",
            DocumentSlot::Selfie => "selfieImage",
        }
    }
}

/// Encode an uploaded file as a data-URL. The result carries the slot it was started for,
/// so a conversion that finishes late can only ever fill its own field.
pub async fn read_as_data_url(
    slot: DocumentSlot,
    mime_type: &str,
    bytes: Vec<u8>
) -> Result<(DocumentSlot, String)> {
    let mime_type = mime_type.trim().to_lowercase();
    if !(mime_type.starts_with("image/") || mime_type == "application/pdf") {
        return Err(
            AppError::validation(slot.field_name(), format!("Unsupported file type: {}", mime_type))
        );
    }
    if bytes.is_empty() {
        return Err(AppError::validation(slot.field_name(), "File is empty"));
    }
    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(AppError::validation(slot.field_name(), "File must be 5 MB or smaller"));
    }

    let encoded = tokio::task
        ::spawn_blocking(move || STANDARD.encode(bytes)).await
        .map_err(|e| AppError::Internal(format!("Document encoding task failed: {}", e)))?;

    Ok((slot, format!("data:{};base64,{}", mime_type, encoded)))
}

pub fn is_data_url(value: &str) -> bool {
    value
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .is_some_and(|(mime, payload)| !mime.is_empty() && !payload.is_empty())
}

/// Document images collected for one verification submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUploads {
    pub front: Option<String>,
    pub back: Option<String>,
    pub selfie: Option<String>,
}

impl DocumentUploads {
    pub fn apply(&mut self, slot: DocumentSlot, data_url: String) {
        let target = match slot {
            DocumentSlot::Front => &mut self.front,
            DocumentSlot::Back => &mut self.back,
            DocumentSlot::Selfie => &mut self.selfie,
        };
        *target = Some(data_url);
    }

    pub fn attach_to(self, request: &mut NewVerification) {
        request.front_image = self.front;
        request.back_image = self.back;
        request.selfie_image = self.selfie;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn delayed(slot: DocumentSlot, delay_ms: u64, bytes: &[u8]) -> Result<(DocumentSlot, String)> {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        read_as_data_url(slot, "image/png", bytes.to_vec()).await
    }

    #[tokio::test]
    async fn test_encodes_data_url() {
        let (slot, url) = read_as_data_url(DocumentSlot::Front, "image/png", b"png".to_vec()).await.unwrap();
        assert_eq!(slot, DocumentSlot::Front);
        assert_eq!(url, "data:image/png;base64,cG5n");
        assert!(is_data_url(&url));
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        assert!(read_as_data_url(DocumentSlot::Front, "text/plain", b"x".to_vec()).await.is_err());
        assert!(read_as_data_url(DocumentSlot::Back, "image/png", Vec::new()).await.is_err());
        assert!(
            read_as_data_url(DocumentSlot::Selfie, "image/jpeg", vec![0; MAX_DOCUMENT_BYTES + 1]).await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_out_of_order_completion_fills_own_field() {
        let mut uploads = DocumentUploads::default();
        let mut pending = tokio::task::JoinSet::new();
        pending.spawn(delayed(DocumentSlot::Front, 40, b"front"));
        pending.spawn(delayed(DocumentSlot::Selfie, 0, b"selfie"));

        while let Some(done) = pending.join_next().await {
            let (slot, url) = done.unwrap().unwrap();
            uploads.apply(slot, url);
        }

        assert_eq!(uploads.front.as_deref(), Some("data:image/png;base64,ZnJvbnQ="));
        assert_eq!(uploads.selfie.as_deref(), Some("data:image/png;base64,c2VsZmll"));
        assert!(uploads.back.is_none());
    }

    #[test]
    fn test_data_url_shape() {
        assert!(!is_data_url("https://example.com/a.png"));
        assert!(!is_data_url("data:image/png;base64,"));
    }
}
