use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };

use crate::enums::{ DocumentType, ReviewStatus };

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub id: String,
    pub user_email: String,
    pub user_name: String,
    pub document_type: DocumentType,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Images are stored as data-URLs.
    #[serde(default)]
    pub front_image: Option<String>,
    #[serde(default)]
    pub back_image: Option<String>,
    #[serde(default)]
    pub selfie_image: Option<String>,
    pub status: ReviewStatus,
    pub submitted_date: DateTime<Utc>,
    #[serde(default)]
    pub approved_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVerification {
    pub user_email: String,
    pub user_name: String,
    pub document_type: Option<DocumentType>,
    pub document_number: Option<String>,
    pub country: Option<String>,
    pub front_image: Option<String>,
    pub back_image: Option<String>,
    pub selfie_image: Option<String>,
}
