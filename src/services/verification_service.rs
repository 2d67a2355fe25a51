use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::db::{ keys, NewVerification, RecordStore, VerificationRequest };
use crate::enums::{ ReviewStatus, VerificationStatus };
use crate::error::{ AppError, Result };
use crate::services::document_upload::is_data_url;
use crate::services::user_directory::{ UserDirectory, UserLookup };
use crate::validation;

/// Identity-document review queue. Status changes are mirrored onto the owning user.
pub struct VerificationService {
    store: RecordStore,
    users: Arc<UserDirectory>,
}

impl VerificationService {
    pub fn new(store: RecordStore, users: Arc<UserDirectory>) -> Self {
        Self { store, users }
    }

    pub async fn submit_verification(&self, new: NewVerification) -> Result<VerificationRequest> {
        let document_type = new.document_type.ok_or_else(||
            AppError::validation("documentType", "Select a document type")
        )?;
        if let Some(missing) = validation::required("userEmail", &new.user_email) {
            return Err(missing.into());
        }

        let front_image = Self::image("frontImage", new.front_image, true)?;
        let back_image = Self::image("backImage", new.back_image, document_type.requires_back_image())?;
        let selfie_image = Self::image("selfieImage", new.selfie_image, true)?;

        let owner = self.users.get_user_by_email(new.user_email.trim())?;

        let now = Utc::now();
        let auto_approve = self.users.policy().auto_approve_verifications;
        let request = VerificationRequest {
            id: Uuid::new_v4().to_string(),
            user_email: owner.email.clone(),
            user_name: if new.user_name.trim().is_empty() {
                owner.display_name()
            } else {
                new.user_name.trim().to_string()
            },
            document_type,
            document_number: new.document_number.filter(|n| !n.trim().is_empty()),
            country: new.country.filter(|c| !c.trim().is_empty()),
            front_image,
            back_image,
            selfie_image,
            status: if auto_approve {
                ReviewStatus::Approved
            } else {
                ReviewStatus::Pending
            },
            submitted_date: now,
            approved_date: auto_approve.then_some(now),
            rejected_date: None,
            admin_notes: None,
        };

        self.store.save(keys::VERIFICATION_REQUESTS, &request.id, &request)?;
        self.sync_user(&request).await?;

        tracing::info!(
            "Verification {} submitted for {} ({})",
            request.id,
            request.user_email,
            request.status
        );
        Ok(request)
    }

    pub fn get_verifications(&self) -> Vec<VerificationRequest> {
        let mut requests: Vec<VerificationRequest> = self.store.all(keys::VERIFICATION_REQUESTS);
        requests.sort_by(|a, b| b.submitted_date.cmp(&a.submitted_date));
        requests
    }

    pub fn get_pending_verifications(&self) -> Vec<VerificationRequest> {
        self.get_verifications()
            .into_iter()
            .filter(|request| request.status == ReviewStatus::Pending)
            .collect()
    }

    pub fn get_verification_by_id(&self, id: &str) -> Result<VerificationRequest> {
        self.store
            .get(keys::VERIFICATION_REQUESTS, id)
            .ok_or_else(|| AppError::NotFound(format!("Verification request {} not found", id)))
    }

    pub async fn update_verification_status(
        &self,
        id: &str,
        status: ReviewStatus,
        admin_notes: Option<String>
    ) -> Result<VerificationRequest> {
        let mut request = self.get_verification_by_id(id)?;
        let now = Utc::now();

        request.status = status;
        match status {
            ReviewStatus::Approved => {
                request.approved_date = Some(now);
                request.rejected_date = None;
            }
            ReviewStatus::Rejected => {
                request.rejected_date = Some(now);
                request.approved_date = None;
            }
            ReviewStatus::Pending => {
                request.approved_date = None;
                request.rejected_date = None;
            }
        }
        if let Some(notes) = admin_notes {
            request.admin_notes = Some(notes);
        }

        self.store.save(keys::VERIFICATION_REQUESTS, &request.id, &request)?;

        match self.sync_user(&request).await {
            Ok(()) | Err(AppError::NotFound(_)) => {}
            Err(e) => {
                return Err(e);
            }
        }

        tracing::info!("Verification {} set to {}", request.id, status);
        Ok(request)
    }

    pub fn update_verification_notes(&self, id: &str, notes: &str) -> Result<VerificationRequest> {
        let mut request = self.get_verification_by_id(id)?;
        request.admin_notes = Some(notes.to_string());
        self.store.save(keys::VERIFICATION_REQUESTS, &request.id, &request)?;
        Ok(request)
    }

    async fn sync_user(&self, request: &VerificationRequest) -> Result<()> {
        let status = VerificationStatus::from(request.status);
        self.users.update_user(UserLookup::Email(&request.user_email), |user| {
            user.verification_status = status;
            user.is_verified = status == VerificationStatus::Approved;
            Ok(())
        }).await?;
        Ok(())
    }

    fn image(field: &str, value: Option<String>, required: bool) -> Result<Option<String>> {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(url) if is_data_url(&url) => Ok(Some(url)),
            Some(_) => Err(AppError::validation(field, "Upload must be an encoded image")),
            None if required => Err(AppError::validation(field, "This document is required")),
            None => Ok(None),
        }
    }
}
