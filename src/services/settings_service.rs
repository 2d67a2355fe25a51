use chrono::Utc;

use crate::db::{ keys, RecordStore, SiteSettings, SiteSettingsPatch };
use crate::error::{ AppError, Result };
use crate::validation;

pub struct SettingsService {
    store: RecordStore,
}

impl SettingsService {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Read the singleton, creating and persisting defaults on first access.
    pub fn get_site_settings(&self) -> Result<SiteSettings> {
        if let Some(settings) = self.store.read_value::<SiteSettings>(keys::SITE_SETTINGS) {
            return Ok(settings);
        }

        let settings = SiteSettings::defaults_at(Utc::now());
        self.store.write_value(keys::SITE_SETTINGS, &settings)?;
        tracing::info!("Initialised default site settings");
        Ok(settings)
    }

    /// Settings for read-only decisions; falls back to defaults when they cannot be
    /// persisted.
    pub fn current(&self) -> SiteSettings {
        self.get_site_settings().unwrap_or_else(|e| {
            tracing::warn!("Using default site settings: {}", e);
            SiteSettings::defaults_at(Utc::now())
        })
    }

    pub fn update_site_settings(
        &self,
        patch: SiteSettingsPatch,
        updated_by: &str
    ) -> Result<SiteSettings> {
        let mut settings = self.get_site_settings()?;

        if let Some(value) = patch.maintenance_mode {
            settings.maintenance_mode = value;
        }
        if let Some(value) = patch.allow_registrations {
            settings.allow_registrations = value;
        }
        if let Some(value) = patch.auto_approve_withdrawals {
            settings.auto_approve_withdrawals = value;
        }
        if let Some(value) = patch.email_notifications {
            settings.email_notifications = value;
        }
        if let Some(value) = patch.max_withdrawal_amount {
            validation::positive_amount("maxWithdrawalAmount", value)?;
            settings.max_withdrawal_amount = value;
        }
        if let Some(value) = patch.min_deposit_amount {
            validation::positive_amount("minDepositAmount", value)?;
            settings.min_deposit_amount = value;
        }
        if let Some(value) = patch.site_name {
            if value.trim().is_empty() {
                return Err(AppError::validation("siteName", "Site name cannot be empty"));
            }
            settings.site_name = value.trim().to_string();
        }
        if let Some(value) = patch.support_email {
            if !validation::email(value.trim()) {
                return Err(AppError::validation("supportEmail", "Invalid email format"));
            }
            settings.support_email = value.trim().to_string();
        }

        settings.updated_at = Utc::now();
        settings.updated_by = updated_by.to_string();

        self.store.write_value(keys::SITE_SETTINGS, &settings)?;
        tracing::info!("Site settings updated by {}", updated_by);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_defaults_created_once() {
        let store = RecordStore::in_memory();
        let service = SettingsService::new(store.clone());

        let first = service.get_site_settings().unwrap();
        let second = service.get_site_settings().unwrap();
        assert_eq!(first, second);
        assert!(store.read_value::<SiteSettings>(keys::SITE_SETTINGS).is_some());
    }

    #[test]
    fn test_patch_updates_only_given_fields() {
        let service = SettingsService::new(RecordStore::in_memory());
        let before = service.get_site_settings().unwrap();

        let after = service
            .update_site_settings(
                SiteSettingsPatch {
                    maintenance_mode: Some(true),
                    min_deposit_amount: Some(Decimal::from(250)),
                    ..Default::default()
                },
                "admin@investdesk.local"
            )
            .unwrap();

        assert!(after.maintenance_mode);
        assert_eq!(after.min_deposit_amount, Decimal::from(250));
        assert_eq!(after.site_name, before.site_name);
        assert_eq!(after.updated_by, "admin@investdesk.local");
        assert_eq!(service.get_site_settings().unwrap(), after);
    }

    #[test]
    fn test_patch_rejects_bad_values() {
        let service = SettingsService::new(RecordStore::in_memory());
        let patch = SiteSettingsPatch {
            support_email: Some("not-an-email".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            service.update_site_settings(patch, "admin"),
            Err(AppError::Validation { .. })
        ));
    }
}
