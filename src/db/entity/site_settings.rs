use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
    pub maintenance_mode: bool,
    pub allow_registrations: bool,
    pub auto_approve_withdrawals: bool,
    pub email_notifications: bool,
    pub max_withdrawal_amount: Decimal,
    pub min_deposit_amount: Decimal,
    pub site_name: String,
    pub support_email: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl SiteSettings {
    pub fn defaults_at(now: DateTime<Utc>) -> Self {
        Self {
            maintenance_mode: false,
            allow_registrations: true,
            auto_approve_withdrawals: false,
            email_notifications: true,
            max_withdrawal_amount: Decimal::new(50_000, 0),
            min_deposit_amount: Decimal::new(100, 0),
            site_name: "Invest Desk".to_string(),
            support_email: "support@investdesk.local".to_string(),
            updated_at: now,
            updated_by: "system".to_string(),
        }
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettingsPatch {
    pub maintenance_mode: Option<bool>,
    pub allow_registrations: Option<bool>,
    pub auto_approve_withdrawals: Option<bool>,
    pub email_notifications: Option<bool>,
    pub max_withdrawal_amount: Option<Decimal>,
    pub min_deposit_amount: Option<Decimal>,
    pub site_name: Option<String>,
    pub support_email: Option<String>,
}
