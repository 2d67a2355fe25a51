use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };

use crate::enums::{ Role, UserStatus, VerificationStatus };

/// Stored account. Holds the password hash, never the raw password.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub country: String,
    pub balance: Decimal,
    pub total_invested: Decimal,
    pub total_earnings: Decimal,
    pub is_verified: bool,
    pub verification_status: VerificationStatus,
    pub status: UserStatus,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    /// Bumped on every write.
    #[serde(default)]
    pub version: u64,
}

impl UserRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Public projection of a [`UserRecord`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub country: String,
    pub balance: Decimal,
    pub total_invested: Decimal,
    pub total_earnings: Decimal,
    pub is_verified: bool,
    pub verification_status: VerificationStatus,
    pub status: UserStatus,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            uid: record.uid.clone(),
            email: record.email.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            phone: record.phone.clone(),
            country: record.country.clone(),
            balance: record.balance,
            total_invested: record.total_invested,
            total_earnings: record.total_earnings,
            is_verified: record.is_verified,
            verification_status: record.verification_status,
            status: record.status,
            role: record.role,
            created_at: record.created_at,
            last_login: record.last_login,
        }
    }
}

/// Tombstone left behind when an administrator deletes an account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedUser {
    pub uid: String,
    pub email: String,
    pub deleted_at: DateTime<Utc>,
    pub deleted_by: String,
}

/// One-click re-entry shortcut shown on the login page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentLogin {
    pub email: String,
    pub display_name: String,
    pub country: String,
    pub last_used: DateTime<Utc>,
}
