use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::AppError;

lazy_static! {
    static ref RE_EMAIL: Regex = Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").unwrap();
    static ref RE_PHONE: Regex = Regex::new(r"^[0-9+()\-.\s]{6,32}$").unwrap();
}

const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/~`'\"\\";

/// Largest single amount accepted anywhere in the ledger (one trillion).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Inline form error for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self { field: field.to_string(), message: message.into() }
    }
}

impl From<FieldError> for AppError {
    fn from(e: FieldError) -> Self {
        AppError::Validation { field: e.field, message: e.message }
    }
}

pub fn email(s: &str) -> bool {
    s.len() <= 254 && RE_EMAIL.is_match(s)
}

pub fn phone(s: &str) -> bool {
    RE_PHONE.is_match(s)
}

pub fn password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".into());
    }
    if password.chars().count() > 128 {
        return Err("Password must be less than 128 characters".into());
    }

    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if !has_lowercase {
        return Err("Password must contain at least one lowercase letter".into());
    }
    if !has_uppercase {
        return Err("Password must contain at least one uppercase letter".into());
    }
    if !has_digit {
        return Err("Password must contain at least one number".into());
    }
    if !has_special {
        return Err("Password must contain at least one special character (!@#$%^&*...)".into());
    }

    Ok(())
}

pub fn required(field: &str, value: &str) -> Option<FieldError> {
    if value.trim().is_empty() { Some(FieldError::new(field, "This field is required")) } else { None }
}

/// Amounts must be strictly positive, at most [`MAX_AMOUNT`], with at most two fraction digits.
pub fn positive_amount(field: &str, amount: Decimal) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation(field, "Amount must be greater than zero"));
    }
    if amount > MAX_AMOUNT {
        return Err(AppError::validation(field, "Amount is too large"));
    }
    if amount.normalize().scale() > 2 {
        return Err(AppError::validation(field, "Amount cannot have more than two decimals"));
    }
    Ok(())
}
