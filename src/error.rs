use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("An account with email {0} already exists")] DuplicateEmail(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is blocked")]
    AccountBlocked,

    #[error("Registrations are currently closed")]
    RegistrationsClosed,

    #[error("The platform is in maintenance mode")]
    MaintenanceMode,

    #[error("Storage read error: {0}")] StorageRead(String),

    #[error("Storage write error: {0}")] StorageWrite(String),

    #[error("Could not decode record {key}: {reason}")] Decode {
        key: String,
        reason: String,
    },

    #[error("{field}: {message}")] Validation {
        field: String,
        message: String,
    },

    #[error("Not found: {0}")] NotFound(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Forbidden: {0}")] Forbidden(String),

    #[error("Service unavailable: {0}")] Unavailable(String),

    #[error("Configuration error: {0}")] Config(String),

    #[error("Internal error: {0}")] Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn to_error_response(&self) -> ErrorResponse {
        let (code, message, field) = match self {
            AppError::DuplicateEmail(_) =>
                (
                    "DUPLICATE_EMAIL",
                    "An account with this email already exists".to_string(),
                    Some("email".to_string()),
                ),
            // Both login failures share one public message.
            AppError::UserNotFound | AppError::InvalidCredentials =>
                ("INVALID_LOGIN", "Invalid email or password".to_string(), None),
            AppError::AccountBlocked =>
                ("ACCOUNT_BLOCKED", "This account has been blocked".to_string(), None),
            AppError::RegistrationsClosed =>
                ("REGISTRATIONS_CLOSED", "Registrations are currently closed".to_string(), None),
            AppError::MaintenanceMode =>
                ("MAINTENANCE_MODE", "The platform is under maintenance".to_string(), None),
            AppError::StorageRead(msg) => ("STORAGE_READ_FAILED", msg.clone(), None),
            AppError::StorageWrite(msg) =>
                (
                    "STORAGE_WRITE_FAILED",
                    format!("The change was not saved: {}", msg),
                    None,
                ),
            AppError::Decode { key, reason } =>
                ("DECODE_ERROR", format!("{}: {}", key, reason), None),
            AppError::Validation { field, message } =>
                ("VALIDATION_ERROR", message.clone(), Some(field.clone())),
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone(), None),
            AppError::InsufficientBalance =>
                (
                    "INSUFFICIENT_BALANCE",
                    "Insufficient balance for this operation".to_string(),
                    Some("amount".to_string()),
                ),
            AppError::Forbidden(msg) => ("FORBIDDEN", msg.clone(), None),
            AppError::Unavailable(msg) => ("UNAVAILABLE", msg.clone(), None),
            AppError::Config(msg) => ("CONFIG_ERROR", msg.clone(), None),
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg.clone(), None),
        };

        ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                field,
            },
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::DuplicateEmail(_) => StatusCode::CONFLICT,
            AppError::UserNotFound | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            | AppError::AccountBlocked
            | AppError::RegistrationsClosed
            | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::MaintenanceMode | AppError::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Validation { .. } | AppError::InsufficientBalance => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StorageWrite(_) => StatusCode::INSUFFICIENT_STORAGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let response = self.to_error_response();
        (status, axum::Json(response)).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization failed: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
