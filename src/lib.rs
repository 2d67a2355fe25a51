pub mod config;
pub mod enums;
pub mod error;
pub mod crypto;
pub mod db;
pub mod validation;
pub mod money;
pub mod services;
pub mod api;
pub mod scheduler;

pub use config::Config;
pub use enums::{ Role, UserStatus, VerificationStatus, ReviewStatus, TxType, TxStatus, Sender };
pub use error::{ AppError, Result };
pub use services::Platform;
