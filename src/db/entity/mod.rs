pub mod user;
pub mod transaction;
pub mod investment;
pub mod verification;
pub mod chat;
pub mod site_settings;
pub mod activity;

pub use user::{ DeletedUser, RecentLogin, UserProfile, UserRecord };
pub use transaction::{ NewTransaction, Transaction };
pub use investment::{ Investment, InvestmentPlan, NewInvestment };
pub use verification::{ NewVerification, VerificationRequest };
pub use chat::{ ChatMessage, ChatPreview };
pub use site_settings::{ SiteSettings, SiteSettingsPatch };
pub use activity::{ ClientInfo, DashboardStats, LoginActivity, UserActivity };
