use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::enums::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Sled,
}

/// Where the keyspace lives.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub path: PathBuf,
    pub quota_bytes: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailMatching {
    Exact,
    CaseInsensitive,
}

impl EmailMatching {
    pub fn matches(&self, stored: &str, candidate: &str) -> bool {
        match self {
            EmailMatching::Exact => stored == candidate,
            EmailMatching::CaseInsensitive => stored.eq_ignore_ascii_case(candidate),
        }
    }
}

/// Role-assignment rule: listed addresses are administrators, everyone else is a user.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    pub admin_emails: Vec<String>,
}

impl RolePolicy {
    pub fn role_for(&self, email: &str, matching: EmailMatching) -> Role {
        if self.admin_emails.iter().any(|admin| matching.matches(admin, email)) {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// Business rules that used to be literals in page code.
#[derive(Debug, Clone)]
pub struct PlatformPolicy {
    pub roles: RolePolicy,
    pub email_matching: EmailMatching,
    pub starter_balance: Decimal,
    pub currency: String,
    pub recent_logins_limit: usize,
    pub seed_sample_ledger: bool,
    pub auto_approve_verifications: bool,
    pub simulated_latency: Duration,
}

impl Default for PlatformPolicy {
    fn default() -> Self {
        Self {
            roles: RolePolicy {
                admin_emails: vec!["admin@investdesk.local".to_string()],
            },
            email_matching: EmailMatching::Exact,
            starter_balance: Decimal::new(1_000_000, 2),
            currency: "EUR".to_string(),
            recent_logins_limit: 3,
            seed_sample_ledger: true,
            auto_approve_verifications: true,
            simulated_latency: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub policy: PlatformPolicy,
    pub chat_poll_interval: Duration,
    pub maturity_check_interval: Duration,
    pub server_host: String,
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                kind: StorageKind::Memory,
                path: PathBuf::from("./data/invest-desk"),
                quota_bytes: None,
            },
            policy: PlatformPolicy::default(),
            chat_poll_interval: Duration::from_secs(3),
            maturity_check_interval: Duration::from_secs(60),
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let kind = match
            env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".to_string()).to_lowercase().as_str()
        {
            "memory" => StorageKind::Memory,
            "sled" => StorageKind::Sled,
            _ => {
                return Err("STORAGE_BACKEND must be 'memory' or 'sled'".into());
            }
        };

        let path = env
            ::var("STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.path);
        let quota_bytes = match env::var("STORAGE_QUOTA_BYTES") {
            Ok(raw) => Some(raw.parse::<usize>()?),
            Err(_) => None,
        };

        let admin_emails = Self::parse_list(
            &env::var("ADMIN_EMAILS").unwrap_or_else(|_| defaults.policy.roles.admin_emails.join(","))
        );
        if admin_emails.is_empty() {
            return Err("ADMIN_EMAILS cannot be empty".into());
        }

        let email_matching = match
            env::var("EMAIL_MATCHING").unwrap_or_else(|_| "exact".to_string()).to_lowercase().as_str()
        {
            "exact" => EmailMatching::Exact,
            "case_insensitive" => EmailMatching::CaseInsensitive,
            _ => {
                return Err("EMAIL_MATCHING must be 'exact' or 'case_insensitive'".into());
            }
        };

        let starter_balance = match env::var("STARTER_BALANCE") {
            Ok(raw) => Decimal::from_str(raw.trim())?,
            Err(_) => defaults.policy.starter_balance,
        };
        if starter_balance.is_sign_negative() {
            return Err("STARTER_BALANCE cannot be negative".into());
        }

        let currency = env::var("DEFAULT_CURRENCY").unwrap_or(defaults.policy.currency).to_uppercase();
        let recent_logins_limit = env
            ::var("RECENT_LOGINS_LIMIT")
            .unwrap_or_else(|_| "3".to_string())
            .parse()?;
        let seed_sample_ledger = Self::parse_bool("SEED_SAMPLE_LEDGER", true)?;
        let auto_approve_verifications = Self::parse_bool("AUTO_APPROVE_VERIFICATIONS", true)?;
        let simulated_latency = Duration::from_millis(
            env::var("SIMULATED_LATENCY_MS").unwrap_or_else(|_| "0".to_string()).parse()?
        );

        let chat_poll_interval = Duration::from_secs(
            env::var("CHAT_POLL_INTERVAL_SECS").unwrap_or_else(|_| "3".to_string()).parse()?
        );
        let maturity_check_interval = Duration::from_secs(
            env::var("MATURITY_CHECK_INTERVAL_SECS").unwrap_or_else(|_| "60".to_string()).parse()?
        );
        if chat_poll_interval.is_zero() || maturity_check_interval.is_zero() {
            return Err("Polling intervals must be at least one second".into());
        }

        let server_host = env::var("SERVER_HOST").unwrap_or(defaults.server_host);
        let server_port = env
            ::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        Ok(Config {
            storage: StorageConfig { kind, path, quota_bytes },
            policy: PlatformPolicy {
                roles: RolePolicy { admin_emails },
                email_matching,
                starter_balance,
                currency,
                recent_logins_limit,
                seed_sample_ledger,
                auto_approve_verifications,
                simulated_latency,
            },
            chat_poll_interval,
            maturity_check_interval,
            server_host,
            server_port,
        })
    }

    fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn parse_bool(key: &str, default: bool) -> Result<bool, Box<dyn std::error::Error>> {
        match env::var(key) {
            Ok(raw) =>
                match raw.trim().to_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => Ok(true),
                    "0" | "false" | "no" | "off" => Ok(false),
                    _ => Err(format!("{} must be a boolean", key).into()),
                }
            Err(_) => Ok(default),
        }
    }
}
