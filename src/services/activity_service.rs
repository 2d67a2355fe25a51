use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{ DateTime, Local, Utc };
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::{
    keys,
    ClientInfo,
    DashboardStats,
    LoginActivity,
    RecordStore,
    UserActivity,
    VerificationRequest,
};
use crate::enums::{ ReviewStatus, UserStatus };
use crate::error::{ AppError, Result };
use crate::services::ledger_service::LedgerService;
use crate::services::user_directory::UserDirectory;

/// Primary destination for audit records, normally a remote service.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn record_login(&self, activity: &LoginActivity) -> Result<()>;

    async fn record_activity(&self, activity: &UserActivity) -> Result<()>;

    /// Most recent first, at most `limit` entries.
    async fn login_activities(&self, limit: usize) -> Result<Vec<LoginActivity>>;

    async fn user_activities(&self, limit: usize) -> Result<Vec<UserActivity>>;
}

/// Sink used when no remote audit service is configured. Every call fails, so records
/// always take the local fallback path.
pub struct DisconnectedSink;

#[async_trait]
impl ActivitySink for DisconnectedSink {
    async fn record_login(&self, _activity: &LoginActivity) -> Result<()> {
        Err(Self::unavailable())
    }

    async fn record_activity(&self, _activity: &UserActivity) -> Result<()> {
        Err(Self::unavailable())
    }

    async fn login_activities(&self, _limit: usize) -> Result<Vec<LoginActivity>> {
        Err(Self::unavailable())
    }

    async fn user_activities(&self, _limit: usize) -> Result<Vec<UserActivity>> {
        Err(Self::unavailable())
    }
}

impl DisconnectedSink {
    fn unavailable() -> AppError {
        AppError::Unavailable("no remote activity service configured".to_string())
    }
}

trait ActivityRecord {
    fn id(&self) -> &str;
    fn timestamp(&self) -> DateTime<Utc>;
}

impl ActivityRecord for LoginActivity {
    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl ActivityRecord for UserActivity {
    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit trail for the admin console and the dashboard aggregation.
pub struct ActivityService {
    store: RecordStore,
    sink: Arc<dyn ActivitySink>,
    users: Arc<UserDirectory>,
    ledger: Arc<LedgerService>,
}

impl ActivityService {
    pub fn new(
        store: RecordStore,
        sink: Arc<dyn ActivitySink>,
        users: Arc<UserDirectory>,
        ledger: Arc<LedgerService>
    ) -> Self {
        Self { store, sink, users, ledger }
    }

    pub async fn track_login(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
        success: bool,
        client: ClientInfo
    ) -> Result<LoginActivity> {
        let activity = LoginActivity {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            success,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.sink.record_login(&activity).await {
            tracing::debug!("Storing login activity locally: {}", e);
            self.store.save(keys::LOGIN_ACTIVITIES, &activity.id, &activity)?;
        }

        Ok(activity)
    }

    pub async fn track_activity(
        &self,
        user_id: &str,
        email: &str,
        action: &str,
        details: &str,
        client: ClientInfo
    ) -> Result<UserActivity> {
        let activity = UserActivity {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            action: action.to_string(),
            details: details.to_string(),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.sink.record_activity(&activity).await {
            tracing::debug!("Storing user activity locally: {}", e);
            self.store.save(keys::USER_ACTIVITIES, &activity.id, &activity)?;
        }

        Ok(activity)
    }

    pub async fn get_login_activities(&self, limit: usize) -> Vec<LoginActivity> {
        let remote = self.sink.login_activities(limit).await.unwrap_or_else(|e| {
            tracing::debug!("Remote login activities unavailable: {}", e);
            Vec::new()
        });
        merge_recent(remote, self.store.all(keys::LOGIN_ACTIVITIES), limit)
    }

    pub async fn get_user_activities(&self, limit: usize) -> Vec<UserActivity> {
        let remote = self.sink.user_activities(limit).await.unwrap_or_else(|e| {
            tracing::debug!("Remote user activities unavailable: {}", e);
            Vec::new()
        });
        merge_recent(remote, self.store.all(keys::USER_ACTIVITIES), limit)
    }

    /// Aggregates for the admin dashboard. Any read failure yields zeroed stats.
    pub async fn get_dashboard_stats(&self) -> DashboardStats {
        self.stats_at(Utc::now()).await
    }

    pub async fn stats_at(&self, now: DateTime<Utc>) -> DashboardStats {
        match self.try_stats(now).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("Dashboard stats unavailable: {}", e);
                DashboardStats::default()
            }
        }
    }

    async fn try_stats(&self, now: DateTime<Utc>) -> Result<DashboardStats> {
        let users = self.users.try_all_records()?;

        let remote = self.sink.login_activities(usize::MAX).await.unwrap_or_default();
        let logins = merge_recent(
            remote,
            self.store.try_all::<LoginActivity>(keys::LOGIN_ACTIVITIES)?,
            usize::MAX
        );

        let (total_transactions, total_investments) = self.ledger.try_record_counts()?;
        let pending_verifications = self.store
            .try_all::<VerificationRequest>(keys::VERIFICATION_REQUESTS)?
            .iter()
            .filter(|request| request.status == ReviewStatus::Pending)
            .count();

        let midnight = local_midnight(now);
        let count_status = |status: UserStatus| users.iter().filter(|u| u.status == status).count();

        Ok(DashboardStats {
            total_users: users.len(),
            active_users: count_status(UserStatus::Active),
            blocked_users: count_status(UserStatus::Blocked),
            pending_users: count_status(UserStatus::Pending),
            total_logins: logins.len(),
            today_logins: logins
                .iter()
                .filter(|login| login.timestamp >= midnight)
                .count(),
            failed_logins: logins
                .iter()
                .filter(|login| !login.success)
                .count(),
            total_transactions,
            total_investments,
            pending_verifications,
            total_balance: users
                .iter()
                .try_fold(Decimal::ZERO, |total, u| total.checked_add(u.balance))
                .ok_or_else(|| AppError::Internal("Total balance is out of range".to_string()))?,
        })
    }
}

fn merge_recent<T: ActivityRecord>(remote: Vec<T>, local: Vec<T>, limit: usize) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut merged: Vec<T> = remote
        .into_iter()
        .chain(local)
        .filter(|record| seen.insert(record.id().to_string()))
        .collect();

    merged.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    merged.truncate(limit);
    merged
}

/// Start of the caller's local day, in UTC.
fn local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_timezone(&Local)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use chrono::Duration;
    use crate::config::PlatformPolicy;
    use crate::services::Platform;
    use crate::services::test_support::{ form, platform };

    #[derive(Default)]
    struct MemorySink {
        logins: Mutex<Vec<LoginActivity>>,
        activities: Mutex<Vec<UserActivity>>,
    }

    #[async_trait]
    impl ActivitySink for MemorySink {
        async fn record_login(&self, activity: &LoginActivity) -> Result<()> {
            self.logins.lock().unwrap().push(activity.clone());
            Ok(())
        }

        async fn record_activity(&self, activity: &UserActivity) -> Result<()> {
            self.activities.lock().unwrap().push(activity.clone());
            Ok(())
        }

        async fn login_activities(&self, limit: usize) -> Result<Vec<LoginActivity>> {
            let mut logins = self.logins.lock().unwrap().clone();
            logins.reverse();
            logins.truncate(limit);
            Ok(logins)
        }

        async fn user_activities(&self, limit: usize) -> Result<Vec<UserActivity>> {
            let mut activities = self.activities.lock().unwrap().clone();
            activities.reverse();
            activities.truncate(limit);
            Ok(activities)
        }
    }

    #[tokio::test]
    async fn test_disconnected_sink_falls_back_locally() {
        let p = platform();

        for n in 0..3 {
            p.activity
                .track_login("u1", "alice@example.com", "Alice", n != 1, ClientInfo::default()).await
                .unwrap();
        }

        let recent = p.activity.get_login_activities(2).await;
        assert_eq!(recent.len(), 2);
        assert!(recent[0].timestamp >= recent[1].timestamp);
        assert_eq!(p.store.all::<LoginActivity>(keys::LOGIN_ACTIVITIES).len(), 3);
    }

    #[tokio::test]
    async fn test_remote_sink_is_primary() {
        let sink = Arc::new(MemorySink::default());
        let p = Platform::with_sink(RecordStore::in_memory(), PlatformPolicy::default(), sink.clone());

        let tracked = p.activity
            .track_activity(
                "u1",
                "alice@example.com",
                "withdrawal",
                "Requested 100.00",
                ClientInfo {
                    ip_address: Some("10.0.0.1".to_string()),
                    user_agent: None,
                }
            ).await
            .unwrap();

        assert!(p.store.all::<UserActivity>(keys::USER_ACTIVITIES).is_empty());
        assert_eq!(p.activity.get_user_activities(10).await, vec![tracked]);
    }

    #[test]
    fn test_merge_dedupes_and_orders() {
        let at = Utc::now();
        let login = |id: &str, minutes: i64| LoginActivity {
            id: id.to_string(),
            user_id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            success: true,
            ip_address: None,
            user_agent: None,
            timestamp: at - Duration::minutes(minutes),
        };

        let merged = merge_recent(
            vec![login("a", 5), login("b", 1)],
            vec![login("b", 1), login("c", 3)],
            10
        );
        let ids: Vec<&str> = merged
            .iter()
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_dashboard_stats_aggregate() {
        let p = platform();
        let alice = p.users.register(form("alice@example.com")).await.unwrap();
        let bob = p.users.register(form("bob@example.com")).await.unwrap();
        p.users.block_user("bob@example.com", "admin").await.unwrap();
        p.ledger.add_profit("alice@example.com", Decimal::from(500)).await.unwrap();
        p.activity
            .track_login(&alice.uid, &alice.email, "Alice", true, ClientInfo::default()).await
            .unwrap();
        p.activity
            .track_login(&bob.uid, &bob.email, "Bob", false, ClientInfo::default()).await
            .unwrap();

        let stats = p.activity.get_dashboard_stats().await;

        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.active_users + stats.blocked_users, stats.total_users);
        assert_eq!(stats.blocked_users, 1);
        assert_eq!(stats.total_logins, 2);
        assert_eq!(stats.today_logins, 2);
        assert_eq!(stats.failed_logins, 1);
        assert_eq!(stats.total_transactions, 1);
        assert_eq!(stats.total_balance, alice.balance + bob.balance + Decimal::from(500));
    }

    #[tokio::test]
    async fn test_logins_before_local_midnight_are_not_today() {
        let p = platform();
        p.activity
            .track_login("u1", "alice@example.com", "Alice", true, ClientInfo::default()).await
            .unwrap();

        let tomorrow = p.activity.stats_at(Utc::now() + Duration::days(1)).await;
        assert_eq!(tomorrow.total_logins, 1);
        assert_eq!(tomorrow.today_logins, 0);
    }

    #[tokio::test]
    async fn test_stats_zero_filled_on_corrupt_storage() {
        let p = platform();
        p.users.register(form("alice@example.com")).await.unwrap();
        p.store.write_value(keys::REGISTERED_USERS, &"corrupted").unwrap();

        assert_eq!(p.activity.get_dashboard_stats().await, DashboardStats::default());
    }
}
