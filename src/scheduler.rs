use std::sync::Arc;

use chrono::Utc;
use tokio::time::{ interval, Duration, MissedTickBehavior };

use crate::services::LedgerService;

/// Pays out investments once they reach their end date.
pub struct MaturityScheduler {
    ledger: Arc<LedgerService>,
    period: Duration,
}

impl MaturityScheduler {
    pub fn new(ledger: Arc<LedgerService>, period: Duration) -> Self {
        Self { ledger, period }
    }

    pub async fn start(self) {
        let mut interval = interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.run_once().await;
        }
    }

    /// One settlement pass; returns how many investments were paid out.
    pub async fn run_once(&self) -> usize {
        match self.ledger.settle_matured_investments(Utc::now()).await {
            Ok(settled) => {
                if !settled.is_empty() {
                    tracing::info!("Settled {} matured investments", settled.len());
                }
                settled.len()
            }
            Err(e) => {
                tracing::error!("Maturity settlement failed: {}", e);
                0
            }
        }
    }
}
