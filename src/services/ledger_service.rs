use std::sync::Arc;

use chrono::{ DateTime, Duration, Utc };
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{
    keys,
    Investment,
    InvestmentPlan,
    NewInvestment,
    NewTransaction,
    RecordStore,
    Transaction,
    UserRecord,
};
use crate::enums::{ InvestmentStatus, TxStatus, TxType };
use crate::error::{ AppError, Result };
use crate::money::format_currency;
use crate::services::sample_ledger;
use crate::services::settings_service::SettingsService;
use crate::services::user_directory::{ UserDirectory, UserLookup };
use crate::validation;

/// Longest investment term accepted, in days.
pub const MAX_INVESTMENT_DAYS: u32 = 3_650;

/// Outcome of a balance movement: the new balance and the transaction that explains it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChange {
    pub balance: Decimal,
    pub transaction: Transaction,
}

struct TxDraft {
    tx_type: TxType,
    amount: Decimal,
    status: TxStatus,
    description: String,
    method: Option<String>,
}

impl TxDraft {
    fn completed(tx_type: TxType, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            tx_type,
            amount,
            status: TxStatus::Completed,
            description: description.into(),
            method: None,
        }
    }

    fn into_transaction(self, user_id: &str, currency: &str, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            tx_type: self.tx_type,
            amount: self.amount,
            currency: currency.to_string(),
            status: self.status,
            description: self.description,
            method: self.method,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn investment_plans() -> Vec<InvestmentPlan> {
    vec![
        InvestmentPlan {
            id: "starter",
            name: "Starter Plan",
            min_amount: Decimal::new(100, 0),
            max_amount: Some(Decimal::new(499_999, 2)),
            duration: 30,
            interest_rate: Decimal::new(8, 0),
        },
        InvestmentPlan {
            id: "growth",
            name: "Growth Plan",
            min_amount: Decimal::new(5_000, 0),
            max_amount: Some(Decimal::new(2_499_999, 2)),
            duration: 90,
            interest_rate: Decimal::new(15, 0),
        },
        InvestmentPlan {
            id: "premium",
            name: "Premium Plan",
            min_amount: Decimal::new(25_000, 0),
            max_amount: None,
            duration: 180,
            interest_rate: Decimal::new(25, 0),
        }
    ]
}

/// Per-user transactions and investments plus every balance mutation.
///
/// Balance changes run through [`UserDirectory::update_user`], so they are serialized with
/// every other write to the same user. The transaction explaining a change is stored before
/// the user record and removed again when the user record cannot be written.
pub struct LedgerService {
    store: RecordStore,
    users: Arc<UserDirectory>,
    settings: Arc<SettingsService>,
    status_lock: Mutex<()>,
}

impl LedgerService {
    pub fn new(store: RecordStore, users: Arc<UserDirectory>, settings: Arc<SettingsService>) -> Self {
        Self {
            store,
            users,
            settings,
            status_lock: Mutex::new(()),
        }
    }

    pub fn list_transactions(&self, user_id: &str) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = self.store.all(&keys::transactions(user_id));
        if self.users.policy().seed_sample_ledger {
            transactions.extend(
                sample_ledger::sample_transactions(user_id, &self.currency(), Utc::now())
            );
        }
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        transactions
    }

    pub fn list_investments(&self, user_id: &str) -> Vec<Investment> {
        let mut investments: Vec<Investment> = self.store.all(&keys::investments(user_id));
        if self.users.policy().seed_sample_ledger {
            investments.extend(sample_ledger::sample_investments(user_id, Utc::now()));
        }
        investments.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        investments
    }

    pub fn record_transaction(&self, new: NewTransaction) -> Result<String> {
        validation::positive_amount("amount", new.amount)?;

        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            currency: new.currency.unwrap_or_else(|| self.currency()),
            user_id: new.user_id,
            tx_type: new.tx_type,
            amount: new.amount,
            status: new.status,
            description: new.description,
            method: new.method,
            created_at: now,
            updated_at: now,
        };

        self.store.save(&keys::transactions(&transaction.user_id), &transaction.id, &transaction)?;
        tracing::debug!(
            "Recorded {} transaction {} for {}",
            transaction.tx_type,
            transaction.id,
            transaction.user_id
        );
        Ok(transaction.id)
    }

    pub fn record_investment(&self, new: NewInvestment) -> Result<String> {
        validation::positive_amount("amount", new.amount)?;
        if new.duration == 0 || new.duration > MAX_INVESTMENT_DAYS {
            return Err(
                AppError::validation(
                    "duration",
                    format!("Duration must be between 1 and {} days", MAX_INVESTMENT_DAYS)
                )
            );
        }

        let investment = Self::build_investment(new, Utc::now())?;
        self.store.save(&keys::investments(&investment.user_id), &investment.id, &investment)?;
        Ok(investment.id)
    }

    pub async fn add_profit(&self, email: &str, amount: Decimal) -> Result<BalanceChange> {
        validation::positive_amount("amount", amount)?;

        let change = self.move_balance(
            UserLookup::Email(email),
            amount,
            TxDraft::completed(TxType::Earnings, amount, "Profit credited"),
            |_| Ok(())
        ).await?;

        tracing::info!("Credited {} to {}", amount, email);
        Ok(change)
    }

    /// Debit `amount`; a debit that would take the balance below zero is refused.
    pub async fn deduct_balance(&self, email: &str, amount: Decimal) -> Result<BalanceChange> {
        validation::positive_amount("amount", amount)?;

        let change = self.move_balance(
            UserLookup::Email(email),
            -amount,
            TxDraft::completed(TxType::Withdrawal, amount, "Balance adjustment"),
            |_| Ok(())
        ).await?;

        tracing::info!("Deducted {} from {}", amount, email);
        Ok(change)
    }

    /// Record a deposit request. The balance moves when an admin completes it.
    pub async fn deposit(&self, user_id: &str, amount: Decimal, method: &str) -> Result<Transaction> {
        validation::positive_amount("amount", amount)?;

        let min = self.settings.current().min_deposit_amount;
        if amount < min {
            return Err(
                AppError::validation(
                    "amount",
                    format!("Minimum deposit is {}", format_currency(min, &self.currency()))
                )
            );
        }

        self.users.get_user(UserLookup::Id(user_id))?;
        self.users.simulate_latency().await;

        let id = self.record_transaction(NewTransaction {
            user_id: user_id.to_string(),
            tx_type: TxType::Deposit,
            amount,
            currency: None,
            status: TxStatus::Pending,
            description: format!("Deposit via {}", method),
            method: Some(method.to_string()),
        })?;

        self.store
            .get(&keys::transactions(user_id), &id)
            .ok_or_else(|| AppError::StorageRead(format!("Deposit {} was not readable after write", id)))
    }

    /// Reserve `amount` immediately; completed at once when withdrawals are auto-approved.
    pub async fn withdraw(&self, user_id: &str, amount: Decimal, method: &str) -> Result<BalanceChange> {
        validation::positive_amount("amount", amount)?;

        let settings = self.settings.current();
        if amount > settings.max_withdrawal_amount {
            return Err(
                AppError::validation(
                    "amount",
                    format!(
                        "Maximum withdrawal is {}",
                        format_currency(settings.max_withdrawal_amount, &self.currency())
                    )
                )
            );
        }

        self.users.simulate_latency().await;

        let status = if settings.auto_approve_withdrawals {
            TxStatus::Completed
        } else {
            TxStatus::Pending
        };
        let draft = TxDraft {
            tx_type: TxType::Withdrawal,
            amount,
            status,
            description: format!("Withdrawal via {}", method),
            method: Some(method.to_string()),
        };

        self.move_balance(UserLookup::Id(user_id), -amount, draft, |_| Ok(())).await
    }

    pub async fn invest(&self, user_id: &str, plan_id: &str, amount: Decimal) -> Result<Investment> {
        validation::positive_amount("amount", amount)?;

        let plan = investment_plans()
            .into_iter()
            .find(|plan| plan.id == plan_id)
            .ok_or_else(|| AppError::NotFound(format!("Investment plan {} not found", plan_id)))?;

        if !plan.accepts(amount) {
            return Err(
                AppError::validation("amount", format!("Amount is outside the {} limits", plan.name))
            );
        }

        let investment = Self::build_investment(
            NewInvestment {
                user_id: user_id.to_string(),
                plan_id: plan.id.to_string(),
                plan_name: plan.name.to_string(),
                amount,
                duration: plan.duration,
                interest_rate: plan.interest_rate,
                start_date: None,
            },
            Utc::now()
        )?;
        let collection = keys::investments(user_id);
        self.store.save(&collection, &investment.id, &investment)?;

        let debit = self.move_balance(
            UserLookup::Id(user_id),
            -amount,
            TxDraft::completed(TxType::Investment, amount, format!("Investment in {}", plan.name)),
            |user| {
                user.total_invested = checked_total(user.total_invested, amount)?;
                Ok(())
            }
        ).await;

        if let Err(e) = debit {
            if let Err(cleanup) = self.store.remove(&collection, &investment.id) {
                tracing::error!("Could not roll back investment {}: {}", investment.id, cleanup);
            }
            return Err(e);
        }

        tracing::info!("User {} invested {} in {}", user_id, amount, plan.id);
        Ok(investment)
    }

    /// Move a pending transaction to `status`. Completing a deposit credits it, failing or
    /// cancelling a withdrawal refunds it.
    pub async fn update_transaction_status(
        &self,
        user_id: &str,
        tx_id: &str,
        status: TxStatus
    ) -> Result<Transaction> {
        if sample_ledger::is_sample_id(tx_id) {
            return Err(AppError::validation("id", "Sample transactions are read-only"));
        }

        let _guard = self.status_lock.lock().await;

        let collection = keys::transactions(user_id);
        let original: Transaction = self.store
            .get(&collection, tx_id)
            .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", tx_id)))?;

        if original.status == status {
            return Ok(original);
        }
        if original.status != TxStatus::Pending {
            return Err(
                AppError::validation(
                    "status",
                    format!("Transaction is already {}", original.status)
                )
            );
        }

        let credit = match (original.tx_type, status) {
            (TxType::Deposit, TxStatus::Completed) => original.amount,
            (TxType::Withdrawal, TxStatus::Failed | TxStatus::Cancelled) => original.amount,
            _ => Decimal::ZERO,
        };

        let mut updated = original.clone();
        updated.status = status;
        updated.updated_at = Utc::now();
        self.store.save(&collection, &updated.id, &updated)?;

        if !credit.is_zero() {
            let credited = self.users.update_user(UserLookup::Id(user_id), |user| {
                user.balance = checked_total(user.balance, credit)?;
                Ok(())
            }).await;

            if let Err(e) = credited {
                if let Err(cleanup) = self.store.save(&collection, &original.id, &original) {
                    tracing::error!("Could not restore transaction {}: {}", original.id, cleanup);
                }
                return Err(e);
            }
        }

        tracing::info!("Transaction {} moved to {}", updated.id, status);
        Ok(updated)
    }

    /// Complete every active investment whose end date has passed and pay out principal
    /// plus profit. Returns the settled investments.
    pub async fn settle_matured_investments(&self, now: DateTime<Utc>) -> Result<Vec<Investment>> {
        let _guard = self.status_lock.lock().await;
        let mut settled = Vec::new();

        for collection in self.store.keys_with_prefix(&keys::investments("")) {
            let matured: Vec<Investment> = self.store
                .all::<Investment>(&collection)
                .into_iter()
                .filter(|inv| inv.status == InvestmentStatus::Active && inv.end_date <= now)
                .collect();

            for original in matured {
                let mut investment = original.clone();

                if self.users.get_user(UserLookup::Id(&original.user_id)).is_err() {
                    investment.status = InvestmentStatus::Cancelled;
                    self.store.save(&collection, &investment.id, &investment)?;
                    tracing::warn!(
                        "Cancelled investment {}: owner {} no longer exists",
                        investment.id,
                        investment.user_id
                    );
                    continue;
                }

                let profit = original.expected_return
                    .checked_sub(original.amount)
                    .ok_or_else(|| AppError::Decode {
                        key: format!("{}/{}", collection, original.id),
                        reason: "expected return is out of range".to_string(),
                    })?;
                investment.status = InvestmentStatus::Completed;
                investment.profit = profit;
                self.store.save(&collection, &investment.id, &investment)?;

                let payout = self.move_balance(
                    UserLookup::Id(&original.user_id),
                    original.expected_return,
                    TxDraft::completed(
                        TxType::Earnings,
                        original.expected_return,
                        format!("Return from {}", original.plan_name)
                    ),
                    |user| {
                        user.total_earnings = checked_total(user.total_earnings, profit)?;
                        Ok(())
                    }
                ).await;

                if let Err(e) = payout {
                    if let Err(cleanup) = self.store.save(&collection, &original.id, &original) {
                        tracing::error!("Could not restore investment {}: {}", original.id, cleanup);
                    }
                    return Err(e);
                }

                tracing::info!("Settled investment {} for {}", investment.id, investment.user_id);
                settled.push(investment);
            }
        }

        Ok(settled)
    }

    /// Recorded transaction and investment totals across all users, failing on any
    /// undecodable record.
    pub(crate) fn try_record_counts(&self) -> Result<(usize, usize)> {
        let mut transactions = 0;
        for collection in self.store.keys_with_prefix(&keys::transactions("")) {
            transactions += self.store.try_all::<Transaction>(&collection)?.len();
        }

        let mut investments = 0;
        for collection in self.store.keys_with_prefix(&keys::investments("")) {
            investments += self.store.try_all::<Investment>(&collection)?.len();
        }

        Ok((transactions, investments))
    }

    async fn move_balance<F>(
        &self,
        lookup: UserLookup<'_>,
        delta: Decimal,
        draft: TxDraft,
        adjust: F
    ) -> Result<BalanceChange>
        where F: FnOnce(&mut UserRecord) -> Result<()>
    {
        let currency = self.currency();
        let mut recorded: Option<Transaction> = None;

        let result = self.users.update_user(lookup, |user| {
            let next = checked_total(user.balance, delta)?;
            if next < Decimal::ZERO {
                return Err(AppError::InsufficientBalance);
            }
            user.balance = next;
            adjust(user)?;

            let transaction = draft.into_transaction(&user.uid, &currency, Utc::now());
            self.store.save(&keys::transactions(&user.uid), &transaction.id, &transaction)?;
            recorded = Some(transaction);
            Ok(())
        }).await;

        match (result, recorded) {
            (Ok(user), Some(transaction)) =>
                Ok(BalanceChange {
                    balance: user.balance,
                    transaction,
                }),
            (Ok(user), None) =>
                Err(AppError::Internal(format!("Balance of {} changed without a transaction", user.uid))),
            (Err(e), Some(orphan)) => {
                if
                    let Err(cleanup) = self.store.remove(
                        &keys::transactions(&orphan.user_id),
                        &orphan.id
                    )
                {
                    tracing::error!("Could not remove orphaned transaction {}: {}", orphan.id, cleanup);
                }
                Err(e)
            }
            (Err(e), None) => Err(e),
        }
    }

    fn build_investment(new: NewInvestment, now: DateTime<Utc>) -> Result<Investment> {
        let profit = new.amount
            .checked_mul(new.interest_rate)
            .map(|gross| (gross / Decimal::ONE_HUNDRED).round_dp(2))
            .ok_or_else(|| AppError::validation("interestRate", "Interest rate is too large"))?;
        let expected_return = checked_total(new.amount, profit)?;
        let start_date = new.start_date.unwrap_or(now);
        let end_date = start_date
            .checked_add_signed(Duration::days(i64::from(new.duration)))
            .ok_or_else(|| AppError::validation("duration", "End date is out of range"))?;

        Ok(Investment {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            plan_id: new.plan_id,
            plan_name: new.plan_name,
            amount: new.amount,
            duration: new.duration,
            interest_rate: new.interest_rate,
            expected_return,
            profit: Decimal::ZERO,
            status: InvestmentStatus::Active,
            start_date,
            end_date,
        })
    }

    fn currency(&self) -> String {
        self.users.policy().currency.clone()
    }
}

fn checked_total(current: Decimal, delta: Decimal) -> Result<Decimal> {
    current.checked_add(delta).ok_or_else(|| AppError::validation("amount", "Amount is too large"))
}
