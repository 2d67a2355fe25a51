//! Fabricated dashboard data shown next to a user's recorded activity.

use chrono::{ DateTime, Duration, Utc };
use rust_decimal::Decimal;

use crate::db::{ Investment, Transaction };
use crate::enums::{ InvestmentStatus, TxStatus, TxType };

struct SampleTx {
    tx_type: TxType,
    amount: i64,
    status: TxStatus,
    description: &'static str,
    method: Option<&'static str>,
    days_ago: i64,
}

const SAMPLE_TRANSACTIONS: &[SampleTx] = &[
    SampleTx {
        tx_type: TxType::Deposit,
        amount: 5_000,
        status: TxStatus::Completed,
        description: "Initial deposit",
        method: Some("Bank Transfer"),
        days_ago: 14,
    },
    SampleTx {
        tx_type: TxType::Investment,
        amount: 2_500,
        status: TxStatus::Completed,
        description: "Investment in Starter Plan",
        method: None,
        days_ago: 10,
    },
    SampleTx {
        tx_type: TxType::Earnings,
        amount: 125,
        status: TxStatus::Completed,
        description: "Weekly earnings",
        method: None,
        days_ago: 3,
    },
    SampleTx {
        tx_type: TxType::Withdrawal,
        amount: 1_000,
        status: TxStatus::Pending,
        description: "Withdrawal request",
        method: Some("Bank Transfer"),
        days_ago: 1,
    },
];

pub fn is_sample_id(id: &str) -> bool {
    id.starts_with("sample-")
}

pub fn sample_transactions(user_id: &str, currency: &str, now: DateTime<Utc>) -> Vec<Transaction> {
    SAMPLE_TRANSACTIONS.iter()
        .enumerate()
        .map(|(i, sample)| {
            let at = now - Duration::days(sample.days_ago);
            Transaction {
                id: format!("sample-tx-{}-{}", i + 1, user_id),
                user_id: user_id.to_string(),
                tx_type: sample.tx_type,
                amount: Decimal::from(sample.amount),
                currency: currency.to_string(),
                status: sample.status,
                description: sample.description.to_string(),
                method: sample.method.map(str::to_string),
                created_at: at,
                updated_at: at,
            }
        })
        .collect()
}

pub fn sample_investments(user_id: &str, now: DateTime<Utc>) -> Vec<Investment> {
    let starter_start = now - Duration::days(10);
    let growth_start = now - Duration::days(120);

    vec![
        Investment {
            id: format!("sample-inv-1-{}", user_id),
            user_id: user_id.to_string(),
            plan_id: "starter".to_string(),
            plan_name: "Starter Plan".to_string(),
            amount: Decimal::from(2_500),
            duration: 30,
            interest_rate: Decimal::from(8),
            expected_return: Decimal::from(2_700),
            profit: Decimal::ZERO,
            status: InvestmentStatus::Active,
            start_date: starter_start,
            end_date: starter_start + Duration::days(30),
        },
        Investment {
            id: format!("sample-inv-2-{}", user_id),
            user_id: user_id.to_string(),
            plan_id: "growth".to_string(),
            plan_name: "Growth Plan".to_string(),
            amount: Decimal::from(5_000),
            duration: 90,
            interest_rate: Decimal::from(15),
            expected_return: Decimal::from(5_750),
            profit: Decimal::from(750),
            status: InvestmentStatus::Completed,
            start_date: growth_start,
            end_date: growth_start + Duration::days(90),
        }
    ]
}
