use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };

use crate::enums::InvestmentStatus;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub plan_name: String,
    pub amount: Decimal,
    /// Days.
    pub duration: u32,
    /// Percent over the whole duration.
    pub interest_rate: Decimal,
    /// Principal plus profit at maturity.
    pub expected_return: Decimal,
    /// Profit realised so far; set at maturity.
    pub profit: Decimal,
    pub status: InvestmentStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvestment {
    pub user_id: String,
    pub plan_id: String,
    pub plan_name: String,
    pub amount: Decimal,
    pub duration: u32,
    pub interest_rate: Decimal,
    pub start_date: Option<DateTime<Utc>>,
}

/// Catalogue entry users can invest into.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentPlan {
    pub id: &'static str,
    pub name: &'static str,
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub duration: u32,
    pub interest_rate: Decimal,
}

impl InvestmentPlan {
    pub fn accepts(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && self.max_amount.map_or(true, |max| amount <= max)
    }
}
