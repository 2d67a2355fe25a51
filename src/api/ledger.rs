use axum::{ extract::State, http::{ HeaderMap, StatusCode }, Json };
use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };

use crate::db::{ Investment, InvestmentPlan, Transaction };
use crate::error::Result;
use crate::money::format_currency;
use crate::services::{ investment_plans, BalanceChange };

use super::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyRequest {
    pub amount: Decimal,
    pub method: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestRequest {
    pub plan_id: String,
    pub amount: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub display_amount: String,
}

impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            display_amount: format_currency(transaction.amount, &transaction.currency),
            transaction,
        }
    }
}

pub async fn list_plans() -> Json<Vec<InvestmentPlan>> {
    Json(investment_plans())
}

pub async fn list_transactions(State(state): State<AppState>) -> Result<Json<Vec<TransactionResponse>>> {
    let user = state.require_user()?;

    let response: Vec<TransactionResponse> = state.platform.ledger
        .list_transactions(&user.uid)
        .into_iter()
        .map(|tx| tx.into())
        .collect();

    Ok(Json(response))
}

pub async fn list_investments(State(state): State<AppState>) -> Result<Json<Vec<Investment>>> {
    let user = state.require_user()?;
    Ok(Json(state.platform.ledger.list_investments(&user.uid)))
}

pub async fn deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MoneyRequest>
) -> Result<(StatusCode, Json<TransactionResponse>)> {
    let user = state.require_user()?;
    let transaction = state.platform.ledger.deposit(&user.uid, request.amount, &request.method).await?;

    state.audit(
        &user,
        "deposit",
        &format!("Requested deposit of {}", format_currency(transaction.amount, &transaction.currency)),
        &headers
    ).await;

    Ok((StatusCode::CREATED, Json(transaction.into())))
}

pub async fn withdraw(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MoneyRequest>
) -> Result<(StatusCode, Json<BalanceChange>)> {
    let user = state.require_user()?;
    let change = state.platform.ledger.withdraw(&user.uid, request.amount, &request.method).await?;

    state.audit(
        &user,
        "withdrawal",
        &format!(
            "Requested withdrawal of {}",
            format_currency(change.transaction.amount, &change.transaction.currency)
        ),
        &headers
    ).await;

    Ok((StatusCode::CREATED, Json(change)))
}

pub async fn invest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<InvestRequest>
) -> Result<(StatusCode, Json<Investment>)> {
    let user = state.require_user()?;
    let investment = state.platform.ledger.invest(&user.uid, &request.plan_id, request.amount).await?;

    state.audit(
        &user,
        "investment",
        &format!(
            "Invested {} in {}",
            format_currency(investment.amount, &state.platform.users.policy().currency),
            investment.plan_name
        ),
        &headers
    ).await;

    Ok((StatusCode::CREATED, Json(investment)))
}
