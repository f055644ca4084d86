use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::auth::authenticate;
use crate::domain::Decimal;
use crate::engine::payments;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryDto {
    pub event_key: String,
    pub record_type: String,
    pub amount: String,
    pub status: String,
    pub description: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_match_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub balance: String,
    pub total_withdrawals: String,
    pub records: Vec<LedgerEntryDto>,
}

pub async fn get_wallet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<WalletQuery>,
) -> Result<Json<WalletResponse>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    let user = state
        .repo
        .get_user(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id)))?;

    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let records = state.repo.list_ledger_for_user(&auth.user_id, limit).await?;

    Ok(Json(WalletResponse {
        balance: user.wallet_balance.to_canonical_string(),
        total_withdrawals: user.total_withdrawals.to_canonical_string(),
        records: records
            .iter()
            .map(|r| LedgerEntryDto {
                event_key: r.record.event_key.clone(),
                record_type: r.record.record_type.as_str().to_string(),
                amount: r.record.amount.to_canonical_string(),
                status: r.record.status.as_str().to_string(),
                description: r.record.description.clone(),
                created_at: r.record.created_at.as_ms(),
                related_match_id: r.record.related_match_id.clone(),
                failure_reason: r.failure_reason.clone(),
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequestBody {
    pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequestDto {
    pub id: String,
    pub amount: String,
    pub channel_id: Option<String>,
    pub status: String,
}

pub async fn request_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DepositRequestBody>,
) -> Result<Json<DepositRequestDto>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    let amount = Decimal::from_str_canonical(&body.amount)
        .map_err(|_| AppError::InvalidArgument("Invalid amount".into()))?;

    let request = payments::request_deposit(&state.repo, &auth.user_id, amount).await?;
    Ok(Json(DepositRequestDto {
        id: request.id,
        amount: request.amount.to_canonical_string(),
        channel_id: request.channel_id,
        status: request.status.as_str().to_string(),
    }))
}

pub async fn approve_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_can_approve_deposits()?;
    payments::approve_deposit(&state.repo, &state.notifier, &id).await?;
    Ok(Json(serde_json::json!({"status": "approved"})))
}

pub async fn reject_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_can_approve_deposits()?;
    payments::reject_deposit(&state.repo, &state.notifier, &id).await?;
    Ok(Json(serde_json::json!({"status": "rejected"})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequestBody {
    /// Client-generated id; retries with the same id return the stored
    /// request instead of debiting twice.
    pub request_id: Option<String>,
    pub amount: String,
    pub destination: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequestDto {
    pub id: String,
    pub amount: String,
    pub status: String,
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WithdrawalRequestBody>,
) -> Result<Json<WithdrawalRequestDto>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    let amount = Decimal::from_str_canonical(&body.amount)
        .map_err(|_| AppError::InvalidArgument("Invalid amount".into()))?;
    let request_id = body
        .request_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let request = payments::request_withdrawal(
        &state.repo,
        &state.notifier,
        &request_id,
        &auth.user_id,
        amount,
        body.destination,
    )
    .await?;
    Ok(Json(WithdrawalRequestDto {
        id: request.id,
        amount: request.amount.to_canonical_string(),
        status: request.status.as_str().to_string(),
    }))
}

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_can_approve_withdrawals()?;
    payments::approve_withdrawal(&state.repo, &state.notifier, &id).await?;
    Ok(Json(serde_json::json!({"status": "approved"})))
}

pub async fn reject_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_can_approve_withdrawals()?;
    payments::reject_withdrawal(&state.repo, &state.notifier, &id).await?;
    Ok(Json(serde_json::json!({"status": "rejected"})))
}
