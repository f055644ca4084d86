use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::auth::authenticate;
use crate::domain::{Decimal, UserId};
use crate::engine::settlement::{self, TournamentPayout};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentRequest {
    pub entry_fee: String,
    pub prize_pool: String,
    pub filled_slots: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentResponse {
    pub id: String,
}

pub async fn create_tournament(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateTournamentRequest>,
) -> Result<Json<CreateTournamentResponse>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_can_settle()?;

    let entry_fee = Decimal::from_str_canonical(&body.entry_fee)
        .map_err(|_| AppError::InvalidArgument("Invalid entry fee".into()))?;
    let prize_pool = Decimal::from_str_canonical(&body.prize_pool)
        .map_err(|_| AppError::InvalidArgument("Invalid prize pool".into()))?;
    if body.filled_slots <= 0 {
        return Err(AppError::InvalidArgument(
            "Filled slots must be positive".into(),
        ));
    }

    let id = uuid::Uuid::new_v4().to_string();
    state
        .repo
        .create_tournament(&id, "completed", entry_fee, prize_pool, body.filled_slots)
        .await?;
    Ok(Json(CreateTournamentResponse { id }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutBody {
    pub user_id: String,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeRequest {
    pub payouts: Vec<PayoutBody>,
}

pub async fn distribute(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<DistributeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_can_settle()?;

    let mut payouts = Vec::with_capacity(body.payouts.len());
    for p in &body.payouts {
        let amount = Decimal::from_str_canonical(&p.amount)
            .map_err(|_| AppError::InvalidArgument("Invalid payout amount".into()))?;
        payouts.push(TournamentPayout {
            user_id: UserId::new(p.user_id.as_str()),
            amount,
        });
    }

    settlement::distribute_tournament_winnings(&state.repo, &state.notifier, &id, &payouts)
        .await?;
    Ok(Json(serde_json::json!({"status": "distributed"})))
}
