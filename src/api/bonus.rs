use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::auth::authenticate;
use crate::engine::rewards;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBonusResponse {
    pub date: String,
    pub streak: i64,
    pub amount: String,
}

pub async fn claim_daily_login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DailyBonusResponse>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;

    let claim = rewards::claim_daily_bonus(
        &state.repo,
        &state.notifier,
        &auth.user_id,
        state.config.bonus_utc_offset_minutes,
    )
    .await?;

    Ok(Json(DailyBonusResponse {
        date: claim.date,
        streak: claim.streak,
        amount: claim.amount.to_canonical_string(),
    }))
}
