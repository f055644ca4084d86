use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::matches::{match_dto, MatchDto};
use crate::api::AppState;
use crate::auth::authenticate;
use crate::domain::{Decimal, QueueEntry, QueuePool, TimeMs};
use crate::engine::pairing;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    /// "creators" or "seekers".
    pub pool: String,
    pub entry_fee: String,
    pub room_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_info: Option<MatchDto>,
}

pub async fn enqueue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;

    let pool = QueuePool::parse(&body.pool)
        .ok_or_else(|| AppError::InvalidArgument("Pool must be creators or seekers".into()))?;
    let entry_fee = Decimal::from_str_canonical(&body.entry_fee)
        .map_err(|_| AppError::InvalidArgument("Invalid entry fee".into()))?;
    if pool == QueuePool::Creators && body.room_code.as_deref().unwrap_or("").trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "Creators must provide a room code".into(),
        ));
    }

    let user = state
        .repo
        .get_user(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id)))?;

    let entry = QueueEntry {
        user_id: auth.user_id,
        pool,
        entry_fee,
        room_code: body.room_code.map(|c| c.trim().to_string()),
        user_name: user.name,
        user_avatar: user.avatar_url,
        win_rate: user.win_rate,
        created_at: TimeMs::now(),
    };

    let paired = pairing::enqueue(&state.repo, &state.notifier, entry).await?;
    Ok(Json(EnqueueResponse {
        queued: paired.is_none(),
        match_info: paired.as_ref().map(match_dto),
    }))
}

pub async fn cancel(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    pairing::cancel(&state.repo, &auth.user_id).await?;
    Ok(Json(serde_json::json!({"cancelled": true})))
}
