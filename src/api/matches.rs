use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::auth::authenticate;
use crate::domain::{Decimal, Match, PlayerInfo, ResultClaim, UserId};
use crate::engine::{matches as match_engine, results, settlement};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDto {
    pub user_id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub win_rate: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDto {
    pub id: String,
    pub status: String,
    pub entry_fee: String,
    pub prize_pool: String,
    pub players: Vec<PlayerDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,
    pub created_at: i64,
}

pub fn match_dto(m: &Match) -> MatchDto {
    MatchDto {
        id: m.id.clone(),
        status: m.status.as_str().to_string(),
        entry_fee: m.entry_fee.to_canonical_string(),
        prize_pool: m.prize_pool.to_canonical_string(),
        players: m
            .players
            .iter()
            .map(|p| PlayerDto {
                user_id: p.user_id.as_str().to_string(),
                name: p.name.clone(),
                avatar_url: p.avatar_url.clone(),
                win_rate: p.win_rate.to_canonical_string(),
            })
            .collect(),
        room_code: m.room_code.clone(),
        winner_id: m.winner_id.as_ref().map(|u| u.as_str().to_string()),
        review_reason: m.review_reason.clone(),
        created_at: m.created_at.as_ms(),
    }
}

async fn player_info(state: &AppState, user_id: &UserId) -> Result<PlayerInfo, AppError> {
    let row = state
        .repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
    Ok(PlayerInfo {
        user_id: row.id,
        name: row.name,
        avatar_url: row.avatar_url,
        win_rate: row.win_rate,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    pub entry_fee: String,
    pub room_code: Option<String>,
}

pub async fn create_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateMatchRequest>,
) -> Result<Json<MatchDto>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    let entry_fee = Decimal::from_str_canonical(&body.entry_fee)
        .map_err(|_| AppError::InvalidArgument("Invalid entry fee".into()))?;

    let creator = player_info(&state, &auth.user_id).await?;
    let m = match_engine::create_open_match(&state.repo, creator, entry_fee, body.room_code)
        .await?;
    Ok(Json(match_dto(&m)))
}

pub async fn get_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MatchDto>, AppError> {
    authenticate(&headers, &state.config.jwt_secret)?;
    let m = state
        .repo
        .get_match(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", id)))?;
    Ok(Json(match_dto(&m)))
}

pub async fn join_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MatchDto>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    let joiner = player_info(&state, &auth.user_id).await?;
    let m = match_engine::join_open_match(&state.repo, &state.notifier, &id, joiner).await?;
    Ok(Json(match_dto(&m)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCodeRequest {
    pub room_code: String,
}

pub async fn enter_room_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RoomCodeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    match_engine::enter_room_code(&state.repo, &id, &auth.user_id, &body.room_code).await?;
    Ok(Json(serde_json::json!({"status": "playing"})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResultRequest {
    /// "win" or "loss".
    pub claim: String,
    pub screenshot_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResultResponse {
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub async fn submit_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SubmitResultRequest>,
) -> Result<Json<SubmitResultResponse>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    let claim = ResultClaim::parse(&body.claim)
        .ok_or_else(|| AppError::InvalidArgument("Claim must be win or loss".into()))?;

    let outcome = results::submit_result(
        &state.repo,
        &state.notifier,
        &id,
        &auth.user_id,
        claim,
        body.screenshot_url,
    )
    .await?;

    let response = match outcome {
        results::SubmitOutcome::Pending => SubmitResultResponse {
            outcome: "pending".into(),
            winner_id: None,
            reason: None,
        },
        results::SubmitOutcome::Settled { winner_id } => SubmitResultResponse {
            outcome: "settled".into(),
            winner_id: Some(winner_id.as_str().to_string()),
            reason: None,
        },
        results::SubmitOutcome::Disputed { reason } => SubmitResultResponse {
            outcome: "disputed".into(),
            winner_id: None,
            reason: Some(reason.to_string()),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclareWinnerRequest {
    pub winner_id: String,
}

pub async fn declare_winner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<DeclareWinnerRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_can_settle()?;

    let winner = UserId::new(body.winner_id);
    settlement::declare_winner(&state.repo, &state.notifier, &id, &winner).await?;
    Ok(Json(serde_json::json!({"status": "completed"})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelMatchRequest {
    pub reason: Option<String>,
}

pub async fn cancel_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CancelMatchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_can_settle()?;

    let reason = body.reason.unwrap_or_else(|| "cancelled by admin".to_string());
    match_engine::admin_cancel_match(&state.repo, &state.notifier, &id, &reason).await?;
    Ok(Json(serde_json::json!({"status": "cancelled"})))
}
