use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::users::{user_dto, UserDto};
use crate::api::AppState;
use crate::auth::authenticate;
use crate::db::repo::{CONFIG_COMMISSION_PCT, CONFIG_REFERRAL_PCT};
use crate::domain::{BonusConfig, Decimal, PaymentChannel, Role, UserId};
use crate::engine::payments;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRoleRequest {
    pub user_id: String,
    pub role: String,
}

pub async fn set_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_super_admin()?;

    let role = Role::parse(&body.role)
        .ok_or_else(|| AppError::InvalidArgument(format!("Unknown role {}", body.role)))?;
    let user = UserId::new(body.user_id);
    if !state.repo.set_role(&user, role).await? {
        return Err(AppError::NotFound(format!("User {} not found", user)));
    }
    Ok(Json(serde_json::json!({"status": "updated"})))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserDto>,
}

pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserListResponse>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_super_admin()?;

    let users = state.repo.list_users().await?;
    Ok(Json(UserListResponse {
        users: users.iter().map(user_dto).collect(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub user_count: i64,
    pub queued_players: i64,
    pub live_matches: i64,
    pub disputed_matches: i64,
    pub pending_deposits: i64,
    pub pending_withdrawals: i64,
    pub active_channels: i64,
    pub channels_exhausted: bool,
    /// Net platform position: commissions collected, as a canonical string.
    pub platform_revenue: String,
}

pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_super_admin()?;

    let stats = state.repo.dashboard_stats().await?;
    let revenue = state
        .repo
        .sum_completed_for_user(&UserId::platform())
        .await?;

    Ok(Json(DashboardResponse {
        user_count: stats.user_count,
        queued_players: stats.queued_players,
        live_matches: stats.live_matches,
        disputed_matches: stats.disputed_matches,
        pending_deposits: stats.pending_deposits,
        pending_withdrawals: stats.pending_withdrawals,
        active_channels: stats.active_channels,
        channels_exhausted: stats.active_channels == 0,
        platform_revenue: revenue.to_canonical_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustWalletRequest {
    pub user_id: String,
    pub amount: String,
    pub reason: String,
}

pub async fn adjust_wallet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AdjustWalletRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_super_admin()?;

    let amount = Decimal::from_str_canonical(&body.amount)
        .map_err(|_| AppError::InvalidArgument("Invalid amount".into()))?;
    let user = UserId::new(body.user_id);
    payments::adjust_wallet(
        &state.repo,
        &state.notifier,
        &auth.user_id,
        &user,
        amount,
        &body.reason,
    )
    .await?;
    Ok(Json(serde_json::json!({"status": "adjusted"})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelRequest {
    pub channel_id: String,
    pub payment_limit: String,
    #[serde(default)]
    pub activate: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDto {
    pub id: String,
    pub channel_id: String,
    pub is_active: bool,
    pub payment_limit: String,
    pub current_received: String,
}

fn channel_dto(c: &PaymentChannel) -> ChannelDto {
    ChannelDto {
        id: c.id.clone(),
        channel_id: c.channel_id.clone(),
        is_active: c.is_active,
        payment_limit: c.payment_limit.to_canonical_string(),
        current_received: c.current_received.to_canonical_string(),
    }
}

pub async fn create_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateChannelRequest>,
) -> Result<Json<ChannelDto>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_super_admin()?;

    let limit = Decimal::from_str_canonical(&body.payment_limit)
        .map_err(|_| AppError::InvalidArgument("Invalid payment limit".into()))?;
    if !limit.is_positive() {
        return Err(AppError::InvalidArgument(
            "Payment limit must be positive".into(),
        ));
    }

    let channel = PaymentChannel {
        id: uuid::Uuid::new_v4().to_string(),
        channel_id: body.channel_id,
        is_active: body.activate,
        payment_limit: limit,
        current_received: Decimal::zero(),
    };
    state.repo.insert_channel(&channel).await?;
    Ok(Json(channel_dto(&channel)))
}

pub async fn list_channels(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChannelDto>>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_super_admin()?;

    let channels = state.repo.list_channels().await?;
    Ok(Json(channels.iter().map(channel_dto).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfigRequest {
    pub commission_pct: Option<String>,
    pub referral_pct: Option<String>,
    pub bonus_enabled: Option<bool>,
    pub daily_bonus: Option<String>,
    pub streak_bonus: Option<BTreeMap<u32, String>>,
}

pub async fn set_engine_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EngineConfigRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    auth.ensure_super_admin()?;

    if let Some(pct) = body.commission_pct.as_deref() {
        let value = parse_pct(pct, "commission")?;
        state
            .repo
            .set_config(CONFIG_COMMISSION_PCT, &value.to_canonical_string())
            .await?;
    }
    if let Some(pct) = body.referral_pct.as_deref() {
        let value = parse_pct(pct, "referral")?;
        state
            .repo
            .set_config(CONFIG_REFERRAL_PCT, &value.to_canonical_string())
            .await?;
    }

    if body.bonus_enabled.is_some() || body.daily_bonus.is_some() || body.streak_bonus.is_some() {
        let mut streak_bonus = BTreeMap::new();
        for (day, amount) in body.streak_bonus.unwrap_or_default() {
            let amount = Decimal::from_str_canonical(&amount)
                .map_err(|_| AppError::InvalidArgument("Invalid streak bonus amount".into()))?;
            streak_bonus.insert(day, amount);
        }
        let daily_bonus = match body.daily_bonus.as_deref() {
            Some(s) => Decimal::from_str_canonical(s)
                .map_err(|_| AppError::InvalidArgument("Invalid daily bonus amount".into()))?,
            None => Decimal::zero(),
        };
        let config = BonusConfig {
            enabled: body.bonus_enabled.unwrap_or(true),
            daily_bonus,
            streak_bonus,
        };
        state.repo.set_bonus_config(&config).await?;
    }

    Ok(Json(serde_json::json!({"status": "updated"})))
}

fn parse_pct(s: &str, what: &str) -> Result<Decimal, AppError> {
    let value = Decimal::from_str_canonical(s)
        .map_err(|_| AppError::InvalidArgument(format!("Invalid {} percentage", what)))?;
    if value.is_negative() || value > Decimal::hundred() {
        return Err(AppError::InvalidArgument(format!(
            "The {} percentage must be between 0 and 100",
            what
        )));
    }
    Ok(value)
}
