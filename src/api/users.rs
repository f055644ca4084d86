use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::auth::authenticate;
use crate::db::repo::UserRow;
use crate::domain::UserId;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub avatar_url: Option<String>,
    pub referred_by: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub wallet_balance: String,
    pub total_withdrawals: String,
    pub login_streak: i64,
    pub total_matches_played: i64,
    pub total_matches_won: i64,
    pub win_rate: String,
    pub winnings: String,
}

pub fn user_dto(row: &UserRow) -> UserDto {
    UserDto {
        id: row.id.as_str().to_string(),
        name: row.name.clone(),
        avatar_url: row.avatar_url.clone(),
        role: row.role.as_str().to_string(),
        wallet_balance: row.wallet_balance.to_canonical_string(),
        total_withdrawals: row.total_withdrawals.to_canonical_string(),
        login_streak: row.login_streak,
        total_matches_played: row.total_matches_played,
        total_matches_won: row.total_matches_won,
        win_rate: row.win_rate.to_canonical_string(),
        winnings: row.winnings.to_canonical_string(),
    }
}

/// Create the caller's profile document. Safe to retry; an existing profile
/// is returned untouched.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<UserDto>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;

    if body.name.trim().is_empty() {
        return Err(AppError::InvalidArgument("Name must not be empty".into()));
    }
    let referred_by = match body.referred_by.as_deref() {
        Some(r) if r == auth.user_id.as_str() => {
            return Err(AppError::InvalidArgument(
                "Users cannot refer themselves".into(),
            ));
        }
        Some(r) => Some(UserId::new(r)),
        None => None,
    };

    if let Some(referrer) = &referred_by {
        if state.repo.get_user(referrer).await?.is_none() {
            return Err(AppError::InvalidArgument(format!(
                "Referrer {} does not exist",
                referrer
            )));
        }
    }

    state
        .repo
        .create_user(
            &auth.user_id,
            body.name.trim(),
            body.avatar_url.as_deref(),
            referred_by.as_ref(),
        )
        .await?;

    let row = state
        .repo
        .get_user(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::Internal("User missing after creation".into()))?;
    Ok(Json(user_dto(&row)))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserDto>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    let row = state
        .repo
        .get_user(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id)))?;
    Ok(Json(user_dto(&row)))
}
