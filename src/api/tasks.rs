use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::auth::authenticate;
use crate::engine::rewards;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,
    pub task_type: String,
    pub target: i64,
    pub reward: String,
    pub progress: i64,
    pub completed: bool,
    pub claimed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub tasks: Vec<TaskDto>,
}

/// Enabled tasks joined with the caller's progress.
pub async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TaskListResponse>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;

    let tasks = state.repo.list_tasks().await?;
    let progress = state.repo.list_task_progress(&auth.user_id).await?;

    let dto = tasks
        .iter()
        .filter(|t| t.enabled)
        .map(|t| {
            let p = progress.iter().find(|p| p.task_id == t.id);
            TaskDto {
                id: t.id.clone(),
                task_type: t.task_type.as_str().to_string(),
                target: t.target,
                reward: t.reward.to_canonical_string(),
                progress: p.map(|p| p.progress).unwrap_or(0),
                completed: p.map(|p| p.completed).unwrap_or(false),
                claimed: p.map(|p| p.claimed).unwrap_or(false),
            }
        })
        .collect();

    Ok(Json(TaskListResponse { tasks: dto }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimTaskResponse {
    pub reward: String,
}

pub async fn claim_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ClaimTaskResponse>, AppError> {
    let auth = authenticate(&headers, &state.config.jwt_secret)?;
    let reward =
        rewards::claim_task_reward(&state.repo, &state.notifier, &auth.user_id, &id).await?;
    Ok(Json(ClaimTaskResponse {
        reward: reward.to_canonical_string(),
    }))
}
