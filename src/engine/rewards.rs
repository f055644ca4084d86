//! Reward flows: daily login bonus with streak tracking, and task progress
//! earned through settled matches.

use crate::db::repo::rewards::{
    claim_progress_tx, get_or_init_progress_tx, get_task_tx, list_enabled_tasks_tx,
    set_progress_tx,
};
use crate::db::repo::users::{get_user_tx, set_login_tx};
use crate::db::repo::bonus_config_tx;
use crate::db::Repository;
use crate::domain::{Decimal, LedgerRecord, LedgerType, TaskType, UserId};
use crate::engine::wallet;
use crate::error::AppError;
use crate::notify::Notifier;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::sync::Arc;
use tracing::info;

fn daily_bonus_key(user: &UserId, date: &str) -> String {
    format!("daily:{}:{}", user, date)
}

fn task_reward_key(task_id: &str, user: &UserId) -> String {
    format!("task:{}:{}", task_id, user)
}

/// Local calendar date for the configured business timezone.
fn local_date(now: DateTime<Utc>, offset_minutes: i32) -> (String, String) {
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    let local = now.with_timezone(&offset);
    let today = local.format("%Y-%m-%d").to_string();
    let yesterday = (local - Duration::days(1)).format("%Y-%m-%d").to_string();
    (today, yesterday)
}

/// Result of a successful daily bonus claim.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBonusClaim {
    pub date: String,
    pub streak: i64,
    pub amount: Decimal,
}

/// Claim the daily login bonus for "today" in the business timezone.
pub async fn claim_daily_bonus(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    user: &UserId,
    offset_minutes: i32,
) -> Result<DailyBonusClaim, AppError> {
    let claim = claim_daily_bonus_at(repo, user, offset_minutes, Utc::now()).await?;

    info!(
        user = %user,
        date = %claim.date,
        streak = claim.streak,
        amount = %claim.amount,
        "Daily bonus claimed"
    );
    notifier
        .notify(
            user,
            "Daily bonus",
            &format!("Day {} streak: {} added to your wallet.", claim.streak, claim.amount),
        )
        .await;
    Ok(claim)
}

/// Clock-parameterized claim so streak arithmetic is testable around
/// midnight boundaries.
pub async fn claim_daily_bonus_at(
    repo: &Repository,
    user: &UserId,
    offset_minutes: i32,
    now: DateTime<Utc>,
) -> Result<DailyBonusClaim, AppError> {
    let (today, yesterday) = local_date(now, offset_minutes);

    let mut tx = repo.begin().await?;

    let row = get_user_tx(&mut tx, user)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user)))?;

    let config = bonus_config_tx(&mut tx).await?.ok_or_else(|| {
        AppError::FailedPrecondition("Daily bonus is not configured".to_string())
    })?;
    if !config.enabled {
        return Err(AppError::FailedPrecondition(
            "Daily bonus is currently disabled".to_string(),
        ));
    }

    if row.last_login_date.as_deref() == Some(today.as_str()) {
        return Err(AppError::FailedPrecondition(
            "Daily bonus already claimed today".to_string(),
        ));
    }

    // Consecutive-day logins extend the streak; any gap resets it.
    let streak = if row.last_login_date.as_deref() == Some(yesterday.as_str()) {
        row.login_streak + 1
    } else {
        1
    };

    if !set_login_tx(&mut tx, user, &today, streak).await? {
        return Err(AppError::FailedPrecondition(
            "Daily bonus already claimed today".to_string(),
        ));
    }

    let amount = config.amount_for_streak(streak.max(1) as u32);
    if amount.is_positive() {
        let record = LedgerRecord::completed(
            daily_bonus_key(user, &today),
            user.clone(),
            LedgerType::DailyBonus,
            amount,
            format!("Daily login bonus, streak day {}", streak),
        );
        wallet::post_record_tx(&mut tx, &record).await?;
    }

    tx.commit().await?;

    Ok(DailyBonusClaim {
        date: today,
        streak,
        amount,
    })
}

/// Credit a completed task's reward. The guarded claim flip makes the
/// payout single-shot per (user, task).
pub async fn claim_task_reward(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    user: &UserId,
    task_id: &str,
) -> Result<Decimal, AppError> {
    let mut tx = repo.begin().await?;

    let task = get_task_tx(&mut tx, task_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))?;

    if !claim_progress_tx(&mut tx, user, task_id).await? {
        return Err(AppError::FailedPrecondition(
            "Task is not completed or its reward was already claimed".to_string(),
        ));
    }

    let record = LedgerRecord::completed(
        task_reward_key(task_id, user),
        user.clone(),
        LedgerType::TaskReward,
        task.reward,
        format!("Task reward: {}", task_id),
    );
    wallet::post_record_tx(&mut tx, &record).await?;

    tx.commit().await?;

    info!(user = %user, task_id, reward = %task.reward, "Task reward claimed");
    notifier
        .notify(
            user,
            "Task completed",
            &format!("You earned {} for completing a task.", task.reward),
        )
        .await;
    Ok(task.reward)
}

/// Advance task progress for one player after a settled match. Runs inside
/// the settlement transaction, so progress is exactly-once per settlement.
/// Returns the ids of tasks whose target was reached by this match, for
/// post-commit notification by the caller.
pub async fn apply_match_completion_tx(
    conn: &mut sqlx::SqliteConnection,
    user: &UserId,
    is_winner: bool,
) -> Result<Vec<String>, sqlx::Error> {
    let tasks = list_enabled_tasks_tx(conn).await?;
    let mut reached = Vec::new();

    for task in &tasks {
        let counts = match task.task_type {
            TaskType::PlayCount => true,
            TaskType::WinBased => is_winner,
        };
        if !counts {
            continue;
        }

        let progress = get_or_init_progress_tx(conn, user, &task.id).await?;
        if progress.completed {
            continue;
        }

        let advanced = progress.progress + 1;
        let completed = advanced >= task.target;
        set_progress_tx(conn, user, &task.id, advanced, completed).await?;
        if completed {
            info!(user = %user, task_id = %task.id, "Task target reached");
            reached.push(task.id.clone());
        }
    }

    Ok(reached)
}
