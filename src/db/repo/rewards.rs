//! Task definitions and per-player task progress.

use crate::db::repo::{parse_decimal, Repository};
use crate::domain::{Task, TaskProgress, TaskType, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

fn row_to_task(row: &SqliteRow) -> Task {
    let type_str: String = row.get("task_type");
    let reward: String = row.get("reward");
    let enabled: i64 = row.get("enabled");
    Task {
        id: row.get("id"),
        task_type: TaskType::parse(&type_str).unwrap_or(TaskType::PlayCount),
        target: row.get("target"),
        reward: parse_decimal(&reward, "tasks.reward"),
        enabled: enabled != 0,
    }
}

fn row_to_progress(row: &SqliteRow) -> TaskProgress {
    let user_id: String = row.get("user_id");
    let completed: i64 = row.get("completed");
    let claimed: i64 = row.get("claimed");
    TaskProgress {
        user_id: UserId::new(user_id),
        task_id: row.get("task_id"),
        progress: row.get("progress"),
        completed: completed != 0,
        claimed: claimed != 0,
    }
}

impl Repository {
    pub async fn upsert_task(&self, task: &Task) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, task_type, target, reward, enabled)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                task_type = excluded.task_type,
                target = excluded.target,
                reward = excluded.reward,
                enabled = excluded.enabled
            "#,
        )
        .bind(&task.id)
        .bind(task.task_type.as_str())
        .bind(task.target)
        .bind(task.reward.to_canonical_string())
        .bind(task.enabled as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_task).collect())
    }

    pub async fn get_task_progress(
        &self,
        user: &UserId,
        task_id: &str,
    ) -> Result<Option<TaskProgress>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM task_progress WHERE user_id = ? AND task_id = ?")
            .bind(user.as_str())
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_progress))
    }

    pub async fn list_task_progress(
        &self,
        user: &UserId,
    ) -> Result<Vec<TaskProgress>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM task_progress WHERE user_id = ? ORDER BY task_id ASC")
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_progress).collect())
    }
}

pub async fn list_enabled_tasks_tx(conn: &mut SqliteConnection) -> Result<Vec<Task>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM tasks WHERE enabled = 1 ORDER BY id ASC")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(row_to_task).collect())
}

pub async fn get_task_tx(
    conn: &mut SqliteConnection,
    task_id: &str,
) -> Result<Option<Task>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(row_to_task))
}

/// Read-or-initialize a player's progress row.
pub async fn get_or_init_progress_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    task_id: &str,
) -> Result<TaskProgress, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO task_progress (user_id, task_id) VALUES (?, ?)
        ON CONFLICT(user_id, task_id) DO NOTHING
        "#,
    )
    .bind(user.as_str())
    .bind(task_id)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query("SELECT * FROM task_progress WHERE user_id = ? AND task_id = ?")
        .bind(user.as_str())
        .bind(task_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row_to_progress(&row))
}

pub async fn set_progress_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    task_id: &str,
    progress: i64,
    completed: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE task_progress SET progress = ?, completed = ? WHERE user_id = ? AND task_id = ?",
    )
    .bind(progress)
    .bind(completed as i64)
    .bind(user.as_str())
    .bind(task_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// The claim compare-and-commit: succeeds at most once per (user, task).
pub async fn claim_progress_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    task_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE task_progress SET claimed = 1 \
         WHERE user_id = ? AND task_id = ? AND completed = 1 AND claimed = 0",
    )
    .bind(user.as_str())
    .bind(task_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
