//! Matchmaking queue storage.
//!
//! Entries are consumed by guarded deletes inside the pairing transaction;
//! a delete that affects zero rows means another pairing won the race.

use crate::db::repo::{parse_decimal, Repository};
use crate::domain::{Decimal, QueueEntry, QueuePool, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

fn row_to_entry(row: &SqliteRow) -> QueueEntry {
    let user_id: String = row.get("user_id");
    let pool_str: String = row.get("pool");
    let fee: String = row.get("entry_fee");
    let win_rate: String = row.get("win_rate");

    QueueEntry {
        user_id: UserId::new(user_id),
        pool: QueuePool::parse(&pool_str).unwrap_or(QueuePool::Seekers),
        entry_fee: parse_decimal(&fee, "queue_entries.entry_fee"),
        room_code: row.get("room_code"),
        user_name: row.get("user_name"),
        user_avatar: row.get("user_avatar"),
        win_rate: parse_decimal(&win_rate, "queue_entries.win_rate"),
        created_at: TimeMs::new(row.get("created_at")),
    }
}

const QUEUE_COLUMNS: &str =
    "user_id, pool, entry_fee, room_code, user_name, user_avatar, win_rate, created_at";

impl Repository {
    /// Insert a queue entry. Returns false when the user is already queued.
    pub async fn insert_queue_entry(&self, entry: &QueueEntry) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO queue_entries
            (user_id, pool, entry_fee, room_code, user_name, user_avatar, win_rate, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(entry.user_id.as_str())
        .bind(entry.pool.as_str())
        .bind(entry.entry_fee.to_canonical_string())
        .bind(entry.room_code.as_deref())
        .bind(&entry.user_name)
        .bind(entry.user_avatar.as_deref())
        .bind(entry.win_rate.to_canonical_string())
        .bind(entry.created_at.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_queue_entry(&self, user: &UserId) -> Result<Option<QueueEntry>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM queue_entries WHERE user_id = ?",
            QUEUE_COLUMNS
        ))
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_entry))
    }

    /// Unilateral cancellation by the owner.
    pub async fn delete_queue_entry(&self, user: &UserId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM queue_entries WHERE user_id = ?")
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All waiting entries, oldest first, for the periodic pairing re-scan.
    pub async fn list_queue_entries(&self) -> Result<Vec<QueueEntry>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM queue_entries ORDER BY created_at ASC, user_id ASC",
            QUEUE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_entry).collect())
    }
}

/// Oldest entry in `pool` with exactly `entry_fee`, excluding `exclude_user`.
/// First-come-first-served by creation order.
pub async fn find_opponent_tx(
    conn: &mut SqliteConnection,
    pool: QueuePool,
    entry_fee: Decimal,
    exclude_user: &UserId,
) -> Result<Option<QueueEntry>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM queue_entries \
         WHERE pool = ? AND entry_fee = ? AND user_id <> ? \
         ORDER BY created_at ASC, user_id ASC LIMIT 1",
        QUEUE_COLUMNS
    ))
    .bind(pool.as_str())
    .bind(entry_fee.to_canonical_string())
    .bind(exclude_user.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.as_ref().map(row_to_entry))
}

/// Guarded consumption of a queue entry. Zero rows affected means the entry
/// was already consumed by a concurrent pairing.
pub async fn consume_entry_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    pool: QueuePool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM queue_entries WHERE user_id = ? AND pool = ?")
        .bind(user.as_str())
        .bind(pool.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::tests::setup_test_db;

    fn entry(user: &str, pool: QueuePool, fee: i64, at: i64) -> QueueEntry {
        QueueEntry {
            user_id: UserId::new(user),
            pool,
            entry_fee: Decimal::from_int(fee),
            room_code: None,
            user_name: user.to_string(),
            user_avatar: None,
            win_rate: Decimal::zero(),
            created_at: TimeMs::new(at),
        }
    }

    #[tokio::test]
    async fn test_one_entry_per_user() {
        let (repo, _temp) = setup_test_db().await;

        assert!(repo
            .insert_queue_entry(&entry("u1", QueuePool::Creators, 50, 1000))
            .await
            .unwrap());
        assert!(!repo
            .insert_queue_entry(&entry("u1", QueuePool::Seekers, 50, 2000))
            .await
            .unwrap());

        // First insert wins; the losing insert leaves no trace.
        let stored = repo
            .get_queue_entry(&UserId::new("u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.pool, QueuePool::Creators);
        assert_eq!(stored.created_at, TimeMs::new(1000));
    }

    #[tokio::test]
    async fn test_find_opponent_matches_fee_and_pool_fcfs() {
        let (repo, _temp) = setup_test_db().await;

        repo.insert_queue_entry(&entry("late", QueuePool::Creators, 50, 3000))
            .await
            .unwrap();
        repo.insert_queue_entry(&entry("early", QueuePool::Creators, 50, 1000))
            .await
            .unwrap();
        repo.insert_queue_entry(&entry("wrong-fee", QueuePool::Creators, 75, 500))
            .await
            .unwrap();

        let mut tx = repo.begin().await.unwrap();
        let found = find_opponent_tx(
            &mut tx,
            QueuePool::Creators,
            Decimal::from_int(50),
            &UserId::new("seeker"),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(found.user_id.as_str(), "early");

        let none = find_opponent_tx(
            &mut tx,
            QueuePool::Seekers,
            Decimal::from_int(50),
            &UserId::new("seeker"),
        )
        .await
        .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_consume_entry_guard() {
        let (repo, _temp) = setup_test_db().await;
        repo.insert_queue_entry(&entry("u1", QueuePool::Creators, 50, 1000))
            .await
            .unwrap();

        let mut tx = repo.begin().await.unwrap();
        assert!(
            consume_entry_tx(&mut tx, &UserId::new("u1"), QueuePool::Creators)
                .await
                .unwrap()
        );
        assert!(
            !consume_entry_tx(&mut tx, &UserId::new("u1"), QueuePool::Creators)
                .await
                .unwrap()
        );
        tx.commit().await.unwrap();
    }
}
