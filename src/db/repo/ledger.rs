//! Ledger record storage and raw balance reads/writes.
//!
//! The projection rules (status gate, platform skip, non-negativity) live
//! in `engine::wallet`; this module is only SQL.

use crate::db::repo::{parse_decimal, Repository};
use crate::domain::{Decimal, LedgerRecord, LedgerStatus, LedgerType, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

/// A stored ledger record plus its rejection reason, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub record: LedgerRecord,
    pub failure_reason: Option<String>,
}

fn row_to_ledger(row: &SqliteRow) -> LedgerRow {
    let user_id: String = row.get("user_id");
    let type_str: String = row.get("record_type");
    let status_str: String = row.get("status");
    let amount: String = row.get("amount");

    LedgerRow {
        record: LedgerRecord {
            event_key: row.get("event_key"),
            user_id: UserId::new(user_id),
            // Unknown strings should be impossible; fall back to the most
            // inert interpretation rather than dropping the row.
            record_type: LedgerType::parse(&type_str).unwrap_or(LedgerType::AdminCredit),
            amount: parse_decimal(&amount, "ledger_records.amount"),
            status: LedgerStatus::parse(&status_str).unwrap_or(LedgerStatus::Failed),
            created_at: TimeMs::new(row.get("created_at")),
            description: row.get("description"),
            related_match_id: row.get("related_match_id"),
            related_tournament_id: row.get("related_tournament_id"),
        },
        failure_reason: row.get("failure_reason"),
    }
}

const LEDGER_COLUMNS: &str = "event_key, user_id, record_type, amount, status, created_at, \
     description, related_match_id, related_tournament_id, failure_reason";

/// Insert a record with an explicit stored status. Returns false when the
/// event key already exists (redelivered event).
pub async fn insert_record_tx(
    conn: &mut SqliteConnection,
    record: &LedgerRecord,
    status: LedgerStatus,
    failure_reason: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO ledger_records
        (event_key, user_id, record_type, amount, status, created_at,
         description, related_match_id, related_tournament_id, failure_reason)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(event_key) DO NOTHING
        "#,
    )
    .bind(&record.event_key)
    .bind(record.user_id.as_str())
    .bind(record.record_type.as_str())
    .bind(record.amount.to_canonical_string())
    .bind(status.as_str())
    .bind(record.created_at.as_ms())
    .bind(&record.description)
    .bind(record.related_match_id.as_deref())
    .bind(record.related_tournament_id.as_deref())
    .bind(failure_reason)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Terminal transition of a stored record to `failed`. The only mutation a
/// ledger record ever receives after insert.
pub async fn mark_failed_tx(
    conn: &mut SqliteConnection,
    event_key: &str,
    reason: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE ledger_records SET status = 'failed', failure_reason = ? WHERE event_key = ?",
    )
    .bind(reason)
    .bind(event_key)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_balance_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<Option<Decimal>, sqlx::Error> {
    let row = sqlx::query("SELECT wallet_balance FROM users WHERE id = ?")
        .bind(user.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| {
        let s: String = r.get("wallet_balance");
        parse_decimal(&s, "users.wallet_balance")
    }))
}

pub async fn set_balance_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    balance: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET wallet_balance = ? WHERE id = ?")
        .bind(balance.to_canonical_string())
        .bind(user.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn bump_total_withdrawals_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    delta: Decimal,
) -> Result<(), sqlx::Error> {
    let row = sqlx::query("SELECT total_withdrawals FROM users WHERE id = ?")
        .bind(user.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else { return Ok(()) };
    let current: String = row.get("total_withdrawals");
    let updated = parse_decimal(&current, "users.total_withdrawals") + delta;

    sqlx::query("UPDATE users SET total_withdrawals = ? WHERE id = ?")
        .bind(updated.to_canonical_string())
        .bind(user.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl Repository {
    pub async fn get_ledger_record(
        &self,
        event_key: &str,
    ) -> Result<Option<LedgerRow>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM ledger_records WHERE event_key = ?",
            LEDGER_COLUMNS
        ))
        .bind(event_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_ledger))
    }

    pub async fn list_ledger_for_user(
        &self,
        user: &UserId,
        limit: i64,
    ) -> Result<Vec<LedgerRow>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM ledger_records WHERE user_id = ? \
             ORDER BY created_at DESC, event_key DESC LIMIT ?",
            LEDGER_COLUMNS
        ))
        .bind(user.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_ledger).collect())
    }

    /// Sum of completed ledger amounts for one user.
    ///
    /// Summed in Rust to preserve decimal precision; SQLite's SUM aggregate
    /// returns REAL.
    pub async fn sum_completed_for_user(&self, user: &UserId) -> Result<Decimal, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT amount FROM ledger_records WHERE user_id = ? AND status = 'completed' \
             ORDER BY created_at ASC, event_key ASC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut sum = Decimal::zero();
        for row in rows {
            let amount: String = row.get("amount");
            sum = sum + parse_decimal(&amount, "ledger_records.amount");
        }
        Ok(sum)
    }
}
