//! Deposit and withdrawal request documents written by the UI collaborator.
//!
//! Requests carry a pending -> approved | rejected lifecycle; the guarded
//! transition is the idempotency anchor for everything money-moving that
//! hangs off an approval.

use crate::db::repo::{parse_decimal, Repository};
use crate::domain::{Decimal, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepositRequest {
    pub id: String,
    pub user_id: UserId,
    pub amount: Decimal,
    pub channel_id: Option<String>,
    pub status: RequestStatus,
    pub created_at: TimeMs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalRequest {
    pub id: String,
    pub user_id: UserId,
    pub amount: Decimal,
    pub destination: Option<String>,
    pub status: RequestStatus,
    pub created_at: TimeMs,
}

fn row_to_deposit(row: &SqliteRow) -> DepositRequest {
    let user_id: String = row.get("user_id");
    let amount: String = row.get("amount");
    let status: String = row.get("status");
    DepositRequest {
        id: row.get("id"),
        user_id: UserId::new(user_id),
        amount: parse_decimal(&amount, "deposit_requests.amount"),
        channel_id: row.get("channel_id"),
        status: RequestStatus::parse(&status).unwrap_or(RequestStatus::Rejected),
        created_at: TimeMs::new(row.get("created_at")),
    }
}

fn row_to_withdrawal(row: &SqliteRow) -> WithdrawalRequest {
    let user_id: String = row.get("user_id");
    let amount: String = row.get("amount");
    let status: String = row.get("status");
    WithdrawalRequest {
        id: row.get("id"),
        user_id: UserId::new(user_id),
        amount: parse_decimal(&amount, "withdrawal_requests.amount"),
        destination: row.get("destination"),
        status: RequestStatus::parse(&status).unwrap_or(RequestStatus::Rejected),
        created_at: TimeMs::new(row.get("created_at")),
    }
}

impl Repository {
    pub async fn insert_deposit_request(&self, req: &DepositRequest) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO deposit_requests (id, user_id, amount, channel_id, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&req.id)
        .bind(req.user_id.as_str())
        .bind(req.amount.to_canonical_string())
        .bind(req.channel_id.as_deref())
        .bind(req.status.as_str())
        .bind(req.created_at.as_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_deposit_request(
        &self,
        id: &str,
    ) -> Result<Option<DepositRequest>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM deposit_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_deposit))
    }

    pub async fn get_withdrawal_request(
        &self,
        id: &str,
    ) -> Result<Option<WithdrawalRequest>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM withdrawal_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_withdrawal))
    }
}

pub async fn get_deposit_request_tx(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<DepositRequest>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM deposit_requests WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(row_to_deposit))
}

pub async fn get_withdrawal_request_tx(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<WithdrawalRequest>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM withdrawal_requests WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(row_to_withdrawal))
}

pub async fn insert_withdrawal_request_tx(
    conn: &mut SqliteConnection,
    req: &WithdrawalRequest,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO withdrawal_requests (id, user_id, amount, destination, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&req.id)
    .bind(req.user_id.as_str())
    .bind(req.amount.to_canonical_string())
    .bind(req.destination.as_deref())
    .bind(req.status.as_str())
    .bind(req.created_at.as_ms())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Guarded pending -> approved|rejected transition. Zero rows affected means
/// the request was already processed (redelivery or a concurrent admin).
pub async fn transition_deposit_tx(
    conn: &mut SqliteConnection,
    id: &str,
    to: RequestStatus,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE deposit_requests SET status = ? WHERE id = ? AND status = 'pending'")
            .bind(to.as_str())
            .bind(id)
            .execute(&mut *conn)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn transition_withdrawal_tx(
    conn: &mut SqliteConnection,
    id: &str,
    to: RequestStatus,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE withdrawal_requests SET status = ? WHERE id = ? AND status = 'pending'")
            .bind(to.as_str())
            .bind(id)
            .execute(&mut *conn)
            .await?;
    Ok(result.rows_affected() > 0)
}
