//! Wallet Projector: the only writer of `wallet_balance`.
//!
//! Every ledger record passes through `post_record_tx`, which inserts the
//! record and applies its signed delta to the owning wallet inside the
//! caller's transaction. A record that would drive the balance negative is
//! stored with status `failed` and the wallet is left untouched.

use crate::db::repo::ledger::{
    bump_total_withdrawals_tx, get_balance_tx, insert_record_tx, mark_failed_tx, set_balance_tx,
};
use crate::db::Repository;
use crate::domain::{LedgerRecord, LedgerStatus, LedgerType};
use sqlx::sqlite::SqliteConnection;
use tracing::{debug, warn};

/// Result of posting one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// Inserted and, where applicable, projected onto the wallet.
    Posted,
    /// Event key already present; redelivered event, nothing changed.
    Duplicate,
    /// Stored with status `failed`; wallet untouched.
    Rejected(String),
}

impl PostOutcome {
    pub fn is_posted(&self) -> bool {
        matches!(self, PostOutcome::Posted)
    }
}

/// Insert a record and project it within the caller's transaction.
pub async fn post_record_tx(
    conn: &mut SqliteConnection,
    record: &LedgerRecord,
) -> Result<PostOutcome, sqlx::Error> {
    let inserted = insert_record_tx(conn, record, record.status, None).await?;
    if !inserted {
        debug!(event_key = %record.event_key, "Ledger record redelivered, skipping");
        return Ok(PostOutcome::Duplicate);
    }

    // Only completed records move money, and the platform pseudo-user has
    // no wallet to project onto.
    if record.status != LedgerStatus::Completed || record.user_id.is_platform() {
        return Ok(PostOutcome::Posted);
    }

    let Some(balance) = get_balance_tx(conn, &record.user_id).await? else {
        let reason = "Unknown wallet owner";
        warn!(event_key = %record.event_key, user = %record.user_id, "{}", reason);
        mark_failed_tx(conn, &record.event_key, reason).await?;
        return Ok(PostOutcome::Rejected(reason.to_string()));
    };

    let new_balance = balance + record.amount;
    if new_balance.is_negative() {
        let reason = "Insufficient balance";
        warn!(
            event_key = %record.event_key,
            user = %record.user_id,
            balance = %balance,
            amount = %record.amount,
            "Rejecting ledger record that would drive balance negative"
        );
        mark_failed_tx(conn, &record.event_key, reason).await?;
        return Ok(PostOutcome::Rejected(reason.to_string()));
    }

    set_balance_tx(conn, &record.user_id, new_balance).await?;

    if record.record_type == LedgerType::Withdrawal {
        // Withdrawal amounts are negative; this adds the positive value.
        bump_total_withdrawals_tx(conn, &record.user_id, -record.amount).await?;
    }

    Ok(PostOutcome::Posted)
}

/// Convenience wrapper opening its own transaction, for flows where the
/// record is the whole unit of work.
pub async fn post_record(
    repo: &Repository,
    record: &LedgerRecord,
) -> Result<PostOutcome, sqlx::Error> {
    let mut tx = repo.begin().await?;
    let outcome = post_record_tx(&mut tx, record).await?;
    tx.commit().await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{Decimal, UserId};
    use tempfile::TempDir;

    async fn setup() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn record(key: &str, user: &str, record_type: LedgerType, amount: i64) -> LedgerRecord {
        LedgerRecord::completed(
            key,
            UserId::new(user),
            record_type,
            Decimal::from_int(amount),
            "test",
        )
    }

    #[tokio::test]
    async fn test_projection_applies_signed_delta() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("u1");
        repo.create_user(&user, "Asha", None, None).await.unwrap();

        let outcome = post_record(&repo, &record("dep:1", "u1", LedgerType::Deposit, 500))
            .await
            .unwrap();
        assert_eq!(outcome, PostOutcome::Posted);

        let outcome = post_record(&repo, &record("fee:1", "u1", LedgerType::EntryFee, -50))
            .await
            .unwrap();
        assert_eq!(outcome, PostOutcome::Posted);

        let stored = repo.get_user(&user).await.unwrap().unwrap();
        assert_eq!(stored.wallet_balance.to_canonical_string(), "450");
        assert_eq!(
            repo.sum_completed_for_user(&user).await.unwrap(),
            stored.wallet_balance
        );
    }

    #[tokio::test]
    async fn test_overdraft_marks_record_failed_and_leaves_wallet() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("u1");
        repo.create_user(&user, "Asha", None, None).await.unwrap();
        post_record(&repo, &record("dep:1", "u1", LedgerType::Deposit, 100))
            .await
            .unwrap();

        let outcome = post_record(&repo, &record("wd:1", "u1", LedgerType::Withdrawal, -500))
            .await
            .unwrap();
        assert!(matches!(outcome, PostOutcome::Rejected(_)));

        let stored = repo.get_user(&user).await.unwrap().unwrap();
        assert_eq!(stored.wallet_balance.to_canonical_string(), "100");
        assert!(stored.total_withdrawals.is_zero());

        let row = repo.get_ledger_record("wd:1").await.unwrap().unwrap();
        assert_eq!(row.record.status, crate::domain::LedgerStatus::Failed);
        assert_eq!(row.failure_reason.as_deref(), Some("Insufficient balance"));
    }

    #[tokio::test]
    async fn test_withdrawal_bumps_total_withdrawals() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("u1");
        repo.create_user(&user, "Asha", None, None).await.unwrap();
        post_record(&repo, &record("dep:1", "u1", LedgerType::Deposit, 500))
            .await
            .unwrap();

        post_record(&repo, &record("wd:1", "u1", LedgerType::Withdrawal, -200))
            .await
            .unwrap();

        let stored = repo.get_user(&user).await.unwrap().unwrap();
        assert_eq!(stored.wallet_balance.to_canonical_string(), "300");
        assert_eq!(stored.total_withdrawals.to_canonical_string(), "200");
    }

    #[tokio::test]
    async fn test_redelivered_record_projects_once() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("u1");
        repo.create_user(&user, "Asha", None, None).await.unwrap();

        let r = record("dep:1", "u1", LedgerType::Deposit, 500);
        assert_eq!(post_record(&repo, &r).await.unwrap(), PostOutcome::Posted);
        assert_eq!(post_record(&repo, &r).await.unwrap(), PostOutcome::Duplicate);

        let stored = repo.get_user(&user).await.unwrap().unwrap();
        assert_eq!(stored.wallet_balance.to_canonical_string(), "500");
    }

    #[tokio::test]
    async fn test_platform_records_skip_projection() {
        let (repo, _temp) = setup().await;

        let outcome = post_record(
            &repo,
            &record("mcom:1", "platform", LedgerType::MatchCommission, 10),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PostOutcome::Posted);

        let sum = repo
            .sum_completed_for_user(&UserId::platform())
            .await
            .unwrap();
        assert_eq!(sum.to_canonical_string(), "10");
    }

    #[tokio::test]
    async fn test_pending_record_does_not_project() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("u1");
        repo.create_user(&user, "Asha", None, None).await.unwrap();

        let mut r = record("dep:1", "u1", LedgerType::Deposit, 500);
        r.status = crate::domain::LedgerStatus::Pending;
        assert_eq!(post_record(&repo, &r).await.unwrap(), PostOutcome::Posted);

        let stored = repo.get_user(&user).await.unwrap().unwrap();
        assert!(stored.wallet_balance.is_zero());
    }
}
