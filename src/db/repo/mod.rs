//! Repository layer for database operations.
//!
//! Single-purpose queries live in per-domain submodules. Conn-scoped
//! functions (suffix `_tx`) take `&mut SqliteConnection` so engine handlers
//! can compose them inside one transaction; `Repository` methods open their
//! own connection from the pool for plain reads and writes.

pub mod channels;
pub mod ledger;
pub mod matches;
pub mod queue;
pub mod requests;
pub mod rewards;
pub mod users;

use crate::domain::{BonusConfig, Decimal};
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::{Row, Sqlite, Transaction};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

pub use requests::{DepositRequest, RequestStatus, WithdrawalRequest};
pub use users::UserRow;

/// Config key for the match commission percentage (default 10).
pub const CONFIG_COMMISSION_PCT: &str = "commission_pct";
/// Config key for the referral commission percentage (default 5).
pub const CONFIG_REFERRAL_PCT: &str = "referral_pct";

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction for a compare-and-commit critical section.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    // =========================================================================
    // Mutable engine configuration (read transactionally at point of use)
    // =========================================================================

    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO engine_config (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_bonus_config(&self, config: &BonusConfig) -> Result<(), sqlx::Error> {
        let streak_json = serde_json::to_string(&config.streak_bonus)
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO bonus_config (singleton, enabled, daily_bonus, streak_bonus)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(singleton) DO UPDATE SET
                enabled = excluded.enabled,
                daily_bonus = excluded.daily_bonus,
                streak_bonus = excluded.streak_bonus
            "#,
        )
        .bind(config.enabled as i64)
        .bind(config.daily_bonus.to_canonical_string())
        .bind(streak_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cross-domain counts for the admin dashboard.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS user_count,
                (SELECT COUNT(*) FROM queue_entries) AS queued_players,
                (SELECT COUNT(*) FROM matches WHERE status NOT IN ('completed', 'cancelled'))
                    AS live_matches,
                (SELECT COUNT(*) FROM matches WHERE status = 'disputed') AS disputed_matches,
                (SELECT COUNT(*) FROM deposit_requests WHERE status = 'pending')
                    AS pending_deposits,
                (SELECT COUNT(*) FROM withdrawal_requests WHERE status = 'pending')
                    AS pending_withdrawals,
                (SELECT COUNT(*) FROM payment_channels WHERE is_active = 1) AS active_channels
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardStats {
            user_count: row.get("user_count"),
            queued_players: row.get("queued_players"),
            live_matches: row.get("live_matches"),
            disputed_matches: row.get("disputed_matches"),
            pending_deposits: row.get("pending_deposits"),
            pending_withdrawals: row.get("pending_withdrawals"),
            active_channels: row.get("active_channels"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardStats {
    pub user_count: i64,
    pub queued_players: i64,
    pub live_matches: i64,
    pub disputed_matches: i64,
    pub pending_deposits: i64,
    pub pending_withdrawals: i64,
    pub active_channels: i64,
}

/// Read a decimal config value inside a transaction, falling back to the
/// given default when the key is absent or unparseable.
pub async fn config_decimal_tx(
    conn: &mut SqliteConnection,
    key: &str,
    default: Decimal,
) -> Result<Decimal, sqlx::Error> {
    let row = sqlx::query("SELECT value FROM engine_config WHERE key = ?")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(match row {
        Some(r) => {
            let value: String = r.get("value");
            Decimal::from_str(&value).unwrap_or_else(|e| {
                warn!(key = %key, value = %value, error = %e, "Unparseable config value, using default");
                default
            })
        }
        None => default,
    })
}

pub async fn commission_pct_tx(conn: &mut SqliteConnection) -> Result<Decimal, sqlx::Error> {
    config_decimal_tx(conn, CONFIG_COMMISSION_PCT, Decimal::from_int(10)).await
}

pub async fn referral_pct_tx(conn: &mut SqliteConnection) -> Result<Decimal, sqlx::Error> {
    config_decimal_tx(conn, CONFIG_REFERRAL_PCT, Decimal::from_int(5)).await
}

/// Read the bonus configuration inside a transaction. `None` when the
/// singleton row has never been written.
pub async fn bonus_config_tx(
    conn: &mut SqliteConnection,
) -> Result<Option<BonusConfig>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT enabled, daily_bonus, streak_bonus FROM bonus_config WHERE singleton = 1",
    )
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|r| {
        let enabled: i64 = r.get("enabled");
        let daily: String = r.get("daily_bonus");
        let streak_json: String = r.get("streak_bonus");
        let streak_bonus: BTreeMap<u32, Decimal> =
            serde_json::from_str(&streak_json).unwrap_or_else(|e| {
                warn!(error = %e, "Unparseable streak bonus table, treating as empty");
                BTreeMap::new()
            });
        BonusConfig {
            enabled: enabled != 0,
            daily_bonus: parse_decimal(&daily, "bonus_config.daily_bonus"),
            streak_bonus,
        }
    }))
}

/// Parse a stored canonical decimal string, warning and defaulting to zero
/// on corruption rather than failing the whole read.
pub(crate) fn parse_decimal(s: &str, context: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_else(|e| {
        warn!(context = %context, value = %s, error = %e, "Failed to parse stored decimal, using zero");
        Decimal::zero()
    })
}
