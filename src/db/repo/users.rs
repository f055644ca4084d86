//! User rows: wallet field-group, aggregate stats, roles, active matches.
//!
//! `wallet_balance` is written only through the ledger projection in
//! `engine::wallet`; everything else here stays clear of it.

use crate::db::repo::{parse_decimal, Repository};
use crate::domain::{Decimal, Role, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub referred_by: Option<UserId>,
    pub wallet_balance: Decimal,
    pub total_withdrawals: Decimal,
    pub referral_bonus_paid: bool,
    pub last_login_date: Option<String>,
    pub login_streak: i64,
    pub total_matches_played: i64,
    pub total_matches_won: i64,
    pub win_rate: Decimal,
    pub winnings: Decimal,
    pub created_at: TimeMs,
}

fn row_to_user(row: &SqliteRow) -> UserRow {
    let id: String = row.get("id");
    let role_str: String = row.get("role");
    let balance: String = row.get("wallet_balance");
    let withdrawals: String = row.get("total_withdrawals");
    let win_rate: String = row.get("win_rate");
    let winnings: String = row.get("winnings");
    let referral_paid: i64 = row.get("referral_bonus_paid");
    let referred_by: Option<String> = row.get("referred_by");

    UserRow {
        role: Role::parse(&role_str).unwrap_or(Role::None),
        wallet_balance: parse_decimal(&balance, "users.wallet_balance"),
        total_withdrawals: parse_decimal(&withdrawals, "users.total_withdrawals"),
        win_rate: parse_decimal(&win_rate, "users.win_rate"),
        winnings: parse_decimal(&winnings, "users.winnings"),
        referral_bonus_paid: referral_paid != 0,
        referred_by: referred_by.map(UserId::new),
        id: UserId::new(id),
        name: row.get("name"),
        avatar_url: row.get("avatar_url"),
        last_login_date: row.get("last_login_date"),
        login_streak: row.get("login_streak"),
        total_matches_played: row.get("total_matches_played"),
        total_matches_won: row.get("total_matches_won"),
        created_at: TimeMs::new(row.get("created_at")),
    }
}

const USER_COLUMNS: &str = "id, name, avatar_url, role, referred_by, wallet_balance, \
     total_withdrawals, referral_bonus_paid, last_login_date, login_streak, \
     total_matches_played, total_matches_won, win_rate, winnings, created_at";

impl Repository {
    /// Insert a user idempotently. Returns false when the id already exists.
    pub async fn create_user(
        &self,
        id: &UserId,
        name: &str,
        avatar_url: Option<&str>,
        referred_by: Option<&UserId>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, avatar_url, referred_by, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id.as_str())
        .bind(name)
        .bind(avatar_url)
        .bind(referred_by.map(|u| u.as_str()))
        .bind(TimeMs::now().as_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_user(&self, id: &UserId) -> Result<Option<UserRow>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    pub async fn set_role(&self, id: &UserId, role: Role) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_users(&self) -> Result<Vec<UserRow>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY created_at ASC, id ASC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_user).collect())
    }

    pub async fn active_match_ids(&self, user: &UserId) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT match_id FROM active_matches WHERE user_id = ? ORDER BY match_id ASC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("match_id")).collect())
    }
}

pub async fn get_user_tx(
    conn: &mut SqliteConnection,
    id: &UserId,
) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(row_to_user))
}

pub async fn active_match_count_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM active_matches WHERE user_id = ?")
        .bind(user.as_str())
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get("n"))
}

pub async fn insert_active_match_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    match_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO active_matches (user_id, match_id) VALUES (?, ?)
        ON CONFLICT(user_id, match_id) DO NOTHING
        "#,
    )
    .bind(user.as_str())
    .bind(match_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn remove_active_match_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    match_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM active_matches WHERE user_id = ? AND match_id = ?")
        .bind(user.as_str())
        .bind(match_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Apply post-settlement aggregate stats for one player.
pub async fn apply_match_stats_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    is_winner: bool,
    prize: Decimal,
) -> Result<(), sqlx::Error> {
    let current = get_user_tx(conn, user).await?;
    let Some(current) = current else {
        // Stats for an unknown player are dropped, not fatal; the money
        // movement is validated separately.
        tracing::warn!(user = %user, "Skipping stats update for missing user");
        return Ok(());
    };

    let played = current.total_matches_played + 1;
    let won = current.total_matches_won + if is_winner { 1 } else { 0 };
    let win_rate = Decimal::from_int(won) / Decimal::from_int(played) * Decimal::hundred();
    let winnings = if is_winner {
        current.winnings + prize
    } else {
        current.winnings
    };

    sqlx::query(
        r#"
        UPDATE users
        SET total_matches_played = ?, total_matches_won = ?, win_rate = ?, winnings = ?
        WHERE id = ?
        "#,
    )
    .bind(played)
    .bind(won)
    .bind(win_rate.to_canonical_string())
    .bind(winnings.to_canonical_string())
    .bind(user.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Record today's login, guarded so a same-day repeat (or a concurrent
/// duplicate claim) affects zero rows.
pub async fn set_login_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
    today: &str,
    streak: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET last_login_date = ?, login_streak = ?
        WHERE id = ? AND (last_login_date IS NULL OR last_login_date <> ?)
        "#,
    )
    .bind(today)
    .bind(streak)
    .bind(user.as_str())
    .bind(today)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Flip the one-shot referral flag. Returns false when it was already set,
/// which is the signal to skip the payout.
pub async fn flip_referral_paid_tx(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE users SET referral_bonus_paid = 1 WHERE id = ? AND referral_bonus_paid = 0")
            .bind(user.as_str())
            .execute(&mut *conn)
            .await?;
    Ok(result.rows_affected() > 0)
}
