//! Match, player, result, and tournament storage.

use crate::db::repo::{parse_decimal, Repository};
use crate::domain::{
    Decimal, Match, MatchResult, MatchStatus, PlayerInfo, ResultClaim, TimeMs, UserId,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

#[derive(Debug, Clone, PartialEq)]
pub struct TournamentRow {
    pub id: String,
    pub status: String,
    pub entry_fee: Decimal,
    pub prize_pool: Decimal,
    pub filled_slots: i64,
    pub prize_distributed: bool,
}

fn row_to_match(row: &SqliteRow, players: Vec<PlayerInfo>) -> Match {
    let status_str: String = row.get("status");
    let fee: String = row.get("entry_fee");
    let pool: String = row.get("prize_pool");
    let winner: Option<String> = row.get("winner_id");
    let distributed: i64 = row.get("prize_distributed");

    Match {
        id: row.get("id"),
        status: MatchStatus::parse(&status_str).unwrap_or(MatchStatus::Cancelled),
        entry_fee: parse_decimal(&fee, "matches.entry_fee"),
        prize_pool: parse_decimal(&pool, "matches.prize_pool"),
        max_players: row.get("max_players"),
        players,
        room_code: row.get("room_code"),
        winner_id: winner.map(UserId::new),
        review_reason: row.get("review_reason"),
        prize_distributed: distributed != 0,
        created_at: TimeMs::new(row.get("created_at")),
    }
}

async fn load_players(
    conn: &mut SqliteConnection,
    match_id: &str,
) -> Result<Vec<PlayerInfo>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT user_id, name, avatar_url, win_rate FROM match_players \
         WHERE match_id = ? ORDER BY user_id ASC",
    )
    .bind(match_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|r| {
            let user_id: String = r.get("user_id");
            let win_rate: String = r.get("win_rate");
            PlayerInfo {
                user_id: UserId::new(user_id),
                name: r.get("name"),
                avatar_url: r.get("avatar_url"),
                win_rate: parse_decimal(&win_rate, "match_players.win_rate"),
            }
        })
        .collect())
}

pub async fn insert_match_tx(conn: &mut SqliteConnection, m: &Match) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO matches
        (id, status, entry_fee, prize_pool, max_players, room_code,
         winner_id, review_reason, prize_distributed, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&m.id)
    .bind(m.status.as_str())
    .bind(m.entry_fee.to_canonical_string())
    .bind(m.prize_pool.to_canonical_string())
    .bind(m.max_players)
    .bind(m.room_code.as_deref())
    .bind(m.winner_id.as_ref().map(|u| u.as_str()))
    .bind(m.review_reason.as_deref())
    .bind(m.prize_distributed as i64)
    .bind(m.created_at.as_ms())
    .execute(&mut *conn)
    .await?;

    for player in &m.players {
        insert_player_tx(conn, &m.id, player).await?;
    }
    Ok(())
}

pub async fn insert_player_tx(
    conn: &mut SqliteConnection,
    match_id: &str,
    player: &PlayerInfo,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO match_players (match_id, user_id, name, avatar_url, win_rate)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(match_id, user_id) DO NOTHING
        "#,
    )
    .bind(match_id)
    .bind(player.user_id.as_str())
    .bind(&player.name)
    .bind(player.avatar_url.as_deref())
    .bind(player.win_rate.to_canonical_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_match_tx(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Match>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM matches WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else { return Ok(None) };
    let players = load_players(conn, id).await?;
    Ok(Some(row_to_match(&row, players)))
}

/// Guarded status transition. Zero rows affected means the match was not in
/// any of `from` states anymore; callers treat that as a lost race.
pub async fn update_status_guarded_tx(
    conn: &mut SqliteConnection,
    id: &str,
    to: MatchStatus,
    from: &[MatchStatus],
) -> Result<bool, sqlx::Error> {
    let placeholders = vec!["?"; from.len()].join(", ");
    let sql = format!(
        "UPDATE matches SET status = ? WHERE id = ? AND status IN ({})",
        placeholders
    );
    let mut query = sqlx::query(&sql).bind(to.as_str()).bind(id);
    for s in from {
        query = query.bind(s.as_str());
    }
    let result = query.execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Enter a room code, transitioning in_progress -> playing.
pub async fn set_room_code_tx(
    conn: &mut SqliteConnection,
    id: &str,
    room_code: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE matches SET room_code = ?, status = 'playing' \
         WHERE id = ? AND status = 'in_progress'",
    )
    .bind(room_code)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Move a still-live match to disputed with a review reason.
pub async fn mark_disputed_tx(
    conn: &mut SqliteConnection,
    id: &str,
    reason: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE matches SET status = 'disputed', review_reason = ? \
         WHERE id = ? AND status IN ('in_progress', 'playing', 'result_submitted')",
    )
    .bind(reason)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// The settlement compare-and-commit: flips prize_distributed exactly once.
pub async fn settle_flip_tx(
    conn: &mut SqliteConnection,
    id: &str,
    winner: &UserId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE matches SET status = 'completed', winner_id = ?, prize_distributed = 1 \
         WHERE id = ? AND prize_distributed = 0",
    )
    .bind(winner.as_str())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_result_tx(
    conn: &mut SqliteConnection,
    result: &MatchResult,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        INSERT INTO match_results (match_id, user_id, claim, screenshot_url, submitted_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(match_id, user_id) DO NOTHING
        "#,
    )
    .bind(&result.match_id)
    .bind(result.user_id.as_str())
    .bind(result.claim.as_str())
    .bind(result.screenshot_url.as_deref())
    .bind(result.submitted_at.as_ms())
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn get_results_tx(
    conn: &mut SqliteConnection,
    match_id: &str,
) -> Result<Vec<MatchResult>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT match_id, user_id, claim, screenshot_url, submitted_at \
         FROM match_results WHERE match_id = ? ORDER BY submitted_at ASC, user_id ASC",
    )
    .bind(match_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|r| {
            let user_id: String = r.get("user_id");
            let claim: String = r.get("claim");
            MatchResult {
                match_id: r.get("match_id"),
                user_id: UserId::new(user_id),
                claim: ResultClaim::parse(&claim).unwrap_or(ResultClaim::Loss),
                screenshot_url: r.get("screenshot_url"),
                submitted_at: TimeMs::new(r.get("submitted_at")),
            }
        })
        .collect())
}

impl Repository {
    pub async fn get_match(&self, id: &str) -> Result<Option<Match>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        get_match_tx(&mut conn, id).await
    }

    /// Failure-boundary write: push a match to review after an analysis
    /// error; already-terminal matches are left alone.
    pub async fn mark_disputed_best_effort(&self, id: &str, reason: &str) -> Result<bool, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        mark_disputed_tx(&mut conn, id, reason).await
    }

    pub async fn cancel_waiting_match(&self, id: &str) -> Result<bool, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        update_status_guarded_tx(&mut conn, id, MatchStatus::Cancelled, &[MatchStatus::Waiting])
            .await
    }

    pub async fn create_tournament(
        &self,
        id: &str,
        status: &str,
        entry_fee: Decimal,
        prize_pool: Decimal,
        filled_slots: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO tournaments (id, status, entry_fee, prize_pool, filled_slots, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(entry_fee.to_canonical_string())
        .bind(prize_pool.to_canonical_string())
        .bind(filled_slots)
        .bind(TimeMs::now().as_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub async fn get_tournament_tx(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<TournamentRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, status, entry_fee, prize_pool, filled_slots, prize_distributed \
         FROM tournaments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|r| {
        let fee: String = r.get("entry_fee");
        let pool: String = r.get("prize_pool");
        let distributed: i64 = r.get("prize_distributed");
        TournamentRow {
            id: r.get("id"),
            status: r.get("status"),
            entry_fee: parse_decimal(&fee, "tournaments.entry_fee"),
            prize_pool: parse_decimal(&pool, "tournaments.prize_pool"),
            filled_slots: r.get("filled_slots"),
            prize_distributed: distributed != 0,
        }
    }))
}

pub async fn tournament_flip_tx(conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE tournaments SET prize_distributed = 1 WHERE id = ? AND prize_distributed = 0")
            .bind(id)
            .execute(&mut *conn)
            .await?;
    Ok(result.rows_affected() > 0)
}
