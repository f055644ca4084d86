//! Two-sided matchmaking queue and the atomic pairing transaction.
//!
//! Pairing consumes one entry from each pool, creates the match, and debits
//! both entry fees in a single transaction. The guarded deletes are the
//! race arbiter: of two concurrent pairings over the same entries, exactly
//! one sees its deletes succeed; the other rolls back and reports no match.

use crate::db::repo::queue::{consume_entry_tx, find_opponent_tx};
use crate::db::repo::users::{active_match_count_tx, insert_active_match_tx};
use crate::db::repo::{commission_pct_tx, matches as match_repo};
use crate::db::Repository;
use crate::domain::{
    Decimal, LedgerRecord, LedgerType, Match, MatchStatus, PlayerInfo, QueueEntry, QueuePool,
    TimeMs, UserId,
};
use crate::engine::wallet;
use crate::error::AppError;
use crate::notify::Notifier;
use std::sync::Arc;
use tracing::{info, warn};

/// Maximum concurrent active matches per user, re-validated where money
/// moves.
pub const MAX_ACTIVE_MATCHES: i64 = 5;

fn entry_fee_key(match_id: &str, user: &UserId) -> String {
    format!("fee:{}:{}", match_id, user)
}

fn player_from_entry(entry: &QueueEntry) -> PlayerInfo {
    PlayerInfo {
        user_id: entry.user_id.clone(),
        name: entry.user_name.clone(),
        avatar_url: entry.user_avatar.clone(),
        win_rate: entry.win_rate,
    }
}

/// Queue a player and immediately attempt pairing.
///
/// Returns the created match if an opponent was waiting, `None` if the
/// entry is now waiting in its pool.
pub async fn enqueue(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    entry: QueueEntry,
) -> Result<Option<Match>, AppError> {
    if !entry.entry_fee.is_positive() {
        return Err(AppError::InvalidArgument(
            "Entry fee must be positive".to_string(),
        ));
    }

    let user = repo
        .get_user(&entry.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", entry.user_id)))?;

    if user.wallet_balance < entry.entry_fee {
        return Err(AppError::FailedPrecondition(
            "Insufficient balance for entry fee".to_string(),
        ));
    }

    let active = repo.active_match_ids(&entry.user_id).await?;
    if active.len() as i64 >= MAX_ACTIVE_MATCHES {
        return Err(AppError::FailedPrecondition(format!(
            "At most {} concurrent matches allowed",
            MAX_ACTIVE_MATCHES
        )));
    }

    if !repo.insert_queue_entry(&entry).await? {
        return Err(AppError::FailedPrecondition(
            "Already waiting in the queue".to_string(),
        ));
    }

    try_pair(repo, notifier, &entry).await
}

/// Remove the caller's own queue entry.
pub async fn cancel(repo: &Repository, user: &UserId) -> Result<(), AppError> {
    if repo.delete_queue_entry(user).await? {
        Ok(())
    } else {
        Err(AppError::NotFound("No queue entry to cancel".to_string()))
    }
}

/// One pairing attempt for `entry`. Safe to call repeatedly; a lost race or
/// missing opponent is simply "no match found".
pub async fn try_pair(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    entry: &QueueEntry,
) -> Result<Option<Match>, AppError> {
    let mut tx = repo.begin().await?;

    let Some(opponent) = find_opponent_tx(
        &mut tx,
        entry.pool.opposite(),
        entry.entry_fee,
        &entry.user_id,
    )
    .await?
    else {
        return Ok(None);
    };

    // Consume both entries; failure on either side means a concurrent
    // pairing got there first.
    if !consume_entry_tx(&mut tx, &entry.user_id, entry.pool).await?
        || !consume_entry_tx(&mut tx, &opponent.user_id, opponent.pool).await?
    {
        tx.rollback().await?;
        return Ok(None);
    }

    // The soft cap was checked at queue-entry time; re-validate now that
    // money is about to move.
    for player in [&entry.user_id, &opponent.user_id] {
        if active_match_count_tx(&mut tx, player).await? >= MAX_ACTIVE_MATCHES {
            tx.rollback().await?;
            warn!(user = %player, "Dropping queue entry: active match cap reached");
            repo.delete_queue_entry(player).await?;
            return Ok(None);
        }
    }

    let commission_pct = commission_pct_tx(&mut tx).await?;
    let gross = entry.entry_fee * Decimal::from_int(2);
    let prize_pool = gross - gross.percent(commission_pct);

    let (creator, seeker) = match entry.pool {
        QueuePool::Creators => (entry, &opponent),
        QueuePool::Seekers => (&opponent, entry),
    };

    let new_match = Match {
        id: uuid::Uuid::new_v4().to_string(),
        status: MatchStatus::InProgress,
        entry_fee: entry.entry_fee,
        prize_pool,
        max_players: 2,
        players: vec![player_from_entry(creator), player_from_entry(seeker)],
        room_code: creator.room_code.clone().or_else(|| seeker.room_code.clone()),
        winner_id: None,
        review_reason: None,
        prize_distributed: false,
        created_at: TimeMs::now(),
    };

    match_repo::insert_match_tx(&mut tx, &new_match).await?;

    for player in [&entry.user_id, &opponent.user_id] {
        let debit = LedgerRecord::completed(
            entry_fee_key(&new_match.id, player),
            player.clone(),
            LedgerType::EntryFee,
            -entry.entry_fee,
            "Match entry fee",
        )
        .with_match(new_match.id.clone());

        let outcome = wallet::post_record_tx(&mut tx, &debit).await?;
        if !outcome.is_posted() {
            tx.rollback().await?;
            warn!(user = %player, outcome = ?outcome, "Pairing aborted: entry fee debit rejected");
            // Drop the entry whose owner cannot fund the fee so the other
            // side can pair with someone else.
            repo.delete_queue_entry(player).await?;
            return Ok(None);
        }

        insert_active_match_tx(&mut tx, player, &new_match.id).await?;
    }

    tx.commit().await?;

    info!(
        match_id = %new_match.id,
        creator = %creator.user_id,
        seeker = %seeker.user_id,
        entry_fee = %entry.entry_fee,
        prize_pool = %prize_pool,
        "Paired match created"
    );

    for player in new_match.player_ids() {
        notifier
            .notify(
                player,
                "Match found",
                &format!("Your match is ready. Prize pool: {}", prize_pool),
            )
            .await;
    }

    Ok(Some(new_match))
}

/// Periodic re-attempt for waiting entries.
///
/// Create-time pairing can lose its trigger (the racing pairing consumed
/// the other side first); the re-scan guarantees no entry waits forever
/// while a compatible opponent sits in the opposite pool.
pub async fn rescan(repo: &Repository, notifier: &Arc<dyn Notifier>) -> Result<usize, AppError> {
    let entries = repo.list_queue_entries().await?;
    let mut consumed: Vec<UserId> = Vec::new();
    let mut paired = 0usize;

    for entry in &entries {
        if consumed.contains(&entry.user_id) {
            continue;
        }
        if let Some(m) = try_pair(repo, notifier, entry).await? {
            consumed.extend(m.player_ids().into_iter().cloned());
            paired += 1;
        }
    }

    Ok(paired)
}

/// Background loop driving [`rescan`].
pub async fn run_rescan_loop(
    repo: Arc<Repository>,
    notifier: Arc<dyn Notifier>,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
    loop {
        interval.tick().await;
        match rescan(&repo, &notifier).await {
            Ok(0) => {}
            Ok(n) => info!(paired = n, "Queue re-scan paired waiting entries"),
            Err(e) => warn!(error = %e, "Queue re-scan failed"),
        }
    }
}
