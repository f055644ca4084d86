//! Open-match lifecycle: direct creation, joining, room codes, and admin
//! cancellation with refunds.

use crate::db::repo::users::{active_match_count_tx, insert_active_match_tx, remove_active_match_tx};
use crate::db::repo::{commission_pct_tx, matches as match_repo};
use crate::db::Repository;
use crate::domain::{
    Decimal, LedgerRecord, LedgerType, Match, MatchStatus, PlayerInfo, TimeMs, UserId,
};
use crate::engine::pairing::MAX_ACTIVE_MATCHES;
use crate::engine::wallet;
use crate::error::AppError;
use crate::notify::Notifier;
use std::sync::Arc;
use tracing::{info, warn};

fn entry_fee_key(match_id: &str, user: &UserId) -> String {
    format!("fee:{}:{}", match_id, user)
}

fn refund_key(match_id: &str, user: &UserId) -> String {
    format!("refund:{}:{}", match_id, user)
}

/// Create a match in `waiting`, visible to joiners. No money moves until
/// someone joins.
pub async fn create_open_match(
    repo: &Repository,
    creator: PlayerInfo,
    entry_fee: Decimal,
    room_code: Option<String>,
) -> Result<Match, AppError> {
    if !entry_fee.is_positive() {
        return Err(AppError::InvalidArgument(
            "Entry fee must be positive".to_string(),
        ));
    }

    let user = repo
        .get_user(&creator.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", creator.user_id)))?;

    if user.wallet_balance < entry_fee {
        return Err(AppError::FailedPrecondition(
            "Insufficient balance for entry fee".to_string(),
        ));
    }

    let mut tx = repo.begin().await?;

    if active_match_count_tx(&mut tx, &creator.user_id).await? >= MAX_ACTIVE_MATCHES {
        return Err(AppError::FailedPrecondition(format!(
            "At most {} concurrent matches allowed",
            MAX_ACTIVE_MATCHES
        )));
    }

    let commission_pct = commission_pct_tx(&mut tx).await?;
    let gross = entry_fee * Decimal::from_int(2);
    let prize_pool = gross - gross.percent(commission_pct);

    let new_match = Match {
        id: uuid::Uuid::new_v4().to_string(),
        status: MatchStatus::Waiting,
        entry_fee,
        prize_pool,
        max_players: 2,
        players: vec![creator],
        room_code,
        winner_id: None,
        review_reason: None,
        prize_distributed: false,
        created_at: TimeMs::now(),
    };

    match_repo::insert_match_tx(&mut tx, &new_match).await?;
    tx.commit().await?;

    info!(match_id = %new_match.id, entry_fee = %entry_fee, "Open match created");
    Ok(new_match)
}

/// Join a `waiting` match. The guarded status flip picks exactly one winner
/// among concurrent joiners; both entry fees are debited here.
pub async fn join_open_match(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    match_id: &str,
    joiner: PlayerInfo,
) -> Result<Match, AppError> {
    let mut tx = repo.begin().await?;

    let m = match_repo::get_match_tx(&mut tx, match_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))?;

    if m.has_player(&joiner.user_id) {
        return Err(AppError::FailedPrecondition(
            "Already a player in this match".to_string(),
        ));
    }
    if m.status != MatchStatus::Waiting {
        return Err(AppError::FailedPrecondition(
            "Match is not open for joining".to_string(),
        ));
    }
    if active_match_count_tx(&mut tx, &joiner.user_id).await? >= MAX_ACTIVE_MATCHES {
        return Err(AppError::FailedPrecondition(format!(
            "At most {} concurrent matches allowed",
            MAX_ACTIVE_MATCHES
        )));
    }

    let flipped = match_repo::update_status_guarded_tx(
        &mut tx,
        match_id,
        MatchStatus::InProgress,
        &[MatchStatus::Waiting],
    )
    .await?;
    if !flipped {
        return Err(AppError::FailedPrecondition(
            "Match is not open for joining".to_string(),
        ));
    }

    match_repo::insert_player_tx(&mut tx, match_id, &joiner).await?;

    let mut players = m.players.clone();
    players.push(joiner.clone());

    for player in &players {
        let debit = LedgerRecord::completed(
            entry_fee_key(match_id, &player.user_id),
            player.user_id.clone(),
            LedgerType::EntryFee,
            -m.entry_fee,
            "Match entry fee",
        )
        .with_match(match_id.to_string());

        let outcome = wallet::post_record_tx(&mut tx, &debit).await?;
        if !outcome.is_posted() {
            tx.rollback().await?;
            warn!(
                match_id,
                user = %player.user_id,
                outcome = ?outcome,
                "Join aborted: entry fee debit rejected"
            );
            if player.user_id == joiner.user_id {
                return Err(AppError::FailedPrecondition(
                    "Insufficient balance for entry fee".to_string(),
                ));
            }
            // The creator can no longer fund their own fee; close the
            // match so it stops attracting joiners.
            repo.cancel_waiting_match(match_id).await?;
            return Err(AppError::FailedPrecondition(
                "Match creator can no longer fund the entry fee".to_string(),
            ));
        }

        insert_active_match_tx(&mut tx, &player.user_id, match_id).await?;
    }

    tx.commit().await?;

    let joined = Match {
        status: MatchStatus::InProgress,
        players,
        ..m
    };

    info!(match_id, joiner = %joiner.user_id, "Open match joined");
    for player in joined.player_ids() {
        notifier
            .notify(player, "Match started", "Your opponent has joined.")
            .await;
    }

    Ok(joined)
}

/// A player posts the room code, moving the match to `playing`.
pub async fn enter_room_code(
    repo: &Repository,
    match_id: &str,
    user: &UserId,
    room_code: &str,
) -> Result<(), AppError> {
    if room_code.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "Room code must not be empty".to_string(),
        ));
    }

    let mut tx = repo.begin().await?;

    let m = match_repo::get_match_tx(&mut tx, match_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))?;
    if !m.has_player(user) {
        return Err(AppError::PermissionDenied(
            "Only players may set the room code".to_string(),
        ));
    }

    if !match_repo::set_room_code_tx(&mut tx, match_id, room_code.trim()).await? {
        return Err(AppError::FailedPrecondition(
            "Room code can only be set while the match is in progress".to_string(),
        ));
    }

    tx.commit().await?;
    info!(match_id, user = %user, "Room code set");
    Ok(())
}

/// Admin cancellation: refund every debited player and release their
/// active-match slots. Settled and already-cancelled matches are refused.
pub async fn admin_cancel_match(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    match_id: &str,
    reason: &str,
) -> Result<(), AppError> {
    let mut tx = repo.begin().await?;

    let m = match_repo::get_match_tx(&mut tx, match_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))?;

    if !m.status.is_cancellable() {
        return Err(AppError::FailedPrecondition(format!(
            "Match in status {} cannot be cancelled",
            m.status.as_str()
        )));
    }

    let fees_collected = m.status != MatchStatus::Waiting;

    let flipped = match_repo::update_status_guarded_tx(
        &mut tx,
        match_id,
        MatchStatus::Cancelled,
        &[
            MatchStatus::Waiting,
            MatchStatus::InProgress,
            MatchStatus::Playing,
            MatchStatus::ResultSubmitted,
            MatchStatus::Disputed,
        ],
    )
    .await?;
    if !flipped {
        return Err(AppError::FailedPrecondition(
            "Match was settled or cancelled concurrently".to_string(),
        ));
    }

    for player in &m.players {
        if fees_collected {
            let refund = LedgerRecord::completed(
                refund_key(match_id, &player.user_id),
                player.user_id.clone(),
                LedgerType::Refund,
                m.entry_fee,
                format!("Entry fee refund: {}", reason),
            )
            .with_match(match_id.to_string());
            wallet::post_record_tx(&mut tx, &refund).await?;
        }
        remove_active_match_tx(&mut tx, &player.user_id, match_id).await?;
    }

    tx.commit().await?;

    info!(match_id, reason, "Match cancelled by admin");
    for player in m.player_ids() {
        notifier
            .notify(
                player,
                "Match cancelled",
                &format!("Your match was cancelled: {}. Entry fees were refunded.", reason),
            )
            .await;
    }

    Ok(())
}
