//! Prize distribution for matches and tournaments.
//!
//! The one-shot flip on `prize_distributed` anchors the whole settlement:
//! stats, task progress, and both ledger credits ride the same transaction,
//! so a redelivered settlement either repeats entirely (and loses the flip)
//! or never happened.

use crate::db::repo::matches as match_repo;
use crate::db::repo::users::{apply_match_stats_tx, remove_active_match_tx};
use crate::db::repo::commission_pct_tx;
use crate::db::Repository;
use crate::domain::{Decimal, LedgerRecord, LedgerType, MatchStatus, UserId};
use crate::engine::rewards::apply_match_completion_tx;
use crate::engine::wallet;
use crate::error::AppError;
use crate::notify::Notifier;
use std::sync::Arc;
use tracing::{info, warn};

fn winnings_key(match_id: &str) -> String {
    format!("win:{}", match_id)
}

fn match_commission_key(match_id: &str) -> String {
    format!("mcom:{}", match_id)
}

fn tournament_winnings_key(tournament_id: &str, user: &UserId) -> String {
    format!("twin:{}:{}", tournament_id, user)
}

fn tournament_commission_key(tournament_id: &str) -> String {
    format!("tcom:{}", tournament_id)
}

/// Admin settlement of a disputed or stuck match.
pub async fn declare_winner(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    match_id: &str,
    winner_id: &UserId,
) -> Result<(), AppError> {
    let m = repo
        .get_match(match_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))?;

    if !m.has_player(winner_id) {
        return Err(AppError::InvalidArgument(format!(
            "{} is not a player in match {}",
            winner_id, match_id
        )));
    }
    if m.status.is_terminal() {
        return Err(AppError::FailedPrecondition(format!(
            "Match in status {} cannot be settled",
            m.status.as_str()
        )));
    }

    settle(repo, notifier, match_id, winner_id).await
}

/// Distribute the prize pool. Idempotent: a match that already flipped
/// `prize_distributed` is reported settled without moving money again.
pub async fn settle(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    match_id: &str,
    winner_id: &UserId,
) -> Result<(), AppError> {
    let mut tx = repo.begin().await?;

    let m = match_repo::get_match_tx(&mut tx, match_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))?;

    if !m.has_player(winner_id) {
        return Err(AppError::InvalidArgument(format!(
            "{} is not a player in match {}",
            winner_id, match_id
        )));
    }
    if m.status == MatchStatus::Cancelled {
        return Err(AppError::FailedPrecondition(
            "Cancelled matches cannot be settled".to_string(),
        ));
    }

    if !match_repo::settle_flip_tx(&mut tx, match_id, winner_id).await? {
        tx.rollback().await?;
        info!(match_id, "Settlement skipped: prize already distributed");
        return Ok(());
    }

    let commission_pct = commission_pct_tx(&mut tx).await?;
    let gross = m.entry_fee * Decimal::from_int(m.players.len() as i64);
    let commission = gross.percent(commission_pct);
    if m.prize_pool + commission != gross {
        // Commission rate changed between pairing and settlement. The
        // stored prize pool is honored; the gap lands in the ledger.
        warn!(
            match_id,
            prize_pool = %m.prize_pool,
            commission = %commission,
            gross = %gross,
            "Commission rate drift detected at settlement"
        );
    }

    let winnings = LedgerRecord::completed(
        winnings_key(match_id),
        winner_id.clone(),
        LedgerType::Winnings,
        m.prize_pool,
        "Match winnings",
    )
    .with_match(match_id.to_string());
    wallet::post_record_tx(&mut tx, &winnings).await?;

    let platform_cut = LedgerRecord::completed(
        match_commission_key(match_id),
        UserId::platform(),
        LedgerType::MatchCommission,
        commission,
        "Match commission",
    )
    .with_match(match_id.to_string());
    wallet::post_record_tx(&mut tx, &platform_cut).await?;

    let mut reached_tasks: Vec<(UserId, String)> = Vec::new();
    for player in &m.players {
        let is_winner = &player.user_id == winner_id;
        apply_match_stats_tx(&mut tx, &player.user_id, is_winner, m.prize_pool).await?;
        for task_id in apply_match_completion_tx(&mut tx, &player.user_id, is_winner).await? {
            reached_tasks.push((player.user_id.clone(), task_id));
        }
        remove_active_match_tx(&mut tx, &player.user_id, match_id).await?;
    }

    tx.commit().await?;

    info!(
        match_id,
        winner = %winner_id,
        prize = %m.prize_pool,
        commission = %commission,
        "Match settled"
    );

    for player in m.player_ids() {
        if player == winner_id {
            notifier
                .notify(player, "You won!", &format!("You won {}.", m.prize_pool))
                .await;
        } else {
            notifier
                .notify(player, "Match over", "Better luck next time.")
                .await;
        }
    }

    for (user, task_id) in &reached_tasks {
        notifier
            .notify(
                user,
                "Task complete",
                &format!("Task {} is done. Claim your reward.", task_id),
            )
            .await;
    }

    Ok(())
}

/// One winner's share of a tournament prize pool.
#[derive(Debug, Clone)]
pub struct TournamentPayout {
    pub user_id: UserId,
    pub amount: Decimal,
}

/// Distribute a tournament's prize pool across the given payouts.
///
/// The payout sum must not exceed the pool; the platform keeps the spread
/// between collected entry fees and the pool.
pub async fn distribute_tournament_winnings(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    tournament_id: &str,
    payouts: &[TournamentPayout],
) -> Result<(), AppError> {
    if payouts.is_empty() {
        return Err(AppError::InvalidArgument(
            "At least one payout is required".to_string(),
        ));
    }
    for payout in payouts {
        if !payout.amount.is_positive() {
            return Err(AppError::InvalidArgument(
                "Payout amounts must be positive".to_string(),
            ));
        }
    }

    let mut tx = repo.begin().await?;

    let t = match_repo::get_tournament_tx(&mut tx, tournament_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tournament {} not found", tournament_id)))?;

    if t.status != "completed" {
        return Err(AppError::FailedPrecondition(format!(
            "Tournament in status {} cannot distribute winnings",
            t.status
        )));
    }

    let total: Decimal = payouts
        .iter()
        .fold(Decimal::zero(), |acc, p| acc + p.amount);
    if total > t.prize_pool {
        return Err(AppError::InvalidArgument(format!(
            "Payout total {} exceeds prize pool {}",
            total, t.prize_pool
        )));
    }

    if !match_repo::tournament_flip_tx(&mut tx, tournament_id).await? {
        return Err(AppError::FailedPrecondition(
            "Tournament winnings already distributed".to_string(),
        ));
    }

    for payout in payouts {
        let record = LedgerRecord::completed(
            tournament_winnings_key(tournament_id, &payout.user_id),
            payout.user_id.clone(),
            LedgerType::Winnings,
            payout.amount,
            "Tournament winnings",
        )
        .with_tournament(tournament_id.to_string());
        wallet::post_record_tx(&mut tx, &record).await?;
    }

    let collected = t.entry_fee * Decimal::from_int(t.filled_slots);
    let commission = collected - t.prize_pool;
    if commission.is_positive() {
        let record = LedgerRecord::completed(
            tournament_commission_key(tournament_id),
            UserId::platform(),
            LedgerType::TournamentCommission,
            commission,
            "Tournament commission",
        )
        .with_tournament(tournament_id.to_string());
        wallet::post_record_tx(&mut tx, &record).await?;
    }

    tx.commit().await?;

    info!(
        tournament_id,
        payouts = payouts.len(),
        total = %total,
        commission = %commission,
        "Tournament winnings distributed"
    );

    for payout in payouts {
        notifier
            .notify(
                &payout.user_id,
                "Tournament winnings",
                &format!("You won {} in the tournament.", payout.amount),
            )
            .await;
    }

    Ok(())
}
