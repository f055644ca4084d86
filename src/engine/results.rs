//! Result intake and analysis.
//!
//! Players self-report win/loss claims with screenshot evidence. Once every
//! player has reported, the claims are classified: a clean single victory
//! settles the match, anything else parks it in `disputed` for an admin.

use crate::db::repo::matches as match_repo;
use crate::db::Repository;
use crate::domain::{Match, MatchResult, MatchStatus, ResultClaim, TimeMs, UserId};
use crate::engine::settlement;
use crate::error::AppError;
use crate::notify::Notifier;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const REASON_MULTIPLE_WINNERS: &str = "Multiple players claimed victory.";
pub const REASON_DUPLICATE_SCREENSHOTS: &str = "Duplicate screenshots submitted.";
pub const REASON_UNCLEAR: &str = "Conflicting or unclear results submitted.";
pub const REASON_SYSTEM_ERROR: &str = "System error during result processing.";

/// Outcome of a result submission as seen by the submitting player.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Not every player has reported yet.
    Pending,
    /// Claims agreed; the match settled with this winner.
    Settled { winner_id: UserId },
    /// Claims disagreed; the match needs an admin decision.
    Disputed { reason: &'static str },
}

/// Verdict over a complete result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Winner(UserId),
    Dispute(&'static str),
}

/// Pure classification of a complete result set.
///
/// Order matters: competing victory claims outrank evidence problems, and
/// evidence problems outrank a merely unclear outcome.
pub fn classify(results: &[MatchResult]) -> Verdict {
    let winners: Vec<&UserId> = results
        .iter()
        .filter(|r| r.claim == ResultClaim::Win)
        .map(|r| &r.user_id)
        .collect();

    if winners.len() > 1 {
        return Verdict::Dispute(REASON_MULTIPLE_WINNERS);
    }

    let mut seen = HashSet::new();
    for url in results.iter().filter_map(|r| r.screenshot_url.as_deref()) {
        if !seen.insert(url) {
            return Verdict::Dispute(REASON_DUPLICATE_SCREENSHOTS);
        }
    }

    // A victory only settles when every result carries evidence.
    if results.iter().any(|r| r.screenshot_url.is_none()) {
        return Verdict::Dispute(REASON_UNCLEAR);
    }

    match winners.first() {
        Some(winner) => Verdict::Winner((*winner).clone()),
        None => Verdict::Dispute(REASON_UNCLEAR),
    }
}

/// Record one player's claim; if it completes the result set, analyze and
/// either settle or dispute the match.
pub async fn submit_result(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    match_id: &str,
    user: &UserId,
    claim: ResultClaim,
    screenshot_url: Option<String>,
) -> Result<SubmitOutcome, AppError> {
    let (m, results) = record_claim(repo, match_id, user, claim, screenshot_url).await?;

    if (results.len() as i64) < m.max_players {
        for player in m.player_ids() {
            if player != user {
                notifier
                    .notify(
                        player,
                        "Opponent submitted a result",
                        "Submit your own result to finish the match.",
                    )
                    .await;
            }
        }
        return Ok(SubmitOutcome::Pending);
    }

    // Submission is committed; the failure boundary starts here. Any error
    // while analyzing or settling parks the match for an admin instead of
    // losing it in limbo.
    match analyze(repo, notifier, &m, &results).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            warn!(match_id, error = %e, "Result analysis failed; marking match disputed");
            repo.mark_disputed_best_effort(match_id, REASON_SYSTEM_ERROR)
                .await?;
            Ok(SubmitOutcome::Disputed {
                reason: REASON_SYSTEM_ERROR,
            })
        }
    }
}

async fn record_claim(
    repo: &Repository,
    match_id: &str,
    user: &UserId,
    claim: ResultClaim,
    screenshot_url: Option<String>,
) -> Result<(Match, Vec<MatchResult>), AppError> {
    let mut tx = repo.begin().await?;

    let m = match_repo::get_match_tx(&mut tx, match_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))?;

    if !m.has_player(user) {
        return Err(AppError::PermissionDenied(
            "Only players may submit results".to_string(),
        ));
    }
    if !m.status.accepts_results() {
        return Err(AppError::FailedPrecondition(format!(
            "Match in status {} does not accept results",
            m.status.as_str()
        )));
    }

    let result = MatchResult {
        match_id: match_id.to_string(),
        user_id: user.clone(),
        claim,
        screenshot_url,
        submitted_at: TimeMs::now(),
    };
    if !match_repo::insert_result_tx(&mut tx, &result).await? {
        return Err(AppError::FailedPrecondition(
            "Result already submitted for this match".to_string(),
        ));
    }

    let results = match_repo::get_results_tx(&mut tx, match_id).await?;

    if (results.len() as i64) < m.max_players {
        match_repo::update_status_guarded_tx(
            &mut tx,
            match_id,
            MatchStatus::ResultSubmitted,
            &[MatchStatus::InProgress, MatchStatus::Playing],
        )
        .await?;
    }

    tx.commit().await?;
    info!(match_id, user = %user, claim = claim.as_str(), "Result recorded");
    Ok((m, results))
}

async fn analyze(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    m: &Match,
    results: &[MatchResult],
) -> Result<SubmitOutcome, AppError> {
    match classify(results) {
        Verdict::Winner(winner_id) => {
            settlement::settle(repo, notifier, &m.id, &winner_id).await?;
            Ok(SubmitOutcome::Settled { winner_id })
        }
        Verdict::Dispute(reason) => {
            if repo.mark_disputed_best_effort(&m.id, reason).await? {
                info!(match_id = %m.id, reason, "Match marked disputed");
                for player in m.player_ids() {
                    notifier
                        .notify(player, "Match under review", reason)
                        .await;
                }
            }
            Ok(SubmitOutcome::Disputed { reason })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(user: &str, claim: ResultClaim, shot: Option<&str>) -> MatchResult {
        MatchResult {
            match_id: "m1".to_string(),
            user_id: UserId::new(user),
            claim,
            screenshot_url: shot.map(str::to_string),
            submitted_at: TimeMs::now(),
        }
    }

    #[test]
    fn test_clean_victory() {
        let verdict = classify(&[
            result("a", ResultClaim::Win, Some("https://cdn/a.png")),
            result("b", ResultClaim::Loss, Some("https://cdn/b.png")),
        ]);
        assert_eq!(verdict, Verdict::Winner(UserId::new("a")));
    }

    #[test]
    fn test_both_claim_victory() {
        let verdict = classify(&[
            result("a", ResultClaim::Win, Some("https://cdn/a.png")),
            result("b", ResultClaim::Win, Some("https://cdn/b.png")),
        ]);
        assert_eq!(verdict, Verdict::Dispute(REASON_MULTIPLE_WINNERS));
    }

    #[test]
    fn test_duplicate_screenshots() {
        let verdict = classify(&[
            result("a", ResultClaim::Win, Some("https://cdn/same.png")),
            result("b", ResultClaim::Loss, Some("https://cdn/same.png")),
        ]);
        assert_eq!(verdict, Verdict::Dispute(REASON_DUPLICATE_SCREENSHOTS));
    }

    #[test]
    fn test_nobody_claims_victory() {
        let verdict = classify(&[
            result("a", ResultClaim::Loss, Some("https://cdn/a.png")),
            result("b", ResultClaim::Loss, Some("https://cdn/b.png")),
        ]);
        assert_eq!(verdict, Verdict::Dispute(REASON_UNCLEAR));
    }

    #[test]
    fn test_multiple_winners_outranks_duplicates() {
        let verdict = classify(&[
            result("a", ResultClaim::Win, Some("https://cdn/same.png")),
            result("b", ResultClaim::Win, Some("https://cdn/same.png")),
        ]);
        assert_eq!(verdict, Verdict::Dispute(REASON_MULTIPLE_WINNERS));
    }

    #[test]
    fn test_missing_screenshot_blocks_settlement() {
        let verdict = classify(&[
            result("a", ResultClaim::Win, None),
            result("b", ResultClaim::Loss, Some("https://cdn/b.png")),
        ]);
        assert_eq!(verdict, Verdict::Dispute(REASON_UNCLEAR));
    }

    #[test]
    fn test_no_screenshots_at_all_is_unclear_not_duplicate() {
        let verdict = classify(&[
            result("a", ResultClaim::Win, None),
            result("b", ResultClaim::Loss, None),
        ]);
        assert_eq!(verdict, Verdict::Dispute(REASON_UNCLEAR));
    }
}
