mod common;

use common::{balance, create_user, fund, setup_test_app, RecordingNotifier, TestApp};
use stakearena::domain::{
    Decimal, Match, MatchStatus, QueueEntry, QueuePool, ResultClaim, TimeMs, UserId,
};
use stakearena::engine::{pairing, results};
use stakearena::engine::results::SubmitOutcome;
use stakearena::notify::Notifier;
use std::sync::Arc;

async fn paired_match(t: &TestApp, creator: &UserId, seeker: &UserId) -> Match {
    pairing::enqueue(
        &t.repo,
        &t.notifier,
        QueueEntry {
            user_id: creator.clone(),
            pool: QueuePool::Creators,
            entry_fee: Decimal::from_int(10),
            room_code: Some("ROOM".to_string()),
            user_name: creator.as_str().to_string(),
            user_avatar: None,
            win_rate: Decimal::zero(),
            created_at: TimeMs::now(),
        },
    )
    .await
    .unwrap();
    pairing::enqueue(
        &t.repo,
        &t.notifier,
        QueueEntry {
            user_id: seeker.clone(),
            pool: QueuePool::Seekers,
            entry_fee: Decimal::from_int(10),
            room_code: None,
            user_name: seeker.as_str().to_string(),
            user_avatar: None,
            win_rate: Decimal::zero(),
            created_at: TimeMs::now(),
        },
    )
    .await
    .unwrap()
    .expect("pairing failed")
}

async fn setup_match() -> (TestApp, UserId, UserId, Match) {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    let bob = create_user(&t.repo, "bob", "Bob").await;
    fund(&t.repo, &alice, 100).await;
    fund(&t.repo, &bob, 100).await;
    let m = paired_match(&t, &alice, &bob).await;
    (t, alice, bob, m)
}

#[tokio::test]
async fn test_agreeing_results_settle_the_match() {
    let (t, alice, bob, m) = setup_match().await;

    let first = results::submit_result(
        &t.repo,
        &t.notifier,
        &m.id,
        &alice,
        ResultClaim::Win,
        Some("https://cdn/a.png".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(first, SubmitOutcome::Pending);

    // One result in: the match shows result_submitted.
    let mid = t.repo.get_match(&m.id).await.unwrap().unwrap();
    assert_eq!(mid.status, MatchStatus::ResultSubmitted);

    let second = results::submit_result(
        &t.repo,
        &t.notifier,
        &m.id,
        &bob,
        ResultClaim::Loss,
        Some("https://cdn/b.png".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(
        second,
        SubmitOutcome::Settled {
            winner_id: alice.clone()
        }
    );

    let settled = t.repo.get_match(&m.id).await.unwrap().unwrap();
    assert_eq!(settled.status, MatchStatus::Completed);
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(108));
}

#[tokio::test]
async fn test_competing_victory_claims_dispute_the_match() {
    let (t, alice, bob, m) = setup_match().await;

    results::submit_result(
        &t.repo,
        &t.notifier,
        &m.id,
        &alice,
        ResultClaim::Win,
        Some("https://cdn/a.png".to_string()),
    )
    .await
    .unwrap();
    let outcome = results::submit_result(
        &t.repo,
        &t.notifier,
        &m.id,
        &bob,
        ResultClaim::Win,
        Some("https://cdn/b.png".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        SubmitOutcome::Disputed {
            reason: results::REASON_MULTIPLE_WINNERS
        }
    );

    let disputed = t.repo.get_match(&m.id).await.unwrap().unwrap();
    assert_eq!(disputed.status, MatchStatus::Disputed);
    assert_eq!(
        disputed.review_reason.as_deref(),
        Some(results::REASON_MULTIPLE_WINNERS)
    );

    // No money moved.
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(90));
    assert_eq!(balance(&t.repo, &bob).await, Decimal::from_int(90));
}

#[tokio::test]
async fn test_duplicate_screenshots_dispute_the_match() {
    let (t, alice, bob, m) = setup_match().await;

    results::submit_result(
        &t.repo,
        &t.notifier,
        &m.id,
        &alice,
        ResultClaim::Win,
        Some("https://cdn/same.png".to_string()),
    )
    .await
    .unwrap();
    let outcome = results::submit_result(
        &t.repo,
        &t.notifier,
        &m.id,
        &bob,
        ResultClaim::Loss,
        Some("https://cdn/same.png".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        SubmitOutcome::Disputed {
            reason: results::REASON_DUPLICATE_SCREENSHOTS
        }
    );
}

#[tokio::test]
async fn test_agreeing_claims_without_evidence_dispute_the_match() {
    let (t, alice, bob, m) = setup_match().await;

    results::submit_result(&t.repo, &t.notifier, &m.id, &alice, ResultClaim::Win, None)
        .await
        .unwrap();
    let outcome = results::submit_result(
        &t.repo,
        &t.notifier,
        &m.id,
        &bob,
        ResultClaim::Loss,
        Some("https://cdn/b.png".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        SubmitOutcome::Disputed {
            reason: results::REASON_UNCLEAR
        }
    );

    // No money moved; the match waits for an admin.
    let disputed = t.repo.get_match(&m.id).await.unwrap().unwrap();
    assert_eq!(disputed.status, MatchStatus::Disputed);
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(90));
    assert_eq!(balance(&t.repo, &bob).await, Decimal::from_int(90));
}

#[tokio::test]
async fn test_double_submission_rejected() {
    let (t, alice, _bob, m) = setup_match().await;

    results::submit_result(&t.repo, &t.notifier, &m.id, &alice, ResultClaim::Win, None)
        .await
        .unwrap();
    let err = results::submit_result(&t.repo, &t.notifier, &m.id, &alice, ResultClaim::Loss, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already submitted"));
}

#[tokio::test]
async fn test_pending_submission_notifies_opponent() {
    let (t, alice, _bob, m) = setup_match().await;
    let recorder = Arc::new(RecordingNotifier::default());
    let notifier: Arc<dyn Notifier> = recorder.clone();

    let outcome = results::submit_result(
        &t.repo,
        &notifier,
        &m.id,
        &alice,
        ResultClaim::Win,
        Some("https://cdn/a.png".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(outcome, SubmitOutcome::Pending);

    assert_eq!(
        recorder.titles_for("bob"),
        vec!["Opponent submitted a result".to_string()]
    );
    assert!(recorder.titles_for("alice").is_empty());
}

#[tokio::test]
async fn test_non_player_cannot_submit() {
    let (t, _alice, _bob, m) = setup_match().await;
    let eve = create_user(&t.repo, "eve", "Eve").await;

    let err = results::submit_result(&t.repo, &t.notifier, &m.id, &eve, ResultClaim::Win, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Only players"));
}

#[tokio::test]
async fn test_disputed_match_settles_via_admin_decision() {
    let (t, alice, bob, m) = setup_match().await;

    results::submit_result(&t.repo, &t.notifier, &m.id, &alice, ResultClaim::Win, None)
        .await
        .unwrap();
    results::submit_result(&t.repo, &t.notifier, &m.id, &bob, ResultClaim::Win, None)
        .await
        .unwrap();

    stakearena::engine::settlement::declare_winner(&t.repo, &t.notifier, &m.id, &bob)
        .await
        .unwrap();

    let settled = t.repo.get_match(&m.id).await.unwrap().unwrap();
    assert_eq!(settled.status, MatchStatus::Completed);
    assert_eq!(settled.winner_id, Some(bob.clone()));
    assert_eq!(balance(&t.repo, &bob).await, Decimal::from_int(108));
}
