mod common;

use common::{balance, create_user, fund, setup_test_app, TestApp};
use stakearena::domain::{Decimal, Match, MatchStatus, QueueEntry, QueuePool, TimeMs, UserId};
use stakearena::engine::{pairing, settlement};

async fn paired_match(t: &TestApp, creator: &UserId, seeker: &UserId, fee: i64) -> Match {
    pairing::enqueue(
        &t.repo,
        &t.notifier,
        QueueEntry {
            user_id: creator.clone(),
            pool: QueuePool::Creators,
            entry_fee: Decimal::from_int(fee),
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
            entry_fee: Decimal::from_int(fee),
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

#[tokio::test]
async fn test_settlement_credits_winner_and_platform() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    let bob = create_user(&t.repo, "bob", "Bob").await;
    fund(&t.repo, &alice, 100).await;
    fund(&t.repo, &bob, 100).await;

    let m = paired_match(&t, &alice, &bob, 10).await;
    settlement::settle(&t.repo, &t.notifier, &m.id, &alice)
        .await
        .unwrap();

    let settled = t.repo.get_match(&m.id).await.unwrap().unwrap();
    assert_eq!(settled.status, MatchStatus::Completed);
    assert_eq!(settled.winner_id, Some(alice.clone()));
    assert!(settled.prize_distributed);

    // Winner holds 100 - 10 + 18; loser holds 90.
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(108));
    assert_eq!(balance(&t.repo, &bob).await, Decimal::from_int(90));

    // Platform commission recorded against the pseudo-user.
    let commission = t
        .repo
        .get_ledger_record(&format!("mcom:{}", m.id))
        .await
        .unwrap()
        .expect("commission record");
    assert_eq!(commission.record.amount.to_canonical_string(), "2");

    // Stats applied to both sides.
    let winner = t.repo.get_user(&alice).await.unwrap().unwrap();
    assert_eq!(winner.total_matches_played, 1);
    assert_eq!(winner.total_matches_won, 1);
    assert_eq!(winner.winnings, Decimal::from_int(18));
    let loser = t.repo.get_user(&bob).await.unwrap().unwrap();
    assert_eq!(loser.total_matches_played, 1);
    assert_eq!(loser.total_matches_won, 0);

    // Active-match links released.
    assert!(t.repo.active_match_ids(&alice).await.unwrap().is_empty());
    assert!(t.repo.active_match_ids(&bob).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_settlement_is_idempotent() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    let bob = create_user(&t.repo, "bob", "Bob").await;
    fund(&t.repo, &alice, 100).await;
    fund(&t.repo, &bob, 100).await;

    let m = paired_match(&t, &alice, &bob, 10).await;
    settlement::settle(&t.repo, &t.notifier, &m.id, &alice)
        .await
        .unwrap();
    settlement::settle(&t.repo, &t.notifier, &m.id, &alice)
        .await
        .unwrap();

    // Redelivery pays nothing extra.
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(108));
    let records = t.repo.list_ledger_for_user(&alice, 100).await.unwrap();
    let winnings = records
        .iter()
        .filter(|r| r.record.event_key == format!("win:{}", m.id))
        .count();
    assert_eq!(winnings, 1);

    // Stats applied once.
    let winner = t.repo.get_user(&alice).await.unwrap().unwrap();
    assert_eq!(winner.total_matches_played, 1);
}

#[tokio::test]
async fn test_settle_rejects_non_player_winner() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    let bob = create_user(&t.repo, "bob", "Bob").await;
    let eve = create_user(&t.repo, "eve", "Eve").await;
    fund(&t.repo, &alice, 100).await;
    fund(&t.repo, &bob, 100).await;

    let m = paired_match(&t, &alice, &bob, 10).await;
    let err = settlement::settle(&t.repo, &t.notifier, &m.id, &eve)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not a player"));
}

#[tokio::test]
async fn test_declare_winner_rejects_settled_match() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    let bob = create_user(&t.repo, "bob", "Bob").await;
    fund(&t.repo, &alice, 100).await;
    fund(&t.repo, &bob, 100).await;

    let m = paired_match(&t, &alice, &bob, 10).await;
    settlement::settle(&t.repo, &t.notifier, &m.id, &alice)
        .await
        .unwrap();

    let err = settlement::declare_winner(&t.repo, &t.notifier, &m.id, &bob)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cannot be settled"));
}

#[tokio::test]
async fn test_tournament_distribution_single_shot() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    let bob = create_user(&t.repo, "bob", "Bob").await;

    // 10 slots x 10 entry fee collected outside; 80 paid out, 20 kept.
    t.repo
        .create_tournament("t1", "completed", Decimal::from_int(10), Decimal::from_int(80), 10)
        .await
        .unwrap();

    let payouts = vec![
        settlement::TournamentPayout {
            user_id: alice.clone(),
            amount: Decimal::from_int(50),
        },
        settlement::TournamentPayout {
            user_id: bob.clone(),
            amount: Decimal::from_int(30),
        },
    ];
    settlement::distribute_tournament_winnings(&t.repo, &t.notifier, "t1", &payouts)
        .await
        .unwrap();

    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(50));
    assert_eq!(balance(&t.repo, &bob).await, Decimal::from_int(30));

    let commission = t
        .repo
        .get_ledger_record("tcom:t1")
        .await
        .unwrap()
        .expect("tournament commission record");
    assert_eq!(commission.record.amount.to_canonical_string(), "20");

    // Second distribution is refused.
    let err = settlement::distribute_tournament_winnings(&t.repo, &t.notifier, "t1", &payouts)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already distributed"));
}

#[tokio::test]
async fn test_tournament_must_be_completed_before_distribution() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    t.repo
        .create_tournament("t1", "open", Decimal::from_int(10), Decimal::from_int(80), 10)
        .await
        .unwrap();

    let payouts = vec![settlement::TournamentPayout {
        user_id: alice.clone(),
        amount: Decimal::from_int(50),
    }];
    let err = settlement::distribute_tournament_winnings(&t.repo, &t.notifier, "t1", &payouts)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cannot distribute winnings"));

    // Nothing moved.
    assert_eq!(balance(&t.repo, &alice).await, Decimal::zero());
}

#[tokio::test]
async fn test_tournament_payouts_must_fit_pool() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    t.repo
        .create_tournament("t1", "completed", Decimal::from_int(10), Decimal::from_int(80), 10)
        .await
        .unwrap();

    let payouts = vec![settlement::TournamentPayout {
        user_id: alice,
        amount: Decimal::from_int(81),
    }];
    let err = settlement::distribute_tournament_winnings(&t.repo, &t.notifier, "t1", &payouts)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("exceeds prize pool"));
}
