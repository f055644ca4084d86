mod common;

use common::{balance, create_user, fund, setup_test_app};
use stakearena::domain::{Decimal, QueueEntry, QueuePool, ResultClaim, TimeMs, UserId};
use stakearena::engine::{pairing, payments, results};

fn entry(user: &UserId, pool: QueuePool, fee: i64) -> QueueEntry {
    QueueEntry {
        user_id: user.clone(),
        pool,
        entry_fee: Decimal::from_int(fee),
        room_code: Some("ROOM".to_string()),
        user_name: user.as_str().to_string(),
        user_avatar: None,
        win_rate: Decimal::zero(),
        created_at: TimeMs::now(),
    }
}

/// The projection invariant: a wallet always equals the sum of its
/// completed ledger records.
async fn assert_projection(t: &common::TestApp, user: &UserId) {
    let projected = balance(&t.repo, user).await;
    let summed = t.repo.sum_completed_for_user(user).await.unwrap();
    assert_eq!(projected, summed, "projection drifted for {}", user);
}

#[tokio::test]
async fn test_wallets_equal_ledger_sums_through_full_lifecycle() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    let bob = create_user(&t.repo, "bob", "Bob").await;
    fund(&t.repo, &alice, 100).await;
    fund(&t.repo, &bob, 100).await;

    pairing::enqueue(&t.repo, &t.notifier, entry(&alice, QueuePool::Creators, 10))
        .await
        .unwrap();
    let m = pairing::enqueue(&t.repo, &t.notifier, entry(&bob, QueuePool::Seekers, 10))
        .await
        .unwrap()
        .unwrap();

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
    results::submit_result(
        &t.repo,
        &t.notifier,
        &m.id,
        &bob,
        ResultClaim::Loss,
        Some("https://cdn/b.png".to_string()),
    )
    .await
    .unwrap();

    payments::request_withdrawal(
        &t.repo,
        &t.notifier,
        "wd-1",
        &alice,
        Decimal::from_int(50),
        None,
    )
    .await
    .unwrap();

    assert_projection(&t, &alice).await;
    assert_projection(&t, &bob).await;
}

#[tokio::test]
async fn test_money_is_conserved_across_a_match() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    let bob = create_user(&t.repo, "bob", "Bob").await;
    fund(&t.repo, &alice, 100).await;
    fund(&t.repo, &bob, 100).await;

    pairing::enqueue(&t.repo, &t.notifier, entry(&alice, QueuePool::Creators, 10))
        .await
        .unwrap();
    let m = pairing::enqueue(&t.repo, &t.notifier, entry(&bob, QueuePool::Seekers, 10))
        .await
        .unwrap()
        .unwrap();

    results::submit_result(&t.repo, &t.notifier, &m.id, &alice, ResultClaim::Win, None)
        .await
        .unwrap();
    results::submit_result(&t.repo, &t.notifier, &m.id, &bob, ResultClaim::Loss, None)
        .await
        .unwrap();

    // Seeded 200 in; wallets plus the platform's cut must still be 200.
    let total = balance(&t.repo, &alice).await
        + balance(&t.repo, &bob).await
        + t.repo
            .sum_completed_for_user(&UserId::platform())
            .await
            .unwrap();
    assert_eq!(total, Decimal::from_int(200));
}

#[tokio::test]
async fn test_failed_overdraft_leaves_wallet_untouched() {
    use stakearena::domain::{LedgerRecord, LedgerStatus, LedgerType};
    use stakearena::engine::wallet;

    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    fund(&t.repo, &alice, 30).await;

    let debit = LedgerRecord::completed(
        "fee:overdraft:alice",
        alice.clone(),
        LedgerType::EntryFee,
        Decimal::from_int(-50),
        "Oversized entry fee",
    );
    let outcome = wallet::post_record(&t.repo, &debit).await.unwrap();
    assert!(!outcome.is_posted());

    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(30));

    // The rejected record is persisted as failed with a reason.
    let row = t
        .repo
        .get_ledger_record("fee:overdraft:alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.record.status, LedgerStatus::Failed);
    assert!(row.failure_reason.is_some());

    // Failed records never count toward the projection.
    assert_eq!(
        t.repo.sum_completed_for_user(&alice).await.unwrap(),
        Decimal::from_int(30)
    );
}
