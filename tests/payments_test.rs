mod common;

use common::{balance, create_user, fund, setup_test_app};
use stakearena::domain::{Decimal, PaymentChannel, UserId};
use stakearena::engine::payments;

fn channel(id: &str, active: bool, limit: i64, received: i64) -> PaymentChannel {
    PaymentChannel {
        id: id.to_string(),
        channel_id: format!("upi-{}", id),
        is_active: active,
        payment_limit: Decimal::from_int(limit),
        current_received: Decimal::from_int(received),
    }
}

#[tokio::test]
async fn test_deposit_approval_credits_wallet_once() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    t.repo.insert_channel(&channel("ch1", true, 1000, 0)).await.unwrap();

    let request = payments::request_deposit(&t.repo, &alice, Decimal::from_int(100))
        .await
        .unwrap();
    assert_eq!(request.channel_id.as_deref(), Some("ch1"));

    payments::approve_deposit(&t.repo, &t.notifier, &request.id)
        .await
        .unwrap();
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(100));

    // A redelivered approval is refused and pays nothing.
    let err = payments::approve_deposit(&t.repo, &t.notifier, &request.id)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already processed"));
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(100));
}

#[tokio::test]
async fn test_rejected_deposit_pays_nothing() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    t.repo.insert_channel(&channel("ch1", true, 1000, 0)).await.unwrap();

    let request = payments::request_deposit(&t.repo, &alice, Decimal::from_int(100))
        .await
        .unwrap();
    payments::reject_deposit(&t.repo, &t.notifier, &request.id)
        .await
        .unwrap();
    assert!(balance(&t.repo, &alice).await.is_zero());

    // A reject cannot be flipped into an approve later.
    let err = payments::approve_deposit(&t.repo, &t.notifier, &request.id)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already processed"));
}

#[tokio::test]
async fn test_first_deposit_pays_referral_bonus_once() {
    let t = setup_test_app().await;
    let carol = create_user(&t.repo, "carol", "Carol").await;
    let dave = UserId::new("dave");
    t.repo
        .create_user(&dave, "Dave", None, Some(&carol))
        .await
        .unwrap();
    t.repo.insert_channel(&channel("ch1", true, 10000, 0)).await.unwrap();

    let first = payments::request_deposit(&t.repo, &dave, Decimal::from_int(200))
        .await
        .unwrap();
    payments::approve_deposit(&t.repo, &t.notifier, &first.id)
        .await
        .unwrap();

    // Default referral rate is 5%.
    assert_eq!(balance(&t.repo, &carol).await, Decimal::from_int(10));
    assert_eq!(balance(&t.repo, &dave).await, Decimal::from_int(200));

    // The bonus is one-shot; later deposits pay the referrer nothing.
    let second = payments::request_deposit(&t.repo, &dave, Decimal::from_int(500))
        .await
        .unwrap();
    payments::approve_deposit(&t.repo, &t.notifier, &second.id)
        .await
        .unwrap();
    assert_eq!(balance(&t.repo, &carol).await, Decimal::from_int(10));
    assert_eq!(balance(&t.repo, &dave).await, Decimal::from_int(700));
}

#[tokio::test]
async fn test_channel_rotates_when_limit_reached() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    t.repo.insert_channel(&channel("ch1", true, 1000, 900)).await.unwrap();
    t.repo.insert_channel(&channel("ch2", false, 1000, 0)).await.unwrap();

    let request = payments::request_deposit(&t.repo, &alice, Decimal::from_int(150))
        .await
        .unwrap();
    payments::approve_deposit(&t.repo, &t.notifier, &request.id)
        .await
        .unwrap();

    let ch1 = t.repo.get_channel("ch1").await.unwrap().unwrap();
    assert!(!ch1.is_active);
    assert_eq!(ch1.current_received, Decimal::from_int(1050));

    let active = t.repo.get_active_channel().await.unwrap().unwrap();
    assert_eq!(active.id, "ch2");
}

#[tokio::test]
async fn test_exhausting_last_channel_blocks_new_deposits() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    t.repo.insert_channel(&channel("ch1", true, 100, 0)).await.unwrap();

    let request = payments::request_deposit(&t.repo, &alice, Decimal::from_int(100))
        .await
        .unwrap();
    payments::approve_deposit(&t.repo, &t.notifier, &request.id)
        .await
        .unwrap();

    assert!(t.repo.get_active_channel().await.unwrap().is_none());
    let err = payments::request_deposit(&t.repo, &alice, Decimal::from_int(10))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No payment channel"));
}

#[tokio::test]
async fn test_withdrawal_holds_funds_and_reject_refunds() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    fund(&t.repo, &alice, 100).await;

    let request = payments::request_withdrawal(
        &t.repo,
        &t.notifier,
        "wd-req-1",
        &alice,
        Decimal::from_int(60),
        Some("upi://alice".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(40));

    // Held amount counts as withdrawn while pending.
    let row = t.repo.get_user(&alice).await.unwrap().unwrap();
    assert_eq!(row.total_withdrawals, Decimal::from_int(60));

    payments::reject_withdrawal(&t.repo, &t.notifier, &request.id)
        .await
        .unwrap();
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(100));
}

#[tokio::test]
async fn test_withdrawal_request_is_idempotent_by_id() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    fund(&t.repo, &alice, 100).await;

    payments::request_withdrawal(
        &t.repo,
        &t.notifier,
        "wd-req-1",
        &alice,
        Decimal::from_int(60),
        None,
    )
    .await
    .unwrap();
    // Same request id retried: no second debit.
    payments::request_withdrawal(
        &t.repo,
        &t.notifier,
        "wd-req-1",
        &alice,
        Decimal::from_int(60),
        None,
    )
    .await
    .unwrap();
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(40));
}

#[tokio::test]
async fn test_withdrawal_exceeding_balance_rejected() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    fund(&t.repo, &alice, 50).await;

    let err = payments::request_withdrawal(
        &t.repo,
        &t.notifier,
        "wd-req-1",
        &alice,
        Decimal::from_int(60),
        None,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Insufficient balance"));
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(50));

    // The failed hold leaves no request document behind.
    assert!(t
        .repo
        .get_withdrawal_request("wd-req-1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_approved_withdrawal_keeps_funds_out() {
    let t = setup_test_app().await;
    let alice = create_user(&t.repo, "alice", "Alice").await;
    fund(&t.repo, &alice, 100).await;

    let request = payments::request_withdrawal(
        &t.repo,
        &t.notifier,
        "wd-req-1",
        &alice,
        Decimal::from_int(60),
        None,
    )
    .await
    .unwrap();
    payments::approve_withdrawal(&t.repo, &t.notifier, &request.id)
        .await
        .unwrap();
    assert_eq!(balance(&t.repo, &alice).await, Decimal::from_int(40));

    // Approve then reject is refused; no double refund path.
    let err = payments::reject_withdrawal(&t.repo, &t.notifier, &request.id)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already processed"));
}
