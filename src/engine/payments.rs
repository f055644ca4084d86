//! Deposits, withdrawals, payment channel rotation, and admin wallet
//! adjustments.
//!
//! Money enters through admin-approved deposit requests and leaves through
//! admin-approved withdrawals. The withdrawal debit happens at request time
//! so the balance is held while the request is pending; rejection refunds
//! it.

use crate::db::repo::channels::{
    activate_first_inactive_tx, add_received_tx, clear_active_pointer_tx, deactivate_tx,
    get_channel_tx,
};
use crate::db::repo::requests::{
    get_deposit_request_tx, get_withdrawal_request_tx, insert_withdrawal_request_tx,
    transition_deposit_tx, transition_withdrawal_tx, DepositRequest, RequestStatus,
    WithdrawalRequest,
};
use crate::db::repo::users::{flip_referral_paid_tx, get_user_tx};
use crate::db::repo::referral_pct_tx;
use crate::db::Repository;
use crate::domain::{Decimal, LedgerRecord, LedgerType, TimeMs, UserId};
use crate::engine::wallet::{self, PostOutcome};
use crate::error::AppError;
use crate::notify::Notifier;
use std::sync::Arc;
use tracing::{info, warn};

fn deposit_key(request_id: &str) -> String {
    format!("dep:{}", request_id)
}

fn withdrawal_key(request_id: &str) -> String {
    format!("wd:{}", request_id)
}

fn withdrawal_refund_key(request_id: &str) -> String {
    format!("wdref:{}", request_id)
}

fn referral_key(referee: &UserId) -> String {
    format!("ref:{}", referee)
}

/// Open a deposit request against the currently active payment channel.
pub async fn request_deposit(
    repo: &Repository,
    user: &UserId,
    amount: Decimal,
) -> Result<DepositRequest, AppError> {
    if !amount.is_positive() {
        return Err(AppError::InvalidArgument(
            "Deposit amount must be positive".to_string(),
        ));
    }
    repo.get_user(user)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user)))?;

    let channel = repo.get_active_channel().await?.ok_or_else(|| {
        AppError::FailedPrecondition("No payment channel is currently available".to_string())
    })?;

    let request = DepositRequest {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.clone(),
        amount,
        channel_id: Some(channel.id.clone()),
        status: RequestStatus::Pending,
        created_at: TimeMs::now(),
    };
    repo.insert_deposit_request(&request).await?;

    info!(request_id = %request.id, user = %user, amount = %amount, "Deposit request opened");
    Ok(request)
}

/// Approve a deposit: credit the wallet, pay the one-time referral bonus if
/// due, then rotate the receiving channel when its limit is reached.
pub async fn approve_deposit(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    request_id: &str,
) -> Result<(), AppError> {
    let mut tx = repo.begin().await?;

    let request = get_deposit_request_tx(&mut tx, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deposit request {} not found", request_id)))?;

    if !transition_deposit_tx(&mut tx, request_id, RequestStatus::Approved).await? {
        return Err(AppError::FailedPrecondition(
            "Deposit request already processed".to_string(),
        ));
    }

    let credit = LedgerRecord::completed(
        deposit_key(request_id),
        request.user_id.clone(),
        LedgerType::Deposit,
        request.amount,
        "Deposit approved",
    );
    let outcome = wallet::post_record_tx(&mut tx, &credit).await?;
    if let PostOutcome::Rejected(reason) = outcome {
        tx.rollback().await?;
        return Err(AppError::FailedPrecondition(format!(
            "Deposit could not be credited: {}",
            reason
        )));
    }

    pay_referral_bonus_tx(&mut tx, &request.user_id, request.amount).await?;

    tx.commit().await?;

    info!(request_id, user = %request.user_id, amount = %request.amount, "Deposit approved");
    notifier
        .notify(
            &request.user_id,
            "Deposit approved",
            &format!("{} was added to your wallet.", request.amount),
        )
        .await;

    // Channel accounting is best-effort bookkeeping; a failure here never
    // takes back an approved deposit.
    if let Some(channel_id) = request.channel_id.as_deref() {
        if let Err(e) = record_channel_receipt(repo, channel_id, request.amount).await {
            warn!(request_id, channel_id, error = %e, "Channel accounting failed");
        }
    }

    Ok(())
}

/// Reject a pending deposit request. No money has moved yet.
pub async fn reject_deposit(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    request_id: &str,
) -> Result<(), AppError> {
    let mut tx = repo.begin().await?;

    let request = get_deposit_request_tx(&mut tx, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deposit request {} not found", request_id)))?;

    if !transition_deposit_tx(&mut tx, request_id, RequestStatus::Rejected).await? {
        return Err(AppError::FailedPrecondition(
            "Deposit request already processed".to_string(),
        ));
    }

    tx.commit().await?;

    info!(request_id, user = %request.user_id, "Deposit rejected");
    notifier
        .notify(&request.user_id, "Deposit rejected", "Your deposit request was rejected.")
        .await;
    Ok(())
}

/// First approved deposit pays the referrer a one-time cut of the amount.
/// The guarded flag flip keeps the bonus single-shot even under concurrent
/// approvals.
async fn pay_referral_bonus_tx(
    conn: &mut sqlx::SqliteConnection,
    referee: &UserId,
    deposit_amount: Decimal,
) -> Result<(), sqlx::Error> {
    let Some(user) = get_user_tx(conn, referee).await? else {
        return Ok(());
    };
    let Some(referrer) = user.referred_by else {
        return Ok(());
    };
    if user.referral_bonus_paid {
        return Ok(());
    }
    if !flip_referral_paid_tx(conn, referee).await? {
        return Ok(());
    }

    let pct = referral_pct_tx(conn).await?;
    let bonus = deposit_amount.percent(pct);
    if !bonus.is_positive() {
        return Ok(());
    }

    let record = LedgerRecord::completed(
        referral_key(referee),
        referrer.clone(),
        LedgerType::ReferralBonus,
        bonus,
        format!("Referral bonus for {}", referee),
    );
    wallet::post_record_tx(conn, &record).await?;
    info!(referrer = %referrer, referee = %referee, bonus = %bonus, "Referral bonus paid");
    Ok(())
}

/// Accumulate the deposit on its channel and rotate to the next channel
/// when the limit is reached.
async fn record_channel_receipt(
    repo: &Repository,
    channel_id: &str,
    amount: Decimal,
) -> Result<(), AppError> {
    let mut tx = repo.begin().await?;

    let Some(channel) = get_channel_tx(&mut tx, channel_id).await? else {
        warn!(channel_id, "Deposit referenced an unknown channel");
        return Ok(());
    };

    let new_total = channel.current_received + amount;
    add_received_tx(&mut tx, channel_id, new_total).await?;

    if channel.is_active && channel.would_exhaust(amount) {
        if deactivate_tx(&mut tx, channel_id).await? {
            match activate_first_inactive_tx(&mut tx, channel_id).await? {
                Some(next) => {
                    info!(
                        exhausted = channel_id,
                        activated = %next.id,
                        received = %new_total,
                        "Payment channel rotated"
                    );
                }
                None => {
                    clear_active_pointer_tx(&mut tx, channel_id).await?;
                    warn!(exhausted = channel_id, "All payment channels exhausted");
                }
            }
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Open a withdrawal and hold the funds. The debit rides the same
/// transaction as the request row, so a failed hold leaves no request
/// behind.
pub async fn request_withdrawal(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    request_id: &str,
    user: &UserId,
    amount: Decimal,
    destination: Option<String>,
) -> Result<WithdrawalRequest, AppError> {
    if !amount.is_positive() {
        return Err(AppError::InvalidArgument(
            "Withdrawal amount must be positive".to_string(),
        ));
    }

    let mut tx = repo.begin().await?;

    // Redelivered request: hand back the stored document untouched.
    if let Some(existing) = get_withdrawal_request_tx(&mut tx, request_id).await? {
        if existing.user_id != *user {
            return Err(AppError::PermissionDenied(
                "Withdrawal request belongs to another user".to_string(),
            ));
        }
        return Ok(existing);
    }

    get_user_tx(&mut tx, user)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user)))?;

    let request = WithdrawalRequest {
        id: request_id.to_string(),
        user_id: user.clone(),
        amount,
        destination,
        status: RequestStatus::Pending,
        created_at: TimeMs::now(),
    };
    insert_withdrawal_request_tx(&mut tx, &request).await?;

    let debit = LedgerRecord::completed(
        withdrawal_key(request_id),
        user.clone(),
        LedgerType::Withdrawal,
        -amount,
        "Withdrawal request",
    );
    let outcome = wallet::post_record_tx(&mut tx, &debit).await?;
    if !outcome.is_posted() {
        tx.rollback().await?;
        return Err(AppError::FailedPrecondition(
            "Insufficient balance for withdrawal".to_string(),
        ));
    }

    tx.commit().await?;

    info!(request_id, user = %user, amount = %amount, "Withdrawal requested");
    notifier
        .notify(
            user,
            "Withdrawal requested",
            &format!("{} is on hold pending review.", amount),
        )
        .await;
    Ok(request)
}

/// Approve a withdrawal. The funds were held at request time; this is a
/// pure state transition plus the payout side effect outside the system.
pub async fn approve_withdrawal(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    request_id: &str,
) -> Result<(), AppError> {
    let mut tx = repo.begin().await?;

    let request = get_withdrawal_request_tx(&mut tx, request_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Withdrawal request {} not found", request_id))
        })?;

    if !transition_withdrawal_tx(&mut tx, request_id, RequestStatus::Approved).await? {
        return Err(AppError::FailedPrecondition(
            "Withdrawal request already processed".to_string(),
        ));
    }

    tx.commit().await?;

    info!(request_id, user = %request.user_id, amount = %request.amount, "Withdrawal approved");
    notifier
        .notify(
            &request.user_id,
            "Withdrawal approved",
            &format!("{} is on its way.", request.amount),
        )
        .await;
    Ok(())
}

/// Reject a withdrawal and release the held funds.
pub async fn reject_withdrawal(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    request_id: &str,
) -> Result<(), AppError> {
    let mut tx = repo.begin().await?;

    let request = get_withdrawal_request_tx(&mut tx, request_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Withdrawal request {} not found", request_id))
        })?;

    if !transition_withdrawal_tx(&mut tx, request_id, RequestStatus::Rejected).await? {
        return Err(AppError::FailedPrecondition(
            "Withdrawal request already processed".to_string(),
        ));
    }

    let refund = LedgerRecord::completed(
        withdrawal_refund_key(request_id),
        request.user_id.clone(),
        LedgerType::WithdrawalRefund,
        request.amount,
        "Withdrawal rejected, funds released",
    );
    wallet::post_record_tx(&mut tx, &refund).await?;

    tx.commit().await?;

    info!(request_id, user = %request.user_id, amount = %request.amount, "Withdrawal rejected");
    notifier
        .notify(
            &request.user_id,
            "Withdrawal rejected",
            &format!("{} was returned to your wallet.", request.amount),
        )
        .await;
    Ok(())
}

/// Manual admin credit or debit. Adjustments have no natural reference, so
/// the event key is hashed from the record fields.
pub async fn adjust_wallet(
    repo: &Repository,
    notifier: &Arc<dyn Notifier>,
    admin: &UserId,
    user: &UserId,
    amount: Decimal,
    reason: &str,
) -> Result<(), AppError> {
    if amount.is_zero() {
        return Err(AppError::InvalidArgument(
            "Adjustment amount must be non-zero".to_string(),
        ));
    }
    repo.get_user(user)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user)))?;

    let record_type = if amount.is_positive() {
        LedgerType::AdminCredit
    } else {
        LedgerType::AdminDebit
    };
    let now = TimeMs::now();
    let key = LedgerRecord::compute_event_key(user, record_type, &amount, now);
    let record = LedgerRecord::completed(
        key,
        user.clone(),
        record_type,
        amount,
        format!("Admin adjustment: {}", reason),
    );

    let outcome = wallet::post_record(repo, &record).await?;
    match outcome {
        PostOutcome::Posted => {
            info!(admin = %admin, user = %user, amount = %amount, "Wallet adjusted");
            notifier
                .notify(user, "Wallet adjusted", &format!("An admin adjusted your wallet by {}.", amount))
                .await;
            Ok(())
        }
        PostOutcome::Duplicate => Ok(()),
        PostOutcome::Rejected(reason) => Err(AppError::FailedPrecondition(format!(
            "Adjustment rejected: {}",
            reason
        ))),
    }
}
