//! Append-only wallet ledger records.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// Balance-affecting transaction kinds. Every variant carries a signed
/// amount (credits positive, debits negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerType {
    Deposit,
    Withdrawal,
    EntryFee,
    Winnings,
    Refund,
    AdminCredit,
    AdminDebit,
    ReferralBonus,
    DailyBonus,
    WithdrawalRefund,
    TaskReward,
    MatchCommission,
    TournamentCommission,
}

impl LedgerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerType::Deposit => "deposit",
            LedgerType::Withdrawal => "withdrawal",
            LedgerType::EntryFee => "entry-fee",
            LedgerType::Winnings => "winnings",
            LedgerType::Refund => "refund",
            LedgerType::AdminCredit => "admin-credit",
            LedgerType::AdminDebit => "admin-debit",
            LedgerType::ReferralBonus => "referral-bonus",
            LedgerType::DailyBonus => "daily-bonus",
            LedgerType::WithdrawalRefund => "withdrawal-refund",
            LedgerType::TaskReward => "task-reward",
            LedgerType::MatchCommission => "match-commission",
            LedgerType::TournamentCommission => "tournament-commission",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(LedgerType::Deposit),
            "withdrawal" => Some(LedgerType::Withdrawal),
            "entry-fee" => Some(LedgerType::EntryFee),
            "winnings" => Some(LedgerType::Winnings),
            "refund" => Some(LedgerType::Refund),
            "admin-credit" => Some(LedgerType::AdminCredit),
            "admin-debit" => Some(LedgerType::AdminDebit),
            "referral-bonus" => Some(LedgerType::ReferralBonus),
            "daily-bonus" => Some(LedgerType::DailyBonus),
            "withdrawal-refund" => Some(LedgerType::WithdrawalRefund),
            "task-reward" => Some(LedgerType::TaskReward),
            "match-commission" => Some(LedgerType::MatchCommission),
            "tournament-commission" => Some(LedgerType::TournamentCommission),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Pending,
    Completed,
    Failed,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::Completed => "completed",
            LedgerStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LedgerStatus::Pending),
            "completed" => Some(LedgerStatus::Completed),
            "failed" => Some(LedgerStatus::Failed),
            _ => None,
        }
    }
}

/// A single ledger record. Immutable once written, except for a terminal
/// `status` transition to `failed` when the projection rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Stable unique identifier, deterministic per logical event so that
    /// redelivered triggers collapse into one row.
    pub event_key: String,
    pub user_id: UserId,
    pub record_type: LedgerType,
    pub amount: Decimal,
    pub status: LedgerStatus,
    pub created_at: TimeMs,
    pub description: String,
    pub related_match_id: Option<String>,
    pub related_tournament_id: Option<String>,
}

impl LedgerRecord {
    /// Create a completed record with an explicit deterministic event key.
    pub fn completed(
        event_key: impl Into<String>,
        user_id: UserId,
        record_type: LedgerType,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        LedgerRecord {
            event_key: event_key.into(),
            user_id,
            record_type,
            amount,
            status: LedgerStatus::Completed,
            created_at: TimeMs::now(),
            description: description.into(),
            related_match_id: None,
            related_tournament_id: None,
        }
    }

    pub fn with_match(mut self, match_id: impl Into<String>) -> Self {
        self.related_match_id = Some(match_id.into());
        self
    }

    pub fn with_tournament(mut self, tournament_id: impl Into<String>) -> Self {
        self.related_tournament_id = Some(tournament_id.into());
        self
    }

    /// Compute a fallback event key from deterministic fields, for records
    /// with no natural reference (manual admin adjustments).
    ///
    /// SHA-256 truncated to 128 bits; collision resistance far exceeds the
    /// expected record volume.
    pub fn compute_event_key(
        user_id: &UserId,
        record_type: LedgerType,
        amount: &Decimal,
        created_at: TimeMs,
    ) -> String {
        use sha2::{Digest, Sha256};

        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hash_var(&mut hasher, user_id.as_str());
        hash_var(&mut hasher, record_type.as_str());
        hash_var(&mut hasher, &amount.to_canonical_string());
        hasher.update(created_at.as_ms().to_le_bytes());

        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }
}
