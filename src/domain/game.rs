//! Match lifecycle types: status machine, player info, submitted results.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// Match lifecycle. `waiting` only occurs for publicly joinable matches
/// created outside the paired-queue flow; paired matches start at
/// `in_progress`. `completed` and `cancelled` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    InProgress,
    Playing,
    ResultSubmitted,
    Completed,
    Disputed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Waiting => "waiting",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Playing => "playing",
            MatchStatus::ResultSubmitted => "result_submitted",
            MatchStatus::Completed => "completed",
            MatchStatus::Disputed => "disputed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(MatchStatus::Waiting),
            "in_progress" => Some(MatchStatus::InProgress),
            "playing" => Some(MatchStatus::Playing),
            "result_submitted" => Some(MatchStatus::ResultSubmitted),
            "completed" => Some(MatchStatus::Completed),
            "disputed" => Some(MatchStatus::Disputed),
            "cancelled" => Some(MatchStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }

    /// States from which an admin may force-cancel with refunds.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            MatchStatus::Waiting
                | MatchStatus::InProgress
                | MatchStatus::Playing
                | MatchStatus::ResultSubmitted
                | MatchStatus::Disputed
        )
    }

    /// States in which the result analyzer still acts. Results arriving
    /// after the match concluded (or went to review) are ignored.
    pub fn accepts_results(&self) -> bool {
        matches!(
            self,
            MatchStatus::InProgress | MatchStatus::Playing | MatchStatus::ResultSubmitted
        )
    }
}

/// Display info embedded on a match for each player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub user_id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
    pub win_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub status: MatchStatus,
    pub entry_fee: Decimal,
    pub prize_pool: Decimal,
    pub max_players: i64,
    pub players: Vec<PlayerInfo>,
    pub room_code: Option<String>,
    pub winner_id: Option<UserId>,
    pub review_reason: Option<String>,
    pub prize_distributed: bool,
    pub created_at: TimeMs,
}

impl Match {
    pub fn player_ids(&self) -> Vec<&UserId> {
        self.players.iter().map(|p| &p.user_id).collect()
    }

    pub fn has_player(&self, user_id: &UserId) -> bool {
        self.players.iter().any(|p| &p.user_id == user_id)
    }
}

/// A self-reported outcome claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultClaim {
    Win,
    Loss,
}

impl ResultClaim {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultClaim::Win => "win",
            ResultClaim::Loss => "loss",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "win" => Some(ResultClaim::Win),
            "loss" => Some(ResultClaim::Loss),
            _ => None,
        }
    }
}

/// One result per (match, player); keyed by player id so a second
/// submission from the same player cannot create a second row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: String,
    pub user_id: UserId,
    pub claim: ResultClaim,
    pub screenshot_url: Option<String>,
    pub submitted_at: TimeMs,
}
