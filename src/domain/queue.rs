//! Two-sided matchmaking queue entries.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// The two symmetric waiting pools. Creators bring a room code; seekers
/// join one. Pairing always consumes one entry from each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePool {
    Creators,
    Seekers,
}

impl QueuePool {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueuePool::Creators => "creators",
            QueuePool::Seekers => "seekers",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "creators" => Some(QueuePool::Creators),
            "seekers" => Some(QueuePool::Seekers),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            QueuePool::Creators => QueuePool::Seekers,
            QueuePool::Seekers => QueuePool::Creators,
        }
    }
}

/// A waiting player. Lives in exactly one pool; consumed atomically by the
/// pairing transaction or deleted unilaterally on cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub user_id: UserId,
    pub pool: QueuePool,
    pub entry_fee: Decimal,
    pub room_code: Option<String>,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub win_rate: Decimal,
    pub created_at: TimeMs,
}
