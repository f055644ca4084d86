//! Reward-flow types: bonus configuration, tasks, per-player progress.

use crate::domain::{Decimal, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Daily login bonus configuration, stored as a single mutable document and
/// read transactionally at claim time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusConfig {
    pub enabled: bool,
    pub daily_bonus: Decimal,
    /// Extra amount per streak day; days without an entry add nothing.
    pub streak_bonus: BTreeMap<u32, Decimal>,
}

impl BonusConfig {
    /// Total bonus for the given streak day, zero when disabled.
    pub fn amount_for_streak(&self, streak: u32) -> Decimal {
        if !self.enabled {
            return Decimal::zero();
        }
        let extra = self
            .streak_bonus
            .get(&streak)
            .copied()
            .unwrap_or_else(Decimal::zero);
        self.daily_bonus + extra
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    PlayCount,
    WinBased,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::PlayCount => "PLAY_COUNT",
            TaskType::WinBased => "WIN_BASED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PLAY_COUNT" => Some(TaskType::PlayCount),
            "WIN_BASED" => Some(TaskType::WinBased),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub task_type: TaskType,
    pub target: i64,
    pub reward: Decimal,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub user_id: UserId,
    pub task_id: String,
    pub progress: i64,
    pub completed: bool,
    pub claimed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool) -> BonusConfig {
        let mut streak_bonus = BTreeMap::new();
        streak_bonus.insert(3, Decimal::from_int(5));
        streak_bonus.insert(7, Decimal::from_int(20));
        BonusConfig {
            enabled,
            daily_bonus: Decimal::from_int(2),
            streak_bonus,
        }
    }

    #[test]
    fn test_streak_amount_adds_configured_extra() {
        let cfg = config(true);
        assert_eq!(cfg.amount_for_streak(1).to_canonical_string(), "2");
        assert_eq!(cfg.amount_for_streak(3).to_canonical_string(), "7");
        assert_eq!(cfg.amount_for_streak(7).to_canonical_string(), "22");
    }

    #[test]
    fn test_disabled_config_pays_nothing() {
        assert!(config(false).amount_for_streak(7).is_zero());
    }
}
