//! Domain types for the matchmaking and settlement engine.
//!
//! This module provides:
//! - Lossless currency handling via the Decimal wrapper
//! - Primitives: UserId (with the reserved platform pseudo-user), TimeMs
//! - Ledger record types with deterministic event keys
//! - Match lifecycle, queue, payment channel, reward, and role types

pub mod channel;
pub mod decimal;
pub mod game;
pub mod ledger;
pub mod primitives;
pub mod queue;
pub mod rewards;
pub mod role;

pub use channel::PaymentChannel;
pub use decimal::Decimal;
pub use game::{Match, MatchResult, MatchStatus, PlayerInfo, ResultClaim};
pub use ledger::{LedgerRecord, LedgerStatus, LedgerType};
pub use primitives::{TimeMs, UserId, PLATFORM_USER};
pub use queue::{QueueEntry, QueuePool};
pub use rewards::{BonusConfig, Task, TaskProgress, TaskType};
pub use role::Role;
