pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod notify;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    BonusConfig, Decimal, LedgerRecord, LedgerStatus, LedgerType, Match, MatchResult, MatchStatus,
    PaymentChannel, PlayerInfo, QueueEntry, QueuePool, ResultClaim, Role, Task, TaskProgress,
    TaskType, TimeMs, UserId,
};
pub use error::AppError;
pub use notify::{LoggingNotifier, Notifier, WebhookNotifier};
