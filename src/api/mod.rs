pub mod admin;
pub mod bonus;
pub mod health;
pub mod matches;
pub mod queue;
pub mod tasks;
pub mod tournaments;
pub mod users;
pub mod wallet;

use crate::config::Config;
use crate::db::Repository;
use crate::notify::Notifier;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repo,
            config,
            notifier,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/users", post(users::register))
        .route("/v1/users/me", get(users::me))
        .route("/v1/wallet", get(wallet::get_wallet))
        .route("/v1/queue", post(queue::enqueue))
        .route("/v1/queue", delete(queue::cancel))
        .route("/v1/matches", post(matches::create_match))
        .route("/v1/matches/:id", get(matches::get_match))
        .route("/v1/matches/:id/join", post(matches::join_match))
        .route("/v1/matches/:id/room-code", post(matches::enter_room_code))
        .route("/v1/matches/:id/results", post(matches::submit_result))
        .route(
            "/v1/matches/:id/declare-winner",
            post(matches::declare_winner),
        )
        .route("/v1/matches/:id/cancel", post(matches::cancel_match))
        .route("/v1/deposits", post(wallet::request_deposit))
        .route("/v1/deposits/:id/approve", post(wallet::approve_deposit))
        .route("/v1/deposits/:id/reject", post(wallet::reject_deposit))
        .route("/v1/withdrawals", post(wallet::request_withdrawal))
        .route(
            "/v1/withdrawals/:id/approve",
            post(wallet::approve_withdrawal),
        )
        .route(
            "/v1/withdrawals/:id/reject",
            post(wallet::reject_withdrawal),
        )
        .route("/v1/bonus/daily-login", post(bonus::claim_daily_login))
        .route("/v1/tasks", get(tasks::list_tasks))
        .route("/v1/tasks/:id/claim", post(tasks::claim_task))
        .route("/v1/tournaments", post(tournaments::create_tournament))
        .route(
            "/v1/tournaments/:id/distribute",
            post(tournaments::distribute),
        )
        .route("/v1/admin/roles", post(admin::set_role))
        .route("/v1/admin/users", get(admin::list_users))
        .route("/v1/admin/dashboard", get(admin::dashboard))
        .route("/v1/admin/adjustments", post(admin::adjust_wallet))
        .route("/v1/admin/channels", post(admin::create_channel))
        .route("/v1/admin/channels", get(admin::list_channels))
        .route("/v1/admin/config", post(admin::set_engine_config))
        .layer(cors)
        .with_state(state)
}
