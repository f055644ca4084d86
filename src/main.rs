use stakearena::engine::pairing;
use stakearena::notify::{LoggingNotifier, Notifier, WebhookNotifier};
use stakearena::{api, config::Config, db::init_db, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let notifier: Arc<dyn Notifier> = match config.notify_webhook_url.clone() {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(LoggingNotifier),
    };

    // Background re-scan catches queue entries whose create-time pairing
    // lost a race.
    tokio::spawn(pairing::run_rescan_loop(
        repo.clone(),
        notifier.clone(),
        config.pairing_rescan_secs,
    ));

    // Create router
    let app = api::create_router(api::AppState::new(repo, config, notifier));

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
