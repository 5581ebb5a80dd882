use dealdesk::api;
use dealdesk::config::Config;
use dealdesk::db::init_db;
use dealdesk::domain::SystemClock;
use dealdesk::engine::{AccruingCollector, DealEngine, EngineParams};
use dealdesk::ratesource::HttpRateSource;
use dealdesk::Repository;
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
    let rates = Arc::new(HttpRateSource::new(config.rate_api_url.clone()));
    let engine = Arc::new(DealEngine::new(
        EngineParams::from_config(&config),
        Arc::new(AccruingCollector::new()),
    ));

    // Create router
    let app = api::create_router(api::AppState {
        engine,
        repo,
        rates,
        clock: Arc::new(SystemClock),
        config,
    });

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
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
