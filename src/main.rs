use anyhow::Context;
use invest_desk::{ api, db, scheduler::MaturityScheduler, AppError, Config, Platform };
use tower_http::{ cors::CorsLayer, trace::TraceLayer };
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "invest_desk=debug,tower_http=debug".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()
        .map_err(|e| AppError::Config(e.to_string()))
        .context("loading configuration")?;

    tracing::info!(
        "Starting invest-desk with {:?} storage at {}",
        config.storage.kind,
        config.storage.path.display()
    );

    // Open the keyspace
    let backend = db
        ::open_backend(&config.storage)
        .with_context(|| format!("opening storage at {}", config.storage.path.display()))?;
    let store = db::RecordStore::new(backend);

    // Wire services
    let platform = Platform::new(store, config.policy.clone());
    let settings = platform.settings.get_site_settings().context("reading site settings")?;
    tracing::info!("Serving {} (maintenance mode: {})", settings.site_name, settings.maintenance_mode);

    // Pay out matured investments in the background
    let scheduler = MaturityScheduler::new(platform.ledger.clone(), config.maturity_check_interval);
    tokio::spawn(scheduler.start());

    let app = api
        ::router(api::AppState::new(platform, config.chat_poll_interval))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener
        ::bind(&addr).await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("serving HTTP")?;

    Ok(())
}
