//! timetrack - time tracking and timesheet service

use anyhow::{Context, Result};
use axum::http::HeaderName;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timetrack::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{SqlxTaskRepository, SqlxTimeEntryRepository},
    },
    hooks::{self, HookManager},
    services::{SystemClock, TimerService, TimesheetService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timetrack=info,activity=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting timetrack {}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    let user_header = HeaderName::from_bytes(config.server.user_header.trim().as_bytes())
        .with_context(|| format!("Invalid server.user_header: {}", config.server.user_header))?;
    let offset = config.timesheet.offset()?;
    tracing::info!("Configuration loaded (timesheet offset {})", offset);

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    if db::migrations::is_up_to_date(&pool).await? {
        tracing::info!("Database schema is up to date");
    } else {
        db::migrations::run_migrations(&pool).await?;
        tracing::info!("Database migrations completed");
    }

    // Activity hooks
    let hook_manager = Arc::new(HookManager::new());
    hooks::register_activity_log(&hook_manager);

    // Create repositories
    let entry_repo = SqlxTimeEntryRepository::boxed(pool.clone());
    let task_repo = SqlxTaskRepository::boxed(pool.clone());

    // Initialize services
    let timer_service = Arc::new(TimerService::with_hooks(
        entry_repo.clone(),
        task_repo,
        Arc::new(SystemClock),
        hook_manager,
    ));
    let timesheet_service = Arc::new(TimesheetService::new(entry_repo, offset));

    let state = AppState {
        pool: pool.clone(),
        timer_service,
        timesheet_service,
        user_header,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
