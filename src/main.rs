use std::{process, sync::Arc};

use clinic_cms::{
    AppState, LocalImageStore,
    config::{AppConfig, Env},
    create_router,
    storage::{ImageService, ImageState},
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Logs a fatal startup error and exits with status 1.
fn fail(message: &str, err: impl std::fmt::Display) -> ! {
    tracing::error!(error = %err, "{message}");
    eprintln!("FATAL: {message}: {err}");
    process::exit(1)
}

/// main
///
/// Loads configuration, initializes logging, connects and migrates the database, prepares the
/// upload directory and serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {e}");
            process::exit(1);
        }
    };

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clinic_cms=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = match PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => fail("failed to connect to Postgres, check DB_DSN", e),
    };

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        fail("database migrations failed", e);
    }

    // 5. Upload Storage Initialization
    let image_store = LocalImageStore::new(&config.upload_dir);
    if let Err(e) = image_store.ensure_ready().await {
        fail("upload directory is not usable", e);
    }
    let images = Arc::new(image_store) as ImageState;

    // 6. Unified State Assembly
    let port = config.port;
    let app = create_router(AppState::postgres(pool, images, config));

    // 7. Server Startup
    let addr = format!("0.0.0.0:{port}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => fail("failed to bind the HTTP listener", e),
    };

    tracing::info!("Listening on {addr}");
    tracing::info!("Admin panel available at: http://localhost:{port}/admin");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        fail("server terminated", e);
    }
}
