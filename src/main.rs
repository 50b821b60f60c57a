use challenge_portal::{
    AppState, ChallengeRegistry, LocalDiskStorage,
    config::{AppConfig, Env},
    create_router,
    repository::{self, RepositoryState, SqliteRepository},
    storage::{StorageService, StorageState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database, storage, challenge catalog,
/// then the HTTP server. Any startup failure aborts the process.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise a development default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "challenge_portal=debug,tower_http=info".into());

    // 3. Pretty output locally, JSON for log aggregation in production.
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

    // 4. Database Initialization (SQLite, migrations applied on connect)
    let pool = repository::connect(&config.db_url)
        .await
        .expect("FATAL: Failed to open the submission database. Check DATABASE_URL.");
    let repo = Arc::new(SqliteRepository::new(pool)) as RepositoryState;

    // 5. Storage Initialization (local disk)
    let disk = LocalDiskStorage::new(config.upload_root.clone());
    disk.ensure_root()
        .await
        .expect("FATAL: Failed to create the upload directory. Check UPLOAD_ROOT.");
    tracing::info!("Storing uploads under {}", disk.root().display());
    let storage = Arc::new(disk) as StorageState;

    // 6. Challenge Catalog
    let challenges = match &config.challenges_path {
        Some(path) => ChallengeRegistry::from_json_file(path)
            .unwrap_or_else(|e| panic!("FATAL: Failed to load challenges from {}: {e}", path.display())),
        None => ChallengeRegistry::builtin(),
    };
    tracing::info!("Serving challenges: {:?}", challenges.ids());

    // 7. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        storage,
        challenges: Arc::new(challenges),
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {bind_addr}: {e}"));

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await.expect("HTTP server terminated unexpectedly");
}
