use anyhow::Result;
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::{
    audit::SqliteAuditLog,
    media_source::{MediaSource, ObjectStoreSource},
    sqlite_store::{SqliteObjectStore, StoreConfig},
    thumbnail::{HttpImageProbe, ImageProbe, NoProbe},
};

/// Timeout for one image-dimension probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting media-source with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    tracing::debug!("Connecting using raw URL => {}", db_url);

    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        services::sqlite_store::apply_schema(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core services ---
    let objects = SqliteObjectStore::connect(
        db.clone(),
        StoreConfig {
            bucket: cfg.source.bucket.clone(),
            base_path: cfg.storage_dir.clone().into(),
            credentials: cfg.source.credentials.clone(),
        },
    )
    .await?;

    let probe: Arc<dyn ImageProbe> = if cfg.source.probe_images {
        Arc::new(HttpImageProbe::new(PROBE_TIMEOUT)?)
    } else {
        Arc::new(NoProbe)
    };

    let source: Arc<dyn MediaSource> = Arc::new(ObjectStoreSource::new(
        Arc::new(objects.clone()),
        Arc::new(SqliteAuditLog::new(db.clone())),
        probe,
        cfg.source.clone(),
    ));
    tracing::info!(
        source = source.type_name(),
        bucket = %objects.bucket(),
        "media source ready"
    );

    // One batch may carry several files at the per-file limit.
    let upload_limit =
        usize::try_from(cfg.source.upload.max_size_bytes.saturating_mul(16)).unwrap_or(usize::MAX);

    let state = handlers::AppState {
        source,
        objects,
        config: Arc::new(cfg.source.clone()),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(upload_limit).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
