mod silo;
mod storage;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{response::Html, routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::EnvFilter;

use silo::AppState;

/// Process settings, read once from the environment at start-up.
#[derive(Debug, Clone)]
struct Config {
    port: u16,
    db_path: PathBuf,
    assets_dir: PathBuf,
    silo_key: Option<String>,
}

impl Config {
    fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let port = match var("PORT").map(|p| p.parse::<u16>()) {
            Some(Ok(port)) => port,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "ignoring invalid PORT");
                3000
            }
            None => 3000,
        };
        Config {
            port,
            db_path: PathBuf::from(var("DB_PATH").unwrap_or_else(|| "data/atlas.redb".to_string())),
            assets_dir: PathBuf::from(var("ASSETS_DIR").unwrap_or_else(|| "assets".to_string())),
            silo_key: var("ATLAS_SILO_KEY").filter(|k| !k.is_empty()),
        }
    }
}

/// Build a cache-controlled static file router.
///
/// Separated so tests can exercise the caching layer with arbitrary directories.
fn cached_static_router(dir: &Path, cache_header: &'static str) -> Router {
    let layer = SetResponseHeaderLayer::overriding(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(cache_header),
    );
    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(layer)
}

const CACHE_1DAY: &str = "public, max-age=86400, must-revalidate";
const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Build the full application router.
fn build_app(state: AppState, assets_dir: &Path) -> Router {
    // Static file routers are stateless, merge them before adding app state
    let static_files = Router::new()
        .nest("/static", cached_static_router(assets_dir, CACHE_1DAY))
        .nest(
            "/dist",
            cached_static_router(Path::new("dist"), CACHE_IMMUTABLE),
        )
        .nest(
            "/assets",
            cached_static_router(Path::new("dist/assets"), CACHE_IMMUTABLE),
        );

    silo::routes()
        .route("/", get(serve_index))
        .with_state(state)
        .merge(static_files)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    if config.silo_key.is_none() {
        tracing::warn!("ATLAS_SILO_KEY is not set, document writes will be refused");
    }

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let storage = storage::Storage::open(&config.db_path)?;

    let state = AppState {
        storage,
        write_key: config.silo_key.as_deref().map(Arc::from),
    };
    let app = build_app(state, &config.assets_dir);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(port = config.port, db = %config.db_path.display(), "server running");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_index() -> Html<String> {
    // Try to serve the built frontend, fall back to a simple message
    match std::fs::read_to_string("dist/index.html") {
        Ok(html) => Html(html),
        Err(_) => Html(
            r#"<!DOCTYPE html>
<html>
<head><title>Atlas</title></head>
<body>
<h1>Atlas</h1>
<p>Frontend not built yet. The document API is at <a href="/api/health">/api/health</a>.</p>
</body>
</html>"#
                .to_string(),
        ),
    }
}
