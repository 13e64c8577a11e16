//! Tile server
//!
//! HTTP server rendering coverage overlays from the caches in a directory.
//!
//! # Endpoints
//!
//! - `GET /{user}/{leaf_zoom}/{z}/{x}/{y}.png` - Coverage tile at a leaf zoom
//! - `GET /{user}/{z}/{x}/{y}.png` - Coverage tile at the default leaf zoom
//! - `GET /users` - Loaded users and their tile URL templates
//! - `GET /health` - Health check
//! - `GET /swagger-ui` - OpenAPI documentation
//!
//! Caches are loaded once at startup; the registry is never mutated while
//! serving.

pub mod api;
pub mod state;

use anyhow::{Context, Result};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServeConfig;

pub use state::ServerState;

/// Load all caches and start the server
pub async fn serve(config: &ServeConfig) -> Result<()> {
    let (state, skipped) = ServerState::load(&config.cache_dir)
        .with_context(|| format!("loading caches from {}", config.cache_dir.display()))?;
    if state.registry.is_empty() {
        warn!(skipped = skipped.len(), "no usable caches; every tile request will 404");
    }
    for (user_id, cache) in state.registry.users() {
        for leaf in cache.leaf_zooms() {
            info!("serving http://{}/{user_id}/{leaf}/{{z}}/{{x}}/{{y}}.png", config.addr);
        }
    }

    let app = api::build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    info!("listening on http://{}", config.addr);
    info!("swagger UI: http://{}/swagger-ui/", config.addr);

    axum::serve(listener, app).await.context("serving tiles")?;
    Ok(())
}
