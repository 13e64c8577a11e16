//! HTTP API handlers with Axum and Utoipa

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::render::{encode_png, render_record};
use crate::store::Lookup;
use crate::tile::TileCoordinate;

use super::state::{ServerState, LEGACY_LEAF_ZOOM};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(tile, legacy_tile, users, health),
    components(schemas(UserEntry, UsersResponse, HealthResponse, ErrorResponse)),
    info(
        title = "Kachel Tile API",
        version = "1.0.0",
        description = "Raster overlays of the map tiles a user has visited"
    )
)]
struct ApiDoc;

/// Build the Axum router
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/users", get(users))
        .route("/health", get(health))
        .route("/{user_id}/{z}/{x}/{y}", get(legacy_tile))
        .route("/{user_id}/{leaf_zoom}/{z}/{x}/{y}", get(tile))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

// ============ Tile Endpoints ============

/// Coverage overlay for one tile at an explicit leaf zoom
#[utoipa::path(
    get,
    path = "/{user_id}/{leaf_zoom}/{z}/{x}/{y}.png",
    params(
        ("user_id" = String, Path, description = "User id"),
        ("leaf_zoom" = u8, Path, description = "Leaf zoom level of the cache"),
        ("z" = u8, Path, description = "Tile zoom"),
        ("x" = u32, Path, description = "Tile column"),
        ("y" = String, Path, description = "Tile row followed by .png"),
    ),
    responses(
        (status = 200, description = "PNG tile, transparent where nothing is covered"),
        (status = 400, description = "Malformed tile path", body = ErrorResponse),
        (status = 404, description = "Unknown user or leaf zoom", body = ErrorResponse),
    )
)]
async fn tile(
    State(state): State<Arc<ServerState>>,
    Path((user_id, leaf_zoom, z, x, y)): Path<(String, u8, u8, u32, String)>,
) -> Response {
    match parse_png_segment(&y) {
        Ok(y) => tile_response(&state, &user_id, leaf_zoom, TileCoordinate::new(x, y, z)),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

/// Coverage overlay for one tile at the default leaf zoom
#[utoipa::path(
    get,
    path = "/{user_id}/{z}/{x}/{y}.png",
    params(
        ("user_id" = String, Path, description = "User id"),
        ("z" = u8, Path, description = "Tile zoom"),
        ("x" = u32, Path, description = "Tile column"),
        ("y" = String, Path, description = "Tile row followed by .png"),
    ),
    responses(
        (status = 200, description = "PNG tile from leaf zoom 14, or the user's smallest leaf zoom"),
        (status = 400, description = "Malformed tile path", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse),
    )
)]
async fn legacy_tile(
    State(state): State<Arc<ServerState>>,
    Path((user_id, z, x, y)): Path<(String, u8, u32, String)>,
) -> Response {
    let y = match parse_png_segment(&y) {
        Ok(y) => y,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    // unknown users and users without levels fall through to the lookup's 404
    let leaf_zoom = state.default_leaf_zoom(&user_id).unwrap_or(LEGACY_LEAF_ZOOM);
    tile_response(&state, &user_id, leaf_zoom, TileCoordinate::new(x, y, z))
}

fn tile_response(state: &ServerState, user_id: &str, leaf_zoom: u8, tile: TileCoordinate) -> Response {
    let record = match state.registry.lookup(user_id, leaf_zoom, &tile) {
        Lookup::UnknownUser => {
            return error_response(StatusCode::NOT_FOUND, format!("User id {user_id} not found"))
        }
        Lookup::UnknownLevel { available } => {
            let available: Vec<String> = available.iter().map(u8::to_string).collect();
            return error_response(
                StatusCode::NOT_FOUND,
                format!(
                    "Leaf zoom {leaf_zoom} not cached for user {user_id}; available: [{}]",
                    available.join(", ")
                ),
            );
        }
        Lookup::Found(record) => record,
    };

    let image = render_record(record, tile.zoom, leaf_zoom);
    match encode_png(&image) {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => {
            error!(user = user_id, %tile, error = %e, "failed to encode tile");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Parse a `<row>.png` path segment
fn parse_png_segment(segment: &str) -> Result<u32, String> {
    segment
        .strip_suffix(".png")
        .and_then(|row| row.parse().ok())
        .ok_or_else(|| format!("Invalid tile row: {segment}. Expected <int>.png"))
}

// ============ Users Endpoint ============

#[derive(Debug, Serialize, ToSchema)]
pub struct UserEntry {
    pub user_id: String,
    pub leaf_zooms: Vec<u8>,
    /// Tile URL template per leaf zoom
    pub tile_urls: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsersResponse {
    pub users: Vec<UserEntry>,
}

/// List users with a loaded cache
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Loaded users", body = UsersResponse),
    )
)]
async fn users(State(state): State<Arc<ServerState>>) -> Json<UsersResponse> {
    let users = state
        .registry
        .users()
        .map(|(user_id, cache)| {
            let leaf_zooms = cache.leaf_zooms();
            let tile_urls = leaf_zooms
                .iter()
                .map(|leaf| format!("/{user_id}/{leaf}/{{z}}/{{x}}/{{y}}.png"))
                .collect();
            UserEntry {
                user_id: user_id.to_string(),
                leaf_zooms,
                tile_urls,
            }
        })
        .collect();
    Json(UsersResponse { users })
}

// ============ Health Endpoint ============

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub users: usize,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse),
    )
)]
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        users: state.registry.len(),
    })
}
