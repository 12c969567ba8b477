//! HTTP tile server for the browser map.
//!
//! Serves pyramid tiles from the active slice and accepts the map's area
//! selection, captures and snapshot switches.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tilesnap::area::{Area, ChunkCoord};
use tilesnap::cache::CacheStats;
use tilesnap::compositor::{RenderError, TileKey};
use tilesnap::download::Downloader;
use tilesnap::provider::ChunkSource;
use tilesnap::service::{ActiveSlice, ServiceError, TileService};
use tilesnap::snapshot::{SliceDate, SliceOptions, StoreError};

/// Shared state of the tile server.
pub struct AppState<P: ChunkSource> {
    pub service: Arc<TileService>,
    pub downloader: Downloader<P>,
    pub options: SliceOptions,
    /// `Cache-Control` value for tile responses
    pub cache_control: Option<HeaderValue>,
}

impl<P: ChunkSource> AppState<P> {
    pub fn new(service: Arc<TileService>, downloader: Downloader<P>, options: SliceOptions) -> Self {
        Self {
            service,
            downloader,
            options,
            cache_control: None,
        }
    }

    /// Adds a `Cache-Control` header to every tile. Invalid values are ignored.
    pub fn with_cache_control(mut self, value: Option<String>) -> Self {
        self.cache_control = value.and_then(|v| match HeaderValue::from_str(&v) {
            Ok(header) => Some(header),
            Err(_) => {
                warn!(value = %v, "Ignoring invalid Cache-Control value");
                None
            }
        });
        self
    }
}

/// Create the router with all routes.
pub fn create_router<P: ChunkSource + 'static>(state: Arc<AppState<P>>) -> Router {
    Router::new()
        .route("/tiles/{z}/{x}/{y}", get(get_tile::<P>))
        .route("/points", post(select_rectangle::<P>))
        .route("/polygon", post(select_polygon::<P>))
        .route("/selection", get(get_selection::<P>))
        .route("/snapshot", post(create_snapshot::<P>))
        .route("/load", post(load_snapshot::<P>))
        .route("/current", get(get_current::<P>))
        .route("/stats", get(get_stats::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `port` on all interfaces and serve until Ctrl+C.
pub async fn serve<P: ChunkSource + 'static>(
    state: Arc<AppState<P>>,
    port: u16,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Tile server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down tile server");
            }
        })
        .await
}

// =============================================================================
// Errors
// =============================================================================

/// JSON error response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match &err {
            ServiceError::Render(RenderError::InvalidZoom(_))
            | ServiceError::Store(StoreError::NoArea)
            | ServiceError::Store(StoreError::InvalidName(_))
            | ServiceError::Store(StoreError::InvalidDate(_)) => Self::bad_request(err.to_string()),
            _ if err.is_not_found() => Self::not_found(err.to_string()),
            _ => {
                error!(error = %err, "Request failed");
                Self::internal("Internal error").with_details(err.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ServiceError::Store(err).into()
    }
}

// =============================================================================
// Request and response bodies
// =============================================================================

/// Rectangle corners in chunk coordinates, as sent by the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsRequest {
    pub tile_x0: i32,
    pub tile_y0: i32,
    pub tile_x1: i32,
    pub tile_y1: i32,
}

#[derive(Serialize)]
struct PointsResponse {
    status: &'static str,
    received: PointsRequest,
}

#[derive(Debug, Deserialize)]
pub struct PolygonRequest {
    pub points: Vec<[i32; 2]>,
}

#[derive(Serialize)]
struct PolygonResponse {
    status: &'static str,
    vertices: usize,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    /// Defaults to the active snapshot
    #[serde(default)]
    pub name: Option<String>,
    /// Switch to the new change once it is saved
    #[serde(default)]
    pub switch: bool,
}

#[derive(Serialize)]
struct SnapshotResponse {
    name: String,
    date: String,
    written: usize,
    failed: usize,
    bytes: u64,
    switched: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    pub name: String,
    /// Load the earliest change at or after this date instead of the latest
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Serialize)]
struct CurrentResponse {
    name: String,
    date: String,
    path: String,
}

impl From<ActiveSlice> for CurrentResponse {
    fn from(slice: ActiveSlice) -> Self {
        Self {
            name: slice.name,
            date: slice.date.formatted(),
            path: slice.dir.display().to_string(),
        }
    }
}

#[derive(Serialize)]
struct CacheStatsBody {
    entries: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    hit_rate: f64,
}

impl From<CacheStats> for CacheStatsBody {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            entries: stats.entries,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
        }
    }
}

#[derive(Serialize)]
struct StatsResponse {
    tiles: CacheStatsBody,
    chunks: CacheStatsBody,
    queued_renders: usize,
}

// =============================================================================
// Handlers
// =============================================================================

async fn get_tile<P: ChunkSource>(
    State(state): State<Arc<AppState<P>>>,
    Path((z, x, y)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let tile = parse_tile(&z, &x, &y)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid tile {}/{}/{}", z, x, y)))?;
    let bytes = state.service.tile(tile).await?;

    let mut response = Response::new(Body::from(bytes.as_ref().clone()));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    if let Some(value) = &state.cache_control {
        headers.insert(header::CACHE_CONTROL, value.clone());
    }
    Ok(response)
}

/// Parses tile path segments; `y` may carry a `.png` suffix.
fn parse_tile(z: &str, x: &str, y: &str) -> Option<TileKey> {
    let y = y.strip_suffix(".png").unwrap_or(y);
    Some(TileKey::new(z.parse().ok()?, x.parse().ok()?, y.parse().ok()?))
}

async fn select_rectangle<P: ChunkSource>(
    State(state): State<Arc<AppState<P>>>,
    Json(body): Json<PointsRequest>,
) -> Json<impl Serialize> {
    state.service.set_selection(Area::rectangle(
        ChunkCoord::new(body.tile_x0, body.tile_y0),
        ChunkCoord::new(body.tile_x1, body.tile_y1),
    ));
    Json(PointsResponse {
        status: "ok",
        received: body,
    })
}

async fn select_polygon<P: ChunkSource>(
    State(state): State<Arc<AppState<P>>>,
    Json(body): Json<PolygonRequest>,
) -> Result<Json<impl Serialize>, ApiError> {
    if body.points.len() < 3 {
        return Err(ApiError::bad_request("A polygon needs at least three points"));
    }
    let vertices = body.points.len();
    state
        .service
        .set_selection(Area::polygon(
            body.points.into_iter().map(|[x, y]| ChunkCoord::new(x, y)),
        ));
    Ok(Json(PolygonResponse {
        status: "ok",
        vertices,
    }))
}

async fn get_selection<P: ChunkSource>(State(state): State<Arc<AppState<P>>>) -> Json<Area> {
    Json(state.service.selection())
}

async fn create_snapshot<P: ChunkSource>(
    State(state): State<Arc<AppState<P>>>,
    Json(body): Json<SnapshotRequest>,
) -> Result<Json<impl Serialize>, ApiError> {
    let name = match body.name {
        Some(name) => name,
        None => state
            .service
            .active()
            .await
            .map(|slice| slice.name)
            .ok_or_else(|| ApiError::bad_request("No snapshot name given and none is loaded"))?,
    };

    let report = state
        .service
        .capture(&state.downloader, &name, state.options, body.switch)
        .await?;

    let quota_name = name.clone();
    let plan = state
        .service
        .store()
        .run_blocking(move |store| store.enforce_quota(&quota_name, 0))
        .await?;
    if !plan.is_empty() {
        warn!(
            snapshot = %name,
            quota_bytes = plan.quota_bytes,
            projected_bytes = plan.projected_bytes,
            victims = plan.victims.len(),
            "Snapshot over quota, run `tilesnap limit` to free space"
        );
    }

    Ok(Json(SnapshotResponse {
        name: report.name,
        date: report.date.formatted(),
        written: report.written,
        failed: report.failed,
        bytes: report.bytes,
        switched: body.switch,
    }))
}

async fn load_snapshot<P: ChunkSource>(
    State(state): State<Arc<AppState<P>>>,
    Json(body): Json<LoadRequest>,
) -> Result<Json<impl Serialize>, ApiError> {
    let after = body.after.as_deref().map(SliceDate::parse_loose).transpose()?;
    let slice = state.service.load(&body.name, after).await?;
    Ok(Json(CurrentResponse::from(slice)))
}

async fn get_current<P: ChunkSource>(
    State(state): State<Arc<AppState<P>>>,
) -> Result<Json<impl Serialize>, ApiError> {
    let slice = state
        .service
        .active()
        .await
        .ok_or_else(|| ApiError::not_found("No snapshot loaded"))?;
    Ok(Json(CurrentResponse::from(slice)))
}

async fn get_stats<P: ChunkSource>(State(state): State<Arc<AppState<P>>>) -> Json<impl Serialize> {
    let (tiles, chunks) = state.service.cache_stats();
    Json(StatsResponse {
        tiles: tiles.into(),
        chunks: chunks.into(),
        queued_renders: state.service.scheduler().queued(),
    })
}
