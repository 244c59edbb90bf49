//! HTTP endpoints for sillage.
//!
//! Write endpoints (`/api/position`, `/api/position_simple`,
//! `/api/reset-track`) go through the [`TokenGuard`]. Reads, media uploads
//! and `/uploads/*` are open.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, Query,
        State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::TokenGuard;
use crate::error::ApiError;
use crate::media::{MediaRecord, MediaStore, NewMedia, UPLOADS_PREFIX};
use crate::positions::{self, default_track_id, NewPosition, PositionStore, TrackPoint};

/// Default request body limit for media uploads.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub positions: Arc<RwLock<PositionStore>>,
    pub media: Arc<MediaStore>,
    pub guard: TokenGuard,
    pub max_upload_bytes: usize,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(guard: TokenGuard, positions: PositionStore, media: MediaStore) -> Self {
        Self {
            positions: Arc::new(RwLock::new(positions)),
            media: Arc::new(media),
            guard,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            start_time: Instant::now(),
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.media.upload_dir());
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(serve_root))
        .route("/health", get(handle_health))
        .route("/api/position", post(add_position))
        .route("/api/position_simple", get(add_position_simple))
        .route("/api/live-track", get(live_track))
        .route("/api/reset-track", post(reset_track))
        .route(
            "/api/media",
            get(list_media).post(upload_media).layer(upload_limit),
        )
        .nest_service(UPLOADS_PREFIX, uploads)
        .fallback(not_found)
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct WriteAck {
    status: &'static str,
    count: usize,
}

#[derive(Debug, Serialize)]
struct LiveTrack {
    track_id: String,
    points: Vec<TrackPoint>,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackQuery {
    #[serde(default = "default_track_id")]
    track_id: String,
    token: Option<String>,
}

/// Everything arrives as text so bad numbers get a field-level error.
#[derive(Debug, Deserialize)]
struct SimplePositionQuery {
    lat: Option<String>,
    lng: Option<String>,
    #[serde(default = "default_track_id")]
    track_id: String,
    token: Option<String>,
}

/// Serve root discovery endpoint
async fn serve_root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "sillage",
        "version": env!("CARGO_PKG_VERSION"),
        "links": {
            "position": "/api/position",
            "position_simple": "/api/position_simple",
            "live_track": "/api/live-track",
            "reset_track": "/api/reset-track",
            "media": "/api/media",
            "uploads": UPLOADS_PREFIX,
            "health": "/health",
        }
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let (positions, capacity) = {
        let store = state.positions.read().await;
        (store.len(), store.capacity())
    };

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "positions": positions,
        "position_capacity": capacity,
        "media": state.media.count().await,
        "auth": state.guard.is_enabled(),
    }))
}

/// Position pushed by the boat as a JSON body.
///
/// The body is validated before the token is checked, so a malformed body
/// is a 422 whatever the credentials.
async fn add_position(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    body: Result<Json<NewPosition>, JsonRejection>,
) -> Result<Json<WriteAck>, ApiError> {
    let Json(position) =
        body.map_err(|rejection| ApiError::validation("body", rejection.body_text()))?;
    state.guard.check_request(&headers, query.token.as_deref())?;
    let track_id = position.track_id.clone();
    let count = state.positions.write().await.append(position);
    info!(%track_id, count, "position recorded");

    Ok(Json(WriteAck { status: "ok", count }))
}

/// Same as [`add_position`], for trackers that can only issue GET requests.
async fn add_position_simple(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SimplePositionQuery>,
) -> Result<Json<WriteAck>, ApiError> {
    let lat = parse_coordinate("lat", query.lat.as_deref())?;
    let lng = parse_coordinate("lng", query.lng.as_deref())?;
    state.guard.check_request(&headers, query.token.as_deref())?;
    let position = NewPosition::new(lat, lng, query.track_id.clone());
    let count = state.positions.write().await.append(position);
    info!(track_id = %query.track_id, count, "position recorded (simple)");

    Ok(Json(WriteAck { status: "ok", count }))
}

async fn live_track(
    State(state): State<AppState>,
    Query(query): Query<TrackQuery>,
) -> Json<LiveTrack> {
    let points = state
        .positions
        .read()
        .await
        .query(&query.track_id)
        .iter()
        .map(TrackPoint::from)
        .collect();

    Json(LiveTrack {
        track_id: query.track_id,
        points,
    })
}

async fn reset_track(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TrackQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.guard.check_request(&headers, query.token.as_deref())?;

    let removed = state.positions.write().await.reset(&query.track_id);
    info!(track_id = %query.track_id, removed, "track cleared");

    Ok(Json(serde_json::json!({ "status": "cleared" })))
}

async fn list_media(State(state): State<AppState>) -> Json<Vec<MediaRecord>> {
    let media = state.media.list().await;
    info!(count = media.len(), "media listed");
    Json(media)
}

async fn upload_media(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MediaRecord>, ApiError> {
    let mut file: Option<(Option<String>, Option<String>, Vec<u8>)> = None;
    let mut title = String::new();
    let mut description = String::new();
    let mut track_id = String::new();
    let mut lat: Option<String> = None;
    let mut lng: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("body", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(|e| multipart_error("file", e))?;
                file = Some((filename, content_type, bytes.to_vec()));
            }
            "title" => title = field.text().await.map_err(|e| multipart_error("title", e))?,
            "description" => {
                description = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("description", e))?
            }
            "trackId" => {
                track_id = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("trackId", e))?
            }
            "lat" => lat = Some(field.text().await.map_err(|e| multipart_error("lat", e))?),
            "lng" => lng = Some(field.text().await.map_err(|e| multipart_error("lng", e))?),
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| ApiError::validation("file", "field required"))?;
    let filename = filename.ok_or_else(|| ApiError::validation("file", "missing filename"))?;
    let lat = parse_coordinate("lat", lat.as_deref())?;
    let lng = parse_coordinate("lng", lng.as_deref())?;

    info!(
        %title,
        %description,
        %track_id,
        lat,
        lng,
        %filename,
        content_type = ?content_type,
        bytes = bytes.len(),
        "media payload"
    );

    let record = state
        .media
        .create(NewMedia {
            filename,
            bytes,
            title,
            description,
            track_id,
            lat,
            lng,
            content_type,
        })
        .await?;

    Ok(Json(record))
}

fn parse_coordinate(field: &str, raw: Option<&str>) -> Result<f64, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::validation(field, "field required"))?;
    positions::parse_coordinate(raw)
        .ok_or_else(|| ApiError::validation(field, format!("not a valid number: {raw:?}")))
}

fn multipart_error(field: &str, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(%field, "upload exceeds body limit");
        return ApiError::TooLarge(err.body_text());
    }
    ApiError::validation(field, err.body_text())
}
