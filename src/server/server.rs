use anyhow::Result;
use std::time::Duration;

use tracing::{error, info, warn};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::{http_cache, log_requests, metrics, state::*, ServerConfig};
use crate::asset_cache::ResolveError;
use crate::catalog_store::{page_offset, Album, MAX_PAGE_SIZE};
use crate::playback::PlaybackError;
use crate::sampler::SampleError;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    format!(
        "{}d {:02}:{:02}:{:02}",
        total_seconds / 86_400,
        (total_seconds % 86_400) / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60
    )
}

/// Error returned by handlers, rendered as a plain text body.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Playback(PlaybackError),
    Internal(anyhow::Error),
}

impl From<PlaybackError> for ApiError {
    fn from(err: PlaybackError) -> Self {
        ApiError::Playback(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Playback(err) => match err {
                PlaybackError::NotFound(what) => {
                    (StatusCode::NOT_FOUND, format!("{} not found", what))
                }
                PlaybackError::Sample(SampleError::CatalogExhausted) => {
                    (StatusCode::BAD_REQUEST, "No tracks found".to_string())
                }
                PlaybackError::Resolve(ResolveError::NotFound(what)) => {
                    (StatusCode::NOT_FOUND, format!("{} not found", what))
                }
                PlaybackError::Resolve(ResolveError::UpstreamUnavailable(reason)) => {
                    warn!("Upstream unavailable: {}", reason);
                    (StatusCode::BAD_GATEWAY, format!("Upstream unavailable: {}", reason))
                }
                other => {
                    error!("Request failed: {}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
                }
            },
            ApiError::Internal(err) => {
                error!("Request failed: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
            }
        };
        (status, message).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn check_page(page: usize, per_page: usize) -> ApiResult<()> {
    if per_page > MAX_PAGE_SIZE {
        return Err(ApiError::BadRequest(format!(
            "Page size must be at most {}",
            MAX_PAGE_SIZE
        )));
    }
    match page_offset(page, per_page) {
        Some(_) => Ok(()),
        None => Err(ApiError::BadRequest("Page is out of range".to_string())),
    }
}

fn parse_positive(name: &str, value: &str) -> ApiResult<usize> {
    match value.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ApiError::BadRequest(format!(
            "{} must be a positive integer",
            name
        ))),
    }
}

async fn home() -> &'static str {
    "OK"
}

async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    })
}

#[derive(Deserialize, Debug)]
struct AlbumsQuery {
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Serialize)]
struct AlbumsResponse {
    albums: Vec<Album>,
    total: usize,
}

async fn get_albums(
    State(catalog): State<GuardedCatalogStore>,
    Query(query): Query<AlbumsQuery>,
) -> ApiResult<Json<AlbumsResponse>> {
    let (page, limit) = match (query.page.as_deref(), query.limit.as_deref()) {
        (Some(page), Some(limit)) if !page.is_empty() && !limit.is_empty() => {
            (parse_positive("page", page)?, parse_positive("limit", limit)?)
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Page and limit are required".to_string(),
            ))
        }
    };
    check_page(page, limit)?;
    let (albums, total) = catalog.list_albums(page, limit)?;
    Ok(Json(AlbumsResponse { albums, total }))
}

async fn get_album_tracks(
    State(playback): State<GuardedPlaybackService>,
    Path(album_id): Path<String>,
) -> ApiResult<Response> {
    Ok(Json(playback.album_with_tracks(&album_id).await?).into_response())
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RandomTrackBody {
    #[serde(default)]
    anon_id: String,
}

async fn post_random_track(
    State(playback): State<GuardedPlaybackService>,
    Json(body): Json<RandomTrackBody>,
) -> ApiResult<Response> {
    if body.anon_id.is_empty() {
        return Err(ApiError::BadRequest("anonId is required".to_string()));
    }
    Ok(Json(playback.select_next(&body.anon_id).await?).into_response())
}

async fn get_track(
    State(playback): State<GuardedPlaybackService>,
    Path(track_id): Path<String>,
) -> ApiResult<Response> {
    Ok(Json(playback.track_by_id(&track_id).await?).into_response())
}

#[derive(Deserialize, Debug)]
struct ArtistPhotoQuery {
    #[serde(default)]
    name: String,
}

async fn get_artist_photo(
    State(playback): State<GuardedPlaybackService>,
    Query(query): Query<ArtistPhotoQuery>,
) -> ApiResult<Response> {
    if query.name.is_empty() {
        return Err(ApiError::BadRequest("Artist name is required".to_string()));
    }
    let photo = playback.artist_photo(&query.name).await?;
    let content_type = infer::get(&photo)
        .map(|kind| kind.mime_type())
        .unwrap_or("image/jpeg");
    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        photo,
    )
        .into_response())
}

#[derive(Deserialize, Debug)]
struct ArtistsAlbumsQuery {
    paged: Option<String>,
    page: Option<String>,
    per_page: Option<String>,
}

/// `paged=true` pages through every artist, `paged=false` takes a JSON
/// array of album ids in the body.
async fn post_artists_albums(
    State(catalog): State<GuardedCatalogStore>,
    Query(query): Query<ArtistsAlbumsQuery>,
    body: Bytes,
) -> ApiResult<Response> {
    let rows = match query.paged.as_deref() {
        Some("true") => {
            let page = query
                .page
                .and_then(|p| p.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            let per_page = match query.per_page.and_then(|p| p.parse::<usize>().ok()) {
                None | Some(0) => 10,
                Some(n) => n,
            };
            check_page(page, per_page)?;
            catalog.get_artists_albums_page(page, per_page)?
        }
        Some("false") => {
            let album_ids: Vec<String> = serde_json::from_slice(&body)
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            if album_ids.is_empty() {
                return Err(ApiError::BadRequest("No album IDs provided".to_string()));
            }
            catalog.get_artists_albums_for(&album_ids)?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Pagination parameter is required".to_string(),
            ))
        }
    };
    Ok(Json(rows).into_response())
}

#[derive(Deserialize, Debug)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_album_ids(
    State(catalog): State<GuardedCatalogStore>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<String>>> {
    if query.q.is_empty() {
        return Err(ApiError::BadRequest("Query is required".to_string()));
    }
    Ok(Json(catalog.search_album_ids(&query.q)?))
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let patterns = config.allowed_origins.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            origin
                .to_str()
                .map(|origin| patterns.iter().any(|p| p.is_match(origin)))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(30))
}

pub fn make_app(state: ServerState) -> Result<Router> {
    let config = state.config.clone();

    let content_routes: Router = Router::new()
        .route("/albums", get(get_albums))
        .route("/track/album/{album_id}", get(get_album_tracks))
        .route("/track/{track_id}", get(get_track))
        .route("/artist/photo", get(get_artist_photo))
        .layer(middleware::from_fn_with_state(
            config.content_cache_age_sec,
            http_cache,
        ))
        .with_state(state.clone());

    let api_routes: Router = Router::new()
        .route("/track/random", post(post_random_track))
        .route("/artists-albums", post(post_artists_albums))
        .route("/search", get(search_album_ids))
        .with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .with_state(state.clone());

    let app = home_router
        .merge(content_routes)
        .merge(api_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
        .layer(cors_layer(&config));

    Ok(app)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;
    let app = make_app(state)?;

    let metrics_app = Router::new().route("/metrics", get(metrics::metrics_handler));
    let metrics_listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port)).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            error!("Metrics server failed: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
