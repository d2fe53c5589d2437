use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

const PREFIX: &str = "dj";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    /// Outcome is one of `hit`, `populated`, `degraded`, `failed`.
    pub static ref ASSET_CACHE_RESOLUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_asset_cache_resolutions_total"),
            "Asset cache resolutions by outcome"
        ),
        &["kind", "outcome"]
    ).expect("Failed to create asset_cache_resolutions_total metric");

    pub static ref ASSET_TRANSFORM_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_asset_transform_duration_seconds"),
            "Image transform duration in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["kind"]
    ).expect("Failed to create asset_transform_duration_seconds metric");

    pub static ref HISTORY_RESETS_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_history_resets_total"),
        "Listening history resets after a client exhausted the catalog"
    ).expect("Failed to create history_resets_total metric");

    pub static ref CATALOG_ITEMS_TOTAL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_catalog_items_total"), "Total items in catalog"),
        &["type"]
    ).expect("Failed to create catalog_items_total metric");
}

/// Registers every metric. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ASSET_CACHE_RESOLUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ASSET_TRANSFORM_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(HISTORY_RESETS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_ITEMS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn init_catalog_metrics(num_albums: usize, num_tracks: usize) {
    CATALOG_ITEMS_TOTAL
        .with_label_values(&["album"])
        .set(num_albums as f64);
    CATALOG_ITEMS_TOTAL
        .with_label_values(&["track"])
        .set(num_tracks as f64);

    tracing::info!(
        "Catalog metrics initialized: {} albums, {} tracks",
        num_albums,
        num_tracks
    );
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_asset_resolution(kind: &str, outcome: &str) {
    ASSET_CACHE_RESOLUTIONS_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
}

pub fn record_asset_transform(kind: &str, duration: Duration) {
    ASSET_TRANSFORM_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

pub fn record_history_reset() {
    HISTORY_RESETS_TOTAL.inc();
}

/// Collapses ids out of request paths so label cardinality stays bounded.
pub fn categorize_endpoint(path: &str) -> &'static str {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        [""] => "/",
        ["health"] => "/health",
        ["albums"] => "/albums",
        ["track", "random"] => "/track/random",
        ["track", "album", _] => "/track/album/{id}",
        ["track", _] => "/track/{id}",
        ["artist", "photo"] => "/artist/photo",
        ["artists-albums"] => "/artists-albums",
        ["search"] => "/search",
        _ => "other",
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}
