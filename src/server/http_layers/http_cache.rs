//! Cache-Control for catalog content.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Adds `Cache-Control: max-age` to 200 responses only.
pub async fn http_cache(
    State(max_age_sec): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if response.status() == StatusCode::OK {
        if let Ok(value) = HeaderValue::from_str(&format!("max-age={}", max_age_sec)) {
            response.headers_mut().insert(header::CACHE_CONTROL, value);
        }
    }
    response
}
