//! Request logging middleware

use super::super::state::ServerState;
use crate::server::metrics::{categorize_endpoint, record_http_request};
use axum::extract::State;
use axum::{
    body::{Body, Bytes},
    http::{header::HeaderMap, Request, Response, StatusCode},
    middleware::Next,
};
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

fn content_length(headers: &HeaderMap) -> Result<usize, &'static str> {
    headers
        .get("content-length")
        .ok_or("Content-length not set.")?
        .to_str()
        .map_err(|_| "Could not get Content-length string value.")?
        .parse::<usize>()
        .map_err(|_| "Could not parse Content-length numeric value.")
}

fn log_headers(label: &str, headers: &HeaderMap) {
    info!("  {} Headers:", label);
    for (name, value) in headers.iter() {
        info!("    {:?}: {:?}", name, value);
    }
}

/// Logs a small body and hands back a replayable copy of it. `None` when
/// the body could not be read.
async fn log_body(label: &str, headers: &HeaderMap, body: Body) -> Option<Body> {
    match content_length(headers) {
        Err(reason) => {
            info!("  {} Body: {}", label, reason);
            Some(body)
        }
        Ok(size) if size >= MAX_LOGGABLE_BODY_LENGTH => {
            info!(
                "  {} Body: Too big to log ({:#})",
                label,
                byte_unit::Byte::from(size)
            );
            Some(body)
        }
        Ok(size) => match axum::body::to_bytes(body, size).await {
            Ok(bytes) => {
                info!("  {} Body:\n{}", label, String::from_utf8_lossy(&bytes));
                Some(Body::from(bytes))
            }
            Err(err) => {
                error!("Failed to read {} body: {:?}", label, err);
                None
            }
        },
    }
}

fn internal_error() -> Response<Body> {
    let mut response = Response::new(Body::from(Bytes::from_static(b"Internal Server Error")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

pub async fn log_requests(
    State(state): State<ServerState>,
    mut request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let level = state.config.requests_logging_level.clone();
    let start = Instant::now();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", method, request.uri());
    }
    if level >= RequestsLoggingLevel::Headers {
        log_headers("Req", request.headers());
    }
    if level >= RequestsLoggingLevel::Body {
        let (parts, body) = request.into_parts();
        match log_body("Req", &parts.headers, body).await {
            Some(body) => request = Request::from_parts(parts, body),
            None => return internal_error(),
        }
    }

    let mut response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Resp", response.headers());
    }
    if level >= RequestsLoggingLevel::Body {
        let (parts, body) = response.into_parts();
        match log_body("Resp", &parts.headers, body).await {
            Some(body) => response = Response::from_parts(parts, body),
            None => return internal_error(),
        }
    }

    let status = response.status().as_u16();
    let duration = start.elapsed();
    if level > RequestsLoggingLevel::None {
        info!("<<< {} ({}ms)", status, duration.as_millis());
    }

    record_http_request(&method, categorize_endpoint(&path), status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn level_ordering() {
        assert!(RequestsLoggingLevel::None < RequestsLoggingLevel::Headers);
        assert!(RequestsLoggingLevel::Body > RequestsLoggingLevel::Path);
        assert_eq!(RequestsLoggingLevel::default(), RequestsLoggingLevel::Path);
    }

    #[test]
    fn content_length_reports_why_it_is_unavailable() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), Err("Content-length not set."));

        headers.insert("content-length", HeaderValue::from_static("abc"));
        assert!(content_length(&headers).is_err());

        headers.insert("content-length", HeaderValue::from_static("42"));
        assert_eq!(content_length(&headers), Ok(42));
    }
}
