// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Application state, route handlers, and router construction.
//!
//! This module is `pub` so that integration tests can build a test router directly
//! without starting the full binary.

use crate::error::FetchError;
use crate::models::fetch::{
    FetchBody, FetchQuery, FetchResponse, ScrapeQuery, ScrapeResponse, ScreenshotQuery,
};
use crate::models::version::VersionResponse;
use crate::services::orchestrator::Fetcher;
use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

/// Application version extracted from `Cargo.toml` at compile time.
/// The patch segment can be overridden via `RENDER_PATCH_VERSION` (see `build.rs`).
pub const VERSION: &str = env!("RENDER_AGENT_VERSION");

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Shared application state injected into every route handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<Fetcher>,
}

type ApiError = (StatusCode, Json<FetchResponse>);

/// HTTP status for each caller-visible failure
pub fn status_for(err: &FetchError) -> StatusCode {
    match err {
        FetchError::InvalidInput(_) | FetchError::InvalidSelector(_) => StatusCode::BAD_REQUEST,
        FetchError::RobotsBlocked(_) => StatusCode::FORBIDDEN,
        FetchError::NotFound(_) => StatusCode::NOT_FOUND,
        FetchError::Exhausted { .. } | FetchError::Capture(_) => StatusCode::BAD_GATEWAY,
    }
}

fn api_error(err: FetchError) -> ApiError {
    (status_for(&err), Json(FetchResponse::error(err.to_string())))
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub async fn healthz_handler() -> &'static str {
    "ok"
}

pub async fn version_handler() -> Json<VersionResponse> {
    Json(VersionResponse {
        agent: "render-agent".to_string(),
        version: VERSION.to_string(),
    })
}

/// Shared by both verbs of `/fetch`
async fn fetch_url(state: &AppState, url: &str) -> (StatusCode, Json<FetchResponse>) {
    match state.fetcher.fetch(url).await {
        Ok(page) => (StatusCode::OK, Json(page.into())),
        Err(e) => api_error(e),
    }
}

pub async fn fetch_get_handler(
    State(state): State<AppState>,
    Query(query): Query<FetchQuery>,
) -> (StatusCode, Json<FetchResponse>) {
    fetch_url(&state, &query.url).await
}

pub async fn fetch_post_handler(
    State(state): State<AppState>,
    Json(body): Json<FetchBody>,
) -> (StatusCode, Json<FetchResponse>) {
    fetch_url(&state, &body.url).await
}

pub async fn scrape_handler(
    State(state): State<AppState>,
    Query(query): Query<ScrapeQuery>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    state
        .fetcher
        .scrape(&query.url, &query.selector, query.wants_all())
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn screenshot_handler(
    State(state): State<AppState>,
    Query(query): Query<ScreenshotQuery>,
) -> Result<Response, ApiError> {
    let png = state
        .fetcher
        .screenshot(&query.url, query.wants_full_page())
        .await
        .map_err(api_error)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

pub async fn pdf_handler(
    State(state): State<AppState>,
    Query(query): Query<FetchQuery>,
) -> Result<Response, ApiError> {
    let pdf = state.fetcher.pdf(&query.url).await.map_err(api_error)?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], pdf).into_response())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/version", get(version_handler))
        .route("/fetch", get(fetch_get_handler).post(fetch_post_handler))
        .route("/scrape", get(scrape_handler))
        .route("/screenshot", get(screenshot_handler))
        .route("/pdf", get(pdf_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&FetchError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&FetchError::RobotsBlocked("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&FetchError::NotFound("h1".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&FetchError::Exhausted {
                local: "a".into(),
                provider: "b".into()
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_version_is_semver() {
        assert_eq!(VERSION.split('.').count(), 3);
    }
}
