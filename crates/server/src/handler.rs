//! HTTP routes.
//!
//! `/api/og` and `/api/og-worker` are the same handler: both take arbitrary
//! query parameters, point them at the site's `/og` page and answer with the
//! PNG screenshot of it.

use axum::{
    Router,
    extract::{RawQuery, State},
    http::{
        HeaderMap, HeaderName, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, HOST},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use ogshot_client::{allowed_origin_from_host, og_target};
use url::Url;

use crate::error::WebError;
use crate::service::OgImageService;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Shared state for the routes.
#[derive(Clone)]
pub struct AppState {
    pub service: OgImageService,
    /// Fixed origin of the `/og` page; None means "the origin the request came in on".
    pub site_origin: Option<Url>,
    /// `Host` values a request-derived origin may use. Only consulted without `site_origin`.
    pub allowed_hosts: Vec<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/og", get(og_image))
        .route("/api/og-worker", get(og_image))
        .route("/healthz", get(healthz))
        .with_state(state)
}

fn resolve_origin(state: &AppState, headers: &HeaderMap) -> Result<Url, WebError> {
    if let Some(origin) = &state.site_origin {
        return Ok(origin.clone());
    }

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| WebError::BadOrigin("request has no Host header and no site_origin is configured".into()))?;
    let proto = headers.get(X_FORWARDED_PROTO).and_then(|v| v.to_str().ok());

    allowed_origin_from_host(proto, host, &state.allowed_hosts).map_err(|e| {
        tracing::warn!(host, error = %e, "rejected request origin");
        WebError::from(e)
    })
}

async fn og_image(
    State(state): State<AppState>, headers: HeaderMap, RawQuery(query): RawQuery,
) -> Result<Response, WebError> {
    let origin = resolve_origin(&state, &headers)?;
    let target = og_target(&origin, query.as_deref());
    tracing::debug!(target = %target, "og image requested");

    let outcome = state.service.image_for(&target).await.map_err(|e| {
        tracing::error!(target = %target, error = %e, "og image capture failed");
        WebError::from(e)
    })?;

    let headers = [
        (CONTENT_TYPE, "image/png".to_string()),
        (CACHE_CONTROL, format!("public, max-age={}", outcome.max_age.as_secs())),
        (ETAG, format!("\"{}\"", outcome.etag)),
        (X_CACHE, outcome.cache.as_str().to_string()),
    ];

    Ok((StatusCode::OK, headers, outcome.bytes).into_response())
}

async fn healthz() -> &'static str {
    "ok"
}
