//! Recipe API: accounts, recipes, tags and ingredients over HTTP.

#![forbid(unsafe_code)]
#![deny(unused_mut)]

pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod recipe;
pub mod response;
mod router;
pub mod telemetry;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    token: Option<&str>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Deserialize a JSON response body.
#[cfg(test)]
pub async fn read_body<T: serde::de::DeserializeOwned>(
    response: axum::http::Response<axum::body::Body>,
) -> T {
    use http_body_util::BodyExt;

    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub crypto: Arc<crypto::Crypto>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    let media = ServeDir::new(&state.config.media.root);

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `/users/...` routes.
        .merge(router::users::router(state.clone()))
        // `/recipe/...` routes. Authorization required.
        .merge(router::recipes::router(state.clone()))
        .with_state(state)
        // Uploaded images.
        .nest_service("/media", media)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    config: Arc<config::Configuration>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let Some(postgres) = &config.postgres else {
        return Err("missing `postgres` entry on `config.yaml` file".into());
    };

    let db = database::Database::new(
        &postgres.address,
        postgres
            .username
            .as_deref()
            .unwrap_or(database::DEFAULT_CREDENTIALS),
        postgres
            .password
            .as_deref()
            .unwrap_or(database::DEFAULT_CREDENTIALS),
        postgres
            .database
            .as_deref()
            .unwrap_or(database::DEFAULT_DATABASE_NAME),
        postgres.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
    )
    .await?;

    // execute migrations scripts on start.
    db.migrate().await?;

    let salt = std::env::var("SALT")
        .map_err(|_| "missing `SALT` environnement variable")?;
    let crypto = Arc::new(crypto::Crypto::new(config.argon2.clone(), salt)?);

    Ok(AppState { config, db, crypto })
}
