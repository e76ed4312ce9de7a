use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use server_api::{
    create_cmdb_item, create_incident, create_service_request, dashboard_stats, list_cmdb_items,
    list_incidents, list_service_requests, ApiContext,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::DataEnvelope,
};
use storage::Storage;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    max_body_bytes: usize,
}

/// Query-routed deployments address resources as `/?path=/incidents`.
#[derive(Debug, Deserialize)]
struct RouteQuery {
    path: Option<String>,
}

type ApiResult = Result<Response, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
        max_body_bytes: settings.max_body_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "service desk api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]);
    let body_limit = RequestBodyLimitLayer::new(state.max_body_bytes);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(query_routed_get).post(query_routed_post))
        .route("/incidents", get(http_list_incidents).post(http_create_incident))
        .route("/requests", get(http_list_requests).post(http_create_request))
        .route("/cmdb", get(http_list_cmdb).post(http_create_cmdb_item))
        .route("/stats", get(http_stats))
        .fallback(not_found)
        .layer(body_limit)
        .layer(cors)
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.api.storage.health_check().await.map_err(|error| {
        warn!(%error, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

async fn not_found() -> (StatusCode, Json<ApiError>) {
    reject(ApiError::new(ErrorCode::NotFound, "Endpoint not found"))
}

async fn query_routed_get(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RouteQuery>,
) -> ApiResult {
    match q.path.as_deref().unwrap_or("/") {
        "/incidents" => http_list_incidents(State(state)).await,
        "/requests" => http_list_requests(State(state)).await,
        "/cmdb" => http_list_cmdb(State(state)).await,
        "/stats" => http_stats(State(state)).await,
        _ => Err(not_found().await),
    }
}

async fn query_routed_post(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RouteQuery>,
    body: Bytes,
) -> ApiResult {
    match q.path.as_deref().unwrap_or("/") {
        "/incidents" => http_create_incident(State(state), body).await,
        "/requests" => http_create_request(State(state), body).await,
        "/cmdb" => http_create_cmdb_item(State(state), body).await,
        _ => Err(not_found().await),
    }
}

async fn http_list_incidents(State(state): State<Arc<AppState>>) -> ApiResult {
    let incidents = list_incidents(&state.api).await.map_err(reject)?;
    Ok(data(StatusCode::OK, incidents))
}

async fn http_create_incident(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let req = parse_body(&body)?;
    let created = create_incident(&state.api, req).await.map_err(reject)?;
    Ok(data(StatusCode::CREATED, created))
}

async fn http_list_requests(State(state): State<Arc<AppState>>) -> ApiResult {
    let requests = list_service_requests(&state.api).await.map_err(reject)?;
    Ok(data(StatusCode::OK, requests))
}

async fn http_create_request(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let req = parse_body(&body)?;
    let created = create_service_request(&state.api, req)
        .await
        .map_err(reject)?;
    Ok(data(StatusCode::CREATED, created))
}

async fn http_list_cmdb(State(state): State<Arc<AppState>>) -> ApiResult {
    let items = list_cmdb_items(&state.api).await.map_err(reject)?;
    Ok(data(StatusCode::OK, items))
}

async fn http_create_cmdb_item(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let req = parse_body(&body)?;
    let created = create_cmdb_item(&state.api, req).await.map_err(reject)?;
    Ok(data(StatusCode::CREATED, created))
}

async fn http_stats(State(state): State<Arc<AppState>>) -> ApiResult {
    let stats = dashboard_stats(&state.api).await.map_err(reject)?;
    Ok(data(StatusCode::OK, stats))
}

fn data<T: Serialize>(status: StatusCode, payload: T) -> Response {
    (status, Json(DataEnvelope::new(payload))).into_response()
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, (StatusCode, Json<ApiError>)> {
    serde_json::from_slice(body)
        .map_err(|e| reject(ApiError::validation(format!("invalid request body: {e}"))))
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => {
            error!(message = %err.message, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
