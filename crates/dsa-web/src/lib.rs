//! JSON API over the problem store: listings, URL search, ingestion trigger
//! and database introspection.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use dsa_core::{identify_problem_url, Platform, ProblemRecord};
use dsa_storage::{ProblemStore, SqliteProblemStore, StoreError, StoreStats};
use dsa_sync::{IngestConfig, IngestPipeline};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

pub const CRATE_NAME: &str = "dsa-web";

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid or missing API key")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(err) => {
                error!(error = %err, "store failure while serving request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(json!({ "status": "error", "message": self.to_string() })),
        )
            .into_response()
    }
}

struct CachedListing {
    stored_at: Instant,
    problems: Arc<Vec<ProblemRecord>>,
}

/// Listing responses keyed by platform filter (`None` = all platforms).
struct ListingCache {
    ttl: Duration,
    entries: RwLock<HashMap<Option<Platform>, CachedListing>>,
}

impl ListingCache {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, key: Option<Platform>) -> Option<Arc<Vec<ProblemRecord>>> {
        let entries = self.entries.read().await;
        entries
            .get(&key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.problems.clone())
    }

    async fn put(&self, key: Option<Platform>, problems: Arc<Vec<ProblemRecord>>) {
        self.entries.write().await.insert(
            key,
            CachedListing {
                stored_at: Instant::now(),
                problems,
            },
        );
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

pub struct AppState {
    pipeline: IngestPipeline,
    api_key: Option<String>,
    cache: ListingCache,
    scrape_lock: Mutex<()>,
}

impl AppState {
    /// `api_key = None` locks every protected endpoint.
    pub fn new(pipeline: IngestPipeline, api_key: Option<String>, cache_ttl: Duration) -> Self {
        Self {
            pipeline,
            api_key,
            cache: ListingCache::new(cache_ttl),
            scrape_lock: Mutex::new(()),
        }
    }

    fn store(&self) -> &dyn ProblemStore {
        self.pipeline.store().as_ref()
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let presented = headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        match (&self.api_key, presented) {
            (Some(expected), Some(given)) if expected == given => Ok(()),
            _ => {
                warn!("rejected request with invalid or missing API key");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ProblemsResponse<'a> {
    status: &'static str,
    count: usize,
    problems: &'a [ProblemRecord],
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct DbInfo {
    #[serde(flatten)]
    stats: StoreStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<DateTime<Utc>>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/db-info", get(db_info_handler))
        .route("/problems", get(problems_handler))
        .route("/problems/{platform}", get(platform_problems_handler))
        .route("/search", post(search_handler))
        .route("/scrape", post(scrape_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(config: &IngestConfig) -> anyhow::Result<()> {
    let store = SqliteProblemStore::connect(&config.database_url).await?;
    let pipeline = IngestPipeline::from_config(config, Arc::new(store)).await?;
    if config.internal_api_key.is_none() {
        warn!("INTERNAL_API_KEY is not set; protected endpoints will reject every request");
    }
    let state = AppState::new(
        pipeline,
        config.internal_api_key.clone(),
        Duration::from_secs(config.cache_ttl_secs),
    );

    let listener = TcpListener::bind(("0.0.0.0", config.web_port)).await?;
    info!(port = config.web_port, "api listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(&IngestConfig::from_env()).await
}

async fn index_handler() -> Json<Value> {
    Json(json!({ "message": "DSA Problems Scraper API" }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database_up = match state.store().ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "health check could not reach the database");
            false
        }
    };
    let (status, database) = if database_up {
        ("healthy", "up")
    } else {
        ("unhealthy", "down")
    };
    Json(json!({
        "status": status,
        "timestamp": Utc::now(),
        "components": {
            "application": "up",
            "database": database,
        }
    }))
}

async fn db_info_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    state.authorize(&headers)?;
    let stats = state.store().stats().await?;

    let metadata = match state.store().database_path() {
        Some(path) => tokio::fs::metadata(path).await.ok(),
        None => None,
    };
    let size_bytes = metadata.as_ref().map(|m| m.len());
    let info = DbInfo {
        stats,
        size_bytes,
        size_mb: size_bytes.map(|bytes| (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0),
        last_modified: metadata
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from),
    };
    Ok(Json(json!({ "status": "success", "data": info })))
}

async fn problems_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    listing_response(&state, None).await
}

async fn platform_problems_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(platform): AxumPath<String>,
) -> Result<Response, ApiError> {
    let platform = Platform::from_str(&platform)
        .map_err(|_| ApiError::BadRequest(format!("Unsupported platform: {platform}")))?;
    listing_response(&state, Some(platform)).await
}

async fn listing_response(state: &AppState, platform: Option<Platform>) -> Result<Response, ApiError> {
    let problems = match state.cache.get(platform).await {
        Some(problems) => problems,
        None => {
            let problems = Arc::new(state.store().list_problems(platform).await?);
            state.cache.put(platform, problems.clone()).await;
            problems
        }
    };
    Ok(Json(ProblemsResponse {
        status: "success",
        count: problems.len(),
        problems: &problems,
    })
    .into_response())
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    state.authorize(&headers)?;
    let request: SearchRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Request body must be JSON".to_string()))?;
    let url = request
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("URL is required".to_string()))?;

    let identifier = identify_problem_url(&url)
        .ok_or_else(|| ApiError::NotFound("Could not identify a problem from that URL".to_string()))?;
    let canonical = identifier
        .canonical_url()
        .ok_or_else(|| ApiError::NotFound("Could not identify a problem from that URL".to_string()))?;

    let problem = state
        .store()
        .find_by_url(identifier.platform, &canonical)
        .await?
        .ok_or_else(|| ApiError::NotFound("Problem not found".to_string()))?;
    Ok(Json(json!({ "status": "success", "problem": problem })))
}

async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    state.authorize(&headers)?;
    let _running = state.scrape_lock.lock().await;

    state.cache.clear().await;
    let report = state.pipeline.ingest_all().await;
    // listings read while the run was in flight may predate its commits
    state.cache.clear().await;
    info!(run_id = %report.run_id, "scrape request finished");
    Ok(Json(json!({
        "status": "success",
        "message": "Scraping completed successfully",
        "run_id": report.run_id,
        "results": report.platforms,
    })))
}
