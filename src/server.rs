//! JSON HTTP server for the rules assistant and character workshop.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/chapters` | Chapter map and routing keywords |
//! | `POST` | `/route` | Which chapter a query routes to |
//! | `POST` | `/search` | Similarity search, optionally scoped to a chapter |
//! | `POST` | `/query` | Full knowledge query (answer, sources, tokens) |
//! | `POST` | `/point-buy` | Validate six ability scores |
//! | `POST` | `/characters` | Run the character workshop |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "validation_error", "message": "⚠️ Erro: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `embeddings_disabled` (400),
//! `validation_error` (422), `retrieval_error` / `generation_error` (502),
//! `load_error` / `ingestion_error` (500). Knowledge failures carry the
//! localized message shown to players.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use lorekeeper_core::chapters::ChapterTable;
use lorekeeper_core::character::Abilities;
use lorekeeper_core::error::KnowledgeError;
use lorekeeper_core::models::{QueryResult, ScoredChunk};
use lorekeeper_core::pointbuy::{self, POINT_BUY_BUDGET};
use lorekeeper_core::query::KnowledgeBase;
use lorekeeper_core::router;
use lorekeeper_core::search::SearchRequest;

use crate::agents::{CharacterRequest, CharacterWorkshop, WorkshopResult};
use crate::config::Config;
use crate::knowledge;
use crate::progress::ProgressMode;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    table: Arc<ChapterTable>,
    /// `None` when embeddings are disabled; routing and point-buy still work.
    kb: Option<KnowledgeBase>,
}

impl AppState {
    pub fn new(config: Arc<Config>, kb: Option<KnowledgeBase>) -> Self {
        let table = config.chapter_table();
        Self { config, table, kb }
    }

    fn kb(&self) -> Result<&KnowledgeBase, AppError> {
        self.kb.as_ref().ok_or_else(|| AppError {
            status: StatusCode::BAD_REQUEST,
            code: "embeddings_disabled".to_string(),
            message: "embeddings are disabled; set [embedding] provider in config".to_string(),
        })
    }
}

/// All routes with CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/chapters", get(handle_chapters))
        .route("/route", post(handle_route))
        .route("/search", post(handle_search))
        .route("/query", post(handle_query))
        .route("/point-buy", post(handle_point_buy))
        .route("/characters", post(handle_characters))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Opens the knowledge base once (building the index if it is absent or
/// stale) and binds to `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let kb = if config.embedding.is_enabled() {
        let progress = ProgressMode::default_for_tty().reporter();
        if config.generation.is_enabled() {
            Some(knowledge::open(&config, progress.as_ref()).await?)
        } else {
            tracing::warn!("generation disabled; /query and /characters will fail");
            Some(knowledge::open_for_search(&config, progress.as_ref()).await?)
        }
    } else {
        tracing::warn!("embeddings disabled; /search, /query and /characters will be unavailable");
        None
    };

    let app = router(AppState::new(config, kb));

    println!("Lorekeeper server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<KnowledgeError> for AppError {
    fn from(err: KnowledgeError) -> Self {
        let status = match &err {
            KnowledgeError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            KnowledgeError::Retrieval(_) | KnowledgeError::Generation(_) => StatusCode::BAD_GATEWAY,
            KnowledgeError::Load { .. } | KnowledgeError::Ingestion(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        tracing::warn!(code = err.code(), "request failed: {}", err);
        AppError {
            status,
            code: err.code().to_string(),
            message: err.user_message(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /chapters ============

async fn handle_chapters(State(state): State<AppState>) -> Json<ChapterTable> {
    Json(state.table.as_ref().clone())
}

// ============ POST /route ============

#[derive(Deserialize)]
struct RouteBody {
    query: String,
}

#[derive(Serialize)]
struct RouteResponse {
    /// Chapter name, or `null` when the query searches every chapter.
    chapter: Option<String>,
    keyword: Option<String>,
}

async fn handle_route(
    State(state): State<AppState>,
    Json(body): Json<RouteBody>,
) -> Json<RouteResponse> {
    let decision = router::route_with_keyword(&state.table, &body.query);
    Json(RouteResponse {
        chapter: decision.as_ref().map(|d| d.chapter.name.clone()),
        keyword: decision.map(|d| d.keyword.to_string()),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchBody {
    query: String,
    k: Option<usize>,
    /// Chapter id or name. Overrides routing.
    chapter: Option<String>,
    #[serde(default)]
    no_route: bool,
}

#[derive(Serialize)]
struct SearchResponse {
    chapter: Option<String>,
    results: Vec<ScoredChunk>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponse>, AppError> {
    if body.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let k = body.k.unwrap_or(state.config.retrieval.k);
    if k == 0 {
        return Err(bad_request("k must be at least 1"));
    }

    let chapter = match &body.chapter {
        Some(wanted) => match state.table.resolve(wanted) {
            Some(c) => Some(c.name.clone()),
            None => return Err(bad_request(format!("unknown chapter: {}", wanted))),
        },
        None if body.no_route => None,
        None => router::route(&state.table, &body.query).map(|c| c.name.clone()),
    };

    let kb = state.kb()?;
    let req = SearchRequest::new(&body.query, k).in_chapter(chapter.as_deref());
    let results = kb.search(&req).await?;
    Ok(Json(SearchResponse { chapter, results }))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryBody {
    query: String,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(body): Json<QueryBody>,
) -> Result<Json<QueryResult>, AppError> {
    if body.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let result = state.kb()?.query(&body.query).await?;
    Ok(Json(result))
}

// ============ POST /point-buy ============

#[derive(Deserialize)]
struct PointBuyBody {
    /// Six scores in sheet order (Força … Carisma).
    scores: Vec<u8>,
}

#[derive(Serialize)]
struct PointBuyResponse {
    spent: u32,
    budget: u32,
    remaining: u32,
}

async fn handle_point_buy(Json(body): Json<PointBuyBody>) -> Result<Json<PointBuyResponse>, AppError> {
    let abilities = Abilities::from_slice(&body.scores).map_err(|e| bad_request(e.to_string()))?;
    let spent = pointbuy::validate(&abilities).map_err(KnowledgeError::from)?;
    Ok(Json(PointBuyResponse {
        spent,
        budget: POINT_BUY_BUDGET,
        remaining: POINT_BUY_BUDGET - spent,
    }))
}

// ============ POST /characters ============

async fn handle_characters(
    State(state): State<AppState>,
    Json(req): Json<CharacterRequest>,
) -> Result<Json<WorkshopResult>, AppError> {
    if req.name.trim().is_empty() {
        return Err(bad_request("name must not be empty"));
    }
    // Validation failures must not depend on the index being available.
    pointbuy::validate(&req.abilities).map_err(KnowledgeError::from)?;

    let workshop = CharacterWorkshop::new(state.kb()?.clone());
    let result = workshop.create(&req).await?;
    Ok(Json(result))
}
