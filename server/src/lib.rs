use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use cns_core::loader::load_documents;
use cns_core::normalizer::normalize;
use cns_core::persist::{index_exists, IndexPaths};
use cns_core::{IndexStats, SearchEngine, SearchResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Upper bound on matches scored per request; pages are cut from this list.
pub const MAX_RESULTS: usize = 10_000;
const MAX_PER_PAGE: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}
fn default_page() -> usize { 1 }
fn default_per_page() -> usize { 25 }

#[derive(Deserialize)]
pub struct DownloadParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub query: String,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u32,
    pub titulo: String,
    pub score: f64,
    pub snippet: String,
    pub data_publicacao: String,
    pub link: String,
}

impl From<&SearchResult> for SearchHit {
    fn from(r: &SearchResult) -> Self {
        Self {
            id: r.id,
            titulo: r.title.clone(),
            score: (r.score * 100.0).round() / 100.0,
            snippet: r.snippet.clone(),
            data_publicacao: r.publication_date.clone(),
            link: r.link.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<SearchEngine>>,
    pub index_paths_root: PathBuf,
    pub data_path: Option<PathBuf>,
    pub admin_token: Option<String>,
}

/// Open the snapshot at `index_dir`, building it from `data_path` first when absent.
pub fn load_engine(index_dir: &str, data_path: Option<&str>) -> Result<SearchEngine> {
    let paths = IndexPaths::new(index_dir);
    match data_path {
        Some(data) if !index_exists(&paths) => {
            tracing::info!(index_dir, data, "no index found, building");
            let engine = SearchEngine::build(load_documents(data)?);
            engine.save(&paths)?;
            Ok(engine)
        }
        _ => SearchEngine::open(&paths).with_context(|| format!("opening index at {index_dir}")),
    }
}

pub fn build_app(index_dir: String, data_path: Option<String>) -> Result<Router> {
    let engine = load_engine(&index_dir, data_path.as_deref())?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState {
        engine: Arc::new(RwLock::new(engine)),
        index_paths_root: PathBuf::from(&index_dir),
        data_path: data_path.map(PathBuf::from),
        admin_token,
    };
    Ok(router(app_state))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .route("/download_csv", get(download_csv_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/rebuild", post(rebuild_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Evaluate on the blocking pool, off the async workers.
async fn run_search(
    state: &AppState,
    query: &str,
) -> Result<Vec<SearchResult>, (StatusCode, String)> {
    let engine = Arc::clone(&state.engine);
    let query = query.to_string();
    tokio::task::spawn_blocking(move || engine.read().search(&query, MAX_RESULTS))
        .await
        .map_err(internal)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let query = params.q.trim().to_string();
    let page = params.page.max(1);
    let per_page = params.per_page.clamp(1, MAX_PER_PAGE);

    let all = if query.is_empty() { Vec::new() } else { run_search(&state, &query).await? };
    let total = all.len();
    let total_pages = total.div_ceil(per_page);
    let results = all
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(SearchHit::from)
        .collect();

    Ok(Json(SearchResponse {
        results,
        query,
        total,
        page,
        per_page,
        total_pages,
        has_next: page < total_pages,
        has_prev: page > 1,
    }))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.engine.read().stats())
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<u32>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let engine = state.engine.read();
    let doc = engine.document(doc_id).ok_or((StatusCode::NOT_FOUND, "not found".to_string()))?;
    Ok(Json(serde_json::json!({
        "id": doc.id,
        "titulo": doc.title,
        "texto": doc.body,
        "data_publicacao": doc.publication_date,
        "link": doc.link,
    })))
}

pub async fn download_csv_handler(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query not provided".into()));
    }
    let results = run_search(&state, query).await?;
    if results.is_empty() {
        return Err((StatusCode::NOT_FOUND, "no results found".into()));
    }
    let body = results_csv(&results).map_err(internal)?;
    let filename = safe_filename(query);
    let disposition = format!("attachment; filename=\"resultados_busca_{filename}.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// CSV export with a UTF-8 byte order mark so spreadsheet tools detect the encoding.
pub fn results_csv(results: &[SearchResult]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer("\u{feff}".as_bytes().to_vec());
    writer.write_record(["Título", "Data de Publicação", "Link", "Score", "Trecho"])?;
    for r in results {
        let score = format!("{:.2}", r.score);
        writer.write_record([
            r.title.as_str(),
            r.publication_date.as_str(),
            r.link.as_str(),
            score.as_str(),
            r.snippet.as_str(),
        ])?;
    }
    writer.into_inner().map_err(|e| anyhow::anyhow!("flushing csv: {e}"))
}

/// Accent-folded query, at most 30 chars, spaces as underscores.
pub fn safe_filename(query: &str) -> String {
    normalize(query).chars().take(30).collect::<String>().trim_end().replace(' ', "_")
}

// --- Admin endpoints ---
async fn rebuild_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<IndexStats>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let data_path = state
        .data_path
        .clone()
        .ok_or((StatusCode::CONFLICT, "no data path configured".to_string()))?;
    let root = state.index_paths_root.clone();

    // Build and persist off the async runtime; readers keep the old engine meanwhile.
    let engine = tokio::task::spawn_blocking(move || -> Result<SearchEngine> {
        let engine = SearchEngine::build(load_documents(&data_path)?);
        engine.save(&IndexPaths::new(&root))?;
        Ok(engine)
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;

    let stats = engine.stats();
    *state.engine.write() = engine;
    tracing::info!(num_docs = stats.total_documents, "index rebuilt and swapped");
    Ok(Json(stats))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

fn internal<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    tracing::error!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
