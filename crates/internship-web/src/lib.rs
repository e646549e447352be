//! JSON API over the listing cache, the persisted filters and saved presets.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use internship_core::{FilterKey, FilterOptions, FilterPatch, Filters, Internship, Page, SavedPreference};
use internship_listing::{
    FilterStore, ListingCache, ListingConfig, ListingError, ListingQuery, PreferenceStore, SortOption,
    StoreError, LOAD_ERROR,
};
use internship_storage::KeyValueStore;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "internship-web";
pub const DEFAULT_WEB_PORT: u16 = 8000;

pub struct AppState {
    pub cache: Arc<ListingCache>,
    pub filters: Mutex<FilterStore>,
    pub presets: Mutex<PreferenceStore>,
    pub page_size: usize,
}

impl AppState {
    pub fn new(cache: Arc<ListingCache>, kv: Arc<dyn KeyValueStore>, page_size: usize) -> Self {
        Self {
            cache,
            filters: Mutex::new(FilterStore::load(kv.clone())),
            presets: Mutex::new(PreferenceStore::load(kv)),
            page_size,
        }
    }

    pub fn from_config(config: &ListingConfig) -> anyhow::Result<Self> {
        let cache = Arc::new(ListingCache::new(config.build_source()?));
        Ok(Self::new(cache, config.open_store(), config.page_size))
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Listing(#[from] ListingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Listing(err) => {
                warn!(error = %err, "listing request failed");
                (StatusCode::BAD_GATEWAY, LOAD_ERROR.to_string())
            }
            Self::Store(StoreError::BlankName) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Store(StoreError::UnknownPreset(_)) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Store(err) => {
                warn!(error = %err, "persisting state failed");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/internships", get(internships_handler))
        .route(
            "/api/filters",
            get(get_filters_handler)
                .patch(update_filters_handler)
                .delete(clear_filters_handler),
        )
        .route("/api/filters/options", get(filter_options_handler))
        .route("/api/filters/{key}", delete(clear_filter_handler))
        .route("/api/presets", get(list_presets_handler).post(save_preset_handler))
        .route("/api/presets/{id}", delete(delete_preset_handler))
        .route("/api/presets/{id}/apply", post(apply_preset_handler))
        .route("/api/cache/invalidate", post(invalidate_handler))
        .with_state(Arc::new(state))
}

pub fn web_port_from_env() -> u16 {
    std::env::var("INTERNSHIP_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_WEB_PORT)
}

pub async fn serve(config: &ListingConfig, port: u16) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, source = state.cache.source_id(), "serving internship api");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(&ListingConfig::from_env(), web_port_from_env()).await
}

async fn health_handler() -> &'static str {
    "ok"
}

#[derive(Debug, Default, Deserialize)]
struct InternshipsQuery {
    page: Option<usize>,
    per_page: Option<usize>,
    q: Option<String>,
    sort: Option<String>,
}

async fn internships_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InternshipsQuery>,
) -> Result<Json<Page<Internship>>, ApiError> {
    let sort = query
        .sort
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<SortOption>)
        .transpose()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let listing_query = ListingQuery {
        filters: state.filters.lock().await.get().clone(),
        search: query.q.unwrap_or_default(),
        sort,
    };
    let page = state
        .cache
        .query_page(
            &listing_query,
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(state.page_size),
        )
        .await?;
    Ok(Json(page))
}

async fn get_filters_handler(State(state): State<Arc<AppState>>) -> Json<Filters> {
    Json(state.filters.lock().await.get().clone())
}

async fn update_filters_handler(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<FilterPatch>,
) -> Result<Json<Filters>, ApiError> {
    let mut filters = state.filters.lock().await;
    filters.update(patch)?;
    Ok(Json(filters.get().clone()))
}

async fn clear_filters_handler(State(state): State<Arc<AppState>>) -> Result<Json<Filters>, ApiError> {
    let mut filters = state.filters.lock().await;
    filters.clear()?;
    Ok(Json(filters.get().clone()))
}

async fn clear_filter_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<Filters>, ApiError> {
    let key = key
        .parse::<FilterKey>()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let mut filters = state.filters.lock().await;
    filters.clear_one(key)?;
    Ok(Json(filters.get().clone()))
}

async fn filter_options_handler(State(state): State<Arc<AppState>>) -> Result<Json<FilterOptions>, ApiError> {
    Ok(Json(state.cache.filter_options().await?))
}

async fn list_presets_handler(State(state): State<Arc<AppState>>) -> Json<Vec<SavedPreference>> {
    Json(state.presets.lock().await.list().to_vec())
}

#[derive(Debug, Deserialize)]
struct SavePresetRequest {
    name: String,
}

async fn save_preset_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SavePresetRequest>,
) -> Result<(StatusCode, Json<SavedPreference>), ApiError> {
    let current = state.filters.lock().await.get().clone();
    let preset = state.presets.lock().await.save(&request.name, current)?;
    info!(id = %preset.id, name = %preset.name, "saved filter preset");
    Ok((StatusCode::CREATED, Json(preset)))
}

async fn apply_preset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Filters>, ApiError> {
    let presets = state.presets.lock().await;
    let mut filters = state.filters.lock().await;
    Ok(Json(presets.apply(&id, &mut filters)?))
}

async fn delete_preset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.presets.lock().await.delete(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no saved preset with id '{id}'")))
    }
}

async fn invalidate_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.cache.invalidate().await;
    StatusCode::NO_CONTENT
}
