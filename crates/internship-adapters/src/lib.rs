//! Listing source contracts, API/fixture-backed sources and raw payload parsing.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use internship_storage::{ApiClient, ApiResponse};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::info;

pub mod deadline;
pub mod normalize;
pub mod stipend;

pub use deadline::{days_left, days_left_on, deadline_status_on, listing_timestamp, parse_listing_date};
pub use normalize::{
    normalize_entry, normalize_payload, normalize_payload_detailed, normalize_payload_on,
    payload_entries, NormalizedInternship,
};
pub use stipend::{format_currency, match_stipend, parse_stipend, parse_stipend_amount};

pub const CRATE_NAME: &str = "internship-adapters";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("fetch failed: {message}")]
    Transport { message: String },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SourceError {
    fn from_response(resp: &ApiResponse) -> Self {
        Self::Transport {
            message: resp.message().unwrap_or("request failed").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Profiles,
    Locations,
    Durations,
}

/// Where the full internship listing and the filter option lists come from.
#[async_trait]
pub trait InternshipSource: Send + Sync {
    fn source_id(&self) -> &str;

    /// Raw listing payload, ready for [`normalize_payload`].
    async fn fetch_listing(&self) -> Result<JsonValue, SourceError>;

    async fn fetch_options(&self, _kind: OptionKind) -> Result<Vec<String>, SourceError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoutes {
    pub internships: String,
    pub profiles: String,
    pub locations: String,
    pub durations: String,
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self {
            internships: "internships".to_string(),
            profiles: "filters/profiles".to_string(),
            locations: "filters/locations".to_string(),
            durations: "filters/durations".to_string(),
        }
    }
}

impl ApiRoutes {
    pub fn for_options(&self, kind: OptionKind) -> &str {
        match kind {
            OptionKind::Profiles => &self.profiles,
            OptionKind::Locations => &self.locations,
            OptionKind::Durations => &self.durations,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiInternshipSource {
    client: ApiClient,
    routes: ApiRoutes,
}

impl ApiInternshipSource {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            routes: ApiRoutes::default(),
        }
    }

    pub fn with_routes(mut self, routes: ApiRoutes) -> Self {
        self.routes = routes;
        self
    }
}

#[async_trait]
impl InternshipSource for ApiInternshipSource {
    fn source_id(&self) -> &str {
        self.client.base_url()
    }

    async fn fetch_listing(&self) -> Result<JsonValue, SourceError> {
        let resp = self.client.get(&self.routes.internships).await;
        if resp.is_error {
            return Err(SourceError::from_response(&resp));
        }
        // The listing sits under the envelope's own `data` key.
        Ok(resp.data.get("data").cloned().unwrap_or(JsonValue::Null))
    }

    async fn fetch_options(&self, kind: OptionKind) -> Result<Vec<String>, SourceError> {
        let resp = self.client.get(self.routes.for_options(kind)).await;
        if resp.is_error {
            return Err(SourceError::from_response(&resp));
        }
        Ok(option_values(&resp.data))
    }
}

/// Reads the listing payload from a local JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct FixtureInternshipSource {
    path: PathBuf,
}

impl FixtureInternshipSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InternshipSource for FixtureInternshipSource {
    fn source_id(&self) -> &str {
        "fixture"
    }

    async fn fetch_listing(&self) -> Result<JsonValue, SourceError> {
        let payload = load_payload_file(&self.path)?;
        info!(path = %self.path.display(), "loaded fixture listing payload");
        Ok(payload)
    }
}

pub fn load_payload_file(path: impl AsRef<Path>) -> Result<JsonValue> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Option lists come either as an array of strings or as an object keyed by
/// the option values.
pub fn option_values(data: &JsonValue) -> Vec<String> {
    match data {
        JsonValue::Array(items) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(ToString::to_string)
            .collect(),
        JsonValue::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}
