//! Listing pipeline: filter predicates, search and sort, the shared listing
//! cache, persisted filter state and the load-more view.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use internship_adapters::{ApiInternshipSource, FixtureInternshipSource, InternshipSource};
use internship_core::ITEMS_PER_PAGE;
use internship_storage::{ApiClient, FileKeyValueStore, HttpClientConfig, KeyValueStore};
use tracing::info;

pub mod cache;
pub mod filters;
pub mod search;
pub mod store;
pub mod view;

pub use cache::{paginate, ListingCache, ListingError, ListingQuery};
pub use filters::{apply_filters, matches};
pub use search::{search, sort, sort_by_option, unique_values, SortKey, SortOption, SortOrder};
pub use store::{FilterStore, PreferenceStore, StoreError, FILTERS_KEY, PREFERENCES_KEY};
pub use view::{ListingView, LOAD_ERROR};

pub const CRATE_NAME: &str = "internship-listing";

#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub api_base_url: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub storage_dir: PathBuf,
    pub page_size: usize,
    pub fixture_path: Option<PathBuf>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://localhost:3000/api".to_string(),
            http_timeout_secs: 20,
            user_agent: "internship-finder/0.1".to_string(),
            storage_dir: PathBuf::from("./.internship-store"),
            page_size: ITEMS_PER_PAGE,
            fixture_path: None,
        }
    }
}

impl ListingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: std::env::var("INTERNSHIP_API_BASE_URL").unwrap_or(defaults.api_base_url),
            http_timeout_secs: std::env::var("INTERNSHIP_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
            user_agent: std::env::var("INTERNSHIP_USER_AGENT").unwrap_or(defaults.user_agent),
            storage_dir: std::env::var("INTERNSHIP_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            page_size: std::env::var("INTERNSHIP_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.page_size),
            fixture_path: std::env::var("INTERNSHIP_FIXTURE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            base_url: self.api_base_url.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
        }
    }

    /// Fixture file when configured, the HTTP API otherwise.
    pub fn build_source(&self) -> Result<Arc<dyn InternshipSource>> {
        if let Some(path) = &self.fixture_path {
            info!(path = %path.display(), "using fixture listing source");
            return Ok(Arc::new(FixtureInternshipSource::new(path.clone())));
        }
        let client = ApiClient::new(self.http_client_config())
            .with_context(|| format!("building http client for {}", self.api_base_url))?;
        info!(base_url = %self.api_base_url, "using api listing source");
        Ok(Arc::new(ApiInternshipSource::new(client)))
    }

    pub fn open_store(&self) -> Arc<dyn KeyValueStore> {
        Arc::new(FileKeyValueStore::new(self.storage_dir.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_listing_constants() {
        let config = ListingConfig::default();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.http_client_config().timeout, Duration::from_secs(20));
        assert_eq!(
            config.http_client_config().user_agent.as_deref(),
            Some("internship-finder/0.1")
        );
    }

    #[test]
    fn fixture_path_selects_fixture_source() {
        let config = ListingConfig {
            fixture_path: Some(PathBuf::from("payload.json")),
            ..ListingConfig::default()
        };
        let source = config.build_source().unwrap();
        assert_eq!(source.source_id(), "fixture");
    }

    #[test]
    fn api_source_reports_base_url() {
        let config = ListingConfig {
            api_base_url: "http://127.0.0.1:9/api".to_string(),
            ..ListingConfig::default()
        };
        let source = config.build_source().unwrap();
        assert_eq!(source.source_id(), "http://127.0.0.1:9/api");
    }
}
