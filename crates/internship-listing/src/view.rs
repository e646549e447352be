//! Load-more listing state: accumulated pages for the current filter selection.

use std::sync::Arc;

use internship_core::{FilterKey, FilterPatch, Filters, Internship};
use tracing::{info, warn};

use crate::cache::{ListingCache, ListingQuery};
use crate::search::SortOption;
use crate::store::{FilterStore, StoreError};

pub const LOAD_ERROR: &str = "Failed to load internships";

pub struct ListingView {
    cache: Arc<ListingCache>,
    filters: FilterStore,
    search: String,
    sort: Option<SortOption>,
    items: Vec<Internship>,
    total: usize,
    page: usize,
    page_size: usize,
    has_more: bool,
    error: Option<String>,
}

impl ListingView {
    pub fn new(cache: Arc<ListingCache>, filters: FilterStore, page_size: usize) -> Self {
        Self {
            cache,
            filters,
            search: String::new(),
            sort: None,
            items: Vec::new(),
            total: 0,
            page: 1,
            page_size: page_size.max(1),
            has_more: false,
            error: None,
        }
    }

    pub fn items(&self) -> &[Internship] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn filters(&self) -> &Filters {
        self.filters.get()
    }

    fn query(&self) -> ListingQuery {
        ListingQuery {
            filters: self.filters.get().clone(),
            search: self.search.clone(),
            sort: self.sort,
        }
    }

    /// Reloads from page 1, replacing the accumulated items.
    pub async fn refresh(&mut self) {
        self.load(1, true).await;
    }

    /// Appends the next page. Returns `false` when there is nothing more to load.
    pub async fn load_more(&mut self) -> bool {
        if !self.has_more || self.error.is_some() {
            return false;
        }
        self.load(self.page + 1, false).await;
        self.error.is_none()
    }

    pub async fn apply_filters(&mut self, patch: FilterPatch) -> Result<(), StoreError> {
        let persisted = self.filters.update(patch);
        self.refresh().await;
        persisted
    }

    pub async fn clear_filter(&mut self, key: FilterKey) -> Result<(), StoreError> {
        let persisted = self.filters.clear_one(key);
        self.refresh().await;
        persisted
    }

    pub async fn reset_filters(&mut self) -> Result<(), StoreError> {
        let persisted = self.filters.clear();
        self.refresh().await;
        persisted
    }

    pub async fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
        self.refresh().await;
    }

    pub async fn set_sort(&mut self, sort: Option<SortOption>) {
        self.sort = sort;
        self.refresh().await;
    }

    // State is only written after the page resolves, so a dropped load
    // leaves the view as it was.
    async fn load(&mut self, page: usize, replace: bool) {
        let query = self.query();
        match self.cache.query_page(&query, page, self.page_size).await {
            Ok(result) => {
                self.has_more = result.has_more();
                self.total = result.total;
                self.page = result.page;
                if replace {
                    self.items = result.items;
                } else {
                    self.items.extend(result.items);
                }
                self.error = None;
                info!(page, shown = self.items.len(), total = self.total, "listing page loaded");
            }
            Err(err) => {
                warn!(page, error = %err, "listing page failed");
                self.items.clear();
                self.total = 0;
                self.has_more = false;
                self.error = Some(LOAD_ERROR.to_string());
            }
        }
    }
}
