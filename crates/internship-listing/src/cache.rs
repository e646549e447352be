//! One normalized copy of the full listing, fetched on first use and shared
//! by every filter, search, sort and page request until invalidated.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use internship_adapters::{normalize_payload, InternshipSource, OptionKind, SourceError};
use internship_core::{FilterOptions, Filters, Internship, Page};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::filters::apply_filters;
use crate::search::{search, sort_by_option, unique_values, SortOption};

#[derive(Debug, Clone, Error)]
pub enum ListingError {
    #[error("failed to load internships: {0}")]
    Fetch(#[source] Arc<SourceError>),
}

impl From<SourceError> for ListingError {
    fn from(err: SourceError) -> Self {
        Self::Fetch(Arc::new(err))
    }
}

type Loaded = Result<Arc<Vec<Internship>>, ListingError>;

/// Everything a page request can narrow or reorder by.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingQuery {
    pub filters: Filters,
    pub search: String,
    pub sort: Option<SortOption>,
}

impl ListingQuery {
    pub fn with_filters(filters: Filters) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    /// Filters, then search, then sort. The cached records are never touched.
    pub fn apply(&self, records: &[Internship]) -> Vec<Internship> {
        let filtered = apply_filters(records, &self.filters);
        let searched = search(&filtered, &self.search);
        match self.sort {
            Some(option) => sort_by_option(&searched, option),
            None => searched,
        }
    }
}

pub struct ListingCache {
    source: Arc<dyn InternshipSource>,
    records: RwLock<Option<Arc<Vec<Internship>>>>,
    // Holds the outcome of the last completed fetch for callers that queued
    // behind it.
    fetch_gate: Mutex<Option<Loaded>>,
    completed: AtomicU64,
    generation: AtomicU64,
}

impl ListingCache {
    pub fn new(source: Arc<dyn InternshipSource>) -> Self {
        Self {
            source,
            records: RwLock::new(None),
            fetch_gate: Mutex::new(None),
            completed: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn source_id(&self) -> &str {
        self.source.source_id()
    }

    pub async fn is_loaded(&self) -> bool {
        self.records.read().await.is_some()
    }

    /// Full normalized listing. Only the first caller after an empty cache
    /// fetches; callers arriving meanwhile share that fetch's outcome,
    /// failure included. An empty listing is returned but not cached.
    pub async fn records(&self) -> Loaded {
        if let Some(hit) = self.records.read().await.clone() {
            debug!(records = hit.len(), "listing cache hit");
            return Ok(hit);
        }

        let seen = self.completed.load(Ordering::SeqCst);
        let mut gate = self.fetch_gate.lock().await;
        if let Some(hit) = self.records.read().await.clone() {
            return Ok(hit);
        }
        if self.completed.load(Ordering::SeqCst) != seen {
            if let Some(outcome) = (*gate).clone() {
                debug!(ok = outcome.is_ok(), "sharing outcome of the fetch this caller waited on");
                return outcome;
            }
        }

        let generation = self.generation.load(Ordering::SeqCst);
        info!(source = self.source.source_id(), "listing cache miss; fetching");
        let outcome = match self.source.fetch_listing().await {
            Ok(payload) => Ok(Arc::new(dedupe_by_id(normalize_payload(&payload)))),
            Err(err) => {
                warn!(source = self.source.source_id(), error = %err, "listing fetch failed");
                Err(ListingError::from(err))
            }
        };

        if let Ok(records) = &outcome {
            let mut slot = self.records.write().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                info!("listing cache invalidated during fetch; result not cached");
            } else if records.is_empty() {
                info!("listing fetch returned no records; result not cached");
            } else {
                *slot = Some(records.clone());
                info!(records = records.len(), "listing cache filled");
            }
        }
        *gate = Some(outcome.clone());
        self.completed.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut slot = self.records.write().await;
        if slot.take().is_some() {
            info!("listing cache invalidated");
        }
    }

    pub async fn get_page(
        &self,
        filters: &Filters,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Internship>, ListingError> {
        let records = self.records().await?;
        Ok(paginate(apply_filters(&records, filters), page, page_size))
    }

    pub async fn query_page(
        &self,
        query: &ListingQuery,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Internship>, ListingError> {
        let records = self.records().await?;
        Ok(paginate(query.apply(&records), page, page_size))
    }

    /// Option lists from the source; a kind that comes back empty or fails is
    /// derived from the cached records instead.
    pub async fn filter_options(&self) -> Result<FilterOptions, ListingError> {
        let (profiles, locations, durations) = tokio::join!(
            self.source.fetch_options(OptionKind::Profiles),
            self.source.fetch_options(OptionKind::Locations),
            self.source.fetch_options(OptionKind::Durations),
        );
        Ok(FilterOptions {
            profiles: self.option_or_derived(OptionKind::Profiles, profiles).await?,
            locations: self.option_or_derived(OptionKind::Locations, locations).await?,
            durations: self.option_or_derived(OptionKind::Durations, durations).await?,
        })
    }

    async fn option_or_derived(
        &self,
        kind: OptionKind,
        fetched: Result<Vec<String>, SourceError>,
    ) -> Result<Vec<String>, ListingError> {
        match fetched {
            Ok(values) if !values.is_empty() => return Ok(values),
            Ok(_) => {}
            Err(err) => warn!(?kind, error = %err, "option fetch failed; deriving from listing"),
        }
        let records = self.records().await?;
        Ok(match kind {
            OptionKind::Profiles => unique_values(&records, |r| r.profile.as_str()),
            OptionKind::Locations => unique_values(&records, |r| r.location.as_str()),
            OptionKind::Durations => unique_values(&records, |r| r.duration.as_str()),
        })
    }
}

/// Keeps the first record for each non-empty id. Records without an id are kept.
fn dedupe_by_id(records: Vec<Internship>) -> Vec<Internship> {
    let mut seen = HashSet::new();
    let before = records.len();
    let kept = records
        .into_iter()
        .filter(|r| r.id.is_empty() || seen.insert(r.id.clone()))
        .collect::<Vec<_>>();
    if kept.len() != before {
        debug!(dropped = before - kept.len(), "dropped duplicate listing ids");
    }
    kept
}

/// Slices `[(page-1)*page_size, page*page_size)`. Page numbers start at 1;
/// `0` is read as `1`, as is a zero page size.
pub fn paginate(records: Vec<Internship>, page: usize, page_size: usize) -> Page<Internship> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total = records.len();
    let items = records
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();
    Page {
        items,
        total,
        page,
        page_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value as JsonValue};

    struct CountingSource {
        calls: AtomicUsize,
        payload: JsonValue,
        fail: bool,
        delay: Duration,
        options: Vec<String>,
    }

    impl CountingSource {
        fn new(payload: JsonValue) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                payload,
                fail: false,
                delay: Duration::from_millis(0),
                options: Vec::new(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InternshipSource for CountingSource {
        fn source_id(&self) -> &str {
            "counting"
        }

        async fn fetch_listing(&self) -> Result<JsonValue, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(SourceError::Transport {
                    message: "connection refused".to_string(),
                });
            }
            Ok(self.payload.clone())
        }

        async fn fetch_options(&self, kind: OptionKind) -> Result<Vec<String>, SourceError> {
            match kind {
                OptionKind::Profiles => Ok(self.options.clone()),
                OptionKind::Locations => Err(SourceError::Transport {
                    message: "503".to_string(),
                }),
                OptionKind::Durations => Ok(Vec::new()),
            }
        }
    }

    fn listing(count: usize) -> JsonValue {
        let entries = (1..=count)
            .map(|i| {
                json!({
                    "id": i,
                    "title": format!("Intern {i}"),
                    "work_from_home": i % 2 == 0,
                    "location_names": [if i % 3 == 0 { "Pune" } else { "Delhi" }],
                    "duration": "3 Months",
                    "profile_name": "Web Development"
                })
            })
            .collect::<Vec<_>>();
        JsonValue::Array(entries)
    }

    #[tokio::test]
    async fn pages_of_twenty_five_records() {
        let cache = ListingCache::new(Arc::new(CountingSource::new(listing(25))));
        let filters = Filters::default();
        let mut lengths = Vec::new();
        for page in 1..=3 {
            let result = cache.get_page(&filters, page, 10).await.unwrap();
            assert_eq!(result.total, 25);
            lengths.push(result.items.len());
        }
        assert_eq!(lengths, vec![10, 10, 5]);
        assert!(cache.get_page(&filters, 4, 10).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn total_counts_filtered_set_and_filters_never_refetch() {
        let source = Arc::new(CountingSource::new(listing(25)));
        let cache = ListingCache::new(source.clone());
        let remote = Filters {
            is_remote: Some(true),
            ..Filters::default()
        };
        let page = cache.get_page(&remote, 1, 10).await.unwrap();
        assert_eq!(page.total, 12);
        assert!(page.items.iter().all(|r| r.is_remote));
        cache.get_page(&Filters::default(), 2, 10).await.unwrap();
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let mut inner = CountingSource::new(listing(5));
        inner.delay = Duration::from_millis(50);
        let source = Arc::new(inner);
        let cache = ListingCache::new(source.clone());
        let filters = Filters::default();

        let (a, b, c) = tokio::join!(
            cache.get_page(&filters, 1, 10),
            cache.get_page(&filters, 1, 2),
            cache.records(),
        );
        assert_eq!(a.unwrap().total, 5);
        assert_eq!(b.unwrap().items.len(), 2);
        assert_eq!(c.unwrap().len(), 5);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let source = Arc::new(CountingSource::new(listing(3)));
        let cache = ListingCache::new(source.clone());
        cache.records().await.unwrap();
        assert!(cache.is_loaded().await);
        cache.invalidate().await;
        assert!(!cache.is_loaded().await);
        cache.records().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn invalidation_during_fetch_discards_result() {
        let mut inner = CountingSource::new(listing(3));
        inner.delay = Duration::from_millis(50);
        let cache = Arc::new(ListingCache::new(Arc::new(inner)));

        let fetching = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.records().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.invalidate().await;

        let records = fetching.await.unwrap().unwrap();
        assert_eq!(records.len(), 3);
        assert!(!cache.is_loaded().await);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_empty() {
        let mut inner = CountingSource::new(listing(3));
        inner.fail = true;
        let source = Arc::new(inner);
        let cache = ListingCache::new(source.clone());
        let err = cache.get_page(&Filters::default(), 1, 10).await.unwrap_err();
        assert!(matches!(
            &err,
            ListingError::Fetch(cause) if matches!(cause.as_ref(), SourceError::Transport { .. })
        ));
        assert!(!cache.is_loaded().await);
        assert!(cache.records().await.is_err());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_failed_fetch() {
        let mut inner = CountingSource::new(listing(3));
        inner.fail = true;
        inner.delay = Duration::from_millis(50);
        let source = Arc::new(inner);
        let cache = ListingCache::new(source.clone());
        let filters = Filters::default();

        let (a, b, c) = tokio::join!(
            cache.get_page(&filters, 1, 10),
            cache.get_page(&filters, 2, 10),
            cache.get_page(&filters, 1, 5),
        );
        for outcome in [a, b, c] {
            let err = outcome.unwrap_err();
            assert!(err.to_string().contains("connection refused"));
        }
        assert_eq!(source.calls(), 1);
        assert!(!cache.is_loaded().await);
    }

    #[tokio::test]
    async fn empty_listing_is_fetched_again() {
        let source = Arc::new(CountingSource::new(json!([])));
        let cache = ListingCache::new(source.clone());
        assert!(cache.records().await.unwrap().is_empty());
        assert!(!cache.is_loaded().await);
        let page = cache.get_page(&Filters::default(), 1, 10).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn duplicate_ids_keep_first_occurrence() {
        let payload = json!([
            {"id": 1, "title": "first"},
            {"id": 1, "title": "second"},
            {"title": "no id"},
            {"title": "no id either"}
        ]);
        let cache = ListingCache::new(Arc::new(CountingSource::new(payload)));
        let records = cache.records().await.unwrap();
        let titles = records.iter().map(|r| r.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["first", "no id", "no id either"]);
    }

    #[tokio::test]
    async fn query_page_searches_and_sorts_before_slicing() {
        let cache = ListingCache::new(Arc::new(CountingSource::new(listing(12))));
        let query = ListingQuery {
            filters: Filters {
                location: vec!["Pune".to_string()],
                ..Filters::default()
            },
            search: "intern 1".to_string(),
            sort: None,
        };
        let page = cache.query_page(&query, 1, 10).await.unwrap();
        let ids = page.items.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["12"]);
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn options_fall_back_to_cached_values() {
        let mut inner = CountingSource::new(listing(6));
        inner.options = vec!["Design".to_string()];
        let cache = ListingCache::new(Arc::new(inner));
        let options = cache.filter_options().await.unwrap();
        assert_eq!(options.profiles, vec!["Design".to_string()]);
        assert_eq!(options.locations, vec!["Delhi".to_string(), "Pune".to_string()]);
        assert_eq!(options.durations, vec!["3 Months".to_string()]);
    }

    #[test]
    fn page_zero_reads_as_first_page() {
        let records = (0..3)
            .map(|i| Internship {
                id: i.to_string(),
                ..Internship::default()
            })
            .collect::<Vec<_>>();
        let page = paginate(records, 0, 2);
        assert_eq!(page.page, 1);
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more());
    }
}
