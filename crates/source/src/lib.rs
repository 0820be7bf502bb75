//! Source fallback orchestration.
//!
//! `CatalogService` serves catalog listings and single-item lookups from a
//! live backend, degrading silently to the static dataset, and as a last
//! resort to a placeholder record. Callers only ever see a result; which
//! source produced it is reported through `CatalogSource`.
//!
//! Listing transitions:
//!
//! ```text
//! TryLive --ok, non-empty--> done (live)
//! TryLive --timeout | error | malformed | empty--> TryStatic --> done (static)
//! ```
//!
//! Lookup transitions:
//!
//! ```text
//! TryLive --direct hit | search hit--> done (live)
//! TryLive --unavailable | nothing found--> TryStatic
//! TryStatic --direct hit | search hit--> done (static)
//! TryStatic --nothing found--> SynthesizePlaceholder --> done (placeholder)
//! ```

mod dataset;
mod keys;

pub use catalogflow_backend_http::{BackendError, LiveSource, OfflineSource};
pub use dataset::{DatasetError, StaticDataset};
pub use keys::{LiveKeyIndex, DEFAULT_KEY_CAPACITY};

use catalogflow_history::RecentlyViewed;
use catalogflow_model::{CanonicalRecord, CatalogSource, QueryRequest, Resolution, ResolutionKind};
use catalogflow_normalize::{normalize, normalize_batch, NormalizationError};
use catalogflow_query::{apply_page, matches_text};
use catalogflow_resolve::{resolve, search_tokens};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Upper bound on each live call; expiry counts as a live failure
    pub live_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            live_timeout: Duration::from_secs(5),
        }
    }
}

/// One page of a catalog listing.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub records: Vec<CanonicalRecord>,
    /// Matches before paging
    pub total: usize,
    pub source: CatalogSource,
}

/// Result of a single-item lookup. Always carries a record.
#[derive(Debug, Clone, Serialize)]
pub struct ItemLookup {
    pub record: CanonicalRecord,
    pub resolution: Resolution,
    /// `None` when the record is a synthesized placeholder
    pub source: Option<CatalogSource>,
}

/// Why the live source was abandoned for a call. Logged, never returned.
#[derive(Debug, Error)]
enum LiveFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("malformed record: {0}")]
    Malformed(#[from] NormalizationError),

    #[error("empty result ({dropped} records dropped)")]
    Empty { dropped: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListState {
    TryLive,
    TryStatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupState {
    TryLive,
    TryStatic,
    SynthesizePlaceholder,
}

/// A record found during a lookup and how it was found.
struct Hit {
    record: CanonicalRecord,
    via_search: bool,
    source: CatalogSource,
}

/// Catalog access with live-then-static degradation.
pub struct CatalogService<L> {
    live: L,
    dataset: Arc<StaticDataset>,
    history: Arc<RecentlyViewed>,
    live_keys: LiveKeyIndex,
    config: SourceConfig,
}

impl<L: LiveSource> CatalogService<L> {
    pub fn new(live: L, dataset: Arc<StaticDataset>) -> Self {
        Self {
            live,
            dataset,
            history: Arc::new(RecentlyViewed::default()),
            live_keys: LiveKeyIndex::default(),
            config: SourceConfig::default(),
        }
    }

    /// Share a recently-viewed cache with other components.
    pub fn with_history(mut self, history: Arc<RecentlyViewed>) -> Self {
        self.history = history;
        self
    }

    pub fn with_config(mut self, config: SourceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn history(&self) -> &Arc<RecentlyViewed> {
        &self.history
    }

    pub fn dataset(&self) -> &StaticDataset {
        &self.dataset
    }

    /// Name of the live backend, for logging and status output.
    pub fn live_name(&self) -> &'static str {
        self.live.name()
    }

    /// Recently viewed records, most recent first.
    pub fn recently_viewed(&self) -> Vec<CanonicalRecord> {
        self.history.list()
    }

    /// Check the live source within the configured timeout.
    pub async fn health(&self) -> Result<(), BackendError> {
        match tokio::time::timeout(self.config.live_timeout, self.live.health_check()).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        }
    }

    /// Serve a filtered, sorted page. Never fails; the worst case is an empty
    /// page from the static dataset.
    pub async fn fetch_catalog(&self, query: &QueryRequest) -> CatalogPage {
        let mut state = ListState::TryLive;

        loop {
            state = match state {
                ListState::TryLive => match self.live_list(query).await {
                    Ok(records) => return page(&records, query, CatalogSource::Live),
                    Err(reason) => {
                        tracing::warn!(
                            backend = self.live.name(),
                            %reason,
                            "Live catalog unavailable, serving static dataset"
                        );
                        ListState::TryStatic
                    }
                },
                ListState::TryStatic => {
                    return page(self.dataset.records(), query, CatalogSource::Static)
                }
            };
        }
    }

    /// Look up one item by any identifier. Never fails; an identifier that
    /// matches nothing yields a placeholder record.
    pub async fn fetch_one(&self, raw_id: &str) -> ItemLookup {
        let resolution = resolve(raw_id);
        // A canonical key carries no words worth searching for.
        let tokens = match resolution.source_kind {
            ResolutionKind::DirectMatch => Vec::new(),
            _ => search_tokens(raw_id),
        };
        let mut state = LookupState::TryLive;

        tracing::debug!(
            raw_id,
            canonical_id = %resolution.canonical_id,
            kind = resolution.source_kind.label(),
            "Resolved identifier"
        );

        loop {
            state = match state {
                LookupState::TryLive => {
                    let outcome = self.live_lookup(&resolution, &tokens).await;
                    match outcome {
                        Ok(Some(hit)) => return self.found(hit, resolution),
                        Ok(None) => {
                            tracing::debug!(
                                canonical_id = %resolution.canonical_id,
                                "Not in live catalog, checking static dataset"
                            );
                            LookupState::TryStatic
                        }
                        Err(reason) => {
                            tracing::warn!(
                                backend = self.live.name(),
                                canonical_id = %resolution.canonical_id,
                                %reason,
                                "Live lookup unavailable, checking static dataset"
                            );
                            LookupState::TryStatic
                        }
                    }
                }
                LookupState::TryStatic => {
                    let outcome = self.static_lookup(&resolution, &tokens);
                    match outcome {
                        Some(hit) => return self.found(hit, resolution),
                        None => LookupState::SynthesizePlaceholder,
                    }
                }
                LookupState::SynthesizePlaceholder => {
                    tracing::warn!(
                        raw_id,
                        canonical_id = %resolution.canonical_id,
                        "No catalog record found, serving placeholder"
                    );
                    return ItemLookup {
                        record: CanonicalRecord::placeholder(
                            resolution.canonical_id.clone(),
                            resolution.original_input.clone(),
                        ),
                        resolution,
                        source: None,
                    };
                }
            };
        }
    }

    /// Live listing, normalized. Empty results count as a failure.
    async fn live_list(&self, query: &QueryRequest) -> Result<Vec<CanonicalRecord>, LiveFailure> {
        let raw = self.bounded(self.live.fetch_list(query)).await??;
        let batch = normalize_batch(&raw, CatalogSource::Live);
        self.live_keys.remember(&batch.records);

        if batch.records.is_empty() {
            return Err(LiveFailure::Empty {
                dropped: batch.dropped,
            });
        }
        Ok(batch.records)
    }

    /// Live direct lookup by every known key, then live keyword search.
    async fn live_lookup(
        &self,
        resolution: &Resolution,
        tokens: &[String],
    ) -> Result<Option<Hit>, LiveFailure> {
        for key in self.live_candidates(resolution) {
            match self.bounded(self.live.fetch_by_id(&key)).await? {
                Ok(raw) => {
                    let mut record = normalize(&raw, CatalogSource::Live)?;
                    self.live_keys.remember([&record]);
                    if record.id != resolution.canonical_id {
                        record = record.rekeyed(&resolution.canonical_id);
                    }
                    return Ok(Some(Hit {
                        record,
                        via_search: false,
                        source: CatalogSource::Live,
                    }));
                }
                Err(BackendError::NotFound) => {
                    tracing::debug!(key = %key, "Live backend has no record under key");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if tokens.is_empty() {
            return Ok(None);
        }

        let raw = match self.bounded(self.live.search(&tokens.join(" "))).await? {
            Ok(raw) => raw,
            Err(BackendError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let batch = normalize_batch(&raw, CatalogSource::Live);
        self.live_keys.remember(&batch.records);

        Ok(batch
            .records
            .into_iter()
            .next()
            .map(|record| Hit {
                record,
                via_search: true,
                source: CatalogSource::Live,
            }))
    }

    /// Keys the live backend may hold the record under, most specific first.
    ///
    /// A canonical id seen in an earlier live response maps back to the
    /// backend's own key. A generated id came from a raw key the backend may
    /// know as is; a canonical input is passed through.
    fn live_candidates(&self, resolution: &Resolution) -> Vec<String> {
        let mut keys = Vec::with_capacity(2);
        if let Some(key) = self.live_keys.source_key(&resolution.canonical_id) {
            keys.push(key);
        }

        let own = match resolution.source_kind {
            ResolutionKind::Generated => resolution.original_input.trim().to_string(),
            _ => resolution.canonical_id.clone(),
        };
        if !own.is_empty() && !keys.contains(&own) {
            keys.push(own);
        }
        keys
    }

    /// Static direct lookup, then static keyword search (all tokens must match).
    fn static_lookup(&self, resolution: &Resolution, tokens: &[String]) -> Option<Hit> {
        if let Some(record) = self.dataset.get(&resolution.canonical_id) {
            return Some(Hit {
                record: record.clone(),
                via_search: false,
                source: CatalogSource::Static,
            });
        }

        if tokens.is_empty() {
            return None;
        }

        self.dataset
            .records()
            .iter()
            .find(|record| tokens.iter().all(|token| matches_text(record, token)))
            .map(|record| Hit {
                record: record.clone(),
                via_search: true,
                source: CatalogSource::Static,
            })
    }

    /// Finish a successful lookup and remember the view.
    fn found(&self, hit: Hit, mut resolution: Resolution) -> ItemLookup {
        let mut record = hit.record;

        if hit.via_search {
            if resolution.source_kind == ResolutionKind::Generated {
                record = record.rekeyed(&resolution.canonical_id);
            }
            resolution.source_kind = ResolutionKind::FallbackSearch;
        }

        tracing::debug!(
            id = %record.id,
            source = %hit.source,
            kind = resolution.source_kind.label(),
            "Resolved catalog item"
        );

        self.history.record(record.clone());

        ItemLookup {
            record,
            resolution,
            source: Some(hit.source),
        }
    }

    /// Run a live call under the configured timeout.
    async fn bounded<T>(&self, call: impl Future<Output = T>) -> Result<T, LiveFailure> {
        tokio::time::timeout(self.config.live_timeout, call)
            .await
            .map_err(|_| LiveFailure::Timeout(self.config.live_timeout))
    }
}

fn page(records: &[CanonicalRecord], query: &QueryRequest, source: CatalogSource) -> CatalogPage {
    let page = apply_page(records, query);
    CatalogPage {
        records: page.records,
        total: page.total,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogflow_model::Availability;
    use pretty_assertions::assert_eq;

    fn offline_service() -> CatalogService<OfflineSource> {
        let dataset = Arc::new(StaticDataset::bundled().unwrap());
        CatalogService::new(OfflineSource, dataset)
    }

    #[tokio::test]
    async fn test_offline_catalog_serves_static() {
        let service = offline_service();
        let page = service.fetch_catalog(&QueryRequest::new()).await;
        assert_eq!(page.source, CatalogSource::Static);
        assert_eq!(page.records.len(), 16);
        assert_eq!(page.total, 16);
    }

    #[tokio::test]
    async fn test_offline_lookup_by_static_key() {
        let service = offline_service();
        let lookup = service.fetch_one("4").await;

        assert_eq!(lookup.record.name, "USB-C Fast Charger");
        assert_eq!(lookup.resolution.source_kind, ResolutionKind::Generated);
        assert_eq!(lookup.record.id, lookup.resolution.canonical_id);
        assert_eq!(lookup.source, Some(CatalogSource::Static));
        assert_eq!(service.recently_viewed().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_lookup_by_keywords() {
        let service = offline_service();
        let lookup = service.fetch_one("yoga-mat-9000").await;

        assert_eq!(lookup.record.name, "Yoga Mat");
        assert_eq!(lookup.resolution.source_kind, ResolutionKind::FallbackSearch);
        assert_eq!(lookup.record.id, resolve("yoga-mat-9000").canonical_id);
        assert_eq!(lookup.record.source_key, "12");
    }

    #[tokio::test]
    async fn test_unknown_id_yields_placeholder() {
        let service = offline_service();
        let lookup = service.fetch_one("###").await;

        assert_eq!(lookup.record.availability, Availability::Unavailable);
        assert_eq!(lookup.record.id, resolve("###").canonical_id);
        assert_eq!(lookup.resolution.source_kind, ResolutionKind::Generated);
        assert_eq!(lookup.source, None);
        assert!(service.recently_viewed().is_empty());
    }
}
