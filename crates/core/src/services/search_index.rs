//! Search index backends.
//!
//! The primary store is the source of truth; a [`SearchIndex`] only holds
//! the searchable fields of each row and answers which ids match a query,
//! best first. Three implementations are provided:
//! - [`MemorySearchIndex`] keeps documents in process (tests, single node)
//! - `MeilisearchIndex` talks to a Meilisearch server (`meilisearch` feature)
//! - [`NoOpSearchIndex`] is used when search is disabled

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use flock_common::{AppError, AppResult, config::SearchBackendKind, config::SearchConfig};
use flock_db::IndexKey;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[cfg(feature = "meilisearch")]
use meilisearch_sdk::client::Client as MeilisearchClient;
#[cfg(feature = "meilisearch")]
use serde::Deserialize;

/// Ids matching a query, best first, plus the total number of matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexHits {
    /// Ids on the requested page, in rank order.
    pub ids: Vec<String>,
    /// Matches across all pages.
    pub total: u64,
}

/// External full-text index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Insert or replace the document for `key`.
    async fn add_to_index(&self, key: &IndexKey, fields: &Map<String, Value>) -> AppResult<()>;

    /// Remove the document for `key`. Removing a missing document is not an
    /// error.
    async fn remove_from_index(&self, key: &IndexKey) -> AppResult<()>;

    /// Query one index. `page` is 1-based.
    async fn query_index(
        &self,
        index: &str,
        expression: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<IndexHits>;
}

/// Build the index backend selected by the configuration.
pub fn build_search_index(config: &SearchConfig) -> AppResult<Arc<dyn SearchIndex>> {
    if !config.enabled {
        info!("Search disabled, index writes will be skipped");
        return Ok(Arc::new(NoOpSearchIndex));
    }

    match config.backend {
        SearchBackendKind::Memory => Ok(Arc::new(MemorySearchIndex::new())),
        #[cfg(feature = "meilisearch")]
        SearchBackendKind::Meilisearch => {
            let url = config.url.as_deref().ok_or_else(|| {
                AppError::Config("search.url is required for the meilisearch backend".to_string())
            })?;
            Ok(Arc::new(MeilisearchIndex::new(url, config.api_key.clone())?))
        }
        #[cfg(not(feature = "meilisearch"))]
        SearchBackendKind::Meilisearch => Err(AppError::Config(
            "meilisearch backend requested but the `meilisearch` feature is not enabled"
                .to_string(),
        )),
    }
}

/// Index that accepts writes and never matches anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpSearchIndex;

#[async_trait]
impl SearchIndex for NoOpSearchIndex {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn add_to_index(&self, _key: &IndexKey, _fields: &Map<String, Value>) -> AppResult<()> {
        Ok(())
    }

    async fn remove_from_index(&self, _key: &IndexKey) -> AppResult<()> {
        Ok(())
    }

    async fn query_index(
        &self,
        _index: &str,
        _expression: &str,
        _page: u64,
        _per_page: u64,
    ) -> AppResult<IndexHits> {
        Ok(IndexHits::default())
    }
}

type Documents = BTreeMap<String, Map<String, Value>>;

/// In-process index.
///
/// Matching is case-insensitive on whole words. A document's score is the
/// number of occurrences of query words across its string fields; equal
/// scores are ordered by id.
#[derive(Clone, Default)]
pub struct MemorySearchIndex {
    indexes: Arc<RwLock<HashMap<String, Documents>>>,
}

impl MemorySearchIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in one index.
    pub async fn len(&self, index: &str) -> usize {
        self.indexes.read().await.get(index).map_or(0, BTreeMap::len)
    }

    /// Stored fields of one document.
    pub async fn document(&self, key: &IndexKey) -> Option<Map<String, Value>> {
        self.indexes
            .read()
            .await
            .get(key.index)
            .and_then(|docs| docs.get(&key.id))
            .cloned()
    }

    fn score(fields: &Map<String, Value>, terms: &[String]) -> usize {
        fields
            .values()
            .filter_map(Value::as_str)
            .flat_map(tokenize)
            .filter(|word| terms.contains(word))
            .count()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn add_to_index(&self, key: &IndexKey, fields: &Map<String, Value>) -> AppResult<()> {
        self.indexes
            .write()
            .await
            .entry(key.index.to_string())
            .or_default()
            .insert(key.id.clone(), fields.clone());
        Ok(())
    }

    async fn remove_from_index(&self, key: &IndexKey) -> AppResult<()> {
        if let Some(docs) = self.indexes.write().await.get_mut(key.index) {
            docs.remove(&key.id);
        }
        Ok(())
    }

    async fn query_index(
        &self,
        index: &str,
        expression: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<IndexHits> {
        let terms: Vec<String> = tokenize(expression).collect();
        if terms.is_empty() {
            return Ok(IndexHits::default());
        }

        let indexes = self.indexes.read().await;
        let Some(docs) = indexes.get(index) else {
            return Ok(IndexHits::default());
        };

        let mut scored: Vec<(usize, &String)> = docs
            .iter()
            .map(|(id, fields)| (Self::score(fields, &terms), id))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let skip = page.saturating_sub(1).saturating_mul(per_page);
        let ids = scored
            .iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(per_page).unwrap_or(usize::MAX))
            .map(|(_, id)| (*id).clone())
            .collect();

        debug!(index, expression, total = scored.len(), "Memory index query");

        Ok(IndexHits {
            ids,
            total: scored.len() as u64,
        })
    }
}

/// Meilisearch-backed index. Each entity index maps to a Meilisearch index
/// of the same name with primary key `id`.
#[cfg(feature = "meilisearch")]
#[derive(Clone)]
pub struct MeilisearchIndex {
    client: MeilisearchClient,
}

#[cfg(feature = "meilisearch")]
#[derive(Deserialize)]
struct DocumentId {
    id: String,
}

#[cfg(feature = "meilisearch")]
impl MeilisearchIndex {
    /// Create a client for the server at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> AppResult<Self> {
        let client = MeilisearchClient::new(url, api_key)
            .map_err(|e| AppError::Config(format!("Invalid Meilisearch client settings: {e}")))?;
        info!(url = %url, "Meilisearch client initialized");
        Ok(Self { client })
    }
}

#[cfg(feature = "meilisearch")]
#[async_trait]
impl SearchIndex for MeilisearchIndex {
    fn name(&self) -> &'static str {
        "meilisearch"
    }

    async fn add_to_index(&self, key: &IndexKey, fields: &Map<String, Value>) -> AppResult<()> {
        let mut document = fields.clone();
        document.insert("id".to_string(), Value::String(key.id.clone()));

        self.client
            .index(key.index)
            .add_documents(&[Value::Object(document)], Some("id"))
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to index {key}: {e}")))?;
        Ok(())
    }

    async fn remove_from_index(&self, key: &IndexKey) -> AppResult<()> {
        self.client
            .index(key.index)
            .delete_document(&key.id)
            .await
            .map_err(|e| {
                AppError::ExternalService(format!("Failed to remove {key} from index: {e}"))
            })?;
        Ok(())
    }

    async fn query_index(
        &self,
        index: &str,
        expression: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<IndexHits> {
        let index = self.client.index(index);
        let results = index
            .search()
            .with_query(expression)
            .with_page(usize::try_from(page).unwrap_or(usize::MAX))
            .with_hits_per_page(usize::try_from(per_page).unwrap_or(usize::MAX))
            .execute::<DocumentId>()
            .await
            .map_err(|e| AppError::ExternalService(format!("Meilisearch search failed: {e}")))?;

        let ids: Vec<String> = results.hits.into_iter().map(|hit| hit.result.id).collect();
        let total = results.total_hits.unwrap_or(ids.len()) as u64;

        Ok(IndexHits { ids, total })
    }
}
