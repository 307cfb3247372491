//! The search index adapter. Talks to an Elasticsearch-compatible HTTP
//! endpoint directly via `reqwest`, since no maintained `elasticsearch`
//! crate appears anywhere in the corpus this workspace was grounded on.
//!
//! `amount` is stored as `f64` here and nowhere else: the relational store
//! remains the precision authority for monetary arithmetic.

mod document;
mod query;

use activity_model::TransactionFilter;
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

pub use document::SearchDocument;
pub use query::{Paging, ReturnMode};

const INDEX: &str = "transactions";

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("search index returned unexpected status {0}")]
    UnexpectedStatus(reqwest::StatusCode),
    #[error("search index returned malformed response: {0}")]
    MalformedResponse(String),
}

/// Outcome of an [`SearchIndex::index`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The document was written (created or overwritten).
    Applied,
    /// The index already holds a version >= the one supplied; the write was
    /// rejected, which is the expected, benign outcome of a reordered retry.
    Stale,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub document: Option<SearchDocument>,
}

#[derive(Clone)]
pub struct SearchIndex {
    client: reqwest::Client,
    base_url: Url,
}

impl SearchIndex {
    /// `timeout` bounds every outbound call to the index, mirroring the
    /// `EXTERNAL_SERVICE_TIMEOUT` default applied to every other downstream
    /// dependency.
    pub fn new(base_url: Url, timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client builds with a plain timeout"),
            base_url,
        }
    }

    fn doc_url(&self, id: Uuid) -> Url {
        self.base_url
            .join(&format!("{INDEX}/_doc/{id}"))
            .expect("well-formed document url")
    }

    /// Creates the index with its mapping if it does not already exist.
    #[tracing::instrument(skip(self), err)]
    pub async fn ensure_index(&self) -> Result<(), SearchError> {
        let index_url = self.base_url.join(INDEX).expect("well-formed index url");
        let head = self.client.head(index_url.clone()).send().await?;
        if head.status().is_success() {
            return Ok(());
        }

        let mapping = json!({
            "mappings": {
                "properties": {
                    "id": {"type": "keyword"},
                    "user_id": {"type": "keyword"},
                    "transaction_type": {"type": "keyword"},
                    "product": {"type": "keyword"},
                    "status": {"type": "keyword"},
                    "currency": {"type": "keyword"},
                    "amount": {"type": "float"},
                    "created_at": {"type": "date"},
                    "search_content": {
                        "type": "text",
                        "analyzer": "standard",
                        "fields": {"keyword": {"type": "keyword"}}
                    },
                    "metadata": {"type": "object", "enabled": true}
                }
            }
        });

        let resp = self.client.put(index_url).json(&mapping).send().await?;
        if !resp.status().is_success() {
            return Err(SearchError::UnexpectedStatus(resp.status()));
        }
        tracing::info!(index = INDEX, "created search index");
        Ok(())
    }

    /// Upserts `document` with external-monotone versioning: the write is
    /// only applied if `version` is >= the index's stored version for this
    /// id. `version` is passed as a query parameter, never embedded in the
    /// document body.
    #[tracing::instrument(skip(self, document), err)]
    pub async fn index(
        &self,
        document: &SearchDocument,
        version: Option<i64>,
    ) -> Result<IndexOutcome, SearchError> {
        let mut url = self.doc_url(document.id);
        if let Some(v) = version {
            url.query_pairs_mut()
                .append_pair("version", &v.to_string())
                .append_pair("version_type", "external_gte");
        }

        let resp = self.client.put(url).json(document).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(IndexOutcome::Applied),
            reqwest::StatusCode::CONFLICT => {
                tracing::debug!(id = %document.id, "index write rejected: version regress");
                Ok(IndexOutcome::Stale)
            }
            other => Err(SearchError::UnexpectedStatus(other)),
        }
    }

    #[tracing::instrument(skip(self, filters), err)]
    pub async fn search(
        &self,
        user_id: &str,
        query: Option<&str>,
        filters: &TransactionFilter,
        paging: Paging,
        return_mode: ReturnMode,
    ) -> Result<(Vec<SearchHit>, i64), SearchError> {
        let body = query::build_search_body(user_id, query, filters, paging);
        let url = self
            .base_url
            .join(&format!("{INDEX}/_search"))
            .expect("well-formed search url");

        let resp = self.client.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(SearchError::UnexpectedStatus(resp.status()));
        }

        let payload: Value = resp.json().await?;
        let total = payload["hits"]["total"]["value"]
            .as_i64()
            .ok_or_else(|| SearchError::MalformedResponse("missing hits.total.value".into()))?;

        let hits = payload["hits"]["hits"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let id_str = hit["_id"]
                .as_str()
                .ok_or_else(|| SearchError::MalformedResponse("missing _id".into()))?;
            let id = Uuid::parse_str(id_str)
                .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;

            let document = if return_mode == ReturnMode::Documents {
                Some(
                    serde_json::from_value::<SearchDocument>(hit["_source"].clone())
                        .map_err(|e| SearchError::MalformedResponse(e.to_string()))?,
                )
            } else {
                None
            };

            results.push(SearchHit { id, document });
        }

        Ok((results, total))
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn delete(&self, id: Uuid) -> Result<(), SearchError> {
        let resp = self.client.delete(self.doc_url(id)).send().await?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(SearchError::UnexpectedStatus(resp.status()))
    }

    /// Fetches the full document for `id`, or `None` if it does not exist.
    /// Used by the search-primary query backend's single-record lookup.
    #[tracing::instrument(skip(self), err)]
    pub async fn get(&self, id: Uuid) -> Result<Option<SearchDocument>, SearchError> {
        let resp = self.client.get(self.doc_url(id)).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(SearchError::UnexpectedStatus(resp.status()));
        }
        let payload: Value = resp.json().await?;
        if payload["found"].as_bool() == Some(false) {
            return Ok(None);
        }
        let document = serde_json::from_value::<SearchDocument>(payload["_source"].clone())
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;
        Ok(Some(document))
    }

    /// The current stored version for `id`, or `None` if the document does
    /// not exist. Used when an incoming event omits its own version.
    #[tracing::instrument(skip(self), err)]
    pub async fn current_version(&self, id: Uuid) -> Result<Option<i64>, SearchError> {
        let resp = self.client.get(self.doc_url(id)).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(SearchError::UnexpectedStatus(resp.status()));
        }
        let payload: Value = resp.json().await?;
        Ok(payload["_version"].as_i64())
    }

    #[tracing::instrument(skip(self))]
    pub async fn health(&self) -> bool {
        match self.client.get(self.base_url.clone()).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
