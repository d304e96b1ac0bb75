//! Off-chain metadata enrichment for a page of records

use async_trait::async_trait;
use futures_util::future::join_all;
use moka::future::Cache;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CollectionConfig;
use crate::models::ora::{sort_by_display_id, Ora};
use crate::models::raw_nft::{MetadataDocument, RawNft};
use crate::models::report::{DegradedReason, PageReport};
use crate::services::normalizer::{normalize_with, remote_metadata_url, RecordOutcome};

#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_document(&self, url: &str) -> Result<MetadataDocument, DegradedReason>;
}

#[derive(Clone)]
pub struct HttpMetadataSource {
    client: Client,
    cache: Arc<Cache<String, MetadataDocument>>,
}

impl HttpMetadataSource {
    pub fn new(client: Client, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            client,
            cache: Arc::new(cache),
        }
    }

    async fn download(&self, url: &str) -> Result<MetadataDocument, String> {
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let body: Value = response.json().await.map_err(|e| e.to_string())?;
        MetadataDocument::from_value(&body).ok_or_else(|| "document is not a JSON object".to_string())
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch_document(&self, url: &str) -> Result<MetadataDocument, DegradedReason> {
        if let Some(doc) = self.cache.get(url).await {
            tracing::debug!("Metadata cache hit for {}", url);
            return Ok(doc);
        }

        match self.download(url).await {
            Ok(doc) => {
                self.cache.insert(url.to_string(), doc.clone()).await;
                Ok(doc)
            }
            Err(message) => Err(DegradedReason::MetadataFetch {
                url: url.to_string(),
                message,
            }),
        }
    }
}

/// Normalized page: Oras sorted by display ID plus outcome counts
#[derive(Debug, Clone, Default)]
pub struct NormalizedPage {
    pub oras: Vec<Ora>,
    pub report: PageReport,
}

/// Normalize a page, fetching missing metadata for all records concurrently
///
/// A failed fetch degrades only its own record. Output keeps upstream order
/// before the final stable sort by display ID.
pub async fn normalize_page(
    records: &[RawNft],
    collection: &CollectionConfig,
    source: &dyn MetadataSource,
) -> NormalizedPage {
    let fetches = records.iter().map(move |raw| async move {
        match remote_metadata_url(raw) {
            Some(url) => Some(source.fetch_document(url).await),
            None => None,
        }
    });
    let fetched = join_all(fetches).await;

    let mut page = NormalizedPage::default();

    for (raw, doc) in records.iter().zip(fetched) {
        match normalize_with(raw, doc, collection) {
            RecordOutcome::Complete(ora) => {
                page.report.complete += 1;
                page.oras.push(ora);
            }
            RecordOutcome::Degraded { ora, reason } => {
                tracing::warn!(token_id = %ora.token_id, "Degraded record: {}", reason);
                page.report.degraded += 1;
                page.oras.push(ora);
            }
            RecordOutcome::Dropped(reason) => {
                tracing::debug!(token_id = %raw.token_id(), "Dropped record: {}", reason);
                page.report.dropped += 1;
            }
        }
    }

    sort_by_display_id(&mut page.oras);

    tracing::info!(
        "Normalized {} records ({} complete, {} degraded, {} dropped)",
        records.len(),
        page.report.complete,
        page.report.degraded,
        page.report.dropped
    );

    page
}
