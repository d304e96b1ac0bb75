//! NFT ownership fetching
//!
//! `OwnershipSource` is one upstream indexer API (Moralis, OpenSea). The
//! `OwnershipFetcher` wraps a source with the collection rules that must hold
//! regardless of what the upstream claims to have filtered: contract
//! allowlist, token standard, and alternate collection-slug retries.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;

use crate::config::CollectionConfig;
use crate::error::OraError;
use crate::models::raw_nft::RawNft;
use crate::models::report::DropReason;

/// Parameters for one upstream page request
#[derive(Debug, Clone)]
pub struct PageQuery<'a> {
    pub address: &'a str,
    pub cursor: Option<&'a str>,
    pub collection_slug: &'a str,
    pub contracts: &'a [String],
    pub limit: u32,
}

/// Unfiltered upstream page
#[derive(Debug, Clone, Default)]
pub struct UpstreamPage {
    pub records: Vec<Value>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait OwnershipSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the upstream scopes results by collection slug (slug retries only make sense then)
    fn filters_by_slug(&self) -> bool;

    async fn request_page(&self, query: &PageQuery<'_>) -> Result<UpstreamPage, OraError>;
}

/// Parse `{result|nfts|assets: [...], cursor|next: "..."}`
pub fn parse_page_body(body: Value) -> UpstreamPage {
    let records = ["result", "nfts", "assets"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default();

    let next_cursor = ["cursor", "next"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    UpstreamPage { records, next_cursor }
}

/// Map a non-2xx response to RateLimited (429) or Upstream
async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, OraError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(OraError::RateLimited {
            provider: provider.to_string(),
        });
    }

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(OraError::upstream(
            status.as_u16(),
            format!("{} API error: {}", provider, error_text),
        ));
    }

    Ok(response)
}

#[derive(Clone)]
pub struct MoralisSource {
    client: Client,
    api_key: String,
    base_url: String,
    chain: String,
}

impl MoralisSource {
    pub fn new(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain: "eth".to_string(),
        }
    }
}

#[async_trait]
impl OwnershipSource for MoralisSource {
    fn name(&self) -> &'static str {
        "Moralis"
    }

    fn filters_by_slug(&self) -> bool {
        false
    }

    async fn request_page(&self, query: &PageQuery<'_>) -> Result<UpstreamPage, OraError> {
        let url = format!("{}/{}/nft", self.base_url, query.address);

        let mut params: Vec<(&str, String)> = vec![
            ("chain", self.chain.clone()),
            ("format", "decimal".to_string()),
            ("normalizeMetadata", "true".to_string()),
            ("mediaItems", "false".to_string()),
            ("includePrices", "false".to_string()),
            ("excludeSpam", "true".to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(cursor) = query.cursor {
            params.push(("cursor", cursor.to_string()));
        }
        // Moralis accepts repeated token_addresses params
        for contract in query.contracts {
            params.push(("token_addresses", contract.to_lowercase()));
        }

        tracing::debug!(address = %query.address, cursor = ?query.cursor, "Fetching Moralis page");

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .header("X-API-Key", &self.api_key)
            .query(&params)
            .send()
            .await
            .map_err(OraError::transport)?;

        let response = check_status(self.name(), response).await?;
        let body: Value = response.json().await.map_err(OraError::transport)?;

        Ok(parse_page_body(body))
    }
}

#[derive(Clone)]
pub struct OpenSeaSource {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenSeaSource {
    pub fn new(client: Client, api_key: Option<String>, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl OwnershipSource for OpenSeaSource {
    fn name(&self) -> &'static str {
        "OpenSea"
    }

    fn filters_by_slug(&self) -> bool {
        true
    }

    async fn request_page(&self, query: &PageQuery<'_>) -> Result<UpstreamPage, OraError> {
        let url = format!(
            "{}/chain/ethereum/account/{}/nfts",
            self.base_url, query.address
        );

        let mut params: Vec<(&str, String)> = vec![
            ("collection", query.collection_slug.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(cursor) = query.cursor {
            params.push(("next", cursor.to_string()));
        }

        tracing::debug!(
            address = %query.address,
            collection = %query.collection_slug,
            cursor = ?query.cursor,
            "Fetching OpenSea page"
        );

        let mut request = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(&params);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(OraError::transport)?;
        let response = check_status(self.name(), response).await?;
        let body: Value = response.json().await.map_err(OraError::transport)?;

        Ok(parse_page_body(body))
    }
}

/// Per-call overrides of the fetcher defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct PageOptions<'a> {
    /// Slug an earlier page of the same listing was served under
    pub slug: Option<&'a str>,
    /// Replaces the collection allowlist
    pub contracts: Option<&'a [String]>,
    /// Replaces the configured page size
    pub limit: Option<u32>,
}

/// Filtered page of records from the configured collection
#[derive(Debug, Clone, Default)]
pub struct OwnershipPage {
    pub records: Vec<RawNft>,
    pub next_cursor: Option<String>,
    /// Upstream records discarded by shape, allowlist or token-standard checks
    pub dropped: usize,
    /// Slug that produced this page
    pub collection_slug: String,
}

pub struct OwnershipFetcher {
    source: Arc<dyn OwnershipSource>,
    collection: CollectionConfig,
    page_size: u32,
}

impl OwnershipFetcher {
    pub fn new(source: Arc<dyn OwnershipSource>, collection: CollectionConfig, page_size: u32) -> Self {
        Self {
            source,
            collection,
            page_size,
        }
    }

    pub fn collection(&self) -> &CollectionConfig {
        &self.collection
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch one page with the configured allowlist, slug search and page size
    pub async fn fetch(&self, address: &str, cursor: Option<&str>) -> Result<OwnershipPage, OraError> {
        self.fetch_page(address, cursor, PageOptions::default()).await
    }

    /// Fetch one page, keeping only allowlisted contracts with the expected token standard
    ///
    /// Without a pinned slug, a non-2xx upstream answer is retried against each
    /// alternate slug (when the source filters by slug) and the first retry
    /// yielding at least one record wins. With a pinned slug the listing is
    /// continued under that slug only, and an empty page is a valid last page.
    /// 429 is surfaced as `RateLimited` without retries.
    pub async fn fetch_page(
        &self,
        address: &str,
        cursor: Option<&str>,
        options: PageOptions<'_>,
    ) -> Result<OwnershipPage, OraError> {
        let allowlist: Vec<String> = options
            .contracts
            .unwrap_or(&self.collection.allowlist)
            .iter()
            .map(|c| c.trim().to_lowercase())
            .collect();
        let limit = options.limit.unwrap_or(self.page_size);

        if let Some(slug) = options.slug {
            return self.request(address, cursor, slug, &allowlist, limit).await;
        }

        let primary_error = match self
            .request(address, cursor, &self.collection.slug, &allowlist, limit)
            .await
        {
            Ok(page) => return Ok(page),
            Err(e @ OraError::Upstream { status: Some(_), .. }) if self.source.filters_by_slug() => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "{} request for collection '{}' failed: {}",
            self.source.name(),
            self.collection.slug,
            primary_error
        );

        for slug in &self.collection.alternate_slugs {
            tracing::info!("Trying alternative collection slug: {}", slug);

            match self.request(address, cursor, slug, &allowlist, limit).await {
                Ok(page) if !page.records.is_empty() => {
                    tracing::info!("Found {} records with collection slug '{}'", page.records.len(), slug);
                    return Ok(page);
                }
                Ok(_) => {
                    tracing::debug!("Alternative slug '{}' returned no records", slug);
                }
                Err(e @ OraError::RateLimited { .. }) => return Err(e),
                Err(e) => {
                    tracing::debug!("Alternative slug '{}' failed: {}", slug, e);
                }
            }
        }

        Err(primary_error)
    }

    async fn request(
        &self,
        address: &str,
        cursor: Option<&str>,
        slug: &str,
        allowlist: &[String],
        limit: u32,
    ) -> Result<OwnershipPage, OraError> {
        let query = PageQuery {
            address,
            cursor,
            collection_slug: slug,
            contracts: allowlist,
            limit,
        };

        let upstream = self.source.request_page(&query).await?;
        Ok(self.retain(upstream, allowlist, slug))
    }

    fn retain(&self, upstream: UpstreamPage, allowlist: &[String], slug: &str) -> OwnershipPage {
        let total = upstream.records.len();
        let mut records = Vec::with_capacity(total);

        for value in upstream.records {
            match RawNft::classify(value).and_then(|raw| self.check_record(raw, allowlist)) {
                Ok(raw) => records.push(raw),
                Err(reason) => tracing::debug!("Dropping upstream record: {}", reason),
            }
        }

        let dropped = total - records.len();
        tracing::debug!(
            "{}: kept {} of {} records (next cursor: {})",
            self.source.name(),
            records.len(),
            total,
            upstream.next_cursor.is_some()
        );

        OwnershipPage {
            records,
            next_cursor: upstream.next_cursor,
            dropped,
            collection_slug: slug.to_string(),
        }
    }

    fn check_record(&self, raw: RawNft, allowlist: &[String]) -> Result<RawNft, DropReason> {
        let contract = raw.contract().trim().to_lowercase();
        if !allowlist.contains(&contract) {
            return Err(DropReason::NotAllowlisted(contract));
        }

        let expected = &self.collection.token_standard;
        match raw.token_standard() {
            Some(found) if found.trim().eq_ignore_ascii_case(expected) => Ok(raw),
            found => Err(DropReason::WrongStandard {
                expected: expected.clone(),
                found: found.map(str::to_string),
            }),
        }
    }
}
