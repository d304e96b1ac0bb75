//! Collection loading pipeline and the dashboard session
//!
//! `CollectionLoader` runs resolve -> fetch -> normalize for one page or for
//! every page of an address. `CollectionSession` owns the visible collection
//! of the current address and decides whether a finished load may still be
//! committed: a result is discarded as `Superseded` once a newer load has
//! started, the address has changed, or another page already consumed the
//! cursor it was requested with.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::CollectionConfig;
use crate::error::OraError;
use crate::models::ora::Ora;
use crate::models::report::PageReport;
use crate::services::ens::{EnsResolver, ResolvedAddress};
use crate::services::metadata::{normalize_page, MetadataSource};
use crate::services::ownership::{OwnershipFetcher, PageOptions};

/// One normalized page
#[derive(Debug, Clone, Default)]
pub struct LoadedPage {
    pub oras: Vec<Ora>,
    pub next_cursor: Option<String>,
    pub report: PageReport,
    /// Slug the upstream served this page under; later cursors must reuse it
    pub collection_slug: Option<String>,
}

pub struct CollectionLoader {
    resolver: EnsResolver,
    fetcher: OwnershipFetcher,
    metadata: Arc<dyn MetadataSource>,
}

impl CollectionLoader {
    pub fn new(resolver: EnsResolver, fetcher: OwnershipFetcher, metadata: Arc<dyn MetadataSource>) -> Self {
        Self {
            resolver,
            fetcher,
            metadata,
        }
    }

    pub fn collection(&self) -> &CollectionConfig {
        self.fetcher.collection()
    }

    pub fn page_size(&self) -> u32 {
        self.fetcher.page_size()
    }

    pub async fn resolve(&self, input: &str) -> Result<ResolvedAddress, OraError> {
        self.resolver.resolve(input).await
    }

    /// Fetch and normalize a single page for an already-resolved address
    pub async fn load_page(&self, address: &str, cursor: Option<&str>) -> Result<LoadedPage, OraError> {
        self.load_page_with(address, cursor, PageOptions::default()).await
    }

    /// Like `load_page`, with per-call slug, contract and page-size overrides
    pub async fn load_page_with(
        &self,
        address: &str,
        cursor: Option<&str>,
        options: PageOptions<'_>,
    ) -> Result<LoadedPage, OraError> {
        let page = self.fetcher.fetch_page(address, cursor, options).await?;

        let overridden;
        let collection = match options.contracts {
            Some(contracts) => {
                overridden = CollectionConfig {
                    allowlist: contracts.iter().map(|c| c.trim().to_lowercase()).collect(),
                    ..self.collection().clone()
                };
                &overridden
            }
            None => self.collection(),
        };
        let normalized = normalize_page(&page.records, collection, self.metadata.as_ref()).await;

        let mut report = normalized.report;
        report.dropped += page.dropped;

        tracing::info!(
            "Loaded page for {}: {} oras, more: {}",
            address,
            normalized.oras.len(),
            page.next_cursor.is_some()
        );

        Ok(LoadedPage {
            oras: normalized.oras,
            next_cursor: page.next_cursor,
            report,
            collection_slug: Some(page.collection_slug),
        })
    }

    /// Follow cursors until the upstream reports no further page
    ///
    /// Pages after the first stay on the slug the first page was served under.
    pub async fn load_all(&self, address: &str) -> Result<LoadedPage, OraError> {
        let mut all = LoadedPage::default();
        let mut seen = HashSet::new();
        let mut seen_cursors = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let options = PageOptions {
                slug: all.collection_slug.as_deref(),
                ..PageOptions::default()
            };
            let page = self.load_page_with(address, cursor.as_deref(), options).await?;
            pages += 1;

            if all.collection_slug.is_none() {
                all.collection_slug = page.collection_slug;
            }

            all.report.merge(&page.report);
            for ora in page.oras {
                if seen.insert(ora.id.clone()) {
                    all.oras.push(ora);
                }
            }

            match page.next_cursor {
                Some(next) if !seen_cursors.insert(next.clone()) => {
                    tracing::warn!("Upstream repeated cursor {}, stopping pagination", next);
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!("Loaded {} oras for {} across {} pages", all.oras.len(), address, pages);
        Ok(all)
    }

    /// Resolve `input` and replace the session's collection with its first page
    pub async fn load_into(&self, session: &RwLock<CollectionSession>, input: &str) -> Result<(), OraError> {
        let ticket = session.write().begin(input);

        let resolved = self.resolve(input).await?;
        let page = self.load_page(&resolved.address, None).await?;

        session.write().commit_load(&ticket, resolved, page)
    }

    /// Append the next page to the session; Ok(0) when nothing is left to load
    pub async fn load_more_into(&self, session: &RwLock<CollectionSession>) -> Result<usize, OraError> {
        let ticket = session.read().begin_more();
        let Some(ticket) = ticket else {
            return Ok(0);
        };

        let options = PageOptions {
            slug: ticket.collection_slug.as_deref(),
            ..PageOptions::default()
        };
        let page = self
            .load_page_with(&ticket.address, Some(&ticket.cursor), options)
            .await?;
        session.write().commit_more(&ticket, page)
    }
}

/// Issued when a first-page load starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub input: String,
}

/// Issued when a next-page load starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoreTicket {
    pub generation: u64,
    pub address: String,
    pub cursor: String,
    pub collection_slug: Option<String>,
}

#[derive(Debug, Default)]
pub struct CollectionSession {
    address: Option<String>,
    source_label: Option<String>,
    oras: Vec<Ora>,
    next_cursor: Option<String>,
    collection_slug: Option<String>,
    generation: u64,
    report: PageReport,
}

impl CollectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn source_label(&self) -> Option<&str> {
        self.source_label.as_deref()
    }

    pub fn oras(&self) -> &[Ora] {
        &self.oras
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn collection_slug(&self) -> Option<&str> {
        self.collection_slug.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn report(&self) -> PageReport {
        self.report
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new load; any load still in flight becomes stale
    pub fn begin(&mut self, input: &str) -> LoadTicket {
        self.generation += 1;
        self.address = None;
        self.source_label = None;
        self.oras.clear();
        self.next_cursor = None;
        self.collection_slug = None;
        self.report = PageReport::default();

        LoadTicket {
            generation: self.generation,
            input: input.trim().to_string(),
        }
    }

    pub fn commit_load(
        &mut self,
        ticket: &LoadTicket,
        resolved: ResolvedAddress,
        page: LoadedPage,
    ) -> Result<(), OraError> {
        if ticket.generation != self.generation {
            tracing::debug!(
                "Discarding stale load for '{}' (generation {} < {})",
                ticket.input,
                ticket.generation,
                self.generation
            );
            return Err(OraError::Superseded);
        }

        let mut seen = HashSet::new();
        self.oras = page
            .oras
            .into_iter()
            .filter(|o| seen.insert(o.id.clone()))
            .collect();
        self.address = Some(resolved.address);
        self.source_label = Some(resolved.source_label);
        self.next_cursor = page.next_cursor;
        self.collection_slug = page.collection_slug;
        self.report = page.report;

        Ok(())
    }

    /// None when no collection is loaded or the last page was reached
    pub fn begin_more(&self) -> Option<MoreTicket> {
        Some(MoreTicket {
            generation: self.generation,
            address: self.address.clone()?,
            cursor: self.next_cursor.clone()?,
            collection_slug: self.collection_slug.clone(),
        })
    }

    /// Append a later page without reordering existing records; returns the number appended
    pub fn commit_more(&mut self, ticket: &MoreTicket, page: LoadedPage) -> Result<usize, OraError> {
        let current = ticket.generation == self.generation
            && self.address.as_deref() == Some(ticket.address.as_str())
            && self.next_cursor.as_deref() == Some(ticket.cursor.as_str());
        if !current {
            tracing::debug!("Discarding stale page for cursor {}", ticket.cursor);
            return Err(OraError::Superseded);
        }

        let mut seen: HashSet<String> = self.oras.iter().map(|o| o.id.clone()).collect();
        let before = self.oras.len();
        for ora in page.oras {
            if seen.insert(ora.id.clone()) {
                self.oras.push(ora);
            }
        }

        self.next_cursor = page.next_cursor;
        self.report.merge(&page.report);

        Ok(self.oras.len() - before)
    }
}
