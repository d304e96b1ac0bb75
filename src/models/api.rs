use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{filter::FilterState, ora::Ora, profile::CmpProfile, report::PageReport};

/// Query parameters for GET /api/oras
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrasQuery {
    pub address: Option<String>,
    pub wallet: Option<String>,          // legacy alias for address
    pub cursor: Option<String>,
    pub format: Option<String>,          // "detailed" (default) or "summary"
    pub include_traits: Option<bool>,    // default: true
    pub limit: Option<i64>,              // clamped to 1..=100
    pub collection: Option<String>,      // slug from a previous pagination block
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub cursor: Option<String>,
    pub page_size: u32,
    /// Slug to send back as `collection` with the cursor
    pub collection: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrasResponse {
    pub oras: Vec<Ora>,
    pub resolved_from: String,
    pub resolved_address: String,
    pub pagination: Pagination,
    pub report: PageReport,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadCollectionRequest {
    pub input: String,
}

/// Filtered view of the dashboard session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    pub address: Option<String>,
    pub source_label: Option<String>,
    pub oras: Vec<Ora>,
    pub total_count: usize,
    pub visible_count: usize,
    pub imported_count: usize,
    pub has_more: bool,
    /// Trait values across the whole collection, unaffected by filters
    pub facets: BTreeMap<String, Vec<String>>,
    pub filters: FilterState,
    pub favorites: Vec<String>,
    pub report: PageReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteToggleResponse {
    pub token_id: String,
    pub favorite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoritesResponse {
    pub favorites: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub token_id: String,
    pub profile: CmpProfile,
    /// True when no overlay exists and defaults were returned
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub category: String,
}
