use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Inclusive numeric bounds on the display ID; either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIdRange {
    #[serde(default)]
    pub min: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
}

impl TokenIdRange {
    pub fn contains(&self, id: u64) -> bool {
        self.min.is_none_or(|min| id >= min) && self.max.is_none_or(|max| id <= max)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub trait_selections: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub token_id_range: Option<TokenIdRange>,
    #[serde(default)]
    pub favorites_only: bool,
}

/// Partial update to `FilterState`
///
/// `tokenIdRange: null` clears the range, an absent field leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPatch {
    #[serde(default)]
    pub search_text: Option<String>,
    #[serde(default)]
    pub trait_selections: Option<BTreeMap<String, BTreeSet<String>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub token_id_range: Option<Option<TokenIdRange>>,
    #[serde(default)]
    pub favorites_only: Option<bool>,
}

impl FilterState {
    pub fn apply(&mut self, patch: FilterPatch) {
        if let Some(search_text) = patch.search_text {
            self.search_text = search_text;
        }
        if let Some(selections) = patch.trait_selections {
            self.trait_selections = selections
                .into_iter()
                .filter(|(_, values)| !values.is_empty())
                .collect();
        }
        if let Some(range) = patch.token_id_range {
            self.token_id_range = range;
        }
        if let Some(favorites_only) = patch.favorites_only {
            self.favorites_only = favorites_only;
        }
    }

    /// Trimmed, lower-cased search text, or None when search is inactive
    pub fn search_term(&self) -> Option<String> {
        let term = self.search_text.trim();
        if term.is_empty() {
            None
        } else {
            Some(term.to_lowercase())
        }
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
