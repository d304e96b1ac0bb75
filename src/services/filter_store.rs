use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::OraError;
use crate::models::filter::{FilterPatch, FilterState};
use crate::models::ora::Ora;
use crate::services::persistence::{StatePort, FAVORITES_KEY};

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedFavorites {
    favorites: Vec<String>,
}

/// Filter predicates and the persisted favorites set
pub struct FilterStore {
    state: FilterState,
    favorites: BTreeSet<String>,
    port: Arc<dyn StatePort>,
}

impl FilterStore {
    /// Load favorites from the port; unreadable content starts an empty set
    pub fn open(port: Arc<dyn StatePort>) -> Result<Self, OraError> {
        let favorites = match port.read(FAVORITES_KEY)? {
            None => BTreeSet::new(),
            Some(raw) => match serde_json::from_str::<PersistedFavorites>(&raw) {
                Ok(stored) => stored.favorites.into_iter().collect(),
                Err(e) => {
                    tracing::warn!("Stored favorites are malformed, resetting: {}", e);
                    BTreeSet::new()
                }
            },
        };

        tracing::debug!("Opened filter store with {} favorites", favorites.len());

        Ok(Self {
            state: FilterState::default(),
            favorites,
            port,
        })
    }

    pub fn filters(&self) -> &FilterState {
        &self.state
    }

    pub fn set_filter(&mut self, patch: FilterPatch) -> &FilterState {
        self.state.apply(patch);
        &self.state
    }

    pub fn clear_trait_filter(&mut self, trait_name: &str) {
        self.state.trait_selections.remove(trait_name);
    }

    pub fn clear_all_filters(&mut self) {
        self.state = FilterState::default();
    }

    pub fn is_favorite(&self, token_id: &str) -> bool {
        self.favorites.contains(token_id)
    }

    pub fn favorites(&self) -> Vec<String> {
        self.favorites.iter().cloned().collect()
    }

    /// Flip one token's favorite flag and persist; returns the new flag
    pub fn toggle_favorite(&mut self, token_id: &str) -> Result<bool, OraError> {
        let now_favorite = if self.favorites.remove(token_id) {
            false
        } else {
            self.favorites.insert(token_id.to_string());
            true
        };

        if let Err(e) = self.persist() {
            // keep memory consistent with what is on disk
            if now_favorite {
                self.favorites.remove(token_id);
            } else {
                self.favorites.insert(token_id.to_string());
            }
            return Err(e);
        }

        Ok(now_favorite)
    }

    fn persist(&self) -> Result<(), OraError> {
        let stored = PersistedFavorites {
            favorites: self.favorites(),
        };
        let raw = serde_json::to_string(&stored).map_err(|e| OraError::Storage(e.to_string()))?;
        self.port.write(FAVORITES_KEY, &raw)
    }

    /// Visible subset of `oras`, in input order
    pub fn apply_filters(&self, oras: &[Ora]) -> Vec<Ora> {
        let search = self.state.search_term();

        oras.iter()
            .filter(|o| !self.state.favorites_only || self.favorites.contains(&o.token_id))
            .filter(|o| match &search {
                Some(term) => search_haystack(o).contains(term.as_str()),
                None => self.matches_traits(o),
            })
            .filter(|o| {
                self.state
                    .token_id_range
                    .is_none_or(|range| range.contains(o.numeric_id()))
            })
            .cloned()
            .collect()
    }

    fn matches_traits(&self, ora: &Ora) -> bool {
        self.state
            .trait_selections
            .iter()
            .filter(|(_, accepted)| !accepted.is_empty())
            .all(|(name, accepted)| {
                ora.traits
                    .get(name)
                    .is_some_and(|value| accepted.contains(value))
            })
    }
}

fn search_haystack(ora: &Ora) -> String {
    let values: Vec<&str> = ora.traits.values().map(String::as_str).collect();
    format!("{} {} {}", ora.name, ora.token_id, values.join(" ")).to_lowercase()
}

/// Distinct, sorted trait values per trait name across `oras`
pub fn available_trait_values(oras: &[Ora]) -> BTreeMap<String, Vec<String>> {
    let mut facets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for ora in oras {
        for (name, value) in &ora.traits {
            if value.trim().is_empty() {
                continue;
            }
            facets.entry(name.clone()).or_default().insert(value.clone());
        }
    }

    facets
        .into_iter()
        .map(|(name, values)| (name, values.into_iter().collect()))
        .collect()
}
