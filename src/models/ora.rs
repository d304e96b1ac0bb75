use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical NFT record for one Ora
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ora {
    pub id: String,
    pub token_id: String,
    /// Number shown to users; equals `token_id` unless the collection numbers by name
    pub display_id: String,
    pub contract: String,
    pub name: String,
    pub image: String,
    pub traits: BTreeMap<String, String>,
    #[serde(alias = "openseaUrl")]
    pub permalink: String,
}

impl Ora {
    /// Build an Ora, deriving `id` and `permalink` from contract + token ID
    pub fn new(
        contract: &str,
        token_id: &str,
        display_id: String,
        name: String,
        image: String,
        traits: BTreeMap<String, String>,
    ) -> Self {
        let contract = contract.trim().to_lowercase();
        Self {
            id: ora_id(&contract, token_id),
            token_id: token_id.to_string(),
            display_id,
            permalink: permalink(&contract, token_id),
            contract,
            name,
            image,
            traits,
        }
    }

    /// Numeric display ID for range filters (non-numeric = 0, beyond u64 saturates)
    pub fn numeric_id(&self) -> u64 {
        match self.display_digits() {
            Some(digits) => digits.parse::<u64>().unwrap_or(u64::MAX),
            None => 0,
        }
    }

    /// Display ID ordering key that stays numeric for digit strings of any length
    pub fn display_sort_key(&self) -> (usize, &str) {
        let digits = self.display_digits().unwrap_or("").trim_start_matches('0');
        (digits.len(), digits)
    }

    fn display_digits(&self) -> Option<&str> {
        let trimmed = self.display_id.trim();
        (!trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit())).then_some(trimmed)
    }
}

pub fn ora_id(contract: &str, token_id: &str) -> String {
    format!("{}:{}", contract.to_lowercase(), token_id)
}

pub fn permalink(contract: &str, token_id: &str) -> String {
    format!(
        "https://opensea.io/assets/ethereum/{}/{}",
        contract.to_lowercase(),
        token_id
    )
}

/// Stable sort by numeric display ID, keeping upstream order on ties
pub fn sort_by_display_id(oras: &mut [Ora]) {
    oras.sort_by(|a, b| a.display_sort_key().cmp(&b.display_sort_key()));
}
