//! Runtime configuration
//!
//! Everything comes from environment variables (optionally loaded from `.env`
//! via dotenvy). `from_lookup` takes an arbitrary key lookup so tests can
//! build configs without touching the process environment.

use std::path::PathBuf;

use crate::error::OraError;

pub const DEFAULT_CONTRACT: &str = "0xd564c25b760cb278a55bdd98831f4ff4b6c97b38";
pub const DEFAULT_COLLECTION_NAME: &str = "Sugartown Ora";
pub const DEFAULT_COLLECTION_SLUG: &str = "sugartown-oras";
pub const DEFAULT_ALTERNATE_SLUGS: &str = "sugartow-noras,sugartown-ora,sugartownoras";
pub const DEFAULT_TOKEN_STANDARD: &str = "ERC721";

pub const DEFAULT_MORALIS_BASE_URL: &str = "https://deep-index.moralis.io/api/v2.2";
pub const DEFAULT_OPENSEA_BASE_URL: &str = "https://api.opensea.io/api/v2";
pub const DEFAULT_ENS_PRIMARY_URL: &str = "https://api.ensideas.com/ens/resolve";
pub const DEFAULT_ENS_FALLBACK_URL: &str = "https://api.web3.bio/profile";

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 100;

/// How the displayed Ora number is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayIdMode {
    /// Display number is the on-chain token ID
    TokenId,
    /// Display number is taken from `#<digits>` in the metadata name when present
    NameNumber,
}

impl std::str::FromStr for DisplayIdMode {
    type Err = OraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "token_id" | "tokenid" => Ok(DisplayIdMode::TokenId),
            "name_number" | "namenumber" => Ok(DisplayIdMode::NameNumber),
            other => Err(OraError::InvalidConfig(format!(
                "ORA_DISPLAY_ID must be 'token_id' or 'name_number', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipProvider {
    Moralis,
    OpenSea,
}

impl std::str::FromStr for OwnershipProvider {
    type Err = OraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "moralis" => Ok(OwnershipProvider::Moralis),
            "opensea" => Ok(OwnershipProvider::OpenSea),
            other => Err(OraError::InvalidConfig(format!(
                "OWNERSHIP_PROVIDER must be 'moralis' or 'opensea', got '{}'",
                other
            ))),
        }
    }
}

/// The collection being browsed
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Display name used in fallback names ("<name> #<tokenId>")
    pub name: String,
    /// Lower-cased contract addresses; the first one is the primary contract
    pub allowlist: Vec<String>,
    pub slug: String,
    /// Slugs tried in order when the primary slug request fails
    pub alternate_slugs: Vec<String>,
    pub token_standard: String,
    pub display_id: DisplayIdMode,
}

impl CollectionConfig {
    pub fn primary_contract(&self) -> &str {
        self.allowlist.first().map(String::as_str).unwrap_or(DEFAULT_CONTRACT)
    }

    pub fn is_allowlisted(&self, contract: &str) -> bool {
        let contract = contract.trim().to_lowercase();
        self.allowlist.iter().any(|c| *c == contract)
    }

    pub fn fallback_name(&self, token_id: &str) -> String {
        format!("{} #{}", self.name, token_id)
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COLLECTION_NAME.to_string(),
            allowlist: vec![DEFAULT_CONTRACT.to_string()],
            slug: DEFAULT_COLLECTION_SLUG.to_string(),
            alternate_slugs: split_list(DEFAULT_ALTERNATE_SLUGS),
            token_standard: DEFAULT_TOKEN_STANDARD.to_string(),
            display_id: DisplayIdMode::TokenId,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub state_dir: PathBuf,
    pub collection: CollectionConfig,
    pub provider: OwnershipProvider,
    pub moralis_api_key: Option<String>,
    pub moralis_base_url: String,
    pub opensea_api_key: Option<String>,
    pub opensea_base_url: String,
    pub ens_primary_url: String,
    pub ens_fallback_url: String,
    pub page_size: u32,
    pub metadata_cache_ttl_secs: u64,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, OraError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, OraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let allowlist: Vec<String> = split_list(
            &get("ORA_CONTRACTS").unwrap_or_else(|| DEFAULT_CONTRACT.to_string()),
        )
        .into_iter()
        .map(|c| c.to_lowercase())
        .collect();

        for contract in &allowlist {
            if !crate::services::ens::is_hex_address(contract) {
                return Err(OraError::InvalidConfig(format!(
                    "ORA_CONTRACTS entry '{}' is not a 0x-prefixed 40 hex char address",
                    contract
                )));
            }
        }
        if allowlist.is_empty() {
            return Err(OraError::InvalidConfig("ORA_CONTRACTS is empty".to_string()));
        }

        let display_id = match get("ORA_DISPLAY_ID") {
            Some(v) => v.parse()?,
            None => DisplayIdMode::TokenId,
        };

        let provider = match get("OWNERSHIP_PROVIDER") {
            Some(v) => v.parse()?,
            None => OwnershipProvider::Moralis,
        };

        let moralis_api_key = get("MORALIS_API_KEY");
        if provider == OwnershipProvider::Moralis && moralis_api_key.is_none() {
            return Err(OraError::InvalidConfig("Missing MORALIS_API_KEY".to_string()));
        }

        let page_size = parse_number::<u32>(&get, "PAGE_SIZE", DEFAULT_PAGE_SIZE)?
            .clamp(1, MAX_PAGE_SIZE);

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            state_dir: PathBuf::from(get("STATE_DIR").unwrap_or_else(|| ".ora-state".to_string())),
            collection: CollectionConfig {
                name: get("ORA_COLLECTION_NAME")
                    .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
                allowlist,
                slug: get("ORA_COLLECTION_SLUG")
                    .unwrap_or_else(|| DEFAULT_COLLECTION_SLUG.to_string()),
                alternate_slugs: split_list(
                    &get("ORA_ALTERNATE_SLUGS")
                        .unwrap_or_else(|| DEFAULT_ALTERNATE_SLUGS.to_string()),
                ),
                token_standard: get("ORA_TOKEN_STANDARD")
                    .unwrap_or_else(|| DEFAULT_TOKEN_STANDARD.to_string()),
                display_id,
            },
            provider,
            moralis_api_key,
            moralis_base_url: get("MORALIS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MORALIS_BASE_URL.to_string()),
            opensea_api_key: get("OPENSEA_API_KEY"),
            opensea_base_url: get("OPENSEA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEA_BASE_URL.to_string()),
            ens_primary_url: get("ENS_PRIMARY_URL")
                .unwrap_or_else(|| DEFAULT_ENS_PRIMARY_URL.to_string()),
            ens_fallback_url: get("ENS_FALLBACK_URL")
                .unwrap_or_else(|| DEFAULT_ENS_FALLBACK_URL.to_string()),
            page_size,
            metadata_cache_ttl_secs: parse_number(&get, "METADATA_CACHE_TTL_SECS", 3600)?,
            http_timeout_secs: parse_number(&get, "HTTP_TIMEOUT_SECS", 30)?,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number<T>(
    get: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, OraError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| OraError::InvalidConfig(format!("{} must be a number: {}", key, e))),
        None => Ok(default),
    }
}
