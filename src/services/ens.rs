//! ENS name resolution
//!
//! Hex addresses pass straight through (checksummed). Names go to a fixed,
//! ordered list of HTTP resolution services; the first one that returns a
//! valid address wins and later services are never called.

use alloy::primitives::Address;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::OraError;

pub const WALLET_LABEL: &str = "Wallet";

lazy_static! {
    static ref HEX_ADDRESS: Regex = Regex::new(r"^0x[a-fA-F0-9]{40}$").unwrap();
}

pub fn is_hex_address(input: &str) -> bool {
    HEX_ADDRESS.is_match(input)
}

/// EIP-55 checksum form of a hex address
pub fn checksum_address(input: &str) -> Result<String, OraError> {
    if !is_hex_address(input) {
        return Err(OraError::InvalidInput(format!(
            "'{}' is not a 0x-prefixed 40 hex char address",
            input
        )));
    }
    Address::from_str(input)
        .map(|a| a.to_checksum(None))
        .map_err(|e| OraError::InvalidInput(format!("Invalid address '{}': {}", input, e)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAddress {
    /// Checksummed address
    pub address: String,
    /// "Wallet" for direct addresses, otherwise the ENS name as entered
    pub source_label: String,
}

/// One external name resolution service
#[async_trait]
pub trait NameService: Send + Sync {
    fn label(&self) -> &str;

    /// Ok(None) means the service answered but had no address
    async fn lookup(&self, name: &str) -> Result<Option<String>, OraError>;
}

/// `GET <base_url>/<name>` returning `{ "address": "0x..." }`
pub struct HttpNameService {
    label: String,
    base_url: String,
    client: Client,
}

impl HttpNameService {
    pub fn new(label: impl Into<String>, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            label: label.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl NameService for HttpNameService {
    fn label(&self) -> &str {
        &self.label
    }

    async fn lookup(&self, name: &str) -> Result<Option<String>, OraError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            OraError::InvalidConfig(format!("Invalid resolver URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| OraError::InvalidConfig(format!("Resolver URL {} cannot take a path", self.base_url)))?
            .push(name);

        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(OraError::transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OraError::upstream(status.as_u16(), error_text));
        }

        let body: Value = response.json().await.map_err(OraError::transport)?;
        Ok(extract_address(&body))
    }
}

/// Pull an address out of a resolver response; some services wrap it in an array
fn extract_address(body: &Value) -> Option<String> {
    let obj = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    obj.get("address")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub struct EnsResolver {
    services: Vec<Arc<dyn NameService>>,
}

impl EnsResolver {
    pub fn new(services: Vec<Arc<dyn NameService>>) -> Self {
        Self { services }
    }

    /// Resolver with the primary and fallback HTTP services
    pub fn http(primary_url: &str, fallback_url: &str, client: Client) -> Self {
        let primary: Arc<dyn NameService> =
            Arc::new(HttpNameService::new("ensideas", primary_url, client.clone()));
        let fallback: Arc<dyn NameService> =
            Arc::new(HttpNameService::new("web3.bio", fallback_url, client));
        Self::new(vec![primary, fallback])
    }

    pub async fn resolve(&self, input: &str) -> Result<ResolvedAddress, OraError> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Err(OraError::InvalidInput(
                "Please provide a wallet address or ENS name".to_string(),
            ));
        }

        if is_hex_address(trimmed) {
            return Ok(ResolvedAddress {
                address: checksum_address(trimmed)?,
                source_label: WALLET_LABEL.to_string(),
            });
        }

        validate_name(trimmed)?;
        let name = trimmed.to_lowercase();

        for service in &self.services {
            match service.lookup(&name).await {
                Ok(Some(raw)) => match checksum_address(&raw) {
                    Ok(address) => {
                        tracing::info!("ENS resolved {} -> {} via {}", name, address, service.label());
                        return Ok(ResolvedAddress {
                            address,
                            source_label: trimmed.to_string(),
                        });
                    }
                    Err(_) => {
                        tracing::warn!(
                            "{} returned an unusable address '{}' for {}",
                            service.label(),
                            raw,
                            name
                        );
                    }
                },
                Ok(None) => {
                    tracing::debug!("{} has no address for {}", service.label(), name);
                }
                Err(e) => {
                    tracing::warn!("{} lookup failed for {}: {}", service.label(), name, e);
                }
            }
        }

        Err(OraError::NotFound {
            input: trimmed.to_string(),
        })
    }
}

/// Characters that would change the meaning of the resolver URL
const URL_RESERVED: [char; 8] = ['/', '?', '#', '%', '\\', '@', ':', '&'];

fn validate_name(name: &str) -> Result<(), OraError> {
    if name.starts_with("0x") && !name.contains('.') {
        return Err(OraError::InvalidInput(format!(
            "'{}' is not a valid address (expected 0x followed by 40 hex chars)",
            name
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || URL_RESERVED.contains(&c)) || !name.contains('.') {
        return Err(OraError::InvalidInput(format!(
            "'{}' is not a valid address or ENS name",
            name
        )));
    }
    if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
        return Err(OraError::InvalidInput(format!("'{}' is not a valid ENS name", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    struct StubService {
        label: &'static str,
        answer: Result<Option<String>, u16>,
        calls: Mutex<Vec<String>>,
    }

    impl StubService {
        fn new(label: &'static str, answer: Result<Option<String>, u16>) -> Arc<Self> {
            Arc::new(Self { label, answer, calls: Mutex::new(Vec::new()) })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    fn resolver_with(stubs: &[&Arc<StubService>]) -> EnsResolver {
        EnsResolver::new(
            stubs
                .iter()
                .map(|s| Arc::clone(*s) as Arc<dyn NameService>)
                .collect(),
        )
    }

    #[async_trait]
    impl NameService for StubService {
        fn label(&self) -> &str {
            self.label
        }

        async fn lookup(&self, name: &str) -> Result<Option<String>, OraError> {
            self.calls.lock().push(name.to_string());
            self.answer
                .clone()
                .map_err(|status| OraError::upstream(status, "stub failure"))
        }
    }

    const VITALIK: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
    const VITALIK_CHECKSUM: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

    #[test]
    fn test_checksum_address() {
        assert_eq!(checksum_address(VITALIK).unwrap(), VITALIK_CHECKSUM);
        assert_eq!(
            checksum_address(&VITALIK.to_uppercase().replace("0X", "0x")).unwrap(),
            VITALIK_CHECKSUM
        );
        assert!(checksum_address("0x123").is_err());
    }

    #[test]
    fn test_extract_address_shapes() {
        assert_eq!(
            extract_address(&json!({ "address": VITALIK })).as_deref(),
            Some(VITALIK)
        );
        assert_eq!(
            extract_address(&json!([{ "address": VITALIK }])).as_deref(),
            Some(VITALIK)
        );
        assert!(extract_address(&json!({ "address": "" })).is_none());
        assert!(extract_address(&json!({})).is_none());
    }

    #[tokio::test]
    async fn test_url_reserved_characters_are_rejected() {
        let primary = StubService::new("primary", Ok(Some(VITALIK.to_string())));
        let resolver = resolver_with(&[&primary]);

        for input in ["vitalik.eth#x", "vitalik.eth?a=1", "evil/vitalik.eth", "vitalik%2eeth"] {
            let err = resolver.resolve(input).await.unwrap_err();
            assert!(matches!(err, OraError::InvalidInput(_)), "{}", input);
        }
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_address_passes_through_without_lookup() {
        let primary = StubService::new("primary", Ok(None));
        let resolver = resolver_with(&[&primary]);

        let resolved = resolver.resolve(&format!("  {}  ", VITALIK)).await.unwrap();

        assert_eq!(resolved.address, VITALIK_CHECKSUM);
        assert_eq!(resolved.source_label, WALLET_LABEL);
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = StubService::new("primary", Ok(Some(VITALIK.to_string())));
        let fallback = StubService::new("fallback", Ok(Some(VITALIK.to_string())));
        let resolver = resolver_with(&[&primary, &fallback]);

        let resolved = resolver.resolve("Vitalik.eth").await.unwrap();

        assert_eq!(resolved.address, VITALIK_CHECKSUM);
        assert_eq!(resolved.source_label, "Vitalik.eth");
        assert_eq!(primary.calls.lock().as_slice(), ["vitalik.eth"]);
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_after_primary_error() {
        let primary = StubService::new("primary", Err(500));
        let fallback = StubService::new("fallback", Ok(Some(VITALIK.to_string())));
        let resolver = resolver_with(&[&primary, &fallback]);

        let resolved = resolver.resolve("vitalik.eth").await.unwrap();

        assert_eq!(resolved.address, VITALIK_CHECKSUM);
        assert_eq!(primary.call_count(), 1);
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_after_missing_or_bad_address() {
        let primary = StubService::new("primary", Ok(Some("not-an-address".to_string())));
        let fallback = StubService::new("fallback", Ok(Some(VITALIK.to_string())));
        let resolver = resolver_with(&[&primary, &fallback]);

        assert!(resolver.resolve("vitalik.eth").await.is_ok());
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn test_not_found_carries_input() {
        let primary = StubService::new("primary", Ok(None));
        let fallback = StubService::new("fallback", Err(404));
        let resolver = resolver_with(&[&primary, &fallback]);

        let err = resolver.resolve(" ghost.eth ").await.unwrap_err();
        match err {
            OraError::NotFound { input } => assert_eq!(input, "ghost.eth"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_inputs() {
        let primary = StubService::new("primary", Ok(Some(VITALIK.to_string())));
        let resolver = resolver_with(&[&primary]);

        for input in ["", "   ", "0x1234", "vitalik", "two words.eth", "bad..eth"] {
            let result = resolver.resolve(input).await;
            assert!(
                matches!(result, Err(OraError::InvalidInput(_))),
                "{:?} should be invalid, got {:?}",
                input,
                result
            );
        }
        assert_eq!(primary.call_count(), 0);
    }
}
