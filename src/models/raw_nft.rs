//! Upstream NFT record shapes
//!
//! Three providers return ownership records in different layouts. Each layout
//! gets its own struct; `RawNft::classify` picks the variant from the fields a
//! record carries:
//!
//! - Moralis: `token_address` + `token_id`
//! - OpenSea v2: `identifier` + `contract`
//! - OpenSea v1: `token_id` + `asset_contract.address`

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::report::DropReason;

#[derive(Debug, Clone, Deserialize)]
pub struct MoralisNft {
    pub token_address: String,
    #[serde(deserialize_with = "string_or_number")]
    pub token_id: String,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Raw metadata JSON as a string
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub normalized_metadata: Option<Value>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSeaV2Nft {
    #[serde(deserialize_with = "string_or_number")]
    pub identifier: String,
    pub contract: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub token_standard: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub display_image_url: Option<String>,
    #[serde(default)]
    pub metadata_url: Option<String>,
    #[serde(default)]
    pub opensea_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSeaV1Contract {
    pub address: String,
    #[serde(default)]
    pub schema_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSeaV1Asset {
    #[serde(deserialize_with = "string_or_number")]
    pub token_id: String,
    pub asset_contract: OpenSeaV1Contract,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub traits: Vec<Value>,
    #[serde(default)]
    pub permalink: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RawNft {
    Moralis(MoralisNft),
    OpenSeaV2(OpenSeaV2Nft),
    OpenSeaV1(OpenSeaV1Asset),
}

impl RawNft {
    /// Select the schema variant from discriminant fields, then parse it
    pub fn classify(value: Value) -> Result<RawNft, DropReason> {
        let Some(obj) = value.as_object() else {
            return Err(DropReason::UnknownShape);
        };

        let result = if obj.contains_key("token_address") {
            serde_json::from_value(value).map(RawNft::Moralis)
        } else if obj.contains_key("identifier") && obj.contains_key("contract") {
            serde_json::from_value(value).map(RawNft::OpenSeaV2)
        } else if obj.contains_key("asset_contract") {
            serde_json::from_value(value).map(RawNft::OpenSeaV1)
        } else {
            return Err(DropReason::UnknownShape);
        };

        result.map_err(|e| DropReason::Malformed(e.to_string()))
    }

    pub fn provider(&self) -> &'static str {
        match self {
            RawNft::Moralis(_) => "moralis",
            RawNft::OpenSeaV2(_) => "opensea-v2",
            RawNft::OpenSeaV1(_) => "opensea-v1",
        }
    }

    pub fn contract(&self) -> &str {
        match self {
            RawNft::Moralis(n) => &n.token_address,
            RawNft::OpenSeaV2(n) => &n.contract,
            RawNft::OpenSeaV1(n) => &n.asset_contract.address,
        }
    }

    pub fn token_id(&self) -> &str {
        match self {
            RawNft::Moralis(n) => &n.token_id,
            RawNft::OpenSeaV2(n) => &n.identifier,
            RawNft::OpenSeaV1(n) => &n.token_id,
        }
    }

    /// Reported token standard ("ERC721", "erc1155", ...)
    pub fn token_standard(&self) -> Option<&str> {
        match self {
            RawNft::Moralis(n) => n.contract_type.as_deref(),
            RawNft::OpenSeaV2(n) => n.token_standard.as_deref(),
            RawNft::OpenSeaV1(n) => n.asset_contract.schema_name.as_deref(),
        }
    }

    /// Off-chain metadata document location, if the record carries one
    pub fn metadata_url(&self) -> Option<&str> {
        let url = match self {
            RawNft::Moralis(n) => n.token_uri.as_deref(),
            RawNft::OpenSeaV2(n) => n.metadata_url.as_deref(),
            RawNft::OpenSeaV1(_) => None,
        };
        url.map(str::trim).filter(|u| !u.is_empty())
    }

    pub fn base_name(&self) -> Option<&str> {
        let name = match self {
            RawNft::Moralis(n) => n.name.as_deref(),
            RawNft::OpenSeaV2(n) => n.name.as_deref(),
            RawNft::OpenSeaV1(n) => n.name.as_deref(),
        };
        non_empty(name)
    }

    pub fn base_image(&self) -> Option<&str> {
        match self {
            RawNft::Moralis(_) => None,
            RawNft::OpenSeaV2(n) => {
                non_empty(n.display_image_url.as_deref()).or(non_empty(n.image_url.as_deref()))
            }
            RawNft::OpenSeaV1(n) => non_empty(n.image_url.as_deref()),
        }
    }
}

/// Off-chain or inline metadata in the common `{name, image, attributes}` layout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataDocument {
    pub name: Option<String>,
    pub image: Option<String>,
    pub attributes: Vec<Value>,
}

impl MetadataDocument {
    /// Lenient parse; anything that isn't a JSON object yields None
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            name: text("name"),
            image: text("image")
                .or_else(|| text("image_url"))
                .or_else(|| text("imageURI")),
            attributes: obj
                .get("attributes")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        })
    }

    pub fn from_json_str(raw: &str) -> Option<Self> {
        serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|v| Self::from_value(&v))
    }

    pub fn traits(&self) -> BTreeMap<String, String> {
        extract_traits(&self.attributes)
    }
}

/// Build a trait map from an attributes list
///
/// Keys come from `trait_type` or `type`, values from `value` or `traitValue`.
/// Entries missing either side are skipped; null and empty values count as missing.
pub fn extract_traits(attributes: &[Value]) -> BTreeMap<String, String> {
    let mut traits = BTreeMap::new();

    for attr in attributes {
        let key = attr
            .get("trait_type")
            .and_then(stringify)
            .or_else(|| attr.get("type").and_then(stringify));
        let value = attr
            .get("value")
            .and_then(stringify)
            .or_else(|| attr.get("traitValue").and_then(stringify));

        if let (Some(k), Some(v)) = (key, value) {
            traits.insert(k, v);
        }
    }

    traits
}

fn stringify(value: &Value) -> Option<String> {
    let s = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    if s.is_empty() { None } else { Some(s) }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
