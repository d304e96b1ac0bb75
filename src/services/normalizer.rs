//! Raw upstream record -> canonical `Ora`
//!
//! Everything here is pure. The only input that may come from the network is
//! an already-fetched off-chain metadata document, handed in by the enricher.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::{CollectionConfig, DisplayIdMode};
use crate::models::ora::Ora;
use crate::models::raw_nft::{MetadataDocument, MoralisNft, OpenSeaV1Asset, OpenSeaV2Nft, RawNft};
use crate::models::report::{DegradedReason, DropReason};

lazy_static! {
    static ref NAME_NUMBER: Regex = Regex::new(r"#(\d+)").unwrap();
}

/// Result of normalizing one record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Complete(Ora),
    /// Built from base-record fields only
    Degraded { ora: Ora, reason: DegradedReason },
    Dropped(DropReason),
}

impl RecordOutcome {
    pub fn into_ora(self) -> Option<Ora> {
        match self {
            RecordOutcome::Complete(ora) | RecordOutcome::Degraded { ora, .. } => Some(ora),
            RecordOutcome::Dropped(_) => None,
        }
    }
}

/// Metadata carried inside the upstream record itself
#[derive(Debug, Clone, PartialEq)]
pub enum InlineMetadata {
    Found(MetadataDocument),
    /// A metadata string was present but is not a JSON object
    Unparseable,
    Absent,
}

pub fn inline_metadata(raw: &RawNft) -> InlineMetadata {
    match raw {
        RawNft::Moralis(n) => moralis_metadata(n),
        RawNft::OpenSeaV2(n) => opensea_v2_metadata(n),
        RawNft::OpenSeaV1(a) => opensea_v1_metadata(a),
    }
}

fn moralis_metadata(nft: &MoralisNft) -> InlineMetadata {
    // Moralis sends a normalized object with all-null fields when it has nothing
    if let Some(doc) = nft
        .normalized_metadata
        .as_ref()
        .and_then(MetadataDocument::from_value)
        .filter(|doc| !is_blank(doc))
    {
        return InlineMetadata::Found(doc);
    }

    match nft.metadata.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => match MetadataDocument::from_json_str(raw) {
            Some(doc) => InlineMetadata::Found(doc),
            None => InlineMetadata::Unparseable,
        },
        _ => InlineMetadata::Absent,
    }
}

fn opensea_v2_metadata(_nft: &OpenSeaV2Nft) -> InlineMetadata {
    // v2 account listings carry no attributes; metadata_url has them
    InlineMetadata::Absent
}

fn opensea_v1_metadata(asset: &OpenSeaV1Asset) -> InlineMetadata {
    if asset.traits.is_empty() {
        return InlineMetadata::Absent;
    }
    InlineMetadata::Found(MetadataDocument {
        name: None,
        image: None,
        attributes: asset.traits.clone(),
    })
}

fn is_blank(doc: &MetadataDocument) -> bool {
    doc.name.is_none() && doc.image.is_none() && doc.attributes.is_empty()
}

/// Metadata URL to fetch, if the record has one and no usable inline metadata
pub fn remote_metadata_url(raw: &RawNft) -> Option<&str> {
    match inline_metadata(raw) {
        InlineMetadata::Found(_) => None,
        InlineMetadata::Unparseable | InlineMetadata::Absent => raw.metadata_url(),
    }
}

/// Normalize using inline metadata only
///
/// Returns None for records outside the collection allowlist.
pub fn normalize(raw: &RawNft, collection: &CollectionConfig) -> Option<Ora> {
    normalize_with(raw, None, collection).into_ora()
}

/// Normalize with the result of an optional off-chain metadata fetch
pub fn normalize_with(
    raw: &RawNft,
    fetched: Option<Result<MetadataDocument, DegradedReason>>,
    collection: &CollectionConfig,
) -> RecordOutcome {
    if !collection.is_allowlisted(raw.contract()) {
        return RecordOutcome::Dropped(DropReason::NotAllowlisted(raw.contract().to_lowercase()));
    }

    match (inline_metadata(raw), fetched) {
        (InlineMetadata::Found(doc), _) => RecordOutcome::Complete(build(raw, Some(&doc), collection)),
        (_, Some(Ok(doc))) => RecordOutcome::Complete(build(raw, Some(&doc), collection)),
        (_, Some(Err(reason))) => RecordOutcome::Degraded {
            ora: build(raw, None, collection),
            reason,
        },
        (InlineMetadata::Unparseable, None) => RecordOutcome::Degraded {
            ora: build(raw, None, collection),
            reason: DegradedReason::UnparseableMetadata,
        },
        (InlineMetadata::Absent, None) => RecordOutcome::Complete(build(raw, None, collection)),
    }
}

fn build(raw: &RawNft, doc: Option<&MetadataDocument>, collection: &CollectionConfig) -> Ora {
    let token_id = raw.token_id().trim();

    let name = doc
        .and_then(|d| d.name.clone())
        .or_else(|| raw.base_name().map(str::to_string))
        .unwrap_or_else(|| collection.fallback_name(token_id));

    let image = doc
        .and_then(|d| d.image.clone())
        .or_else(|| raw.base_image().map(str::to_string))
        .unwrap_or_default();

    let traits = doc.map(MetadataDocument::traits).unwrap_or_default();
    let display_id = display_id(collection.display_id, &name, token_id);

    Ora::new(raw.contract(), token_id, display_id, name, image, traits)
}

/// Effective display number for a record
pub fn display_id(mode: DisplayIdMode, name: &str, token_id: &str) -> String {
    match mode {
        DisplayIdMode::TokenId => token_id.to_string(),
        DisplayIdMode::NameNumber => NAME_NUMBER
            .captures(name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| token_id.to_string()),
    }
}
