use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a record was normalized from base fields only
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DegradedReason {
    #[error("metadata fetch failed for {url}: {message}")]
    MetadataFetch { url: String, message: String },

    #[error("inline metadata is not valid JSON")]
    UnparseableMetadata,
}

/// Why a record never became an Ora
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("contract {0} is not allowlisted")]
    NotAllowlisted(String),

    #[error("token standard {found:?} does not match {expected}")]
    WrongStandard { expected: String, found: Option<String> },

    #[error("record matches no known upstream schema")]
    UnknownShape,

    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Per-page normalization counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReport {
    pub complete: usize,
    pub degraded: usize,
    pub dropped: usize,
}

impl PageReport {
    pub fn merge(&mut self, other: &PageReport) {
        self.complete += other.complete;
        self.degraded += other.degraded;
        self.dropped += other.dropped;
    }

    pub fn total(&self) -> usize {
        self.complete + self.degraded + self.dropped
    }
}
