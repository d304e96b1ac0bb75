#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ora_backend::{
    config::CollectionConfig,
    error::OraError,
    models::{raw_nft::MetadataDocument, report::DegradedReason},
    services::{
        collection::CollectionLoader,
        ens::{EnsResolver, NameService},
        metadata::MetadataSource,
        ownership::{OwnershipFetcher, OwnershipSource, PageQuery, UpstreamPage},
        persistence::{MemoryStatePort, StatePort},
    },
    AppState,
};

pub const ORA_CONTRACT: &str = "0xd564c25b760cb278a55bdd98831f4ff4b6c97b38";
pub const OTHER_CONTRACT: &str = "0x00000000000000000000000000000000000000aa";
pub const VITALIK: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

/// Moralis-shaped ownership record
pub fn moralis_record(contract: &str, token_id: &str, name: &str) -> Value {
    json!({
        "token_address": contract,
        "token_id": token_id,
        "contract_type": "ERC721",
        "name": "Sugartown Ora",
        "normalized_metadata": {
            "name": name,
            "image": format!("https://img.example/{}.png", token_id),
            "attributes": [
                { "trait_type": "Background", "value": if token_id.len() % 2 == 0 { "Pink" } else { "Mint" } }
            ]
        }
    })
}

/// Name service answering from a fixed table
pub struct StubNameService {
    answers: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl StubNameService {
    pub fn new(answers: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            answers: answers
                .iter()
                .map(|(name, address)| (name.to_string(), address.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl NameService for StubNameService {
    fn label(&self) -> &str {
        "stub"
    }

    async fn lookup(&self, name: &str) -> Result<Option<String>, OraError> {
        self.calls.lock().push(name.to_string());
        Ok(self.answers.get(name).cloned())
    }
}

/// One scripted upstream answer
#[derive(Clone)]
pub enum Scripted {
    Page { records: Vec<Value>, next: Option<&'static str> },
    Status(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub address: String,
    pub cursor: Option<String>,
    pub slug: String,
    pub limit: u32,
    pub contracts: Vec<String>,
}

/// Ownership source replaying scripted answers in call order
pub struct ScriptedSource {
    script: Mutex<Vec<Scripted>>,
    delays: HashMap<String, Duration>,
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Self::with_delays(script, &[])
    }

    /// Answers for `address` are delayed (lower-cased match)
    pub fn with_delays(script: Vec<Scripted>, delays: &[(&str, u64)]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            delays: delays
                .iter()
                .map(|(a, ms)| (a.to_lowercase(), Duration::from_millis(*ms)))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl OwnershipSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn filters_by_slug(&self) -> bool {
        true
    }

    async fn request_page(&self, query: &PageQuery<'_>) -> Result<UpstreamPage, OraError> {
        self.calls.lock().push(RecordedCall {
            address: query.address.to_string(),
            cursor: query.cursor.map(str::to_string),
            slug: query.collection_slug.to_string(),
            limit: query.limit,
            contracts: query.contracts.to_vec(),
        });

        let answer = {
            let mut script = self.script.lock();
            if script.is_empty() {
                Scripted::Page { records: vec![], next: None }
            } else {
                script.remove(0)
            }
        };

        if let Some(delay) = self.delays.get(&query.address.to_lowercase()) {
            tokio::time::sleep(*delay).await;
        }

        match answer {
            Scripted::Page { records, next } => Ok(UpstreamPage {
                records,
                next_cursor: next.map(str::to_string),
            }),
            Scripted::Status(429) => Err(OraError::RateLimited {
                provider: "scripted".to_string(),
            }),
            Scripted::Status(status) => Err(OraError::upstream(status, "scripted failure")),
        }
    }
}

/// State port whose reads find nothing and whose writes always fail
pub struct FullDisk;

impl StatePort for FullDisk {
    fn read(&self, _key: &str) -> Result<Option<String>, OraError> {
        Ok(None)
    }

    fn write(&self, key: &str, _value: &str) -> Result<(), OraError> {
        Err(OraError::Storage(format!("No space left writing {}", key)))
    }
}

/// Metadata source that fails for the listed URLs and answers everything else
pub struct StubMetadata {
    pub failing: Vec<String>,
}

#[async_trait]
impl MetadataSource for StubMetadata {
    async fn fetch_document(&self, url: &str) -> Result<MetadataDocument, DegradedReason> {
        if self.failing.iter().any(|f| f == url) {
            return Err(DegradedReason::MetadataFetch {
                url: url.to_string(),
                message: "stub failure".to_string(),
            });
        }
        Ok(MetadataDocument {
            name: Some(format!("Fetched {}", url)),
            image: None,
            attributes: vec![],
        })
    }
}

pub fn loader_with(source: Arc<ScriptedSource>, names: Arc<StubNameService>) -> CollectionLoader {
    let names: Arc<dyn NameService> = names;
    let source: Arc<dyn OwnershipSource> = source;
    let metadata: Arc<dyn MetadataSource> = Arc::new(StubMetadata { failing: vec![] });

    CollectionLoader::new(
        EnsResolver::new(vec![names]),
        OwnershipFetcher::new(source, CollectionConfig::default(), 50),
        metadata,
    )
}

pub fn default_names() -> Arc<StubNameService> {
    StubNameService::new(&[("vitalik.eth", VITALIK)])
}

pub fn test_state(source: Arc<ScriptedSource>) -> AppState {
    let port: Arc<dyn StatePort> = Arc::new(MemoryStatePort::new());
    AppState::new(loader_with(source, default_names()), port).expect("state")
}
