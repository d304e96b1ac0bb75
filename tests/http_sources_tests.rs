mod common;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use ora_backend::{
    config::CollectionConfig,
    error::OraError,
    services::{
        ens::EnsResolver,
        metadata::{HttpMetadataSource, MetadataSource},
        ownership::{MoralisSource, OpenSeaSource, OwnershipFetcher, OwnershipSource},
    },
};

use crate::common::{moralis_record, ORA_CONTRACT, VITALIK};

#[derive(Clone, Default)]
struct Upstream {
    hits: Arc<Mutex<Vec<String>>>,
}

impl Upstream {
    fn hit(&self, what: String) {
        self.hits.lock().push(what);
    }

    fn hits(&self) -> Vec<String> {
        self.hits.lock().clone()
    }
}

async fn moralis_nfts(
    State(upstream): State<Upstream>,
    Path(address): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, StatusCode> {
    upstream.hit(format!("moralis:{}", address));

    if headers.get("X-API-Key").and_then(|v| v.to_str().ok()) != Some("moralis-key") {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if address == "0x0000000000000000000000000000000000000429" {
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let param = |key: &str| params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
    let contracts: Vec<&str> = params
        .iter()
        .filter(|(k, _)| k == "token_addresses")
        .map(|(_, v)| v.as_str())
        .collect();
    if contracts != vec![ORA_CONTRACT] || param("chain") != Some("eth") {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    match param("cursor") {
        None => Ok(Json(json!({
            "result": [moralis_record(ORA_CONTRACT, "2", "Sugartown Ora #2")],
            "cursor": "moralis-page-2"
        }))),
        Some("moralis-page-2") => Ok(Json(json!({
            "result": [moralis_record(ORA_CONTRACT, "1", "Sugartown Ora #1")],
            "cursor": null
        }))),
        Some(_) => Err(StatusCode::BAD_REQUEST),
    }
}

async fn opensea_nfts(
    State(upstream): State<Upstream>,
    Path(address): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    let slug = params.get("collection").cloned().unwrap_or_default();
    upstream.hit(format!("opensea:{}:{}", address, slug));

    match slug.as_str() {
        "sugartown-ora" => Ok(Json(json!({
            "nfts": [{
                "identifier": "33",
                "contract": ORA_CONTRACT,
                "collection": "sugartown-ora",
                "token_standard": "erc721",
                "name": "Sugartown Ora #33",
                "display_image_url": "https://img.example/33.png"
            }],
            "next": ""
        }))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn ens_primary(State(upstream): State<Upstream>, Path(name): Path<String>) -> Result<Json<Value>, StatusCode> {
    upstream.hit(format!("primary:{}", name));
    Err(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn ens_fallback(State(upstream): State<Upstream>, Path(name): Path<String>) -> Json<Value> {
    upstream.hit(format!("fallback:{}", name));
    if name == "vitalik.eth" {
        Json(json!([{ "address": VITALIK.to_lowercase(), "identity": "vitalik.eth" }]))
    } else {
        Json(json!({ "error": "not found" }))
    }
}

async fn metadata_doc(State(upstream): State<Upstream>, Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    upstream.hit(format!("metadata:{}", id));
    if id == "33" {
        Ok(Json(json!({
            "name": "Sugartown Ora #33",
            "image": "ipfs://ora-33",
            "attributes": [{ "trait_type": "Flavor", "value": "Mint" }]
        })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// Serve the stub upstream on an ephemeral port
async fn spawn_upstream() -> (String, Upstream) {
    let upstream = Upstream::default();
    let router = Router::new()
        .route("/moralis/{address}/nft", get(moralis_nfts))
        .route("/opensea/chain/ethereum/account/{address}/nfts", get(opensea_nfts))
        .route("/ens/primary/{name}", get(ens_primary))
        .route("/ens/fallback/{name}", get(ens_fallback))
        .route("/metadata/{id}", get(metadata_doc))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (base, upstream)
}

#[tokio::test]
async fn test_moralis_pages_through_cursor() {
    let (base, upstream) = spawn_upstream().await;
    let source: Arc<dyn OwnershipSource> = Arc::new(MoralisSource::new(
        Client::new(),
        "moralis-key".to_string(),
        format!("{}/moralis", base),
    ));
    let fetcher = OwnershipFetcher::new(source, CollectionConfig::default(), 50);

    let first = fetcher.fetch(VITALIK, None).await.unwrap();
    assert_eq!(first.records.len(), 1);
    assert_eq!(first.next_cursor.as_deref(), Some("moralis-page-2"));

    let second = fetcher.fetch(VITALIK, first.next_cursor.as_deref()).await.unwrap();
    assert_eq!(second.records[0].token_id(), "1");
    assert!(second.next_cursor.is_none());

    assert_eq!(upstream.hits().len(), 2);
}

#[tokio::test]
async fn test_moralis_429_is_rate_limited() {
    let (base, upstream) = spawn_upstream().await;
    let source: Arc<dyn OwnershipSource> = Arc::new(MoralisSource::new(
        Client::new(),
        "moralis-key".to_string(),
        format!("{}/moralis", base),
    ));
    let fetcher = OwnershipFetcher::new(source, CollectionConfig::default(), 50);

    let err = fetcher
        .fetch("0x0000000000000000000000000000000000000429", None)
        .await
        .unwrap_err();

    assert!(matches!(err, OraError::RateLimited { .. }));
    assert_eq!(upstream.hits().len(), 1);
}

#[tokio::test]
async fn test_moralis_bad_key_is_upstream_error() {
    let (base, _) = spawn_upstream().await;
    let source: Arc<dyn OwnershipSource> = Arc::new(MoralisSource::new(
        Client::new(),
        "wrong".to_string(),
        format!("{}/moralis", base),
    ));
    let fetcher = OwnershipFetcher::new(source, CollectionConfig::default(), 50);

    let err = fetcher.fetch(VITALIK, None).await.unwrap_err();

    assert!(matches!(err, OraError::Upstream { status: Some(401), .. }));
    assert_eq!(err.category(), "bad_input");
}

#[tokio::test]
async fn test_opensea_alternate_slug_and_empty_cursor() {
    let (base, upstream) = spawn_upstream().await;
    let source: Arc<dyn OwnershipSource> = Arc::new(OpenSeaSource::new(
        Client::new(),
        None,
        format!("{}/opensea", base),
    ));
    let fetcher = OwnershipFetcher::new(source, CollectionConfig::default(), 25);

    let page = fetcher.fetch(VITALIK, None).await.unwrap();

    assert_eq!(page.records.len(), 1);
    assert_eq!(page.collection_slug, "sugartown-ora");
    assert!(page.next_cursor.is_none());
    assert_eq!(
        upstream.hits(),
        vec![
            format!("opensea:{}:sugartown-oras", VITALIK),
            format!("opensea:{}:sugartow-noras", VITALIK),
            format!("opensea:{}:sugartown-ora", VITALIK),
        ]
    );
}

#[tokio::test]
async fn test_ens_falls_back_after_primary_failure() {
    let (base, upstream) = spawn_upstream().await;
    let resolver = EnsResolver::http(
        &format!("{}/ens/primary", base),
        &format!("{}/ens/fallback", base),
        Client::new(),
    );

    let resolved = resolver.resolve("Vitalik.eth").await.unwrap();
    assert_eq!(resolved.address, VITALIK);
    assert_eq!(
        upstream.hits(),
        vec!["primary:vitalik.eth".to_string(), "fallback:vitalik.eth".to_string()]
    );

    let err = resolver.resolve("nobody.eth").await.unwrap_err();
    assert!(matches!(err, OraError::NotFound { .. }));
}

#[tokio::test]
async fn test_metadata_documents_are_cached() {
    let (base, upstream) = spawn_upstream().await;
    let source = HttpMetadataSource::new(Client::new(), 3600);
    let url = format!("{}/metadata/33", base);

    let first = source.fetch_document(&url).await.unwrap();
    let second = source.fetch_document(&url).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.image.as_deref(), Some("ipfs://ora-33"));
    assert_eq!(upstream.hits(), vec!["metadata:33".to_string()]);

    let missing = source.fetch_document(&format!("{}/metadata/404", base)).await;
    assert!(missing.is_err());
    // Failures are not cached
    let _ = source.fetch_document(&format!("{}/metadata/404", base)).await;
    assert_eq!(upstream.hits().len(), 3);
}
