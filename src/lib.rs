// src/lib.rs

use axum::{
    http::Method,
    routing::{delete, get, patch, post},
    Router,
};
use parking_lot::RwLock;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use config::{AppConfig, OwnershipProvider};
use error::OraError;
use services::{
    collection::{CollectionLoader, CollectionSession},
    ens::EnsResolver,
    filter_store::FilterStore,
    metadata::{HttpMetadataSource, MetadataSource},
    ownership::{MoralisSource, OpenSeaSource, OwnershipFetcher, OwnershipSource},
    persistence::{FileStatePort, StatePort},
    profiles::ProfileBook,
};

#[derive(Clone)]
pub struct AppState {
    pub loader: Arc<CollectionLoader>,
    pub session: Arc<RwLock<CollectionSession>>,
    pub filters: Arc<RwLock<FilterStore>>,
    pub profiles: Arc<RwLock<ProfileBook>>,
}

impl AppState {
    pub fn new(loader: CollectionLoader, port: Arc<dyn StatePort>) -> Result<Self, OraError> {
        let filters = FilterStore::open(port.clone())?;
        let profiles = ProfileBook::open(port, loader.collection().clone())?;

        Ok(Self {
            loader: Arc::new(loader),
            session: Arc::new(RwLock::new(CollectionSession::new())),
            filters: Arc::new(RwLock::new(filters)),
            profiles: Arc::new(RwLock::new(profiles)),
        })
    }

    /// Live HTTP services with file-backed state under `STATE_DIR`
    pub fn from_config(config: &AppConfig) -> Result<Self, OraError> {
        let client = http_client(config)?;
        let loader = build_loader(config, client)?;
        let port: Arc<dyn StatePort> = Arc::new(FileStatePort::new(&config.state_dir)?);

        Self::new(loader, port)
    }
}

pub fn http_client(config: &AppConfig) -> Result<Client, OraError> {
    Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
        .map_err(|e| OraError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))
}

/// Wire the resolver, the configured ownership provider and the metadata enricher
pub fn build_loader(config: &AppConfig, client: Client) -> Result<CollectionLoader, OraError> {
    let resolver = EnsResolver::http(&config.ens_primary_url, &config.ens_fallback_url, client.clone());

    let source: Arc<dyn OwnershipSource> = match config.provider {
        OwnershipProvider::Moralis => {
            let api_key = config.moralis_api_key.clone().ok_or_else(|| {
                OraError::InvalidConfig("MORALIS_API_KEY is required for the Moralis provider".to_string())
            })?;
            Arc::new(MoralisSource::new(client.clone(), api_key, config.moralis_base_url.clone()))
        }
        OwnershipProvider::OpenSea => Arc::new(OpenSeaSource::new(
            client.clone(),
            config.opensea_api_key.clone(),
            config.opensea_base_url.clone(),
        )),
    };
    tracing::info!("Using {} for NFT ownership", source.name());

    let fetcher = OwnershipFetcher::new(source, config.collection.clone(), config.page_size);
    let metadata: Arc<dyn MetadataSource> =
        Arc::new(HttpMetadataSource::new(client, config.metadata_cache_ttl_secs));

    Ok(CollectionLoader::new(resolver, fetcher, metadata))
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::hello_ora))
        .route("/api/oras", get(handlers::oras::get_oras))
        .route("/api/collection", get(handlers::collection::get_collection))
        .route("/api/collection/load", post(handlers::collection::load_collection))
        .route("/api/collection/more", post(handlers::collection::load_more))
        .route(
            "/api/filters",
            patch(handlers::filters::update_filters).delete(handlers::filters::clear_filters),
        )
        .route(
            "/api/filters/traits/{trait_name}",
            delete(handlers::filters::clear_trait_filter),
        )
        .route("/api/favorites", get(handlers::favorites::list_favorites))
        .route(
            "/api/favorites/{token_id}/toggle",
            post(handlers::favorites::toggle_favorite),
        )
        .route("/api/profiles/export", get(handlers::profiles::export_profiles))
        .route("/api/profiles/import", post(handlers::profiles::import_profiles))
        .route(
            "/api/profiles/{token_id}",
            get(handlers::profiles::get_profile)
                .put(handlers::profiles::put_profile)
                .delete(handlers::profiles::delete_profile),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub mod config;
pub mod error;

pub mod services {
    pub mod collection;
    pub mod ens;
    pub mod filter_store;
    pub mod metadata;
    pub mod normalizer;
    pub mod ownership;
    pub mod persistence;
    pub mod profiles;
}

pub mod models;
pub mod handlers;
