mod api;
mod config;
mod places;

use std::sync::Arc;

use axum::http::Method;
use catalog::{InMemoryRecordStore, JsonFileRecordStore, shared};
use discovery::{CellManager, DEFAULT_MECHANISM, SourceRegistry};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{AppState, DynStore};
use crate::config::ServerConfig;
use crate::places::PlacesClient;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    let store: DynStore = match &config.data_path {
        Some(path) => match JsonFileRecordStore::open(path) {
            Ok(store) => {
                info!("records persisted to {}", path.display());
                Box::new(store)
            }
            Err(err) => {
                error!("failed to open record store {}: {err}", path.display());
                std::process::exit(1);
            }
        },
        None => {
            warn!("DISCOVERY_DATA_PATH not set; records are kept in memory only");
            Box::new(InMemoryRecordStore::new())
        }
    };

    let sources = SourceRegistry::new();
    match &config.places_api_key {
        Some(key) => {
            let http = reqwest::Client::builder()
                .timeout(config.places_timeout)
                .build()
                .expect("http client");
            sources.register(
                DEFAULT_MECHANISM,
                Arc::new(PlacesClient::new(
                    http,
                    config.places_endpoint.clone(),
                    key.clone(),
                    config.discovery.page_size,
                )),
            );
        }
        None => warn!("PLACES_API_KEY not set; cell searches are unavailable"),
    }

    let addr = config.addr;
    let state = AppState {
        manager: CellManager::new(shared(store), config.discovery.clone()),
        sources: Arc::new(sources),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let app = api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };
    info!("discovery server listening on http://{addr}");
    if let Err(err) = axum::serve(listener, app).await {
        error!("server error: {err}");
    }
}
