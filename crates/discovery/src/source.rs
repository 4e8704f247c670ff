//! Entity source abstraction.
//!
//! The place-search API is an external collaborator. This module defines the
//! `EntitySource` trait the search step consumes and a registry mapping
//! discovery mechanisms to sources.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use foundation::LatLngBounds;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One candidate returned by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, rename = "type")]
    pub place_type: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub results: Vec<Place>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Non-success response or transport failure.
    Upstream(String),
    RateLimited,
    Timeout,
    Decode(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Upstream(msg) => write!(f, "place source failed: {msg}"),
            SourceError::RateLimited => write!(f, "place source rate limit reached"),
            SourceError::Timeout => write!(f, "place source timed out"),
            SourceError::Decode(msg) => write!(f, "place source response invalid: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A black-box place search restricted to a viewport.
///
/// Methods return boxed futures for dyn-compatibility. Timeouts are the
/// implementation's responsibility.
pub trait EntitySource: Send + Sync {
    fn name(&self) -> &str;

    /// One page of results for `query` inside `viewport`.
    fn search<'a>(
        &'a self,
        query: &'a str,
        viewport: LatLngBounds,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<SearchPage, SourceError>>;
}

/// Sources keyed by discovery mechanism.
pub struct SourceRegistry {
    sources: RwLock<BTreeMap<String, Arc<dyn EntitySource>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn register(&self, mechanism: &str, source: Arc<dyn EntitySource>) {
        self.sources.write().insert(mechanism.to_string(), source);
    }

    pub fn get(&self, mechanism: &str) -> Option<Arc<dyn EntitySource>> {
        self.sources.read().get(mechanism).cloned()
    }

    pub fn mechanisms(&self) -> Vec<String> {
        self.sources.read().keys().cloned().collect()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
