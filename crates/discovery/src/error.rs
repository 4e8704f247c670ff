use catalog::CatalogError;

use crate::source::SourceError;

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryError {
    /// The grid or cell doesn't exist (any more).
    NotFound(String),
    /// Rejected before any mutation, e.g. subdividing at max depth.
    InvalidTransition(String),
    InvalidInput(String),
    /// The place source failed; the cell's status was not advanced.
    Upstream(SourceError),
    Store(CatalogError),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::NotFound(what) => write!(f, "not found: {what}"),
            DiscoveryError::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            DiscoveryError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            DiscoveryError::Upstream(e) => write!(f, "{e}"),
            DiscoveryError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiscoveryError::Upstream(e) => Some(e),
            DiscoveryError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CatalogError> for DiscoveryError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(key) => DiscoveryError::NotFound(key),
            other => DiscoveryError::Store(other),
        }
    }
}

impl From<SourceError> for DiscoveryError {
    fn from(e: SourceError) -> Self {
        DiscoveryError::Upstream(e)
    }
}
