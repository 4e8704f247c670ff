pub mod analysis;
pub mod assign;

pub use analysis::*;
pub use assign::*;

use catalog::CatalogError;

#[derive(Debug, Clone, PartialEq)]
pub enum ComputeError {
    InvalidInput(String),
    Store(CatalogError),
}

impl std::fmt::Display for ComputeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            ComputeError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ComputeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComputeError::Store(e) => Some(e),
            ComputeError::InvalidInput(_) => None,
        }
    }
}

impl From<CatalogError> for ComputeError {
    fn from(e: CatalogError) -> Self {
        ComputeError::Store(e)
    }
}
