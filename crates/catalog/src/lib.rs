pub mod file_store;
pub mod records;
pub mod store;

pub use file_store::*;
pub use records::*;
pub use store::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// `collection/id` doesn't exist.
    NotFound(String),
    /// Inserting an id that already exists.
    Conflict(String),
    Corrupt(String),
    Io(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::NotFound(key) => write!(f, "record not found: {key}"),
            CatalogError::Conflict(key) => write!(f, "record already exists: {key}"),
            CatalogError::Corrupt(msg) => write!(f, "record store corrupt: {msg}"),
            CatalogError::Io(msg) => write!(f, "record store error: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {}
