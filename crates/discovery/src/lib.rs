pub mod actions;
pub mod config;
pub mod dedup;
pub mod error;
pub mod manager;
pub mod search;
pub mod source;

pub use actions::*;
pub use config::*;
pub use dedup::*;
pub use error::*;
pub use manager::*;
pub use search::*;
pub use source::*;
