pub mod density;
pub mod enclosure;

pub use density::*;
pub use enclosure::*;
