pub mod bounds;
pub mod math;
pub mod tiling;
pub mod time;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use math::*;
pub use tiling::*;
pub use time::*;
