use std::time::Duration;

/// Hard cap on subdivision depth; a root cell is depth 0.
pub const MAX_DEPTH: u8 = 4;

/// Results per page returned by the place source.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Per-query result count at which a round marks its cell `saturated`.
///
/// A query that fills a whole page almost certainly has more results the
/// source didn't return, so the cell needs finer tiles.
pub const DEFAULT_SATURATION_THRESHOLD: u32 = DEFAULT_PAGE_SIZE;

pub const DEFAULT_MECHANISM: &str = "places";

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    /// Deepest subdivision allowed, at most `MAX_DEPTH`.
    pub max_depth: u8,
    pub page_size: u32,
    pub max_pages_per_query: u32,
    pub saturation_threshold: u32,
    /// Enabled discovery mechanisms; each one offers a "search" action on cells.
    pub mechanisms: Vec<String>,
    /// Viewports needing more tiles than this are rejected.
    pub max_virtual_cells: usize,
    /// Pause between cells in a bulk search.
    pub inter_cell_delay: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages_per_query: 1,
            saturation_threshold: DEFAULT_SATURATION_THRESHOLD,
            mechanisms: vec![DEFAULT_MECHANISM.to_string()],
            max_virtual_cells: 2500,
            inter_cell_delay: Duration::from_millis(250),
        }
    }
}

impl DiscoveryConfig {
    pub fn is_saturated(&self, query_count: u32) -> bool {
        query_count >= self.saturation_threshold
    }

    /// Most results a single query can return in one round.
    pub fn per_query_cap(&self) -> u32 {
        self.page_size.saturating_mul(self.max_pages_per_query)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth > MAX_DEPTH {
            return Err(format!("max_depth {} exceeds {MAX_DEPTH}", self.max_depth));
        }
        if self.page_size == 0 || self.max_pages_per_query == 0 {
            return Err("page_size and max_pages_per_query must be positive".to_string());
        }
        if self.saturation_threshold == 0 || self.saturation_threshold > self.per_query_cap() {
            return Err(format!(
                "saturation_threshold {} must be in 1..={}",
                self.saturation_threshold,
                self.per_query_cap()
            ));
        }
        if self.mechanisms.is_empty() {
            return Err("at least one discovery mechanism is required".to_string());
        }
        Ok(())
    }
}
