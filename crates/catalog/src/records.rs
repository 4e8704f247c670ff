//! Persisted record types.
//!
//! Documents are stored as camelCase JSON. Grids and cells live in separate
//! collections linked by `gridId`.

use foundation::{Freshness, LatLng, LatLngBounds};
use serde::{Deserialize, Serialize};

use crate::store::Document;

pub const GRIDS: &str = "grids";
pub const CELLS: &str = "cells";
pub const LEADS: &str = "leads";
pub const CLUSTERS: &str = "clusters";

/// Field names used for indexed queries.
pub mod fields {
    pub const GRID_ID: &str = "gridId";
    pub const CELL_ID: &str = "cellId";
    pub const PARENT_CELL_ID: &str = "parentCellId";
    pub const BOUNDS_KEY: &str = "boundsKey";
    pub const CLUSTER_ID: &str = "clusterId";
    pub const DEDUP_KEY: &str = "dedupKey";
}

/// Secondary indexes every store maintains, per collection.
pub fn default_indexes() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        (
            CELLS,
            vec![fields::GRID_ID, fields::PARENT_CELL_ID, fields::BOUNDS_KEY],
        ),
        (
            LEADS,
            vec![
                fields::GRID_ID,
                fields::CELL_ID,
                fields::CLUSTER_ID,
                fields::DEDUP_KEY,
            ],
        ),
    ]
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A discovery campaign over a named area.
///
/// The counters are owned by the cell lifecycle manager and always aggregate the
/// grid's leaf cells (`totalLeadsFound` aggregates every cell, retired included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub searched_count: u32,
    #[serde(default)]
    pub saturated_count: u32,
    #[serde(default)]
    pub total_leaf_cells: u32,
    #[serde(default)]
    pub total_leads_found: u64,
    #[serde(default)]
    pub created_at_ms: u64,
    #[serde(default)]
    pub updated_at_ms: u64,

    // Bounding box of the older fixed-grid layout. Accepted on read, never written.
    #[serde(rename = "swLat", default, skip_serializing)]
    pub legacy_sw_lat: Option<f64>,
    #[serde(rename = "swLng", default, skip_serializing)]
    pub legacy_sw_lng: Option<f64>,
    #[serde(rename = "neLat", default, skip_serializing)]
    pub legacy_ne_lat: Option<f64>,
    #[serde(rename = "neLng", default, skip_serializing)]
    pub legacy_ne_lng: Option<f64>,
    #[serde(rename = "cellSizeKm", default, skip_serializing)]
    pub legacy_cell_size_km: Option<f64>,
}

impl Grid {
    pub fn new(id: impl Into<String>, name: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            region: String::new(),
            province: String::new(),
            queries: Vec::new(),
            searched_count: 0,
            saturated_count: 0,
            total_leaf_cells: 0,
            total_leads_found: 0,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            legacy_sw_lat: None,
            legacy_sw_lng: None,
            legacy_ne_lat: None,
            legacy_ne_lng: None,
            legacy_cell_size_km: None,
        }
    }

    pub fn legacy_bounds(&self) -> Option<LatLngBounds> {
        Some(LatLngBounds::from_edges(
            self.legacy_sw_lat?,
            self.legacy_sw_lng?,
            self.legacy_ne_lat?,
            self.legacy_ne_lng?,
        ))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Unsearched,
    Searching,
    Searched,
    Saturated,
}

impl CellStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellStatus::Unsearched => "unsearched",
            CellStatus::Searching => "searching",
            CellStatus::Searched => "searched",
            CellStatus::Saturated => "saturated",
        }
    }
}

impl std::fmt::Display for CellStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Results one query returned in the last round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCount {
    pub query: String,
    pub count: u32,
}

/// One rectangular tile of a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub id: String,
    pub grid_id: String,
    pub bounds: LatLngBounds,
    pub bounds_key: String,
    pub depth: u8,
    pub status: CellStatus,
    #[serde(default)]
    pub parent_cell_id: Option<String>,
    #[serde(default)]
    pub result_count: u32,
    #[serde(default)]
    pub query_saturation: Vec<QueryCount>,
    #[serde(default)]
    pub last_searched_at_ms: Option<u64>,
    #[serde(default)]
    pub leads_found: u64,
    /// Retired by subdivision; its children are the leaves now.
    #[serde(default)]
    pub subdivided: bool,
    #[serde(default)]
    pub created_at_ms: u64,
}

impl Cell {
    /// A fresh `unsearched` leaf. The key is always derived from `bounds`.
    pub fn new(
        id: impl Into<String>,
        grid_id: impl Into<String>,
        bounds: LatLngBounds,
        depth: u8,
        parent_cell_id: Option<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            grid_id: grid_id.into(),
            bounds_key: bounds.key(),
            bounds,
            depth,
            status: CellStatus::Unsearched,
            parent_cell_id,
            result_count: 0,
            query_saturation: Vec::new(),
            last_searched_at_ms: None,
            leads_found: 0,
            subdivided: false,
            created_at_ms: now_ms,
        }
    }

    pub fn is_leaf(&self) -> bool {
        !self.subdivided
    }

    /// `None` until the cell has completed a search round.
    pub fn staleness(&self, now_ms: u64) -> Option<Freshness> {
        self.last_searched_at_ms
            .map(|t| Freshness::classify(t, now_ms))
    }
}

/// A discovered business/location candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    #[serde(default)]
    pub grid_id: Option<String>,
    #[serde(default)]
    pub cell_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub place_type: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    pub dedup_key: String,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub created_at_ms: u64,
    #[serde(default)]
    pub enriched_at_ms: Option<u64>,
}

impl Lead {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    pub fn enrichment_freshness(&self, now_ms: u64) -> Option<Freshness> {
        self.enriched_at_ms
            .map(|t| Freshness::classify(t, now_ms))
    }
}

/// A user-drawn polygon cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub boundary: Vec<LatLng>,
    pub center: LatLng,
    pub radius_km: f64,
    pub lead_count: u32,
    #[serde(default)]
    pub created_at_ms: u64,
}

impl Document for Grid {
    const COLLECTION: &'static str = GRIDS;
    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for Cell {
    const COLLECTION: &'static str = CELLS;
    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for Lead {
    const COLLECTION: &'static str = LEADS;
    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for Cluster {
    const COLLECTION: &'static str = CLUSTERS;
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::{Cell, CellStatus, Grid};
    use foundation::{DAY_MS, Freshness, LatLngBounds};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn legacy_grid_fields_are_read_but_not_written() {
        let raw = json!({
            "id": "g1",
            "name": "Wellington County",
            "queries": ["farm"],
            "swLat": 43.5,
            "swLng": -80.6,
            "neLat": 43.9,
            "neLng": -80.1,
            "cellSizeKm": 5.0
        });
        let grid: Grid = serde_json::from_value(raw).unwrap();
        assert_eq!(
            grid.legacy_bounds(),
            Some(LatLngBounds::from_edges(43.5, -80.6, 43.9, -80.1))
        );
        assert_eq!(grid.legacy_cell_size_km, Some(5.0));
        assert_eq!(grid.total_leaf_cells, 0);

        let written = serde_json::to_value(&grid).unwrap();
        for legacy in ["swLat", "swLng", "neLat", "neLng", "cellSizeKm"] {
            assert!(written.get(legacy).is_none(), "{legacy} was written");
        }
        assert_eq!(written["queries"], json!(["farm"]));
    }

    #[test]
    fn cell_json_shape() {
        let b = LatLngBounds::from_edges(43.5, -80.3, 43.6, -80.2);
        let cell = Cell::new("c1", "g1", b, 0, None, 7);
        let v = serde_json::to_value(&cell).unwrap();
        assert_eq!(v["status"], json!("unsearched"));
        assert_eq!(v["boundsKey"], json!("43.500000,-80.300000,43.600000,-80.200000"));
        assert_eq!(v["gridId"], json!("g1"));
        assert_eq!(v["bounds"]["sw"]["lat"], json!(43.5));

        let back: Cell = serde_json::from_value(v).unwrap();
        assert_eq!(back, cell);
        assert_eq!(back.status, CellStatus::Unsearched);
    }

    #[test]
    fn staleness_follows_freshness_buckets() {
        let b = LatLngBounds::from_edges(0.0, 0.0, 1.0, 1.0);
        let mut cell = Cell::new("c", "g", b, 0, None, 0);
        assert_eq!(cell.staleness(DAY_MS), None);
        cell.last_searched_at_ms = Some(0);
        assert_eq!(cell.staleness(10 * DAY_MS), Some(Freshness::Fresh));
        assert_eq!(cell.staleness(45 * DAY_MS), Some(Freshness::Aging));
        assert_eq!(cell.staleness(120 * DAY_MS), Some(Freshness::Stale));
    }
}
