//! Virtual grid tiling.
//!
//! The lattice is anchored at (0, 0) rather than at the viewport corner, so the
//! tiles covering a region don't depend on how the viewport happened to frame
//! it: panning away and back reproduces identical bounds (and keys). Each row of
//! tiles gets its own longitude step, corrected for the latitude at the row's
//! center, and that step depends only on the row index.

use crate::bounds::{LatLngBounds, bounds_key};
use crate::math::geodesy::{KM_PER_DEGREE_LAT, km_per_degree_lng};

/// Tiles are only generated between these latitudes.
pub const MAX_TILE_LATITUDE: f64 = 85.0;

/// Floor for the per-row longitude scale, keeps steps finite near the poles.
const MIN_KM_PER_DEGREE_LNG: f64 = 1e-3;

/// An unpersisted candidate tile.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct VirtualCell {
    pub bounds: LatLngBounds,
    pub bounds_key: String,
}

impl VirtualCell {
    pub fn new(bounds: LatLngBounds) -> Self {
        VirtualCell {
            bounds_key: bounds_key(&bounds),
            bounds,
        }
    }
}

/// Most tiles `compute_virtual_grid` will materialize; larger requests get an
/// empty list.
pub const MAX_VIRTUAL_GRID_TILES: usize = 1_000_000;

/// Row and column indices stay below this, so they convert to `i64` exactly.
const MAX_LATTICE_INDEX: f64 = (1u64 << 52) as f64;

/// The lattice rows and columns that intersect a clamped viewport.
///
/// Spans are worked out in `f64` first. Integer indices are only produced
/// once `estimate` shows them to be small enough.
struct Lattice {
    lat_step: f64,
    south: f64,
    north: f64,
    west: f64,
    east: f64,
    cell_size_km: f64,
}

impl Lattice {
    fn new(viewport: LatLngBounds, cell_size_km: f64) -> Option<Lattice> {
        if !(cell_size_km.is_finite() && cell_size_km > 0.0) || viewport.is_degenerate() {
            return None;
        }
        let clamped = LatLngBounds::from_edges(
            viewport.sw.lat.max(-MAX_TILE_LATITUDE),
            viewport.sw.lng.max(-180.0),
            viewport.ne.lat.min(MAX_TILE_LATITUDE),
            viewport.ne.lng.min(180.0),
        );
        if clamped.is_degenerate() {
            return None;
        }

        Some(Lattice {
            lat_step: cell_size_km / KM_PER_DEGREE_LAT,
            south: clamped.sw.lat,
            north: clamped.ne.lat,
            west: clamped.sw.lng,
            east: clamped.ne.lng,
            cell_size_km,
        })
    }

    fn row_bounds(&self) -> (f64, f64) {
        let r0 = (self.south / self.lat_step).floor();
        let r1 = (self.north / self.lat_step).ceil();
        (r0, r1.max(r0 + 1.0))
    }

    fn row_edges(&self, row: i64) -> (f64, f64) {
        (row as f64 * self.lat_step, (row + 1) as f64 * self.lat_step)
    }

    fn lng_step_at(&self, lat: f64) -> f64 {
        self.cell_size_km / km_per_degree_lng(lat).max(MIN_KM_PER_DEGREE_LNG)
    }

    fn lng_step(&self, row: i64) -> f64 {
        let (south, north) = self.row_edges(row);
        self.lng_step_at((south + north) / 2.0)
    }

    fn cols(&self, lng_step: f64) -> std::ops::Range<i64> {
        let c0 = (self.west / lng_step).floor() as i64;
        let c1 = (self.east / lng_step).ceil() as i64;
        c0..c1.max(c0 + 1)
    }

    /// Upper bound on the tile count. Infinite when an index would leave the
    /// exactly representable range.
    fn estimate(&self) -> f64 {
        let (r0, r1) = self.row_bounds();
        // Longitude steps are narrowest nearest the equator. Row edges bound
        // every row center, which is where a row's step is taken.
        let (south_edge, north_edge) = (r0 * self.lat_step, r1 * self.lat_step);
        let nearest_equator = if south_edge <= 0.0 && north_edge >= 0.0 {
            0.0
        } else if south_edge > 0.0 {
            south_edge
        } else {
            north_edge
        };
        let min_lng_step = self.lng_step_at(nearest_equator);
        let c0 = (self.west / min_lng_step).floor();
        let c1 = (self.east / min_lng_step).ceil();

        let in_range = |v: f64| v.is_finite() && v.abs() <= MAX_LATTICE_INDEX;
        if ![r0, r1, c0, c1].into_iter().all(in_range) {
            return f64::INFINITY;
        }
        let per_row = ((self.east - self.west) / min_lng_step).ceil() + 1.0;
        (r1 - r0) * per_row
    }
}

/// Tiles of roughly `cell_size_km` covering `viewport`.
///
/// Pure and deterministic. A zero-area viewport or a non-positive cell size
/// yields an empty list, as does a request for more than
/// `MAX_VIRTUAL_GRID_TILES` tiles. Callers filter out tiles already
/// materialized.
pub fn compute_virtual_grid(viewport: LatLngBounds, cell_size_km: f64) -> Vec<VirtualCell> {
    let Some(lattice) = Lattice::new(viewport, cell_size_km) else {
        return Vec::new();
    };
    if lattice.estimate() > MAX_VIRTUAL_GRID_TILES as f64 {
        return Vec::new();
    }

    let (r0, r1) = lattice.row_bounds();
    let mut out = Vec::new();
    for row in r0 as i64..r1 as i64 {
        let (south, north) = lattice.row_edges(row);
        let lng_step = lattice.lng_step(row);
        for col in lattice.cols(lng_step) {
            let west = col as f64 * lng_step;
            let east = (col + 1) as f64 * lng_step;
            out.push(VirtualCell::new(LatLngBounds::from_edges(
                south, west, north, east,
            )));
        }
    }
    out
}

/// Upper bound on the number of tiles `compute_virtual_grid` would produce,
/// computed in constant time. Saturates at `usize::MAX`.
pub fn estimate_virtual_cell_count(viewport: LatLngBounds, cell_size_km: f64) -> usize {
    match Lattice::new(viewport, cell_size_km) {
        // Float-to-int casts saturate.
        Some(lattice) => lattice.estimate() as usize,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_VIRTUAL_GRID_TILES, compute_virtual_grid, estimate_virtual_cell_count};
    use crate::bounds::LatLngBounds;
    use crate::math::geodesy::haversine_distance;
    use std::collections::BTreeSet;

    fn guelph_view() -> LatLngBounds {
        LatLngBounds::from_edges(43.40, -80.45, 43.70, -80.05)
    }

    fn keys(view: LatLngBounds, km: f64) -> BTreeSet<String> {
        compute_virtual_grid(view, km)
            .into_iter()
            .map(|c| c.bounds_key)
            .collect()
    }

    #[test]
    fn covers_viewport() {
        let view = guelph_view();
        let cells = compute_virtual_grid(view, 5.0);
        assert!(!cells.is_empty());
        for corner in [view.sw, view.ne, view.center()] {
            assert!(cells.iter().any(|c| c.bounds.contains(corner)));
        }
        for c in &cells {
            assert!(c.bounds.intersects(&view));
        }
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let a = compute_virtual_grid(guelph_view(), 5.0);
        let b = compute_virtual_grid(guelph_view(), 5.0);
        assert_eq!(a, b);
    }

    #[test]
    fn panning_back_reproduces_keys() {
        let view = guelph_view();
        let panned = LatLngBounds::from_edges(
            view.sw.lat + 0.013,
            view.sw.lng - 0.021,
            view.ne.lat + 0.013,
            view.ne.lng - 0.021,
        );

        let before = keys(view, 5.0);
        let during = keys(panned, 5.0);
        let after = keys(view, 5.0);
        assert_eq!(before, after);
        // Overlapping regions share tiles.
        assert!(before.intersection(&during).count() > 0);
    }

    #[test]
    fn tiles_are_roughly_cell_sized() {
        for c in compute_virtual_grid(guelph_view(), 5.0) {
            let mid_lat = c.bounds.center().lat;
            let ns = haversine_distance(c.bounds.sw.lat, c.bounds.sw.lng, c.bounds.ne.lat, c.bounds.sw.lng);
            let ew = haversine_distance(mid_lat, c.bounds.sw.lng, mid_lat, c.bounds.ne.lng);
            assert!((ns - 5.0).abs() < 0.01, "ns {ns}");
            assert!((ew - 5.0).abs() < 0.05, "ew {ew}");
        }
    }

    #[test]
    fn tiles_never_overlap() {
        let cells = compute_virtual_grid(guelph_view(), 7.5);
        for a in &cells {
            for b in &cells {
                if a != b {
                    assert!(!a.bounds.intersects(&b.bounds));
                }
            }
        }
    }

    #[test]
    fn degenerate_inputs_are_empty() {
        let flat = LatLngBounds::from_edges(43.5, -80.4, 43.5, -80.1);
        assert!(compute_virtual_grid(flat, 5.0).is_empty());
        assert!(compute_virtual_grid(guelph_view(), 0.0).is_empty());
        assert!(compute_virtual_grid(guelph_view(), -1.0).is_empty());
        assert!(compute_virtual_grid(guelph_view(), f64::NAN).is_empty());
        assert_eq!(estimate_virtual_cell_count(flat, 5.0), 0);
    }

    #[test]
    fn estimate_bounds_actual_count() {
        let view = guelph_view();
        let actual = compute_virtual_grid(view, 5.0).len();
        let estimate = estimate_virtual_cell_count(view, 5.0);
        assert!(estimate >= actual, "{estimate} < {actual}");
        assert!(estimate <= actual * 2, "{estimate} vs {actual}");
    }

    #[test]
    fn vanishing_cell_size_saturates_estimate() {
        let view = guelph_view();
        assert_eq!(estimate_virtual_cell_count(view, 1e-300), usize::MAX);
        assert!(compute_virtual_grid(view, 1e-300).is_empty());
    }

    #[test]
    fn tiny_cell_size_is_cheap_to_reject() {
        let view = guelph_view();
        let started = std::time::Instant::now();
        let estimate = estimate_virtual_cell_count(view, 1e-9);
        assert!(estimate > MAX_VIRTUAL_GRID_TILES);
        assert!(compute_virtual_grid(view, 1e-9).is_empty());
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn estimate_covers_rows_spanning_the_equator() {
        let view = LatLngBounds::from_edges(-0.4, 10.0, 0.3, 10.5);
        let actual = compute_virtual_grid(view, 5.0).len();
        assert!(actual > 0);
        assert!(estimate_virtual_cell_count(view, 5.0) >= actual);

        let south = LatLngBounds::from_edges(-43.7, 170.0, -43.4, 170.4);
        assert!(estimate_virtual_cell_count(south, 5.0) >= compute_virtual_grid(south, 5.0).len());
    }
}
