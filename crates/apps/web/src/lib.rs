//! Browser exports of the map geometry.
//!
//! Everything delegates to `foundation`, the same code the server runs, so a
//! point the map shows inside a drawn polygon is the point the server assigns.
//! Vertex lists cross the boundary flat: `[lat0, lng0, lat1, lng1, ...]`; a
//! trailing odd value is ignored.

use console_error_panic_hook::set_once;
use foundation::{LatLng, LatLngBounds};
use wasm_bindgen::prelude::*;

fn vertices(flat: &[f64]) -> Vec<LatLng> {
    flat.chunks_exact(2)
        .map(|c| LatLng::new(c[0], c[1]))
        .collect()
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    Ok(())
}

#[wasm_bindgen]
pub fn point_in_polygon(lat: f64, lng: f64, flat_vertices: &[f64]) -> bool {
    foundation::point_in_polygon(LatLng::new(lat, lng), &vertices(flat_vertices))
}

/// `[lat, lng]`.
#[wasm_bindgen]
pub fn polygon_centroid(flat_vertices: &[f64]) -> Vec<f64> {
    let c = foundation::polygon_centroid(&vertices(flat_vertices));
    vec![c.lat, c.lng]
}

#[wasm_bindgen]
pub fn bounding_radius_km(lat: f64, lng: f64, flat_vertices: &[f64]) -> f64 {
    foundation::bounding_radius_km(LatLng::new(lat, lng), &vertices(flat_vertices))
}

#[wasm_bindgen]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    foundation::haversine_distance(lat1, lng1, lat2, lng2)
}

/// Tiles covering the viewport, 4 values per tile: `[south, west, north, east, ...]`.
///
/// Empty when the request would need more than `foundation::MAX_VIRTUAL_GRID_TILES`.
#[wasm_bindgen]
pub fn virtual_grid(sw_lat: f64, sw_lng: f64, ne_lat: f64, ne_lng: f64, cell_km: f64) -> Vec<f64> {
    let viewport = LatLngBounds::from_edges(sw_lat, sw_lng, ne_lat, ne_lng);
    foundation::compute_virtual_grid(viewport, cell_km)
        .into_iter()
        .flat_map(|v| [v.bounds.sw.lat, v.bounds.sw.lng, v.bounds.ne.lat, v.bounds.ne.lng])
        .collect()
}

/// Keys of `virtual_grid` tiles, in the same order.
#[wasm_bindgen]
pub fn virtual_grid_keys(
    sw_lat: f64,
    sw_lng: f64,
    ne_lat: f64,
    ne_lng: f64,
    cell_km: f64,
) -> Vec<String> {
    let viewport = LatLngBounds::from_edges(sw_lat, sw_lng, ne_lat, ne_lng);
    foundation::compute_virtual_grid(viewport, cell_km)
        .into_iter()
        .map(|v| v.bounds_key)
        .collect()
}

#[wasm_bindgen]
pub fn bounds_key(south: f64, west: f64, north: f64, east: f64) -> String {
    LatLngBounds::from_edges(south, west, north, east).key()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lcg(u64);

    impl Lcg {
        fn next_f64(&mut self) -> f64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }

        fn range(&mut self, lo: f64, hi: f64) -> f64 {
            lo + (hi - lo) * self.next_f64()
        }
    }

    // Star-shaped (so simple) polygon around a center; odd vertices pulled
    // inward make it concave.
    fn star(rng: &mut Lcg, n: usize) -> Vec<f64> {
        let (clat, clng) = (rng.range(42.0, 46.0), rng.range(-82.0, -75.0));
        let mut flat = Vec::with_capacity(n * 2);
        for i in 0..n {
            let a = i as f64 / n as f64 * std::f64::consts::TAU;
            let r = if i % 2 == 0 { 0.2 } else { rng.range(0.05, 0.2) };
            flat.push(clat + r * a.sin());
            flat.push(clng + r * a.cos());
        }
        flat
    }

    #[test]
    fn client_and_backend_agree() {
        let mut rng = Lcg(42);
        for _ in 0..50 {
            let n = 8 + (rng.next_f64() * 8.0) as usize;
            let flat = star(&mut rng, n);
            let poly = vertices(&flat);
            let c = foundation::polygon_centroid(&poly);
            for _ in 0..50 {
                let (lat, lng) = (c.lat + rng.range(-0.3, 0.3), c.lng + rng.range(-0.3, 0.3));
                assert_eq!(
                    point_in_polygon(lat, lng, &flat),
                    foundation::point_in_polygon(LatLng::new(lat, lng), &poly)
                );
            }
            assert_eq!(polygon_centroid(&flat), vec![c.lat, c.lng]);
            assert_eq!(
                bounding_radius_km(c.lat, c.lng, &flat).to_bits(),
                foundation::bounding_radius_km(c, &poly).to_bits()
            );
        }
    }

    #[test]
    fn flat_vertex_edge_cases() {
        assert!(!point_in_polygon(0.0, 0.0, &[]));
        assert_eq!(polygon_centroid(&[]), vec![0.0, 0.0]);
        // Trailing odd value dropped: one vertex left, radius zero.
        assert_eq!(bounding_radius_km(1.0, 1.0, &[1.0, 1.0, 5.0]), 0.0);
    }

    #[test]
    fn virtual_grid_matches_keys() {
        let flat = virtual_grid(43.50, -80.30, 43.62, -80.18, 5.0);
        let keys = virtual_grid_keys(43.50, -80.30, 43.62, -80.18, 5.0);
        assert_eq!(flat.len(), keys.len() * 4);
        for (tile, key) in flat.chunks_exact(4).zip(&keys) {
            assert_eq!(&bounds_key(tile[0], tile[1], tile[2], tile[3]), key);
        }
        assert!(virtual_grid(43.5, -80.3, 43.5, -80.2, 5.0).is_empty());
        assert!(virtual_grid(43.5, -80.3, 43.6, -80.2, 1e-300).is_empty());
    }
}
