//! Planar polygon predicates over lat/lng vertices.
//!
//! Polygons are simple (non-self-intersecting) rings given as ordered vertices;
//! the closing edge back to the first vertex is implicit. Longitude is treated as
//! `x` and latitude as `y`. Every function here is total: empty input yields
//! "outside" / zero rather than an error.

use crate::bounds::{LatLng, LatLngBounds};
use crate::math::geodesy::haversine_km;

/// Ray-casting parity test: cast a ray from `point` toward +lng and count the
/// edges it crosses. Inside iff the count is odd.
///
/// This is the only implementation; the wasm client calls the same function, so
/// both sides agree bit-for-bit.
pub fn point_in_polygon(point: LatLng, vertices: &[LatLng]) -> bool {
    let n = vertices.len();
    if n == 0 {
        return false;
    }
    let (px, py) = (point.lng, point.lat);
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (vertices[i].lng, vertices[i].lat);
        let (xj, yj) = (vertices[j].lng, vertices[j].lat);
        // The half-open comparison counts a vertex exactly on the ray once.
        if (yi > py) != (yj > py) {
            let x_cross = (xj - xi) * (py - yi) / (yj - yi) + xi;
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Arithmetic mean of the vertices (not an area centroid).
///
/// Zero vertices give `(0, 0)`. If every vertex is the same point that point is
/// returned unchanged, so `bounding_radius_km(polygon_centroid(p), p)` is exactly
/// zero for a collapsed polygon.
pub fn polygon_centroid(vertices: &[LatLng]) -> LatLng {
    let Some(first) = vertices.first() else {
        return LatLng::new(0.0, 0.0);
    };
    if vertices.iter().all(|v| v == first) {
        return *first;
    }
    let n = vertices.len() as f64;
    let (sum_lat, sum_lng) = vertices
        .iter()
        .fold((0.0, 0.0), |(la, ln), v| (la + v.lat, ln + v.lng));
    LatLng::new(sum_lat / n, sum_lng / n)
}

/// Largest haversine distance (km) from `center` to any vertex.
///
/// Zero for zero or one vertex.
pub fn bounding_radius_km(center: LatLng, vertices: &[LatLng]) -> f64 {
    if vertices.len() <= 1 {
        return 0.0;
    }
    vertices
        .iter()
        .map(|v| haversine_km(center, *v))
        .fold(0.0, f64::max)
}

/// Bounding box of the vertices, `None` when there are none.
pub fn polygon_bounds(vertices: &[LatLng]) -> Option<LatLngBounds> {
    let first = vertices.first()?;
    let mut b = LatLngBounds::new(*first, *first);
    for v in vertices.iter().skip(1) {
        b.sw.lat = b.sw.lat.min(v.lat);
        b.sw.lng = b.sw.lng.min(v.lng);
        b.ne.lat = b.ne.lat.max(v.lat);
        b.ne.lng = b.ne.lng.max(v.lng);
    }
    Some(b)
}
