use foundation::{LatLng, bounding_radius_km, point_in_polygon, polygon_bounds, polygon_centroid};

/// Geometry and membership of a drawn polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Enclosure {
    pub center: LatLng,
    pub radius_km: f64,
    /// Ids of enclosed points, in input order.
    pub enclosed: Vec<String>,
}

/// Centroid, bounding radius and the ids of `points` inside `boundary`.
pub fn enclose<'a, I>(boundary: &[LatLng], points: I) -> Enclosure
where
    I: IntoIterator<Item = (&'a str, LatLng)>,
{
    let center = polygon_centroid(boundary);
    let radius_km = bounding_radius_km(center, boundary);
    let bbox = polygon_bounds(boundary);

    let enclosed = points
        .into_iter()
        // Cheap reject before the edge walk.
        .filter(|(_, p)| bbox.is_some_and(|b| b.contains(*p)))
        .filter(|(_, p)| point_in_polygon(*p, boundary))
        .map(|(id, _)| id.to_string())
        .collect();

    Enclosure {
        center,
        radius_km,
        enclosed,
    }
}
