/// WGS84 coordinate in decimal degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        LatLng { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Axis-aligned lat/lng rectangle given by its south-west and north-east corners.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatLngBounds {
    pub sw: LatLng,
    pub ne: LatLng,
}

/// Decimal places kept in a bounds key (~0.1 m at the equator).
pub const BOUNDS_KEY_DECIMALS: usize = 6;

impl LatLngBounds {
    pub fn new(sw: LatLng, ne: LatLng) -> Self {
        LatLngBounds { sw, ne }
    }

    pub fn from_edges(south: f64, west: f64, north: f64, east: f64) -> Self {
        LatLngBounds {
            sw: LatLng::new(south, west),
            ne: LatLng::new(north, east),
        }
    }

    /// True when the rectangle has no area (or isn't made of finite numbers).
    ///
    /// A box whose west edge is east of its east edge is also degenerate: we don't
    /// model antimeridian-crossing boxes.
    pub fn is_degenerate(&self) -> bool {
        !(self.sw.is_finite() && self.ne.is_finite())
            || self.ne.lat <= self.sw.lat
            || self.ne.lng <= self.sw.lng
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.sw.lat + self.ne.lat) / 2.0,
            (self.sw.lng + self.ne.lng) / 2.0,
        )
    }

    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.sw.lat && p.lat <= self.ne.lat && p.lng >= self.sw.lng && p.lng <= self.ne.lng
    }

    pub fn contains_bounds(&self, other: &LatLngBounds) -> bool {
        self.contains(other.sw) && self.contains(other.ne)
    }

    pub fn intersects(&self, other: &LatLngBounds) -> bool {
        self.sw.lat < other.ne.lat
            && other.sw.lat < self.ne.lat
            && self.sw.lng < other.ne.lng
            && other.sw.lng < self.ne.lng
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &LatLngBounds) -> LatLngBounds {
        LatLngBounds::from_edges(
            self.sw.lat.min(other.sw.lat),
            self.sw.lng.min(other.sw.lng),
            self.ne.lat.max(other.ne.lat),
            self.ne.lng.max(other.ne.lng),
        )
    }

    /// The four equal quadrants in SW, SE, NW, NE order.
    ///
    /// Shared edges are the same `f64` values, so the quadrants tile `self` with no
    /// gap or overlap.
    pub fn quadrants(&self) -> [LatLngBounds; 4] {
        let mid = self.center();
        let (s, w, n, e) = (self.sw.lat, self.sw.lng, self.ne.lat, self.ne.lng);
        [
            LatLngBounds::from_edges(s, w, mid.lat, mid.lng),
            LatLngBounds::from_edges(s, mid.lng, mid.lat, e),
            LatLngBounds::from_edges(mid.lat, w, n, mid.lng),
            LatLngBounds::from_edges(mid.lat, mid.lng, n, e),
        ]
    }

    /// Stable identity string derived purely from the geometry.
    pub fn key(&self) -> String {
        bounds_key(self)
    }
}

/// `"<south>,<west>,<north>,<east>"` with fixed precision.
///
/// Values are rounded before formatting and negative zero is folded into zero, so
/// `-0.0000001` and `0.0` produce the same key.
pub fn bounds_key(bounds: &LatLngBounds) -> String {
    format!(
        "{},{},{},{}",
        key_component(bounds.sw.lat),
        key_component(bounds.sw.lng),
        key_component(bounds.ne.lat),
        key_component(bounds.ne.lng),
    )
}

fn key_component(v: f64) -> String {
    let scale = 10f64.powi(BOUNDS_KEY_DECIMALS as i32);
    let rounded = (v * scale).round() / scale + 0.0;
    format!("{rounded:.prec$}", prec = BOUNDS_KEY_DECIMALS)
}
