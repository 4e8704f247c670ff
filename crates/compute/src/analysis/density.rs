//! DBSCAN over haversine distance.
//!
//! Neighbourhoods are found by brute force with a latitude prefilter; lead
//! counts per deployment are in the thousands, which keeps this well under a
//! second.

use std::collections::{BTreeMap, VecDeque};

use foundation::{KM_PER_DEGREE_LAT, LatLng, haversine_km};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EPS_KM: f64 = 15.0;
pub const DEFAULT_MIN_POINTS: usize = 3;
pub const UNKNOWN_CITY: &str = "Unknown";
/// Prefix of cluster refs written by density runs.
pub const AUTO_CLUSTER_PREFIX: &str = "auto-";

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPoint {
    pub id: String,
    pub position: LatLng,
    pub city: Option<String>,
}

impl ClusterPoint {
    pub fn new(id: impl Into<String>, lat: f64, lng: f64, city: Option<&str>) -> Self {
        Self {
            id: id.into(),
            position: LatLng::new(lat, lng),
            city: city.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DbscanParams {
    /// Neighbourhood radius in km.
    pub eps_km: f64,
    /// Neighbours (the point itself included) needed to be a core point.
    pub min_points: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            eps_km: DEFAULT_EPS_KM,
            min_points: DEFAULT_MIN_POINTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityCluster {
    /// `auto-` + the smallest member id; stable while membership is.
    pub key: String,
    pub name: String,
    /// Members in expansion order.
    pub point_ids: Vec<String>,
    pub center: LatLng,
}

fn neighbours(points: &[ClusterPoint], i: usize, eps_km: f64) -> Vec<usize> {
    let p = points[i].position;
    // Latitude alone bounds the distance from below.
    let max_dlat = eps_km / KM_PER_DEGREE_LAT;
    points
        .iter()
        .enumerate()
        .filter(|(_, q)| (q.position.lat - p.lat).abs() <= max_dlat)
        .filter(|(_, q)| haversine_km(p, q.position) <= eps_km)
        .map(|(j, _)| j)
        .collect()
}

/// Groups dense points. Noise points appear in no cluster; points with
/// non-finite coordinates are always noise.
///
/// Deterministic for a fixed input order and parameters.
pub fn dbscan(points: &[ClusterPoint], params: DbscanParams) -> Vec<DensityCluster> {
    let min_points = params.min_points.max(1);
    let n = points.len();
    let mut visited = vec![false; n];
    let mut label: Vec<Option<usize>> = vec![None; n];
    let mut members: Vec<Vec<usize>> = Vec::new();

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        if !points[i].position.is_finite() {
            continue;
        }
        let seed = neighbours(points, i, params.eps_km);
        if seed.len() < min_points {
            continue;
        }

        let c = members.len();
        members.push(vec![i]);
        label[i] = Some(c);
        let mut queue: VecDeque<usize> = seed.into();
        while let Some(j) = queue.pop_front() {
            if label[j].is_none() {
                label[j] = Some(c);
                members[c].push(j);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let reach = neighbours(points, j, params.eps_km);
            if reach.len() >= min_points {
                queue.extend(reach);
            }
        }
    }

    members
        .into_iter()
        .map(|idx| summarize(points, &idx))
        .collect()
}

fn summarize(points: &[ClusterPoint], idx: &[usize]) -> DensityCluster {
    let point_ids: Vec<String> = idx.iter().map(|&i| points[i].id.clone()).collect();
    let smallest = point_ids.iter().min().cloned().unwrap_or_default();

    let n = idx.len() as f64;
    let (lat, lng) = idx.iter().fold((0.0, 0.0), |(la, ln), &i| {
        (la + points[i].position.lat, ln + points[i].position.lng)
    });

    DensityCluster {
        key: format!("{AUTO_CLUSTER_PREFIX}{smallest}"),
        name: dominant_city(idx.iter().map(|&i| points[i].city.as_deref())),
        point_ids,
        center: LatLng::new(lat / n, lng / n),
    }
}

/// Most frequent non-blank city; ties go to the one seen first. `Unknown` when
/// no member has a city.
fn dominant_city<'a>(cities: impl Iterator<Item = Option<&'a str>>) -> String {
    // city -> (count, first position)
    let mut tally: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (pos, city) in cities.enumerate() {
        let Some(city) = city.map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };
        tally.entry(city).or_insert((0, pos)).0 += 1;
    }
    tally
        .into_iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then(b.1.1.cmp(&a.1.1)))
        .map(|(city, _)| city.to_string())
        .unwrap_or_else(|| UNKNOWN_CITY.to_string())
}
