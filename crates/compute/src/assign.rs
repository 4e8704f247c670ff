//! Cluster write-back against the record store.
//!
//! Both entry points read leads under a short lock, compute without it, and
//! write the result in one batch.

use std::collections::BTreeMap;

use catalog::{Cluster, Lead, RecordStore, RecordStoreExt, SharedStore, WriteBatch, new_id};
use foundation::LatLng;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::ComputeError;
use crate::analysis::{AUTO_CLUSTER_PREFIX, ClusterPoint, DbscanParams, DensityCluster, dbscan, enclose};

fn lead_points(leads: &[Lead]) -> Vec<ClusterPoint> {
    leads
        .iter()
        .map(|l| ClusterPoint {
            id: l.id.clone(),
            position: l.position(),
            city: l.city.clone(),
        })
        .collect()
}

/// DBSCAN over every stored lead.
pub fn density_clusters<S: RecordStore>(
    store: &SharedStore<S>,
    params: DbscanParams,
) -> Result<Vec<DensityCluster>, ComputeError> {
    let leads: Vec<Lead> = store.lock().list_docs()?;
    let clusters = dbscan(&lead_points(&leads), params);
    debug!(
        leads = leads.len(),
        clusters = clusters.len(),
        eps_km = params.eps_km,
        min_points = params.min_points,
        "density clustering"
    );
    Ok(clusters)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityWriteBack {
    pub assigned: usize,
    pub cleared: usize,
}

/// Points each member lead at its cluster key and clears `auto-` refs left on
/// leads that are now noise. Polygon cluster refs are never touched.
pub fn apply_density_clusters<S: RecordStore>(
    store: &SharedStore<S>,
    clusters: &[DensityCluster],
) -> Result<DensityWriteBack, ComputeError> {
    let wanted: BTreeMap<&str, &str> = clusters
        .iter()
        .flat_map(|c| c.point_ids.iter().map(|id| (id.as_str(), c.key.as_str())))
        .collect();

    let mut store = store.lock();
    let leads: Vec<Lead> = store.list_docs()?;
    let mut batch = WriteBatch::new();
    let mut report = DensityWriteBack::default();
    for lead in &leads {
        let current = lead.cluster_id.as_deref();
        let automatic = current.is_none_or(|c| c.starts_with(AUTO_CLUSTER_PREFIX));
        if !automatic {
            continue;
        }
        match wanted.get(lead.id.as_str()) {
            Some(&key) if current != Some(key) => {
                batch.patch::<Lead>(&lead.id, json!({ "clusterId": key }))?;
                report.assigned += 1;
            }
            None if current.is_some() => {
                batch.patch::<Lead>(&lead.id, json!({ "clusterId": null }))?;
                report.cleared += 1;
            }
            _ => {}
        }
    }
    store.apply(batch)?;
    info!(assigned = report.assigned, cleared = report.cleared, "density clusters applied");
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonAssignment {
    pub cluster_id: String,
    pub enclosed_count: usize,
    pub center: LatLng,
    pub radius_km: f64,
}

/// Persists a polygon cluster and stamps its id on every lead inside it.
///
/// Membership is decided once, now; later edits to the polygon don't move leads.
pub fn assign_polygon_cluster<S: RecordStore>(
    store: &SharedStore<S>,
    name: &str,
    boundary: Vec<LatLng>,
    now_ms: u64,
) -> Result<PolygonAssignment, ComputeError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ComputeError::InvalidInput("cluster name is empty".to_string()));
    }
    if boundary.iter().any(|v| !v.is_finite()) {
        return Err(ComputeError::InvalidInput(
            "boundary has non-finite vertices".to_string(),
        ));
    }

    let leads: Vec<Lead> = store.lock().list_docs()?;
    let enclosure = enclose(
        &boundary,
        leads.iter().map(|l| (l.id.as_str(), l.position())),
    );

    let mut store = store.lock();
    // Leads deleted since the read are skipped.
    let enclosed: Vec<&String> = enclosure
        .enclosed
        .iter()
        .filter(|id| matches!(store.get(catalog::LEADS, id), Ok(Some(_))))
        .collect();

    let cluster = Cluster {
        id: new_id(),
        name: name.to_string(),
        boundary,
        center: enclosure.center,
        radius_km: enclosure.radius_km,
        lead_count: u32::try_from(enclosed.len()).unwrap_or(u32::MAX),
        created_at_ms: now_ms,
    };
    let mut batch = WriteBatch::new();
    batch.insert(&cluster)?;
    for id in &enclosed {
        batch.patch::<Lead>(id, json!({ "clusterId": cluster.id }))?;
    }
    store.apply(batch)?;

    info!(
        cluster_id = %cluster.id,
        name = %cluster.name,
        enclosed = enclosed.len(),
        "polygon cluster assigned"
    );
    Ok(PolygonAssignment {
        cluster_id: cluster.id,
        enclosed_count: enclosed.len(),
        center: cluster.center,
        radius_km: cluster.radius_km,
    })
}

pub fn list_clusters<S: RecordStore>(store: &SharedStore<S>) -> Result<Vec<Cluster>, ComputeError> {
    Ok(store.lock().list_docs()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{InMemoryRecordStore, fields, shared};
    use pretty_assertions::assert_eq;

    fn lead(id: &str, lat: f64, lng: f64, city: &str) -> Lead {
        Lead {
            id: id.to_string(),
            grid_id: None,
            cell_id: None,
            name: format!("Farm {id}"),
            address: String::new(),
            city: Some(city.to_string()),
            lat,
            lng,
            place_type: None,
            external_id: None,
            dedup_key: format!("farm {id}::{}", city.to_lowercase()),
            cluster_id: None,
            created_at_ms: 0,
            enriched_at_ms: None,
        }
    }

    fn seeded() -> SharedStore<InMemoryRecordStore> {
        let store = shared(InMemoryRecordStore::new());
        {
            let mut s = store.lock();
            for l in [
                lead("a", 43.5448, -80.2482, "Guelph"),
                lead("b", 43.5460, -80.2500, "Guelph"),
                lead("c", 43.5440, -80.2470, "Guelph"),
                lead("d", 45.0, -75.0, "Ottawa"),
                lead("n", 43.25, -79.07, "Niagara Falls"),
            ] {
                s.insert_doc(&l).unwrap();
            }
        }
        store
    }

    fn cluster_of(store: &SharedStore<InMemoryRecordStore>, id: &str) -> Option<String> {
        store.lock().require_doc::<Lead>(id).unwrap().cluster_id
    }

    #[test]
    fn density_write_back_and_clear() {
        let store = seeded();
        let clusters = density_clusters(&store, DbscanParams::default()).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "Guelph");

        let report = apply_density_clusters(&store, &clusters).unwrap();
        assert_eq!(report, DensityWriteBack { assigned: 3, cleared: 0 });
        assert_eq!(cluster_of(&store, "a").as_deref(), Some("auto-a"));
        assert_eq!(cluster_of(&store, "d"), None);

        let members: Vec<Lead> = store.lock().query_docs(fields::CLUSTER_ID, "auto-a").unwrap();
        assert_eq!(members.len(), 3);

        // Same run again changes nothing.
        let report = apply_density_clusters(&store, &clusters).unwrap();
        assert_eq!(report, DensityWriteBack::default());

        // A run where everything is noise clears the stale refs.
        let report = apply_density_clusters(&store, &[]).unwrap();
        assert_eq!(report, DensityWriteBack { assigned: 0, cleared: 3 });
        assert_eq!(cluster_of(&store, "a"), None);
    }

    #[test]
    fn polygon_assignment_counts_enclosed() {
        let store = seeded();
        let boundary = vec![
            LatLng::new(43.20, -79.12),
            LatLng::new(43.20, -79.04),
            LatLng::new(43.28, -79.04),
            LatLng::new(43.28, -79.12),
        ];
        let result = assign_polygon_cluster(&store, "Niagara", boundary, 5).unwrap();
        assert_eq!(result.enclosed_count, 1);
        assert!(result.radius_km > 3.0 && result.radius_km < 10.0);
        assert_eq!(cluster_of(&store, "n"), Some(result.cluster_id.clone()));
        assert_eq!(cluster_of(&store, "a"), None);

        let clusters = list_clusters(&store).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].lead_count, 1);
        assert_eq!(clusters[0].name, "Niagara");
    }

    #[test]
    fn density_never_overrides_polygon_clusters() {
        let store = seeded();
        let boundary = vec![
            LatLng::new(43.0, -81.0),
            LatLng::new(43.0, -80.0),
            LatLng::new(44.0, -80.0),
            LatLng::new(44.0, -81.0),
        ];
        let manual = assign_polygon_cluster(&store, "Wellington", boundary, 0).unwrap();
        assert_eq!(manual.enclosed_count, 3);

        let clusters = density_clusters(&store, DbscanParams::default()).unwrap();
        let report = apply_density_clusters(&store, &clusters).unwrap();
        assert_eq!(report.assigned, 0);
        assert_eq!(cluster_of(&store, "b"), Some(manual.cluster_id));
    }

    #[test]
    fn polygon_needs_a_name() {
        let store = seeded();
        assert!(matches!(
            assign_polygon_cluster(&store, "  ", vec![], 0),
            Err(ComputeError::InvalidInput(_))
        ));
        let empty = assign_polygon_cluster(&store, "Nowhere", vec![], 0).unwrap();
        assert_eq!(empty.enclosed_count, 0);
        assert_eq!(empty.radius_km, 0.0);
    }
}
