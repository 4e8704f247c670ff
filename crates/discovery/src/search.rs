//! Search rounds against an `EntitySource`.
//!
//! A round issues every grid query for one cell concurrently and waits for all
//! of them before anything is recorded. Bulk runs walk cells one at a time.

use std::time::Duration;

use catalog::{QueryCount, RecordStore};
use foundation::{LatLngBounds, now_ms};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::manager::{CellManager, RoundOutcome, SearchReport};
use crate::source::{EntitySource, Place, SourceError};

/// Fetches up to `max_pages_per_query` pages for one query.
async fn fetch_query(
    source: &dyn EntitySource,
    query: &str,
    viewport: LatLngBounds,
    max_pages: u32,
) -> Result<Vec<Place>, SourceError> {
    let mut places = Vec::new();
    let mut token: Option<String> = None;
    for page_no in 0..max_pages {
        let page = source.search(query, viewport, token.as_deref()).await?;
        debug!(query, page_no, results = page.results.len(), "page fetched");
        places.extend(page.results);
        match page.next_page_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }
    Ok(places)
}

/// Runs all `queries` for `viewport` concurrently. Any failing query fails
/// the whole round.
pub async fn fetch_round(
    source: &dyn EntitySource,
    queries: &[String],
    viewport: LatLngBounds,
    config: &DiscoveryConfig,
) -> Result<RoundOutcome, SourceError> {
    let results = join_all(
        queries
            .iter()
            .map(|q| fetch_query(source, q, viewport, config.max_pages_per_query)),
    )
    .await;

    let mut outcome = RoundOutcome::default();
    for (query, result) in queries.iter().zip(results) {
        let places = result?;
        outcome.query_counts.push(QueryCount {
            query: query.clone(),
            count: u32::try_from(places.len()).unwrap_or(u32::MAX),
        });
        outcome.places.extend(places);
    }
    Ok(outcome)
}

/// One full search round on a cell.
///
/// On upstream failure the cell stays `searching` and the error is returned;
/// calling this again retries.
pub async fn search_cell<S: RecordStore>(
    manager: &CellManager<S>,
    source: &dyn EntitySource,
    cell_id: &str,
) -> Result<SearchReport, DiscoveryError> {
    let ticket = manager.begin_search(cell_id, now_ms())?;
    let outcome = match fetch_round(
        source,
        &ticket.queries,
        ticket.cell.bounds,
        manager.config(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(cell_id, source = source.name(), error = %e, "search round failed");
            return Err(e.into());
        }
    };
    let report = manager.complete_search(cell_id, outcome, now_ms())?;
    drop(ticket);
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub cell_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSearchReport {
    pub completed: Vec<SearchReport>,
    pub failed: Vec<BulkFailure>,
}

/// Searches `cell_ids` in order with `delay` between calls. A failing cell is
/// reported and the run continues.
pub async fn search_cells_sequentially<S: RecordStore>(
    manager: &CellManager<S>,
    source: &dyn EntitySource,
    cell_ids: &[String],
    delay: Duration,
) -> BulkSearchReport {
    let mut report = BulkSearchReport::default();
    for (i, cell_id) in cell_ids.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match search_cell(manager, source, cell_id).await {
            Ok(done) => report.completed.push(done),
            Err(e) => report.failed.push(BulkFailure {
                cell_id: cell_id.clone(),
                error: e.to_string(),
            }),
        }
    }
    info!(
        completed = report.completed.len(),
        failed = report.failed.len(),
        "bulk search finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{GridCounters, NewGrid};
    use crate::source::{BoxFuture, SearchPage};
    use catalog::{CellStatus, InMemoryRecordStore, RecordStoreExt, shared};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, BTreeSet};

    /// Serves canned pages per query; page tokens are page indexes.
    #[derive(Default)]
    struct ScriptedSource {
        pages: BTreeMap<String, Vec<Vec<Place>>>,
        failing: BTreeSet<String>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedSource {
        fn with(mut self, query: &str, pages: Vec<Vec<Place>>) -> Self {
            self.pages.insert(query.to_string(), pages);
            self
        }

        fn failing(mut self, query: &str) -> Self {
            self.failing.insert(query.to_string());
            self
        }
    }

    impl EntitySource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn search<'a>(
            &'a self,
            query: &'a str,
            _viewport: LatLngBounds,
            page_token: Option<&'a str>,
        ) -> BoxFuture<'a, Result<SearchPage, SourceError>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .push((query.to_string(), page_token.map(str::to_string)));
                if self.failing.contains(query) {
                    return Err(SourceError::RateLimited);
                }
                let idx: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
                let pages = self.pages.get(query).cloned().unwrap_or_default();
                let results = pages.get(idx).cloned().unwrap_or_default();
                let next_page_token = (idx + 1 < pages.len()).then(|| (idx + 1).to_string());
                Ok(SearchPage {
                    results,
                    next_page_token,
                })
            })
        }
    }

    fn place(name: &str, n: usize) -> Place {
        Place {
            name: format!("{name} {n}"),
            address: format!("{n} Concession Rd"),
            city: Some("Guelph".to_string()),
            lat: 43.5 + n as f64 * 0.001,
            lng: -80.25,
            place_type: None,
            external_id: Some(format!("{name}-{n}")),
        }
    }

    fn places(name: &str, count: usize) -> Vec<Place> {
        (0..count).map(|n| place(name, n)).collect()
    }

    fn setup(config: DiscoveryConfig) -> (CellManager<InMemoryRecordStore>, String, String) {
        let m = CellManager::new(shared(InMemoryRecordStore::new()), config);
        let grid = m
            .create_grid(
                NewGrid {
                    name: "Wellington".to_string(),
                    queries: vec!["farm".to_string(), "orchard".to_string()],
                    ..NewGrid::default()
                },
                0,
            )
            .unwrap();
        let cell = m
            .activate(&grid.id, LatLngBounds::from_edges(43.5, -80.3, 43.6, -80.2), 0)
            .unwrap();
        (m, grid.id, cell.id)
    }

    fn assert_consistent(m: &CellManager<InMemoryRecordStore>, grid_id: &str) {
        assert_eq!(
            GridCounters::of(&m.grid(grid_id).unwrap()),
            m.recount_grid(grid_id).unwrap()
        );
    }

    #[tokio::test]
    async fn round_fans_out_every_query() {
        let (m, grid_id, cell_id) = setup(DiscoveryConfig::default());
        let source = ScriptedSource::default()
            .with("farm", vec![places("Farm", 3)])
            .with("orchard", vec![places("Orchard", 2)]);

        let report = search_cell(&m, &source, &cell_id).await.unwrap();
        assert_eq!(report.status, CellStatus::Searched);
        assert_eq!(report.inserted, 5);

        let calls: BTreeSet<String> = source.calls.lock().iter().map(|c| c.0.clone()).collect();
        assert_eq!(calls, BTreeSet::from(["farm".to_string(), "orchard".to_string()]));

        let cell = m.cell(&cell_id).unwrap();
        assert_eq!(
            cell.query_saturation,
            vec![
                QueryCount { query: "farm".into(), count: 3 },
                QueryCount { query: "orchard".into(), count: 2 },
            ]
        );
        assert_consistent(&m, &grid_id);
    }

    #[tokio::test]
    async fn full_page_saturates() {
        let (m, grid_id, cell_id) = setup(DiscoveryConfig::default());
        let source = ScriptedSource::default().with("farm", vec![places("Farm", 20)]);

        let report = search_cell(&m, &source, &cell_id).await.unwrap();
        assert_eq!(report.status, CellStatus::Saturated);
        assert_eq!(report.saturated_queries, vec!["farm"]);
        assert_eq!(m.grid(&grid_id).unwrap().saturated_count, 1);
        assert_consistent(&m, &grid_id);
    }

    #[tokio::test]
    async fn follows_page_tokens_up_to_limit() {
        let config = DiscoveryConfig {
            max_pages_per_query: 2,
            saturation_threshold: 40,
            ..DiscoveryConfig::default()
        };
        let (m, _, cell_id) = setup(config);
        let source = ScriptedSource::default().with(
            "farm",
            vec![places("A", 20), places("B", 20), places("C", 20)],
        );

        let report = search_cell(&m, &source, &cell_id).await.unwrap();
        assert_eq!(report.result_count, 40);
        assert_eq!(report.status, CellStatus::Saturated);

        let farm_calls: Vec<Option<String>> = source
            .calls
            .lock()
            .iter()
            .filter(|c| c.0 == "farm")
            .map(|c| c.1.clone())
            .collect();
        assert_eq!(farm_calls, vec![None, Some("1".to_string())]);
    }

    #[tokio::test]
    async fn upstream_failure_leaves_cell_searching() {
        let (m, grid_id, cell_id) = setup(DiscoveryConfig::default());
        let broken = ScriptedSource::default()
            .with("farm", vec![places("Farm", 3)])
            .failing("orchard");

        let err = search_cell(&m, &broken, &cell_id).await.unwrap_err();
        assert_eq!(err, DiscoveryError::Upstream(SourceError::RateLimited));
        let cell = m.cell(&cell_id).unwrap();
        assert_eq!(cell.status, CellStatus::Searching);
        assert_eq!(cell.last_searched_at_ms, None);
        assert!(m.store().lock().list_docs::<catalog::Lead>().unwrap().is_empty());
        assert_consistent(&m, &grid_id);

        let healthy = ScriptedSource::default().with("farm", vec![places("Farm", 3)]);
        let report = search_cell(&m, &healthy, &cell_id).await.unwrap();
        assert_eq!(report.status, CellStatus::Searched);
        assert_eq!(report.inserted, 3);
        assert_consistent(&m, &grid_id);
    }

    #[tokio::test]
    async fn repeat_search_finds_only_duplicates() {
        let (m, grid_id, cell_id) = setup(DiscoveryConfig::default());
        let source = ScriptedSource::default().with("farm", vec![places("Farm", 4)]);

        search_cell(&m, &source, &cell_id).await.unwrap();
        let again = search_cell(&m, &source, &cell_id).await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 4);
        assert_eq!(m.grid(&grid_id).unwrap().total_leads_found, 4);
        assert_eq!(m.cell(&cell_id).unwrap().leads_found, 4);
        assert_consistent(&m, &grid_id);
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_search_continues_past_failures() {
        let (m, grid_id, first) = setup(DiscoveryConfig::default());
        let second = m
            .activate(&grid_id, LatLngBounds::from_edges(43.6, -80.3, 43.7, -80.2), 0)
            .unwrap()
            .id;
        let source = ScriptedSource::default().with("farm", vec![places("Farm", 2)]);

        let ids = vec![first.clone(), "missing".to_string(), second.clone()];
        let started = tokio::time::Instant::now();
        let report =
            search_cells_sequentially(&m, &source, &ids, Duration::from_millis(250)).await;
        // Paused clock: only the pauses between the three cells advance it.
        assert!(started.elapsed() >= Duration::from_millis(500));

        let done: Vec<&str> = report.completed.iter().map(|r| r.cell_id.as_str()).collect();
        assert_eq!(done, vec![first.as_str(), second.as_str()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].cell_id, "missing");
        // Same two places seen from both cells: inserted once.
        assert_eq!(report.completed[1].duplicates, 2);
        assert_consistent(&m, &grid_id);
    }
}
