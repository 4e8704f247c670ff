//! Cell lifecycle manager.
//!
//! Owns Grid and Cell records. Every status transition is written as a single
//! `WriteBatch` together with the grid counter patch it implies, so readers never
//! observe a cell whose status disagrees with its grid's aggregates.
//!
//! Counter semantics over a grid's *leaf* cells:
//! - `totalLeafCells`: leaves (retired parents excluded)
//! - `searchedCount`: leaves in `searched` or `saturated`
//! - `saturatedCount`: leaves in `saturated`
//! - `totalLeadsFound`: sum of `leadsFound` over every cell

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use catalog::{
    Cell, CellStatus, Grid, Lead, QueryCount, RecordStore, RecordStoreExt, SharedStore, WriteBatch,
    fields, new_id,
};
use foundation::{Freshness, LatLngBounds, VirtualCell, compute_virtual_grid, estimate_virtual_cell_count};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::actions::{CellAction, available_actions};
use crate::config::DiscoveryConfig;
use crate::dedup::dedup_key;
use crate::error::DiscoveryError;
use crate::source::Place;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewGrid {
    pub name: String,
    pub region: String,
    pub province: String,
    pub queries: Vec<String>,
}

/// Metadata edit; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridUpdate {
    pub name: Option<String>,
    pub region: Option<String>,
    pub province: Option<String>,
    pub queries: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProgress {
    pub leaf_cells: u32,
    pub retired_cells: u32,
    pub unsearched: u32,
    pub searching: u32,
    pub searched: u32,
    pub saturated: u32,
    pub fresh: u32,
    pub aging: u32,
    pub stale: u32,
    /// Share of leaves that completed a round, 0..=100.
    pub percent_complete: f64,
    pub total_leads_found: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDetail {
    pub grid: Grid,
    pub progress: GridProgress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub grids: usize,
    pub cells: usize,
}

/// Aggregates recomputed from scratch; see `CellManager::recount_grid`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridCounters {
    pub searched_count: u32,
    pub saturated_count: u32,
    pub total_leaf_cells: u32,
    pub total_leads_found: u64,
}

impl GridCounters {
    pub fn of(grid: &Grid) -> Self {
        Self {
            searched_count: grid.searched_count,
            saturated_count: grid.saturated_count,
            total_leaf_cells: grid.total_leaf_cells,
            total_leads_found: grid.total_leads_found,
        }
    }

    fn add_leaf(&mut self, status: CellStatus) {
        self.total_leaf_cells += 1;
        self.count_status(status, true);
    }

    fn remove_leaf(&mut self, status: CellStatus) {
        self.total_leaf_cells = self.total_leaf_cells.saturating_sub(1);
        self.count_status(status, false);
    }

    fn set_status(&mut self, from: CellStatus, to: CellStatus) {
        self.count_status(from, false);
        self.count_status(to, true);
    }

    fn count_status(&mut self, status: CellStatus, add: bool) {
        let bump = |n: &mut u32| {
            *n = if add { *n + 1 } else { n.saturating_sub(1) };
        };
        match status {
            CellStatus::Searched => bump(&mut self.searched_count),
            CellStatus::Saturated => {
                bump(&mut self.searched_count);
                bump(&mut self.saturated_count);
            }
            CellStatus::Unsearched | CellStatus::Searching => {}
        }
    }

    // Only counter fields are patched so unrelated grid fields survive untouched.
    fn patch(&self, now_ms: u64) -> serde_json::Value {
        json!({
            "searchedCount": self.searched_count,
            "saturatedCount": self.saturated_count,
            "totalLeafCells": self.total_leaf_cells,
            "totalLeadsFound": self.total_leads_found,
            "updatedAtMs": now_ms,
        })
    }
}

/// Per-query counts and merged places of one completed round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundOutcome {
    pub query_counts: Vec<QueryCount>,
    pub places: Vec<Place>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub cell_id: String,
    pub status: CellStatus,
    pub result_count: u32,
    pub inserted: usize,
    pub duplicates: usize,
    pub saturated_queries: Vec<String>,
}

/// Marks a cell as having a round in flight; released on drop.
pub struct FlightGuard {
    cell_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.cell_id);
    }
}

/// A cell moved to `searching`, plus what the round needs to run.
pub struct SearchTicket {
    pub cell: Cell,
    pub queries: Vec<String>,
    _guard: FlightGuard,
}

fn normalize_queries(queries: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty() && seen.insert(q.clone()))
        .collect()
}

pub struct CellManager<S> {
    store: SharedStore<S>,
    config: DiscoveryConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<S> Clone for CellManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<S: RecordStore> CellManager<S> {
    pub fn new(store: SharedStore<S>, config: DiscoveryConfig) -> Self {
        Self {
            store,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore<S> {
        &self.store
    }

    // ---- grids ----

    pub fn create_grid(&self, new: NewGrid, now_ms: u64) -> Result<Grid, DiscoveryError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(DiscoveryError::InvalidInput("grid name is empty".to_string()));
        }
        let mut grid = Grid::new(new_id(), name, now_ms);
        grid.region = new.region.trim().to_string();
        grid.province = new.province.trim().to_string();
        grid.queries = normalize_queries(new.queries);

        self.store.lock().insert_doc(&grid)?;
        info!(grid_id = %grid.id, name = %grid.name, "grid created");
        Ok(grid)
    }

    pub fn list_grids(&self) -> Result<Vec<Grid>, DiscoveryError> {
        Ok(self.store.lock().list_docs::<Grid>()?)
    }

    pub fn grid(&self, grid_id: &str) -> Result<Grid, DiscoveryError> {
        Ok(self.store.lock().require_doc::<Grid>(grid_id)?)
    }

    pub fn grid_detail(&self, grid_id: &str, now_ms: u64) -> Result<GridDetail, DiscoveryError> {
        let (grid, cells) = {
            let store = self.store.lock();
            let grid: Grid = store.require_doc(grid_id)?;
            let cells: Vec<Cell> = store.query_docs(fields::GRID_ID, grid_id)?;
            (grid, cells)
        };
        let progress = progress_of(&grid, &cells, now_ms);
        Ok(GridDetail { grid, progress })
    }

    pub fn update_grid(
        &self,
        grid_id: &str,
        update: GridUpdate,
        now_ms: u64,
    ) -> Result<Grid, DiscoveryError> {
        let mut store = self.store.lock();
        let grid: Grid = store.require_doc(grid_id)?;
        let mut patch = serde_json::Map::new();

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DiscoveryError::InvalidInput("grid name is empty".to_string()));
            }
            patch.insert("name".into(), json!(name));
        }
        if let Some(region) = update.region {
            patch.insert("region".into(), json!(region.trim()));
        }
        if let Some(province) = update.province {
            patch.insert("province".into(), json!(province.trim()));
        }
        if let Some(queries) = update.queries {
            let queries = normalize_queries(queries);
            if queries.is_empty() {
                let cells: Vec<Cell> = store.query_docs(fields::GRID_ID, grid_id)?;
                if cells.iter().any(|c| c.status != CellStatus::Unsearched) {
                    return Err(DiscoveryError::InvalidInput(
                        "queries cannot be emptied once searching has begun".to_string(),
                    ));
                }
            }
            patch.insert("queries".into(), json!(queries));
        }
        patch.insert("updatedAtMs".into(), json!(now_ms));

        store.patch_doc::<Grid>(&grid.id, serde_json::Value::Object(patch))?;
        debug!(grid_id, "grid metadata updated");
        Ok(store.require_doc(grid_id)?)
    }

    /// Deletes the grid and all its cells. Leads are kept; their grid ref dangles.
    pub fn delete_grid(&self, grid_id: &str) -> Result<PurgeReport, DiscoveryError> {
        let mut store = self.store.lock();
        store.require_doc::<Grid>(grid_id)?;
        let cells: Vec<Cell> = store.query_docs(fields::GRID_ID, grid_id)?;

        let mut batch = WriteBatch::new();
        for cell in &cells {
            batch.delete::<Cell>(&cell.id);
        }
        batch.delete::<Grid>(grid_id);
        store.apply(batch)?;

        info!(grid_id, cells = cells.len(), "grid deleted");
        Ok(PurgeReport {
            grids: 1,
            cells: cells.len(),
        })
    }

    /// Deletes every grid and cell.
    pub fn purge_all(&self) -> Result<PurgeReport, DiscoveryError> {
        let mut store = self.store.lock();
        let grids: Vec<Grid> = store.list_docs()?;
        let cells: Vec<Cell> = store.list_docs()?;

        let mut batch = WriteBatch::new();
        for cell in &cells {
            batch.delete::<Cell>(&cell.id);
        }
        for grid in &grids {
            batch.delete::<Grid>(&grid.id);
        }
        store.apply(batch)?;

        warn!(grids = grids.len(), cells = cells.len(), "purged all grids");
        Ok(PurgeReport {
            grids: grids.len(),
            cells: cells.len(),
        })
    }

    // ---- cells ----

    pub fn list_cells(&self, grid_id: &str) -> Result<Vec<Cell>, DiscoveryError> {
        let store = self.store.lock();
        store.require_doc::<Grid>(grid_id)?;
        Ok(store.query_docs(fields::GRID_ID, grid_id)?)
    }

    pub fn cell(&self, cell_id: &str) -> Result<Cell, DiscoveryError> {
        Ok(self.store.lock().require_doc::<Cell>(cell_id)?)
    }

    pub fn actions(&self, cell_id: &str) -> Result<Vec<CellAction>, DiscoveryError> {
        let cell = self.cell(cell_id)?;
        Ok(available_actions(
            &cell,
            &self.config.mechanisms,
            self.config.max_depth,
        ))
    }

    /// Candidate tiles for `viewport`, excluding keys already persisted in the grid.
    pub fn virtual_cells(
        &self,
        grid_id: &str,
        viewport: LatLngBounds,
        cell_size_km: f64,
    ) -> Result<Vec<VirtualCell>, DiscoveryError> {
        let estimate = estimate_virtual_cell_count(viewport, cell_size_km);
        if estimate > self.config.max_virtual_cells {
            return Err(DiscoveryError::InvalidInput(format!(
                "viewport needs about {estimate} tiles, limit is {}; zoom in or use larger cells",
                self.config.max_virtual_cells
            )));
        }

        let taken: BTreeSet<String> = {
            let store = self.store.lock();
            store.require_doc::<Grid>(grid_id)?;
            store
                .query_docs::<Cell>(fields::GRID_ID, grid_id)?
                .into_iter()
                .map(|c| c.bounds_key)
                .collect()
        };

        Ok(compute_virtual_grid(viewport, cell_size_km)
            .into_iter()
            .filter(|v| !taken.contains(&v.bounds_key))
            .collect())
    }

    /// Materializes a virtual tile as a depth-0 `unsearched` cell.
    pub fn activate(
        &self,
        grid_id: &str,
        bounds: LatLngBounds,
        now_ms: u64,
    ) -> Result<Cell, DiscoveryError> {
        if bounds.is_degenerate() {
            return Err(DiscoveryError::InvalidInput(
                "cell bounds have no area".to_string(),
            ));
        }
        let mut store = self.store.lock();
        let grid: Grid = store.require_doc(grid_id)?;
        let key = bounds.key();
        if self.key_taken(&*store, grid_id, &key)? {
            return Err(DiscoveryError::InvalidTransition(format!(
                "a cell with bounds {key} already exists in grid {grid_id}"
            )));
        }

        let cell = Cell::new(new_id(), grid_id, bounds, 0, None, now_ms);
        let mut counters = GridCounters::of(&grid);
        counters.add_leaf(cell.status);

        let mut batch = WriteBatch::new();
        batch.insert(&cell)?;
        batch.patch::<Grid>(grid_id, counters.patch(now_ms))?;
        store.apply(batch)?;

        info!(grid_id, cell_id = %cell.id, bounds_key = %cell.bounds_key, "cell activated");
        Ok(cell)
    }

    fn key_taken(&self, store: &S, grid_id: &str, key: &str) -> Result<bool, DiscoveryError> {
        Ok(store
            .query_docs::<Cell>(fields::BOUNDS_KEY, key)?
            .iter()
            .any(|c| c.grid_id == grid_id))
    }

    /// Moves a leaf to `searching`. A cell already `searching` with no round in
    /// flight (left stuck by an upstream failure) may be searched again.
    pub fn begin_search(&self, cell_id: &str, now_ms: u64) -> Result<SearchTicket, DiscoveryError> {
        let guard = self.claim(cell_id)?;
        let mut store = self.store.lock();
        let cell: Cell = store.require_doc(cell_id)?;
        if !cell.is_leaf() {
            return Err(DiscoveryError::InvalidTransition(format!(
                "cell {cell_id} was subdivided; search its children"
            )));
        }
        let grid: Grid = store.require_doc(&cell.grid_id)?;
        if grid.queries.is_empty() {
            return Err(DiscoveryError::InvalidInput(format!(
                "grid {} has no search queries",
                grid.id
            )));
        }

        let mut counters = GridCounters::of(&grid);
        counters.set_status(cell.status, CellStatus::Searching);
        let mut batch = WriteBatch::new();
        batch.patch::<Cell>(cell_id, json!({ "status": CellStatus::Searching }))?;
        batch.patch::<Grid>(&grid.id, counters.patch(now_ms))?;
        store.apply(batch)?;

        debug!(cell_id, grid_id = %grid.id, from = %cell.status, "cell searching");
        let mut cell = cell;
        cell.status = CellStatus::Searching;
        Ok(SearchTicket {
            cell,
            queries: grid.queries,
            _guard: guard,
        })
    }

    fn claim(&self, cell_id: &str) -> Result<FlightGuard, DiscoveryError> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(cell_id.to_string()) {
            return Err(DiscoveryError::InvalidTransition(format!(
                "cell {cell_id} already has a search in flight"
            )));
        }
        Ok(FlightGuard {
            cell_id: cell_id.to_string(),
            in_flight: self.in_flight.clone(),
        })
    }

    /// Records a finished round: dedups and inserts new leads, sets the cell's
    /// final status and bumps the grid counters, all in one batch.
    pub fn complete_search(
        &self,
        cell_id: &str,
        outcome: RoundOutcome,
        now_ms: u64,
    ) -> Result<SearchReport, DiscoveryError> {
        let mut store = self.store.lock();
        let cell: Cell = store.require_doc(cell_id)?;
        if !cell.is_leaf() || cell.status != CellStatus::Searching {
            return Err(DiscoveryError::InvalidTransition(format!(
                "cell {cell_id} is {} and not awaiting results",
                if cell.is_leaf() { cell.status.as_str() } else { "retired" }
            )));
        }
        let grid: Grid = store.require_doc(&cell.grid_id)?;

        let saturated_queries: Vec<String> = outcome
            .query_counts
            .iter()
            .filter(|q| self.config.is_saturated(q.count))
            .map(|q| q.query.clone())
            .collect();
        let status = if saturated_queries.is_empty() {
            CellStatus::Searched
        } else {
            CellStatus::Saturated
        };

        let mut batch = WriteBatch::new();
        let mut round_keys = HashSet::new();
        let mut result_count = 0u32;
        let mut inserted = 0usize;
        let mut duplicates = 0usize;
        for place in outcome.places {
            if !(place.lat.is_finite() && place.lng.is_finite()) {
                debug!(cell_id, name = %place.name, "skipping place without coordinates");
                continue;
            }
            let city = place.city.as_deref().unwrap_or_default();
            let key = dedup_key(&place.name, city);
            if !round_keys.insert(key.clone()) {
                continue;
            }
            result_count += 1;
            if !store.query(catalog::LEADS, fields::DEDUP_KEY, &key)?.is_empty() {
                duplicates += 1;
                continue;
            }
            let lead = Lead {
                id: new_id(),
                grid_id: Some(grid.id.clone()),
                cell_id: Some(cell.id.clone()),
                name: place.name.trim().to_string(),
                address: place.address,
                city: place.city,
                lat: place.lat,
                lng: place.lng,
                place_type: place.place_type,
                external_id: place.external_id,
                dedup_key: key,
                cluster_id: None,
                created_at_ms: now_ms,
                enriched_at_ms: None,
            };
            batch.insert(&lead)?;
            inserted += 1;
        }

        let mut counters = GridCounters::of(&grid);
        counters.set_status(CellStatus::Searching, status);
        counters.total_leads_found += inserted as u64;

        batch.patch::<Cell>(
            cell_id,
            json!({
                "status": status,
                "resultCount": result_count,
                "querySaturation": outcome.query_counts,
                "lastSearchedAtMs": now_ms,
                "leadsFound": cell.leads_found + inserted as u64,
            }),
        )?;
        batch.patch::<Grid>(&grid.id, counters.patch(now_ms))?;
        store.apply(batch)?;

        info!(
            cell_id,
            grid_id = %grid.id,
            %status,
            result_count,
            inserted,
            duplicates,
            "search round recorded"
        );
        Ok(SearchReport {
            cell_id: cell_id.to_string(),
            status,
            result_count,
            inserted,
            duplicates,
            saturated_queries,
        })
    }

    /// Retires a leaf and replaces it with its 4 quadrants at `depth + 1`.
    pub fn subdivide(&self, cell_id: &str, now_ms: u64) -> Result<Vec<Cell>, DiscoveryError> {
        let mut store = self.store.lock();
        let cell: Cell = store.require_doc(cell_id)?;
        if !cell.is_leaf() {
            return Err(DiscoveryError::InvalidTransition(format!(
                "cell {cell_id} is already subdivided"
            )));
        }
        if cell.depth >= self.config.max_depth {
            return Err(DiscoveryError::InvalidTransition(format!(
                "cell {cell_id} is at max depth {}",
                self.config.max_depth
            )));
        }
        if cell.status == CellStatus::Searching {
            return Err(DiscoveryError::InvalidTransition(format!(
                "cell {cell_id} is being searched"
            )));
        }
        let grid: Grid = store.require_doc(&cell.grid_id)?;

        let children: Vec<Cell> = cell
            .bounds
            .quadrants()
            .into_iter()
            .map(|b| {
                Cell::new(
                    new_id(),
                    &cell.grid_id,
                    b,
                    cell.depth + 1,
                    Some(cell.id.clone()),
                    now_ms,
                )
            })
            .collect();
        for child in &children {
            if self.key_taken(&*store, &cell.grid_id, &child.bounds_key)? {
                return Err(DiscoveryError::InvalidTransition(format!(
                    "quadrant {} of cell {cell_id} overlaps an existing cell",
                    child.bounds_key
                )));
            }
        }

        let mut counters = GridCounters::of(&grid);
        counters.remove_leaf(cell.status);
        let mut batch = WriteBatch::new();
        batch.patch::<Cell>(cell_id, json!({ "subdivided": true }))?;
        for child in &children {
            counters.add_leaf(child.status);
            batch.insert(child)?;
        }
        batch.patch::<Grid>(&grid.id, counters.patch(now_ms))?;
        store.apply(batch)?;

        info!(cell_id, grid_id = %grid.id, depth = cell.depth + 1, "cell subdivided");
        Ok(children)
    }

    /// Collapses `cell_id` into its parent: all of the parent's descendants are
    /// deleted, their leads move to the parent, and the parent becomes an
    /// `unsearched` leaf again.
    pub fn undivide(&self, cell_id: &str, now_ms: u64) -> Result<Cell, DiscoveryError> {
        let mut store = self.store.lock();
        let cell: Cell = store.require_doc(cell_id)?;
        let Some(parent_id) = cell.parent_cell_id.clone().filter(|_| cell.depth > 0) else {
            return Err(DiscoveryError::InvalidTransition(format!(
                "cell {cell_id} is a root cell"
            )));
        };
        let parent: Cell = store.require_doc(&parent_id)?;
        let grid: Grid = store.require_doc(&cell.grid_id)?;

        let descendants = descendants_of(&*store, &parent_id)?;
        if let Some(busy) = descendants
            .iter()
            .find(|c| self.in_flight.lock().contains(&c.id))
        {
            return Err(DiscoveryError::InvalidTransition(format!(
                "cell {} is being searched",
                busy.id
            )));
        }

        let mut counters = GridCounters::of(&grid);
        let mut batch = WriteBatch::new();
        let mut folded_leads = 0u64;
        for d in &descendants {
            if d.is_leaf() {
                counters.remove_leaf(d.status);
            }
            folded_leads += d.leads_found;
            for lead in store.query_docs::<Lead>(fields::CELL_ID, &d.id)? {
                batch.patch::<Lead>(&lead.id, json!({ "cellId": parent_id }))?;
            }
            batch.delete::<Cell>(&d.id);
        }
        counters.add_leaf(CellStatus::Unsearched);

        batch.patch::<Cell>(
            &parent_id,
            json!({
                "subdivided": false,
                "status": CellStatus::Unsearched,
                "resultCount": 0,
                "querySaturation": [],
                "lastSearchedAtMs": null,
                "leadsFound": parent.leads_found + folded_leads,
            }),
        )?;
        batch.patch::<Grid>(&grid.id, counters.patch(now_ms))?;
        store.apply(batch)?;

        info!(
            cell_id,
            parent_id = %parent_id,
            removed = descendants.len(),
            "cell undivided"
        );
        Ok(store.require_doc(&parent_id)?)
    }

    /// Aggregates recomputed from the grid's cells.
    pub fn recount_grid(&self, grid_id: &str) -> Result<GridCounters, DiscoveryError> {
        let store = self.store.lock();
        store.require_doc::<Grid>(grid_id)?;
        let cells: Vec<Cell> = store.query_docs(fields::GRID_ID, grid_id)?;
        let mut counters = GridCounters::default();
        for cell in &cells {
            if cell.is_leaf() {
                counters.add_leaf(cell.status);
            }
            counters.total_leads_found += cell.leads_found;
        }
        Ok(counters)
    }
}

fn descendants_of<S: RecordStore + ?Sized>(
    store: &S,
    root_id: &str,
) -> Result<Vec<Cell>, DiscoveryError> {
    let mut out = Vec::new();
    let mut frontier = vec![root_id.to_string()];
    while let Some(id) = frontier.pop() {
        for child in store.query_docs::<Cell>(fields::PARENT_CELL_ID, &id)? {
            frontier.push(child.id.clone());
            out.push(child);
        }
    }
    Ok(out)
}

fn progress_of(grid: &Grid, cells: &[Cell], now_ms: u64) -> GridProgress {
    let mut p = GridProgress {
        total_leads_found: grid.total_leads_found,
        ..GridProgress::default()
    };
    for cell in cells {
        if !cell.is_leaf() {
            p.retired_cells += 1;
            continue;
        }
        p.leaf_cells += 1;
        match cell.status {
            CellStatus::Unsearched => p.unsearched += 1,
            CellStatus::Searching => p.searching += 1,
            CellStatus::Searched => p.searched += 1,
            CellStatus::Saturated => p.saturated += 1,
        }
        match cell.staleness(now_ms) {
            Some(Freshness::Fresh) => p.fresh += 1,
            Some(Freshness::Aging) => p.aging += 1,
            Some(Freshness::Stale) => p.stale += 1,
            None => {}
        }
    }
    if p.leaf_cells > 0 {
        p.percent_complete = f64::from(p.searched + p.saturated) * 100.0 / f64::from(p.leaf_cells);
    }
    p
}
