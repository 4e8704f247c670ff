use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use catalog::{Cell, Cluster, Grid, RecordStore};
use compute::{
    ComputeError, DbscanParams, DensityCluster, DensityWriteBack, PolygonAssignment,
    apply_density_clusters, assign_polygon_cluster, density_clusters, list_clusters,
};
use discovery::{
    BulkSearchReport, CellAction, CellManager, DEFAULT_MECHANISM, DiscoveryError, EntitySource,
    GridDetail, GridUpdate, NewGrid, PurgeReport, SearchReport, SourceRegistry, search_cell,
    search_cells_sequentially,
};
use foundation::{LatLng, LatLngBounds, VirtualCell, now_ms};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::error;

use crate::config::ServerConfig;

pub type DynStore = Box<dyn RecordStore>;

#[derive(Clone)]
pub struct AppState {
    pub manager: CellManager<DynStore>,
    pub sources: Arc<SourceRegistry>,
    pub config: Arc<ServerConfig>,
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

fn discovery_error(e: DiscoveryError) -> ApiError {
    let status = match &e {
        DiscoveryError::NotFound(_) => StatusCode::NOT_FOUND,
        DiscoveryError::InvalidTransition(_) => StatusCode::CONFLICT,
        DiscoveryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        DiscoveryError::Upstream(_) => StatusCode::BAD_GATEWAY,
        DiscoveryError::Store(_) => {
            error!("record store failure: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

fn compute_error(e: ComputeError) -> ApiError {
    match e {
        ComputeError::InvalidInput(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        ComputeError::Store(e) => {
            error!("record store failure: {e}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/grids", get(list_grids).post(create_grid).delete(purge_all))
        .route(
            "/grids/:id",
            get(get_grid).patch(update_grid).delete(delete_grid),
        )
        .route("/grids/:id/cells", get(list_cells).post(activate_cell))
        .route("/grids/:id/virtual-cells", post(virtual_cells))
        .route("/grids/:id/search-batch", post(search_batch))
        .route("/cells/:id/actions", get(cell_actions))
        .route("/cells/:id/search", post(search))
        .route("/cells/:id/subdivide", post(subdivide))
        .route("/cells/:id/undivide", post(undivide))
        .route("/clusters", get(get_clusters))
        .route("/clusters/density", post(run_density))
        .route("/clusters/polygon", post(create_polygon_cluster))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// ---- grids ----

async fn list_grids(State(state): State<AppState>) -> ApiResult<Vec<Grid>> {
    state.manager.list_grids().map(Json).map_err(discovery_error)
}

async fn create_grid(
    State(state): State<AppState>,
    Json(new): Json<NewGrid>,
) -> Result<(StatusCode, Json<Grid>), ApiError> {
    let grid = state
        .manager
        .create_grid(new, now_ms())
        .map_err(discovery_error)?;
    Ok((StatusCode::CREATED, Json(grid)))
}

async fn get_grid(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<GridDetail> {
    state
        .manager
        .grid_detail(&id, now_ms())
        .map(Json)
        .map_err(discovery_error)
}

async fn update_grid(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(update): Json<GridUpdate>,
) -> ApiResult<Grid> {
    state
        .manager
        .update_grid(&id, update, now_ms())
        .map(Json)
        .map_err(discovery_error)
}

async fn delete_grid(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<PurgeReport> {
    state.manager.delete_grid(&id).map(Json).map_err(discovery_error)
}

async fn purge_all(State(state): State<AppState>) -> ApiResult<PurgeReport> {
    state.manager.purge_all().map(Json).map_err(discovery_error)
}

// ---- cells ----

async fn list_cells(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Vec<Cell>> {
    state.manager.list_cells(&id).map(Json).map_err(discovery_error)
}

#[derive(Debug, Deserialize)]
struct ActivateRequest {
    bounds: LatLngBounds,
}

async fn activate_cell(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<ActivateRequest>,
) -> Result<(StatusCode, Json<Cell>), ApiError> {
    let cell = state
        .manager
        .activate(&id, req.bounds, now_ms())
        .map_err(discovery_error)?;
    Ok((StatusCode::CREATED, Json(cell)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualCellsRequest {
    viewport: LatLngBounds,
    #[serde(default)]
    cell_size_km: Option<f64>,
}

async fn virtual_cells(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<VirtualCellsRequest>,
) -> ApiResult<Vec<VirtualCell>> {
    let size = req.cell_size_km.unwrap_or(state.config.default_cell_km);
    state
        .manager
        .virtual_cells(&id, req.viewport, size)
        .map(Json)
        .map_err(discovery_error)
}

async fn cell_actions(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Vec<CellAction>> {
    let actions = state.manager.actions(&id).map_err(discovery_error)?;
    // A mechanism without a registered source can't be searched.
    Ok(Json(
        actions
            .into_iter()
            .filter(|action| match action {
                CellAction::Search { mechanism } => state.sources.get(mechanism).is_some(),
                _ => true,
            })
            .collect(),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    mechanism: Option<String>,
}

fn source_for(state: &AppState, mechanism: Option<&str>) -> Result<Arc<dyn EntitySource>, ApiError> {
    let mechanism = mechanism.unwrap_or(DEFAULT_MECHANISM);
    state.sources.get(mechanism).ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("discovery mechanism {mechanism:?} is not configured"),
        )
    })
}

async fn search(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    body: Option<Json<SearchRequest>>,
) -> ApiResult<SearchReport> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let source = source_for(&state, req.mechanism.as_deref())?;
    search_cell(&state.manager, source.as_ref(), &id)
        .await
        .map(Json)
        .map_err(discovery_error)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchBatchRequest {
    cell_ids: Vec<String>,
    #[serde(default)]
    mechanism: Option<String>,
}

async fn search_batch(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<SearchBatchRequest>,
) -> ApiResult<BulkSearchReport> {
    let source = source_for(&state, req.mechanism.as_deref())?;
    // Every id must belong to this grid before anything runs.
    let cells = state.manager.list_cells(&id).map_err(discovery_error)?;
    if let Some(stranger) = req
        .cell_ids
        .iter()
        .find(|cid| !cells.iter().any(|c| &c.id == *cid))
    {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("cell {stranger} is not in grid {id}"),
        ));
    }
    let report = search_cells_sequentially(
        &state.manager,
        source.as_ref(),
        &req.cell_ids,
        state.config.discovery.inter_cell_delay,
    )
    .await;
    Ok(Json(report))
}

async fn subdivide(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Vec<Cell>> {
    state
        .manager
        .subdivide(&id, now_ms())
        .map(Json)
        .map_err(discovery_error)
}

async fn undivide(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Cell> {
    state
        .manager
        .undivide(&id, now_ms())
        .map(Json)
        .map_err(discovery_error)
}

// ---- clusters ----

async fn get_clusters(State(state): State<AppState>) -> ApiResult<Vec<Cluster>> {
    list_clusters(state.manager.store())
        .map(Json)
        .map_err(compute_error)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DensityRequest {
    eps_km: Option<f64>,
    min_points: Option<usize>,
    /// Write `auto-` cluster refs onto leads.
    apply: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DensityResponse {
    clusters: Vec<DensityCluster>,
    #[serde(skip_serializing_if = "Option::is_none")]
    write_back: Option<DensityWriteBack>,
}

async fn run_density(
    State(state): State<AppState>,
    body: Option<Json<DensityRequest>>,
) -> ApiResult<DensityResponse> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let defaults = DbscanParams::default();
    let params = DbscanParams {
        eps_km: req.eps_km.unwrap_or(defaults.eps_km),
        min_points: req.min_points.unwrap_or(defaults.min_points),
    };
    if !(params.eps_km.is_finite() && params.eps_km > 0.0) {
        return Err(api_error(StatusCode::BAD_REQUEST, "epsKm must be positive"));
    }

    let store = state.manager.store();
    let clusters = density_clusters(store, params).map_err(compute_error)?;
    let write_back = if req.apply {
        Some(apply_density_clusters(store, &clusters).map_err(compute_error)?)
    } else {
        None
    };
    Ok(Json(DensityResponse {
        clusters,
        write_back,
    }))
}

#[derive(Debug, Deserialize)]
struct PolygonRequest {
    name: String,
    boundary: Vec<LatLng>,
}

async fn create_polygon_cluster(
    State(state): State<AppState>,
    Json(req): Json<PolygonRequest>,
) -> Result<(StatusCode, Json<PolygonAssignment>), ApiError> {
    let assignment =
        assign_polygon_cluster(state.manager.store(), &req.name, req.boundary, now_ms())
            .map_err(compute_error)?;
    Ok((StatusCode::CREATED, Json(assignment)))
}
