use std::fmt::Write as _;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use branchmap_shared::{
    ColorTags, DashboardView, FALLBACK_CENTER, FilterPolicy, FilterSelection, LatLng,
    MarkerColor, Measurement, SheetLayout, Shape, measure, render,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::color_store::StoreError;
use crate::routes::ApiError;
use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let observability = state.observability.snapshot();
    let (tags, revision) = state.color_tags.snapshot().await;
    Json(serde_json::json!({
        "status": "ok",
        "layout": state.settings.layout,
        "policy": state.settings.policy,
        "sites_loaded": state.loaded_site_count().is_some(),
        "sites": state.loaded_site_count().unwrap_or(0),
        "load_error": state.load_failure().map(ToString::to_string),
        "color_tags": tags.len(),
        "color_tags_revision": revision,
        "color_tags_persistent": state.color_tags.persistent(),
        "started_at": state.started_at.to_rfc3339(),
        "observability": {
            "view_requests_total": observability.view_requests_total,
            "exports_total": observability.exports_total,
            "color_changes_total": observability.color_changes_total,
            "persist_failures_total": observability.persist_failures_total,
        }
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let site_count = state.loaded_site_count().unwrap_or(0);
    let tag_count = state.color_tags.snapshot().await.0.len();
    let body = render_prometheus_metrics(
        site_count,
        tag_count,
        state.color_tags.persistent(),
        state.observability.snapshot(),
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn render_prometheus_metrics(
    site_count: usize,
    tag_count: usize,
    tags_persistent: bool,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    let mut metric = |name: &str, kind: &str, help: &str, value: u64| {
        let _ = writeln!(body, "# HELP {name} {help}");
        let _ = writeln!(body, "# TYPE {name} {kind}");
        let _ = writeln!(body, "{name} {value}");
    };

    metric(
        "branchmap_sites",
        "gauge",
        "Rows in the loaded site sheet.",
        site_count as u64,
    );
    metric(
        "branchmap_color_tags",
        "gauge",
        "Branches with an explicit marker color.",
        tag_count as u64,
    );
    metric(
        "branchmap_color_tags_persistent",
        "gauge",
        "Whether color tags are written to disk (1 or 0).",
        u64::from(tags_persistent),
    );
    metric(
        "branchmap_view_requests_total",
        "counter",
        "Total dashboard view recomputations.",
        observability.view_requests_total,
    );
    metric(
        "branchmap_exports_total",
        "counter",
        "Total spreadsheet downloads served.",
        observability.exports_total,
    );
    metric(
        "branchmap_color_changes_total",
        "counter",
        "Total assign and reset actions.",
        observability.color_changes_total,
    );
    metric(
        "branchmap_persist_failures_total",
        "counter",
        "Total failures while writing the color tag file.",
        observability.persist_failures_total,
    );

    body
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub name: MarkerColor,
    pub hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub layout: SheetLayout,
    pub policy: FilterPolicy,
    pub palette: Vec<PaletteEntry>,
    pub default_color: MarkerColor,
    pub default_selection: FilterSelection,
    pub fallback_center: LatLng,
    pub color_tags_persistent: bool,
    /// Set when the sheet could not be used; the page shows it and stops.
    pub load_error: Option<String>,
}

pub async fn get_config(State(state): State<AppState>) -> Json<DashboardConfig> {
    let load_error = state.sites().await.err().map(|e| e.to_string());
    let policy = state.settings.policy;
    Json(DashboardConfig {
        layout: state.settings.layout,
        policy,
        palette: MarkerColor::ALL
            .into_iter()
            .map(|color| PaletteEntry {
                name: color,
                hex: color.hex().to_owned(),
            })
            .collect(),
        default_color: MarkerColor::default(),
        default_selection: FilterSelection::defaults(policy),
        fallback_center: FALLBACK_CENTER,
        color_tags_persistent: state.color_tags.persistent(),
        load_error,
    })
}

/// Recomputes options, markers and counts for the posted selection.
pub async fn post_view(
    State(state): State<AppState>,
    Json(selection): Json<FilterSelection>,
) -> Result<Json<DashboardView>, ApiError> {
    state.observability.record_view_request();
    let table = state.sites().await?;
    let (tags, _) = state.color_tags.snapshot().await;
    let view = render(&table, &selection, &tags, state.settings.policy);
    debug!(
        filtered = view.filtered_count,
        markers = view.map.markers.len(),
        "rendered dashboard view"
    );
    Ok(Json(view))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorTagsBody {
    pub revision: u64,
    pub tags: ColorTags,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub branches: Vec<String>,
    pub color: MarkerColor,
}

pub async fn get_colors(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (tags, revision) = state.color_tags.snapshot().await;
    let etag = color_tags_etag(&tags);

    if if_none_match_matches(&headers, &etag) {
        return not_modified_response(&etag);
    }

    let body = ColorTagsBody { revision, tags };
    let mut response = Json(body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(etag_header) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

pub async fn assign_colors(
    State(state): State<AppState>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<ColorTagsBody>, ApiError> {
    let branches: Vec<String> = request
        .branches
        .into_iter()
        .map(|branch| branch.trim().to_owned())
        .filter(|branch| !branch.is_empty())
        .collect();
    if branches.is_empty() {
        return Err(ApiError::bad_request("select at least one branch to color"));
    }

    state.observability.record_color_change();
    let result = state.color_tags.assign(branches, request.color).await;
    tags_response(&state, result)
}

pub async fn reset_colors(State(state): State<AppState>) -> Result<Json<ColorTagsBody>, ApiError> {
    state.observability.record_color_change();
    let result = state.color_tags.reset().await;
    tags_response(&state, result)
}

fn tags_response(
    state: &AppState,
    result: Result<(ColorTags, u64), StoreError>,
) -> Result<Json<ColorTagsBody>, ApiError> {
    match result {
        Ok((tags, revision)) => Ok(Json(ColorTagsBody { revision, tags })),
        Err(e) => {
            state.observability.record_persist_failure();
            warn!(error = %e, "color tags changed but could not be saved");
            Err(ApiError::internal(e.to_string()))
        }
    }
}

pub async fn post_measure(Json(shape): Json<Shape>) -> Result<Json<Measurement>, ApiError> {
    measure(&shape)
        .map(Json)
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Checksum of the mapping; the revision counter restarts with the process.
fn color_tags_etag(tags: &ColorTags) -> String {
    let encoded = serde_json::to_vec(tags).unwrap_or_default();
    format!("\"color-tags-{:08x}\"", crc32fast::hash(&encoded))
}

fn not_modified_response(etag: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_MODIFIED;
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(etag_header) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}
