use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use branchmap_shared::{FilterSelection, apply_filters};
use bytes::Bytes;
use tracing::{error, info};

use crate::config::FILTERED_EXPORT_FILENAME;
use crate::export::{
    ExportError, XLSX_CONTENT_TYPE, filtered_workbook, tagged_filename, tagged_workbook,
};
use crate::routes::ApiError;
use crate::state::AppState;

pub async fn export_filtered(
    State(state): State<AppState>,
    Json(selection): Json<FilterSelection>,
) -> Result<Response, ApiError> {
    let table = state.sites().await?;
    let outcome = apply_filters(&table, &selection, state.settings.policy);
    let rows = outcome.rows.len();
    let bytes = spawn_export(move || filtered_workbook(&table, outcome.records(&table))).await?;

    state.observability.record_export();
    info!(rows, bytes = bytes.len(), "served filtered export");
    Ok(attachment_response(bytes, FILTERED_EXPORT_FILENAME))
}

/// The selection is only used to name the file; rows come from the whole sheet.
pub async fn export_tagged(
    State(state): State<AppState>,
    Json(selection): Json<FilterSelection>,
) -> Result<Response, ApiError> {
    let table = state.sites().await?;
    let (tags, _) = state.color_tags.snapshot().await;
    if tags.is_empty() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "no branch has a color assigned yet",
        ));
    }

    let filename = tagged_filename(&selection.regencies);
    let tagged = tags.len();
    let bytes = spawn_export(move || tagged_workbook(&table, &tags)).await?;

    state.observability.record_export();
    info!(tags = tagged, bytes = bytes.len(), %filename, "served color tag export");
    Ok(attachment_response(bytes, &filename))
}

async fn spawn_export<F>(build: F) -> Result<Vec<u8>, ApiError>
where
    F: FnOnce() -> Result<Vec<u8>, ExportError> + Send + 'static,
{
    match tokio::task::spawn_blocking(build).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => {
            error!(error = %e, "spreadsheet export failed");
            Err(ApiError::internal(e.to_string()))
        }
        Err(e) => {
            error!(error = %e, "spreadsheet export task failed");
            Err(ApiError::internal("spreadsheet export was interrupted"))
        }
    }
}

fn attachment_response(bytes: Vec<u8>, filename: &str) -> Response {
    let mut response = Response::new(Body::from(Bytes::from(bytes)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(XLSX_CONTENT_TYPE),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Ok(disposition) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", header_safe(filename)))
    {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    response
}

fn header_safe(filename: &str) -> String {
    filename
        .chars()
        .map(|ch| {
            if ch.is_ascii_graphic() && ch != '"' && ch != '\\' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
