//! Program fetch route.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use std::sync::Arc;
use tracing::info;

use crate::api::server::AppState;

/// GET /{port}/{address}/ returns the device's current program as JSON.
///
/// Always 200: fetch failures are reported in the body's `valid` and
/// `status` fields.
pub async fn get_program(
    State(state): State<Arc<AppState>>,
    Path((port, address)): Path<(u64, String)>,
) -> impl IntoResponse {
    info!(port, address = %address, "Received program request");
    let body = state.gateway.handle(port, &address).await;
    ([(header::CONTENT_TYPE, "application/json")], body)
}
