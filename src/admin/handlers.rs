use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};

use crate::http::server::AppState;
use crate::namespace::DirectoryStatus;

/// `GET /status`: the directory as seen from the request's host.
pub async fn get_status(State(state): State<AppState>, headers: HeaderMap) -> Json<DirectoryStatus> {
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    Json(state.directory.status_for_host(host))
}
