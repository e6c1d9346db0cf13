use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pvs_bus::BusError;
use pvs_store::StoreError;
use thiserror::Error;

/// Maps the core's *store*/*bus* error kinds (spec.md §7) onto HTTP
/// responses for the REST/relay handlers. A camera or organization simply
/// not existing is not an error kind of its own in spec.md; it is
/// represented here as `NotFound` so handlers can return 404 rather than
/// 500 for it.
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl IntoResponse for FrontendError {
    fn into_response(self) -> Response {
        let status = match &self {
            FrontendError::NotFound(_) => StatusCode::NOT_FOUND,
            FrontendError::Store(_) | FrontendError::Bus(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
