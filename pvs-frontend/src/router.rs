use axum::routing::get;
use axum::Router;
use pvs_bus::Bus;
use pvs_store::Store;
use tower_http::trace::TraceLayer;

use crate::mjpeg::mjpeg_stream_handler;
use crate::rest::{camera_meta_handler, daily_counters_handler, recent_events_handler};
use crate::sse::event_stream_handler;
use crate::state::AppState;

/// Builds the frontend's axum router (spec.md §1). Authentication, session
/// cookies, and the HTML dashboard templates are explicitly out of scope
/// (spec.md §1); this wires only the core relay/REST surface.
pub fn router<S, B>(state: AppState<S, B>) -> Router
where
    S: Store,
    B: Bus,
{
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/cameras/{camera_id}/stream.mjpeg", get(mjpeg_stream_handler))
        .route("/cameras/{camera_id}/meta", get(camera_meta_handler))
        .route("/cameras/{camera_id}/events", get(recent_events_handler))
        .route(
            "/organizations/{organization_id}/cameras/{camera_id}/stats",
            get(daily_counters_handler),
        )
        .route(
            "/organizations/{organization_id}/events/stream",
            get(event_stream_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
