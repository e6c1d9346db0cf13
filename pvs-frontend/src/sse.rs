use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use pvs_bus::Bus;
use pvs_store::Store;
use pvs_types::OrganizationId;

use crate::error::FrontendError;
use crate::state::AppState;

/// `GET /organizations/:organization_id/events/stream` — relays the bus's
/// `events/<organization_id>` topic verbatim as server-sent events (spec.md
/// §1, §4.4: "per-organization ... no fan-out batching; each client
/// streams the full event topic for its tenant"). A client disconnect
/// drops this future, which drops the underlying subscription promptly.
pub async fn event_stream_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Path(organization_id): Path<OrganizationId>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, FrontendError>
where
    S: Store,
    B: Bus,
{
    let stream = state.bus.subscribe_events(organization_id).await?;

    let sse_stream = stream.map(|item| {
        let event = match item {
            Ok(payload) => {
                let data = String::from_utf8_lossy(&payload).into_owned();
                SseEvent::default().event("violation").data(data)
            }
            Err(err) => {
                tracing::warn!(%organization_id, %err, "event bus stream error");
                SseEvent::default().event("bus_error").data("event stream interrupted")
            }
        };
        Ok(event)
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}
