use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use pvs_bus::{Bus, FrameSubscription};
use pvs_store::Store;
use pvs_types::CameraId;

use crate::error::FrontendError;
use crate::placeholder::placeholder_jpeg;
use crate::state::AppState;

/// `GET /cameras/:camera_id/stream.mjpeg` — relays the bus's
/// `frames/<camera_id>` topic to one browser as a `multipart/x-mixed-replace`
/// MJPEG stream (spec.md §1, §4.4). Registering with the
/// [`pvs_bus::SharedFrameBroadcaster`] rather than subscribing to the bus
/// directly keeps the Redis connection count independent of how many
/// browsers are watching this camera.
pub async fn mjpeg_stream_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Path(camera_id): Path<CameraId>,
) -> Result<Response, FrontendError>
where
    S: Store,
    B: Bus,
{
    let subscription = state.broadcaster.subscribe(camera_id).await?;
    let with_placeholder = frame_or_placeholder_stream(subscription, state.latest_frame_ttl);

    let framed = with_placeholder.map(|frame: Bytes| {
        let mut chunk = Vec::with_capacity(frame.len() + 64);
        chunk.extend_from_slice(
            format!(
                "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
                frame.len()
            )
            .as_bytes(),
        );
        chunk.extend_from_slice(&frame);
        chunk.extend_from_slice(b"\r\n");
        Ok::<_, std::io::Error>(Bytes::from(chunk))
    });

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "multipart/x-mixed-replace; boundary=frame")
        .header(header::CACHE_CONTROL, "no-cache, private")
        .header(header::PRAGMA, "no-cache")
        .body(Body::from_stream(framed))
        .expect("static headers and a streaming body always build a valid response"))
}

/// Forwards every frame the subscription produces, substituting the
/// placeholder frame whenever `ttl` elapses without one (spec.md §7). Once
/// a real frame shows up streaming resumes transparently; the placeholder
/// keeps reappearing on the same cadence for as long as the camera stays
/// quiet.
fn frame_or_placeholder_stream(subscription: FrameSubscription, ttl: Duration) -> impl Stream<Item = Bytes> {
    futures::stream::unfold(subscription, move |mut subscription| async move {
        match tokio::time::timeout(ttl, subscription.next()).await {
            Ok(Some(frame)) => Some((frame, subscription)),
            Ok(None) => None,
            Err(_) => Some((placeholder_jpeg(), subscription)),
        }
    })
}
