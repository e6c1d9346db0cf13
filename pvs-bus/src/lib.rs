//! The frame/event pub-sub fabric (spec.md §4.4, §6.4) and the
//! frontend-side [`SharedFrameBroadcaster`] fan-out.
//!
//! Backed by Redis (async, multiplexed connection), matching the wire
//! shape of the original implementation's `app/shared/redis/pubsub.py`:
//! `frames:<id>` channels, a `latest_frame:<id>` TTL'd string, a
//! `camera_meta:<id>` TTL'd hash, and `events:<org>` channels.

mod broadcaster;
mod error;
mod meta;
mod redis_bus;
mod retry;
mod topics;

pub use broadcaster::{FrameSubscription, SharedFrameBroadcaster};
pub use error::BusError;
pub use meta::CameraMeta;
pub use redis_bus::RedisBus;
pub use retry::with_one_retry;
pub use topics::{camera_meta_topic, events_topic, frames_topic, latest_frame_topic};

use bytes::Bytes;
use futures::stream::Stream;
use pvs_types::{CameraId, OrganizationId};
use std::pin::Pin;
use std::time::Duration;

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Bytes, BusError>> + Send>>;
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Bytes, BusError>> + Send>>;

/// The four logical bus surfaces of spec.md §4.4/§6.4. Implemented
/// generically (not as a trait object) since the worker and frontend each
/// wire up exactly one concrete transport; callers depend on `Bus` as a
/// trait bound, not `dyn Bus`.
pub trait Bus: Send + Sync + 'static {
    /// Publishes a JPEG frame to `frames/<camera_id>` and writes it to the
    /// `latest_frame/<camera_id>` register with the given TTL (spec.md
    /// §4.1 step 6, testable property 4: every frame publish is
    /// accompanied by a latest-frame write).
    async fn publish_frame(
        &self,
        camera_id: CameraId,
        frame: Bytes,
        latest_frame_ttl: Duration,
    ) -> Result<(), BusError>;

    /// Reads the current `latest_frame/<camera_id>` register, if still
    /// within its TTL.
    async fn latest_frame(&self, camera_id: CameraId) -> Result<Option<Bytes>, BusError>;

    /// Subscribes to `frames/<camera_id>`.
    async fn subscribe_frames(&self, camera_id: CameraId) -> Result<FrameStream, BusError>;

    /// Writes `camera_meta/<camera_id>` with the given TTL (spec.md §4.1
    /// step 7).
    async fn set_camera_meta(
        &self,
        camera_id: CameraId,
        meta: CameraMeta,
        ttl: Duration,
    ) -> Result<(), BusError>;

    /// Reads `camera_meta/<camera_id>`.
    async fn camera_meta(&self, camera_id: CameraId) -> Result<Option<CameraMeta>, BusError>;

    /// Publishes a JSON event payload to `events/<organization_id>`
    /// (spec.md §4.3 step 3, §6.4).
    async fn publish_event(
        &self,
        organization_id: OrganizationId,
        payload: Bytes,
    ) -> Result<(), BusError>;

    /// Subscribes to `events/<organization_id>`.
    async fn subscribe_events(
        &self,
        organization_id: OrganizationId,
    ) -> Result<EventStream, BusError>;

    /// Number of current subscribers to a topic, 1s-cached (SPEC_FULL.md
    /// §4.4 supplement, mirroring `FramePublisher.get_subscriber_count`).
    /// Used by `CameraWorker` to skip the publish step (not the
    /// annotate/encode step) when nobody is watching.
    async fn subscriber_count(&self, topic: &str) -> Result<usize, BusError>;
}
