//! Postgres-backed persistence for cameras, materialized events, and daily
//! rollups (spec.md §6.2). Mirrors the original SQLAlchemy models in
//! `app/shared/models.py`, migrated via plain `.sql` files under
//! `migrations/` instead of alembic.

mod error;
mod postgres;
mod row;

pub use error::StoreError;
pub use postgres::PostgresStore;

use pvs_types::{Camera, CameraId, Event, OrganizationId};

/// Durable camera/event state. Implemented generically (as a trait bound,
/// not `dyn Store`) since the worker wires up exactly one concrete
/// backend, matching the approach taken for `pvs_bus::Bus`.
pub trait Store: Send + Sync + 'static {
    /// All cameras the supervisor should be running, across every
    /// organization (spec.md §4.5 step 1: "re-read the authoritative
    /// camera list").
    async fn active_cameras(&self) -> Result<Vec<Camera>, StoreError>;

    async fn camera_by_id(&self, camera_id: CameraId) -> Result<Option<Camera>, StoreError>;

    /// Best-effort status/last-error update; failures here must never stop
    /// the worker's streaming loop (spec.md §7 "store" error kind).
    async fn update_camera_status(
        &self,
        camera_id: CameraId,
        status: pvs_types::RuntimeStatus,
        last_error: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Inserts a materialized event. Callers must complete this before
    /// registering the event with the deduplicator or publishing to the
    /// bus (spec.md §4.3 durability ordering).
    async fn insert_event(&self, event: &Event) -> Result<(), StoreError>;

    /// Upserts the day's rollup counters for `camera_id`, incrementing by
    /// the deltas carried in `counters` rather than overwriting.
    async fn accumulate_daily_counters(
        &self,
        organization_id: OrganizationId,
        camera_id: CameraId,
        date: chrono::NaiveDate,
        counters: &pvs_types::DailyCounters,
    ) -> Result<(), StoreError>;

    /// Best-effort reseed hook for the in-memory deduplicator (spec.md §9
    /// Open Question (b)): not read back on the hot path, only upserted so
    /// a restarted worker has a starting point.
    async fn upsert_event_tracking(
        &self,
        camera_id: CameraId,
        violation_key: &str,
        event_id: pvs_types::EventId,
    ) -> Result<(), StoreError>;

    /// Deletes tracking rows whose `last_seen` is older than `max_age`,
    /// mirroring the in-memory `Deduplicator::cleanup_stale` contract.
    async fn prune_event_tracking(&self, max_age: chrono::Duration) -> Result<u64, StoreError>;

    /// Most recent events for a camera, newest first. Backs the frontend's
    /// REST reads (spec.md §1: "Serves the dashboard, REST reads").
    async fn recent_events(
        &self,
        camera_id: CameraId,
        limit: i64,
    ) -> Result<Vec<Event>, StoreError>;

    async fn daily_counters(
        &self,
        organization_id: OrganizationId,
        camera_id: CameraId,
        date: chrono::NaiveDate,
    ) -> Result<pvs_types::DailyCounters, StoreError>;
}
