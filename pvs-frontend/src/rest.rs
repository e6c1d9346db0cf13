use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use pvs_bus::{Bus, CameraMeta};
use pvs_store::Store;
use pvs_types::{CameraId, DailyCounters, Event, OrganizationId};
use serde::Deserialize;

use crate::error::FrontendError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    limit: Option<i64>,
}

/// `GET /cameras/:camera_id/events` — most recent materialized events for
/// one camera, newest first (spec.md §6.2 `recent_events`).
pub async fn recent_events_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Path(camera_id): Path<CameraId>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, FrontendError>
where
    S: Store,
    B: Bus,
{
    let limit = query.limit.unwrap_or(state.default_event_page_size);
    let events = state.store.recent_events(camera_id, limit).await?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
pub struct DailyStatsQuery {
    date: Option<NaiveDate>,
}

/// `GET /organizations/:organization_id/cameras/:camera_id/stats` — the
/// rolled-up counters for one camera on one day, defaulting to today
/// (spec.md §6.2 `daily_stats`).
pub async fn daily_counters_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Path((organization_id, camera_id)): Path<(OrganizationId, CameraId)>,
    Query(query): Query<DailyStatsQuery>,
) -> Result<Json<DailyCounters>, FrontendError>
where
    S: Store,
    B: Bus,
{
    let date = query.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let counters = state
        .store
        .daily_counters(organization_id, camera_id, date)
        .await?;
    Ok(Json(counters))
}

/// `GET /cameras/:camera_id/meta` — the live `camera_meta/<camera_id>`
/// bus hash (stream FPS, inference FPS, detection count), used by the
/// dashboard to show per-camera health without opening the MJPEG stream
/// (spec.md §4.4).
pub async fn camera_meta_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Path(camera_id): Path<CameraId>,
) -> Result<Json<CameraMeta>, FrontendError>
where
    S: Store,
    B: Bus,
{
    let meta = state
        .bus
        .camera_meta(camera_id)
        .await?
        .ok_or(FrontendError::NotFound("camera_meta"))?;
    Ok(Json(meta))
}
