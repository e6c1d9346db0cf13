use crate::error::StoreError;
use crate::row::{CameraRow, DailyStatsRow, EventRow};
use crate::Store;
use chrono::{Duration, NaiveDate};
use pvs_types::{Camera, CameraId, DailyCounters, Event, EventId, OrganizationId, RuntimeStatus};
use sqlx::PgPool;

/// `Store` backed by `sqlx::PgPool`, grounded on the `Database`/
/// `Arc<Database>` convention in the `retail-surveillance` example and the
/// row-struct idiom from `EthanFlower1-ONVIF-NVR`.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

impl Store for PostgresStore {
    async fn active_cameras(&self) -> Result<Vec<Camera>, StoreError> {
        let rows: Vec<CameraRow> = sqlx::query_as(
            r#"
            SELECT
                id, organization_id, name, zone,
                source_kind::text AS source_kind,
                rtsp_url, credentials_encrypted, placeholder_video, use_placeholder,
                inference_width, inference_height, target_fps,
                detection_mode::text AS detection_mode,
                zone_polygon, confidence_threshold, is_active, inference_enabled,
                status::text AS status, last_error
            FROM cameras
            WHERE is_active = true
            ORDER BY organization_id, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                tracing::debug!(status = %row.status, last_error = ?row.last_error, "loaded camera row");
                row.into_camera()
            })
            .collect()
    }

    async fn camera_by_id(&self, camera_id: CameraId) -> Result<Option<Camera>, StoreError> {
        let row: Option<CameraRow> = sqlx::query_as(
            r#"
            SELECT
                id, organization_id, name, zone,
                source_kind::text AS source_kind,
                rtsp_url, credentials_encrypted, placeholder_video, use_placeholder,
                inference_width, inference_height, target_fps,
                detection_mode::text AS detection_mode,
                zone_polygon, confidence_threshold, is_active, inference_enabled,
                status::text AS status, last_error
            FROM cameras
            WHERE id = $1
            "#,
        )
        .bind(camera_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CameraRow::into_camera).transpose()
    }

    async fn update_camera_status(
        &self,
        camera_id: CameraId,
        status: RuntimeStatus,
        last_error: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE cameras
            SET status = $1::camera_status, last_error = $2, last_seen = now(), updated_at = now()
            WHERE id = $3
            "#,
        )
        .bind(status.as_store_str())
        .bind(last_error)
        .bind(camera_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        let event_type = event.event_type.as_db_str();
        let violation_type = event.violation_type.map(|v| v.as_db_str());
        let severity = event.severity.as_db_str();

        sqlx::query(
            r#"
            INSERT INTO events (
                id, organization_id, camera_id, event_type, violation_type, severity,
                confidence, bbox_x1, bbox_y1, bbox_x2, bbox_y2, thumbnail_path,
                acknowledged, acknowledged_by, acknowledged_at, created_at
            ) VALUES (
                $1, $2, $3, $4::event_kind, $5::violation_kind, $6::severity,
                $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16
            )
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.organization_id.as_uuid())
        .bind(event.camera_id.as_uuid())
        .bind(event_type)
        .bind(violation_type)
        .bind(severity)
        .bind(event.confidence)
        .bind(event.bbox.map(|b| b.x1 as i32))
        .bind(event.bbox.map(|b| b.y1 as i32))
        .bind(event.bbox.map(|b| b.x2 as i32))
        .bind(event.bbox.map(|b| b.y2 as i32))
        .bind(&event.thumbnail_path)
        .bind(event.acknowledged)
        .bind(event.acknowledged_by.map(|u| u.as_uuid()))
        .bind(event.acknowledged_at)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn accumulate_daily_counters(
        &self,
        organization_id: OrganizationId,
        camera_id: CameraId,
        date: NaiveDate,
        counters: &DailyCounters,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO daily_stats (
                id, organization_id, camera_id, date,
                total_violations, no_hardhat_count, no_vest_count, zone_breach_count,
                frames_processed
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (organization_id, camera_id, date) DO UPDATE SET
                total_violations = daily_stats.total_violations + excluded.total_violations,
                no_hardhat_count = daily_stats.no_hardhat_count + excluded.no_hardhat_count,
                no_vest_count = daily_stats.no_vest_count + excluded.no_vest_count,
                zone_breach_count = daily_stats.zone_breach_count + excluded.zone_breach_count,
                frames_processed = daily_stats.frames_processed + excluded.frames_processed,
                updated_at = now()
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(organization_id.as_uuid())
        .bind(camera_id.as_uuid())
        .bind(date)
        .bind(counters.total_violations as i32)
        .bind(counters.no_hardhat_count as i32)
        .bind(counters.no_vest_count as i32)
        .bind(counters.zone_breach_count as i32)
        .bind(counters.frames_processed as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_event_tracking(
        &self,
        camera_id: CameraId,
        violation_key: &str,
        event_id: EventId,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO event_tracking (id, camera_id, violation_key, first_seen, last_seen, event_id)
            VALUES ($1, $2, $3, now(), now(), $4)
            ON CONFLICT (camera_id, violation_key) DO UPDATE SET
                last_seen = now(),
                event_id = excluded.event_id
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(camera_id.as_uuid())
        .bind(violation_key)
        .bind(event_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn prune_event_tracking(&self, max_age: Duration) -> Result<u64, StoreError> {
        let cutoff = chrono::Utc::now() - max_age;
        let result = sqlx::query("DELETE FROM event_tracking WHERE last_seen < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn recent_events(&self, camera_id: CameraId, limit: i64) -> Result<Vec<Event>, StoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT
                id, organization_id, camera_id,
                event_type::text AS event_type,
                violation_type::text AS violation_type,
                severity::text AS severity,
                confidence, bbox_x1, bbox_y1, bbox_x2, bbox_y2, thumbnail_path,
                acknowledged, acknowledged_by, acknowledged_at, created_at
            FROM events
            WHERE camera_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(camera_id.as_uuid())
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    async fn daily_counters(
        &self,
        organization_id: OrganizationId,
        camera_id: CameraId,
        date: NaiveDate,
    ) -> Result<DailyCounters, StoreError> {
        let row: Option<DailyStatsRow> = sqlx::query_as(
            r#"
            SELECT total_violations, no_hardhat_count, no_vest_count, zone_breach_count, frames_processed
            FROM daily_stats
            WHERE organization_id = $1 AND camera_id = $2 AND date = $3
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(camera_id.as_uuid())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DailyStatsRow::into_counters).unwrap_or_default())
    }
}
