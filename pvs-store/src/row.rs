//! Row structs mirroring the `cameras`/`events`/`daily_stats`/
//! `event_tracking` tables, mapped with `sqlx::FromRow`. Enum columns are
//! fetched cast to `text` (`status::text`) and parsed here rather than via
//! a custom `sqlx::Type`, the same indirection the original's SQLAlchemy
//! models hide behind `Enum` columns.
//!
//! Grounded on the `#[derive(sqlx::FromRow)]` row-struct idiom from
//! `EthanFlower1-ONVIF-NVR`'s `db/models/camera_models.rs`.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use pvs_types::{
    Camera, CameraId, DetectionMode, Event, EventId, EventKind, OrganizationId, Severity,
    SourceKind, UserId, ViolationKind, ZonePolygon, BBox,
};
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct CameraRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub zone: Option<String>,
    pub source_kind: String,
    pub rtsp_url: Option<String>,
    pub credentials_encrypted: Option<String>,
    pub placeholder_video: Option<String>,
    pub use_placeholder: bool,
    pub inference_width: i32,
    pub inference_height: i32,
    pub target_fps: f32,
    pub detection_mode: String,
    pub zone_polygon: Option<serde_json::Value>,
    pub confidence_threshold: f32,
    pub is_active: bool,
    pub inference_enabled: bool,
    pub status: String,
    pub last_error: Option<String>,
}

impl CameraRow {
    pub fn into_camera(self) -> Result<Camera, StoreError> {
        let source_kind = parse_source_kind(&self.source_kind)?;
        let detection_mode = parse_detection_mode(&self.detection_mode)?;
        let zone_polygon = self
            .zone_polygon
            .map(|v| serde_json::from_value::<ZonePolygon>(v))
            .transpose()
            .map_err(|e| StoreError::MalformedColumn {
                column: "zone_polygon",
                value: e.to_string(),
            })?;

        Ok(Camera {
            id: CameraId::from(self.id),
            organization_id: OrganizationId::from(self.organization_id),
            name: self.name,
            zone: self.zone,
            source_kind,
            rtsp_url: self.rtsp_url,
            credentials_encrypted: self.credentials_encrypted,
            placeholder_video: self.placeholder_video,
            use_placeholder: self.use_placeholder,
            inference_width: self.inference_width.max(0) as u32,
            inference_height: self.inference_height.max(0) as u32,
            target_fps: self.target_fps,
            detection_mode,
            zone_polygon,
            confidence_threshold: self.confidence_threshold,
            is_active: self.is_active,
            inference_enabled: self.inference_enabled,
        })
    }
}

fn parse_source_kind(s: &str) -> Result<SourceKind, StoreError> {
    match s {
        "rtsp" => Ok(SourceKind::Rtsp),
        "file" => Ok(SourceKind::File),
        "none" => Ok(SourceKind::None),
        other => Err(StoreError::MalformedColumn {
            column: "source_kind",
            value: other.to_string(),
        }),
    }
}

fn parse_detection_mode(s: &str) -> Result<DetectionMode, StoreError> {
    match s {
        "ppe" => Ok(DetectionMode::Ppe),
        "zone" => Ok(DetectionMode::Zone),
        other => Err(StoreError::MalformedColumn {
            column: "detection_mode",
            value: other.to_string(),
        }),
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub camera_id: Uuid,
    pub event_type: String,
    pub violation_type: Option<String>,
    pub severity: String,
    pub confidence: f32,
    pub bbox_x1: Option<i32>,
    pub bbox_y1: Option<i32>,
    pub bbox_x2: Option<i32>,
    pub bbox_y2: Option<i32>,
    pub thumbnail_path: Option<String>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EventRow {
    pub fn into_event(self) -> Result<Event, StoreError> {
        let event_type = parse_event_kind(&self.event_type)?;
        let violation_type = self
            .violation_type
            .as_deref()
            .map(parse_violation_kind)
            .transpose()?;
        let severity = parse_severity(&self.severity)?;
        let bbox = match (self.bbox_x1, self.bbox_y1, self.bbox_x2, self.bbox_y2) {
            (Some(x1), Some(y1), Some(x2), Some(y2)) => Some(BBox { x1, y1, x2, y2 }),
            _ => None,
        };

        Ok(Event {
            id: EventId::from(self.id),
            organization_id: OrganizationId::from(self.organization_id),
            camera_id: CameraId::from(self.camera_id),
            event_type,
            violation_type,
            severity,
            confidence: self.confidence,
            bbox,
            thumbnail_path: self.thumbnail_path,
            acknowledged: self.acknowledged,
            acknowledged_by: self.acknowledged_by.map(UserId::from),
            acknowledged_at: self.acknowledged_at,
            created_at: self.created_at,
        })
    }
}

fn parse_event_kind(s: &str) -> Result<EventKind, StoreError> {
    match s {
        "ppe_violation" => Ok(EventKind::PpeViolation),
        "zone_violation" => Ok(EventKind::ZoneViolation),
        "system_alert" => Ok(EventKind::SystemAlert),
        other => Err(StoreError::MalformedColumn {
            column: "event_type",
            value: other.to_string(),
        }),
    }
}

fn parse_violation_kind(s: &str) -> Result<ViolationKind, StoreError> {
    match s {
        "no_hardhat" => Ok(ViolationKind::NoHardhat),
        "no_vest" => Ok(ViolationKind::NoVest),
        "no_mask" => Ok(ViolationKind::NoMask),
        "zone_breach" => Ok(ViolationKind::ZoneBreach),
        "other" => Ok(ViolationKind::Other),
        other => Err(StoreError::MalformedColumn {
            column: "violation_type",
            value: other.to_string(),
        }),
    }
}

fn parse_severity(s: &str) -> Result<Severity, StoreError> {
    match s {
        "low" => Ok(Severity::Low),
        "medium" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        "critical" => Ok(Severity::Critical),
        other => Err(StoreError::MalformedColumn {
            column: "severity",
            value: other.to_string(),
        }),
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct DailyStatsRow {
    pub total_violations: i32,
    pub no_hardhat_count: i32,
    pub no_vest_count: i32,
    pub zone_breach_count: i32,
    pub frames_processed: i32,
}

impl DailyStatsRow {
    pub fn into_counters(self) -> pvs_types::DailyCounters {
        pvs_types::DailyCounters {
            total_violations: self.total_violations.max(0) as u64,
            no_hardhat_count: self.no_hardhat_count.max(0) as u64,
            no_vest_count: self.no_vest_count.max(0) as u64,
            zone_breach_count: self.zone_breach_count.max(0) as u64,
            frames_processed: self.frames_processed.max(0) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_camera_row() -> CameraRow {
        CameraRow {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Dock 3".into(),
            zone: Some("loading-dock".into()),
            source_kind: "rtsp".into(),
            rtsp_url: Some("rtsp://cam.local/stream".into()),
            credentials_encrypted: None,
            placeholder_video: None,
            use_placeholder: false,
            inference_width: 320,
            inference_height: 320,
            target_fps: 0.5,
            detection_mode: "zone".into(),
            zone_polygon: Some(serde_json::json!([[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]])),
            confidence_threshold: 0.25,
            is_active: true,
            inference_enabled: true,
            status: "online".into(),
            last_error: None,
        }
    }

    #[test]
    fn camera_row_parses_enums_and_polygon() {
        let camera = sample_camera_row().into_camera().unwrap();
        assert_eq!(camera.source_kind, SourceKind::Rtsp);
        assert_eq!(camera.detection_mode, DetectionMode::Zone);
        assert_eq!(camera.zone_polygon.unwrap().0.len(), 3);
    }

    #[test]
    fn camera_row_rejects_unknown_source_kind() {
        let mut row = sample_camera_row();
        row.source_kind = "webrtc".into();
        assert!(row.into_camera().is_err());
    }

    #[test]
    fn event_row_round_trips_severity_and_bbox() {
        let row = EventRow {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            camera_id: Uuid::new_v4(),
            event_type: "ppe_violation".into(),
            violation_type: Some("no_hardhat".into()),
            severity: "critical".into(),
            confidence: 0.92,
            bbox_x1: Some(10),
            bbox_y1: Some(20),
            bbox_x2: Some(30),
            bbox_y2: Some(40),
            thumbnail_path: None,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            created_at: Utc::now(),
        };
        let event = row.into_event().unwrap();
        assert_eq!(event.violation_type, Some(ViolationKind::NoHardhat));
        assert_eq!(event.severity, Severity::Critical);
        let bbox = event.bbox.unwrap();
        assert_eq!((bbox.x1, bbox.y1, bbox.x2, bbox.y2), (10, 20, 30, 40));
    }
}
