//! Shared data model and configuration for the video-analytics worker and
//! frontend crates: camera configuration, detections, events, and the
//! process-wide `WorkerConfig`.

pub mod camera;
pub mod config;
pub mod detection;
pub mod event;
pub mod ids;

pub use camera::{Camera, CameraRuntime, DetectionMode, Ema, RuntimeStatus, SourceKind, ZonePolygon};
pub use config::{backoff_delay, WorkerConfig};
pub use detection::{BBox, Detection, DetectionClass, ZONE_BREACH_CLASS_ID};
pub use event::{severity_for, DailyCounters, Event, EventKind, Severity, ViolationKind};
pub use ids::{CameraId, EventId, OrganizationId, UserId};
