use crate::detection::Detection;
use crate::ids::{CameraId, OrganizationId};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rtsp,
    File,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    Ppe,
    Zone,
}

/// An ordered polygon vertex list, in inference-frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ZonePolygon(pub Vec<(f32, f32)>);

impl ZonePolygon {
    /// Point-in-polygon test, closed on the boundary (spec.md §8: "Centroid
    /// exactly on polygon edge counts as inside").
    pub fn contains(&self, point: (f32, f32)) -> bool {
        let verts = &self.0;
        if verts.len() < 3 {
            return false;
        }
        let (px, py) = point;
        let mut inside = false;
        let n = verts.len();
        for i in 0..n {
            let (x1, y1) = verts[i];
            let (x2, y2) = verts[(i + 1) % n];

            if on_segment((x1, y1), (x2, y2), (px, py)) {
                return true;
            }

            let crosses = (y1 > py) != (y2 > py);
            if crosses {
                let x_at_y = x1 + (py - y1) * (x2 - x1) / (y2 - y1);
                if px < x_at_y {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

fn on_segment(a: (f32, f32), b: (f32, f32), p: (f32, f32)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    if cross.abs() > 1e-4 {
        return false;
    }
    let dot = (p.0 - a.0) * (b.0 - a.0) + (p.1 - a.1) * (b.1 - a.1);
    if dot < 0.0 {
        return false;
    }
    let len_sq = (b.0 - a.0).powi(2) + (b.1 - a.1).powi(2);
    dot <= len_sq
}

/// The tenant-authored description of a camera source (spec.md §3).
/// Created and mutated by the control plane; the core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub id: CameraId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub zone: Option<String>,
    pub source_kind: SourceKind,
    pub rtsp_url: Option<String>,
    pub credentials_encrypted: Option<String>,
    pub placeholder_video: Option<String>,
    pub use_placeholder: bool,
    pub inference_width: u32,
    pub inference_height: u32,
    pub target_fps: f32,
    pub detection_mode: DetectionMode,
    pub zone_polygon: Option<ZonePolygon>,
    pub confidence_threshold: f32,
    pub is_active: bool,
    pub inference_enabled: bool,
}

impl Camera {
    /// Clamps configured inference dimensions to the hard upper bound from
    /// spec.md §9 Open Question (a): 400x400, defaulting to 320 when unset.
    pub fn clamped_inference_size(&self, cap_px: u32) -> (u32, u32) {
        (
            self.inference_width.clamp(1, cap_px),
            self.inference_height.clamp(1, cap_px),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeStatus {
    Idle,
    Connecting,
    Streaming,
    Error,
    Stopped,
    Offline,
}

impl RuntimeStatus {
    pub fn as_store_str(self) -> &'static str {
        match self {
            Self::Idle => "offline",
            Self::Connecting => "connecting",
            Self::Streaming => "online",
            Self::Error => "error",
            Self::Stopped => "offline",
            Self::Offline => "offline",
        }
    }
}

/// Exponential moving average, alpha=0.2 by default, used for the stream
/// and inference FPS display counters (spec.md GLOSSARY "EMA").
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
    value: Option<f32>,
}

impl Ema {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, value: None }
    }

    pub fn observe(&mut self, sample: f32) -> f32 {
        let next = match self.value {
            None => sample,
            Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        next
    }

    pub fn get(&self) -> f32 {
        self.value.unwrap_or(0.0)
    }
}

impl Default for Ema {
    fn default() -> Self {
        Self::new(0.2)
    }
}

/// Not persisted. Owned exclusively by the CameraSupervisor (spec.md §3).
pub struct CameraRuntime {
    pub camera: Camera,
    pub status: RuntimeStatus,
    pub last_error: Option<String>,
    pub frames_processed: u64,
    pub last_frame_at: Option<Instant>,
    pub last_inference_at: Option<Instant>,
    pub last_detections: Vec<Detection>,
    pub stream_fps_ema: Ema,
    pub inference_fps_ema: Ema,
    pub inference_in_flight: bool,
    /// Distinct from the backoff `attempt` counter (see §4.1.3): reset on
    /// every successful read, incremented on every transient-source error,
    /// surfaced to the Store so flapping cameras are visible even when
    /// backoff keeps re-succeeding within the retry budget.
    pub consecutive_failures: u32,
    /// Last time this camera actually wrote to the bus (SPEC_FULL.md §4.4
    /// supplement): used to keep `latest_frame` from going stale when
    /// `publish()` is skipping the zero-subscriber case.
    pub last_bus_publish_at: Option<Instant>,
}

impl CameraRuntime {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            status: RuntimeStatus::Idle,
            last_error: None,
            frames_processed: 0,
            last_frame_at: None,
            last_inference_at: None,
            last_detections: Vec::new(),
            stream_fps_ema: Ema::default(),
            inference_fps_ema: Ema::default(),
            inference_in_flight: false,
            consecutive_failures: 0,
            last_bus_publish_at: None,
        }
    }

    /// Source fields that, if changed, require stop+respawn rather than an
    /// in-place field mutation (spec.md §4.5 step 4).
    pub fn source_fields_changed(&self, new: &Camera) -> bool {
        self.camera.source_kind != new.source_kind
            || self.camera.rtsp_url != new.rtsp_url
            || self.camera.credentials_encrypted != new.credentials_encrypted
            || self.camera.use_placeholder != new.use_placeholder
            || self.camera.placeholder_video != new.placeholder_video
    }

    /// Mutates the runtime's in-place fields from an updated Camera without
    /// respawning the worker (spec.md §4.5 step 4, "otherwise").
    pub fn apply_config_update(&mut self, new: Camera) {
        self.camera = new;
    }
}
