use parking_lot::Mutex;
use pvs_types::{BBox, CameraId, EventId};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);
const DEFAULT_GRID_SIZE: u32 = 3;
const DEFAULT_STALE_AGE: Duration = Duration::from_secs(300);

/// Spatial-temporal violation deduplicator (spec.md §4.3), grounded on
/// `app/core/deduplication.py::ViolationDeduplicator`: a detection is
/// quantized to a grid cell by its centroid, and a signature of
/// `(camera_id, class_id, cell)` suppresses repeat events within a cooldown.
pub struct Deduplicator {
    cooldown: Duration,
    grid_size: u32,
    recent: Mutex<HashMap<String, (Instant, EventId)>>,
}

impl Deduplicator {
    pub fn new(cooldown: Duration, grid_size: u32) -> Self {
        Self {
            cooldown,
            grid_size: grid_size.max(1),
            recent: Mutex::new(HashMap::new()),
        }
    }

    fn quantize(&self, bbox: &BBox, frame_size: (u32, u32)) -> (u32, u32) {
        let (cx, cy) = bbox.centroid();
        let (w, h) = (frame_size.0.max(1) as f32, frame_size.1.max(1) as f32);
        let grid = self.grid_size;
        let col = ((cx / w * grid as f32) as i64).clamp(0, grid as i64 - 1) as u32;
        let row = ((cy / h * grid as f32) as i64).clamp(0, grid as i64 - 1) as u32;
        (row, col)
    }

    fn signature(&self, camera_id: CameraId, class_id: i16, bbox: &BBox, frame_size: (u32, u32)) -> String {
        let (row, col) = self.quantize(bbox, frame_size);
        let raw = format!("{camera_id}:{class_id}:R{row}C{col}");
        let mut hasher = DefaultHasher::new();
        raw.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Returns `(should_create, signature_digest)`. Does not write the
    /// entry on `true` — the caller must persist the event first and only
    /// then call [`Deduplicator::register`] (spec.md §4.3 durability
    /// ordering).
    pub fn should_emit(
        &self,
        camera_id: CameraId,
        class_id: i16,
        bbox: &BBox,
        frame_size: (u32, u32),
    ) -> (bool, String) {
        let digest = self.signature(camera_id, class_id, bbox, frame_size);
        let now = Instant::now();

        let mut recent = self.recent.lock();
        if let Some((last_seen, event_id)) = recent.get(&digest).copied() {
            if now.duration_since(last_seen) < self.cooldown {
                recent.insert(digest.clone(), (now, event_id));
                return (false, digest);
            }
        }
        (true, digest)
    }

    pub fn register(&self, digest: &str, event_id: EventId) {
        self.recent.lock().insert(digest.to_string(), (Instant::now(), event_id));
    }

    /// Removes entries whose last sighting is older than `max_age`.
    pub fn cleanup_stale(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut recent = self.recent.lock();
        let before = recent.len();
        recent.retain(|_, (last_seen, _)| now.duration_since(*last_seen) < max_age);
        before - recent.len()
    }

    pub fn active_signatures(&self) -> usize {
        self.recent.lock().len()
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN, DEFAULT_GRID_SIZE)
    }
}

/// Default stale-entry cutoff used by the worker's periodic cleanup tick.
pub fn default_stale_age() -> Duration {
    DEFAULT_STALE_AGE
}
