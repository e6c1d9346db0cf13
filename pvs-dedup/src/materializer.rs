use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use image::RgbImage;
use parking_lot::Mutex;
use pvs_bus::Bus;
use pvs_store::Store;
use pvs_types::{
    Camera, CameraId, DailyCounters, Detection, DetectionClass, Event, EventId, EventKind,
    ViolationKind, ZONE_BREACH_CLASS_ID,
};
use tracing::{info, warn};

use crate::dedup::Deduplicator;
use crate::error::MaterializeError;

const HEAD_FRACTION: f32 = 0.30;
const OVERLAP_THRESHOLD: f32 = 0.1;

/// Turns a frame's detections into persisted, deduplicated, published
/// events (spec.md §4.3), grounded on
/// `app/worker/event_processor.py::EventProcessor`.
pub struct EventMaterializer<S, B> {
    dedup: Arc<Deduplicator>,
    store: Arc<S>,
    bus: Arc<B>,
    thumbnail_dir: PathBuf,
    counters: Mutex<HashMap<CameraId, DailyCounters>>,
}

impl<S, B> EventMaterializer<S, B>
where
    S: Store,
    B: Bus,
{
    pub fn new(dedup: Arc<Deduplicator>, store: Arc<S>, bus: Arc<B>, thumbnail_dir: PathBuf) -> Self {
        Self {
            dedup,
            store,
            bus,
            thumbnail_dir,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// PPE mode (spec.md §4.3 step 1): per person, a >0.1 IoU of the head
    /// region against a no-hardhat detection, or of the full box against a
    /// no-vest detection, is a candidate violation.
    pub async fn process_ppe(
        &self,
        camera: &Camera,
        frame: &RgbImage,
        detections: &[Detection],
    ) -> Result<Vec<Event>, MaterializeError> {
        let frame_size = (frame.width(), frame.height());
        let persons = by_class(detections, DetectionClass::Person);
        let no_hardhats = by_class(detections, DetectionClass::NoHardhat);
        let no_vests = by_class(detections, DetectionClass::NoSafetyVest);

        let mut events = Vec::new();
        for person in persons {
            let head = person.bbox.top_fraction(HEAD_FRACTION);

            if let Some(hit) = no_hardhats.iter().find(|d| head.iou(&d.bbox) > OVERLAP_THRESHOLD) {
                if let Some(event) = self
                    .materialize(
                        camera,
                        frame,
                        EventKind::PpeViolation,
                        ViolationKind::NoHardhat,
                        hit.class_id,
                        person,
                        frame_size,
                    )
                    .await?
                {
                    events.push(event);
                }
            }

            if let Some(hit) = no_vests.iter().find(|d| person.bbox.iou(&d.bbox) > OVERLAP_THRESHOLD) {
                if let Some(event) = self
                    .materialize(
                        camera,
                        frame,
                        EventKind::PpeViolation,
                        ViolationKind::NoVest,
                        hit.class_id,
                        person,
                        frame_size,
                    )
                    .await?
                {
                    events.push(event);
                }
            }
        }
        Ok(events)
    }

    /// Zone mode (spec.md §4.3 step 2): a person whose centroid lies
    /// inside the configured polygon is a candidate zone breach.
    pub async fn process_zone(
        &self,
        camera: &Camera,
        frame: &RgbImage,
        detections: &[Detection],
    ) -> Result<Vec<Event>, MaterializeError> {
        let Some(polygon) = camera.zone_polygon.as_ref() else {
            return Ok(Vec::new());
        };
        let frame_size = (frame.width(), frame.height());
        let persons = by_class(detections, DetectionClass::Person);

        let mut events = Vec::new();
        for person in persons {
            if !polygon.contains(person.bbox.centroid()) {
                continue;
            }
            if let Some(event) = self
                .materialize(
                    camera,
                    frame,
                    EventKind::ZoneViolation,
                    ViolationKind::ZoneBreach,
                    ZONE_BREACH_CLASS_ID,
                    person,
                    frame_size,
                )
                .await?
            {
                events.push(event);
            }
        }
        Ok(events)
    }

    async fn materialize(
        &self,
        camera: &Camera,
        frame: &RgbImage,
        event_kind: EventKind,
        violation_kind: ViolationKind,
        signature_class_id: i16,
        detection: &Detection,
        frame_size: (u32, u32),
    ) -> Result<Option<Event>, MaterializeError> {
        let (should_create, digest) =
            self.dedup
                .should_emit(camera.id, signature_class_id, &detection.bbox, frame_size);
        if !should_create {
            return Ok(None);
        }

        let event = Event::new_violation(
            camera.organization_id,
            camera.id,
            event_kind,
            violation_kind,
            detection.confidence,
            Some(detection.bbox),
            None,
        );

        let thumbnail_path = match pvs_annotate::generate_thumbnail(
            frame,
            &event.id.to_string(),
            Some(&detection.bbox),
            &self.thumbnail_dir,
        ) {
            Ok(path) => Some(path.display().to_string()),
            Err(err) => {
                warn!(camera_id = %camera.id, error = %err, "thumbnail generation failed");
                None
            }
        };
        let event = Event { thumbnail_path, ..event };

        // Durability ordering (spec.md §4.3): persist before registering
        // the digest or publishing, so a failed insert lets the next
        // detection in the same cell retry instead of silently dropping.
        self.store.insert_event(&event).await?;

        self.dedup.register(&digest, event.id);
        self.record_counters(camera, violation_kind);
        self.reseed_event_tracking(camera.id, digest, event.id);

        let payload = serde_json::json!({
            "id": event.id.to_string(),
            "camera_id": event.camera_id.to_string(),
            "event_type": event.event_type.as_db_str(),
            "violation_type": violation_kind.as_db_str(),
            "severity": event.severity.as_db_str(),
            "confidence": (event.confidence * 100.0).round() / 100.0,
            "thumbnail_path": event.thumbnail_path,
            "created_at": event.created_at.to_rfc3339(),
        });
        let bytes = serde_json::to_vec(&payload)?;
        let organization_id = camera.organization_id;
        let bus = Arc::clone(&self.bus);
        let publish_bytes = bytes.clone();
        let published = pvs_bus::with_one_retry(|| {
            let bus = Arc::clone(&bus);
            let payload = publish_bytes.clone();
            async move { bus.publish_event(organization_id, payload.into()).await }
        })
        .await;
        if let Err(err) = published {
            // spec.md §7 "bus" error kind: the event is already durably
            // persisted and deduplicated; a broadcast failure after one
            // retry is logged and dropped, never propagated to the caller.
            warn!(camera_id = %camera.id, error = %err, "event publish failed after retry, dropping broadcast");
        }

        info!(
            camera_id = %camera.id,
            violation = violation_kind.as_db_str(),
            severity = event.severity.as_db_str(),
            "violation event materialized"
        );

        Ok(Some(event))
    }

    fn record_counters(&self, camera: &Camera, violation: ViolationKind) {
        let mut counters = self.counters.lock();
        counters.entry(camera.id).or_default().record(violation);

        let store = Arc::clone(&self.store);
        let organization_id = camera.organization_id;
        let camera_id = camera.id;
        let mut delta = DailyCounters::default();
        delta.record(violation);
        tokio::spawn(async move {
            let today = Utc::now().date_naive();
            if let Err(err) = store
                .accumulate_daily_counters(organization_id, camera_id, today, &delta)
                .await
            {
                warn!(%camera_id, error = %err, "failed to persist daily counters");
            }
        });
    }

    /// Best-effort durable projection of the in-memory dedup entry into
    /// `event_tracking` (spec.md §9 Open Question (b)): not read back on
    /// the hot path, only upserted so a restarted worker has a starting
    /// point, detached the same way `record_counters` detaches its own
    /// write so a slow second DB round trip never holds up materialization.
    fn reseed_event_tracking(&self, camera_id: CameraId, digest: String, event_id: EventId) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(err) = store.upsert_event_tracking(camera_id, &digest, event_id).await {
                warn!(%camera_id, error = %err, "event_tracking upsert failed");
            }
        });
    }

    /// Increments `frames_processed` for in-process reporting. Not
    /// persisted per-frame; the worker periodically flushes the real
    /// totals from `CameraRuntime` instead.
    pub fn record_frame(&self, camera_id: CameraId) {
        self.counters.lock().entry(camera_id).or_default().frames_processed += 1;
    }

    /// Returns the process-local running total for `camera_id` (spec.md
    /// §9 "counters" supplement), not drained on read.
    pub fn counters(&self, camera_id: CameraId) -> DailyCounters {
        self.counters.lock().get(&camera_id).cloned().unwrap_or_default()
    }
}

fn by_class(detections: &[Detection], class: DetectionClass) -> Vec<&Detection> {
    detections.iter().filter(|d| d.class_id == class.id()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvs_bus::{BusError, CameraMeta, EventStream, FrameStream};
    use pvs_store::StoreError;
    use pvs_types::{BBox, OrganizationId, RuntimeStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockStore {
        inserts: AtomicUsize,
    }

    impl Store for MockStore {
        async fn active_cameras(&self) -> Result<Vec<Camera>, StoreError> {
            Ok(Vec::new())
        }
        async fn camera_by_id(&self, _: CameraId) -> Result<Option<Camera>, StoreError> {
            Ok(None)
        }
        async fn update_camera_status(
            &self,
            _: CameraId,
            _: RuntimeStatus,
            _: Option<&str>,
        ) -> Result<(), StoreError> {
            Ok(())
        }
        async fn insert_event(&self, _: &Event) -> Result<(), StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn accumulate_daily_counters(
            &self,
            _: OrganizationId,
            _: CameraId,
            _: chrono::NaiveDate,
            _: &DailyCounters,
        ) -> Result<(), StoreError> {
            Ok(())
        }
        async fn upsert_event_tracking(
            &self,
            _: CameraId,
            _: &str,
            _: pvs_types::EventId,
        ) -> Result<(), StoreError> {
            Ok(())
        }
        async fn prune_event_tracking(&self, _: chrono::Duration) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn recent_events(&self, _: CameraId, _: i64) -> Result<Vec<Event>, StoreError> {
            Ok(Vec::new())
        }
        async fn daily_counters(
            &self,
            _: OrganizationId,
            _: CameraId,
            _: chrono::NaiveDate,
        ) -> Result<DailyCounters, StoreError> {
            Ok(DailyCounters::default())
        }
    }

    struct MockBus {
        published: AtomicUsize,
    }

    impl Bus for MockBus {
        async fn publish_frame(
            &self,
            _: CameraId,
            _: bytes::Bytes,
            _: Duration,
        ) -> Result<(), BusError> {
            Ok(())
        }
        async fn latest_frame(&self, _: CameraId) -> Result<Option<bytes::Bytes>, BusError> {
            Ok(None)
        }
        async fn subscribe_frames(&self, _: CameraId) -> Result<FrameStream, BusError> {
            unimplemented!()
        }
        async fn set_camera_meta(&self, _: CameraId, _: CameraMeta, _: Duration) -> Result<(), BusError> {
            Ok(())
        }
        async fn camera_meta(&self, _: CameraId) -> Result<Option<CameraMeta>, BusError> {
            Ok(None)
        }
        async fn publish_event(&self, _: OrganizationId, _: bytes::Bytes) -> Result<(), BusError> {
            self.published.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn subscribe_events(&self, _: OrganizationId) -> Result<EventStream, BusError> {
            unimplemented!()
        }
        async fn subscriber_count(&self, _: &str) -> Result<usize, BusError> {
            Ok(0)
        }
    }

    fn camera() -> Camera {
        Camera {
            id: CameraId::new(),
            organization_id: OrganizationId::new(),
            name: "cam".into(),
            zone: None,
            source_kind: pvs_types::SourceKind::File,
            rtsp_url: None,
            credentials_encrypted: None,
            placeholder_video: None,
            use_placeholder: false,
            inference_width: 320,
            inference_height: 320,
            target_fps: 5.0,
            detection_mode: pvs_types::DetectionMode::Ppe,
            zone_polygon: None,
            confidence_threshold: 0.25,
            is_active: true,
            inference_enabled: true,
        }
    }

    fn person(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::new(BBox { x1, y1, x2, y2 }, DetectionClass::Person, 0.5)
    }

    #[tokio::test]
    async fn ppe_violation_is_inserted_registered_and_published() {
        let dedup = Arc::new(Deduplicator::new(Duration::from_secs(30), 3));
        let store = Arc::new(MockStore { inserts: AtomicUsize::new(0) });
        let bus = Arc::new(MockBus { published: AtomicUsize::new(0) });
        let dir = std::env::temp_dir().join("pvs-dedup-test");
        std::fs::create_dir_all(&dir).unwrap();
        let materializer = EventMaterializer::new(dedup, store.clone(), bus.clone(), dir);

        let frame = RgbImage::new(200, 200);
        let cam = camera();
        let p = person(10, 10, 60, 110);
        let head = p.bbox.top_fraction(HEAD_FRACTION);
        let no_hat = Detection::new(head, DetectionClass::NoHardhat, 0.9);

        let events = materializer.process_ppe(&cam, &frame, &[p, no_hat]).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(bus.published.load(Ordering::SeqCst), 1);

        let counters = materializer.counters(cam.id);
        assert_eq!(counters.no_hardhat_count, 1);
    }

    #[tokio::test]
    async fn repeat_detection_within_cooldown_is_suppressed() {
        let dedup = Arc::new(Deduplicator::new(Duration::from_secs(30), 3));
        let store = Arc::new(MockStore { inserts: AtomicUsize::new(0) });
        let bus = Arc::new(MockBus { published: AtomicUsize::new(0) });
        let dir = std::env::temp_dir().join("pvs-dedup-test-2");
        std::fs::create_dir_all(&dir).unwrap();
        let materializer = EventMaterializer::new(dedup, store.clone(), bus, dir);

        let frame = RgbImage::new(200, 200);
        let cam = camera();
        let p = person(10, 10, 60, 110);
        let head = p.bbox.top_fraction(HEAD_FRACTION);
        let no_hat = Detection::new(head, DetectionClass::NoHardhat, 0.9);

        materializer.process_ppe(&cam, &frame, &[p.clone(), no_hat.clone()]).await.unwrap();
        let second = materializer.process_ppe(&cam, &frame, &[p, no_hat]).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
    }
}
