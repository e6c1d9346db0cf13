use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pvs_bus::Bus;
use pvs_store::Store;
use pvs_types::{Camera, CameraId, CameraRuntime, RuntimeStatus, WorkerConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::camera_worker::{CameraWorker, WorkerDeps};
use crate::runtime::{shared, SharedRuntime};

struct RunningCamera {
    runtime: SharedRuntime,
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the set of running `CameraWorker` tasks and keeps it in sync with
/// the authoritative camera list (spec.md §4.5).
pub struct CameraSupervisor<S, B> {
    store: Arc<S>,
    deps: WorkerDeps<S, B>,
    running: HashMap<CameraId, RunningCamera>,
}

impl<S, B> CameraSupervisor<S, B>
where
    S: Store,
    B: Bus,
{
    pub fn new(store: Arc<S>, deps: WorkerDeps<S, B>) -> Self {
        Self {
            store,
            deps,
            running: HashMap::new(),
        }
    }

    /// Loads the initial camera set, warms up the shared model, spawns one
    /// worker per active camera, then reconciles every
    /// `supervisor_refresh_secs` until `shutdown` fires (spec.md §4.5).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let cameras = match self.store.active_cameras().await {
            Ok(cameras) => cameras,
            Err(err) => {
                error!(%err, "failed to load initial camera list, starting with none");
                Vec::new()
            }
        };
        for camera in cameras {
            self.spawn_camera(camera);
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(self.deps.config.supervisor_refresh_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.reconcile().await;
                }
            }
        }

        self.shutdown_all().await;
    }

    /// Re-reads the authoritative camera list and diffs it against the
    /// running set: cameras no longer active are stopped, newly active ones
    /// are spawned, and source-field changes trigger a stop+respawn rather
    /// than an in-place mutation (spec.md §4.5 step 4).
    async fn reconcile(&mut self) {
        let cameras = match self.store.active_cameras().await {
            Ok(cameras) => cameras,
            Err(err) => {
                warn!(%err, "reconciliation skipped: failed to load camera list");
                return;
            }
        };

        let mut seen = std::collections::HashSet::new();
        for camera in cameras {
            seen.insert(camera.id);
            match self.running.get(&camera.id) {
                None => self.spawn_camera(camera),
                Some(running) => {
                    let changed = running.runtime.lock().source_fields_changed(&camera);
                    if changed {
                        info!(camera_id = %camera.id, "source fields changed, respawning worker");
                        self.stop_camera(camera.id).await;
                        self.spawn_camera(camera);
                    } else {
                        running.runtime.lock().apply_config_update(camera);
                    }
                }
            }
        }

        let stale: Vec<CameraId> = self
            .running
            .keys()
            .copied()
            .filter(|id| !seen.contains(id))
            .collect();
        for camera_id in stale {
            info!(camera_id = %camera_id, "camera no longer active, stopping worker");
            self.stop_camera(camera_id).await;
        }
    }

    fn spawn_camera(&mut self, camera: Camera) {
        let camera_id = camera.id;
        let runtime = shared(CameraRuntime::new(camera));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let worker = CameraWorker::new(camera_id, runtime.clone(), self.deps.clone());
        let handle = tokio::spawn(worker.run(cancel_rx));
        self.running.insert(
            camera_id,
            RunningCamera {
                runtime,
                cancel: cancel_tx,
                handle,
            },
        );
        info!(camera_id = %camera_id, "camera worker spawned");
    }

    async fn stop_camera(&mut self, camera_id: CameraId) {
        if let Some(running) = self.running.remove(&camera_id) {
            let _ = running.cancel.send(true);
            let grace = Duration::from_secs(self.deps.config.shutdown_grace_secs);
            if tokio::time::timeout(grace, running.handle).await.is_err() {
                warn!(camera_id = %camera_id, "worker did not stop within grace period");
            }
            if let Err(err) = self
                .store
                .update_camera_status(camera_id, RuntimeStatus::Stopped, None)
                .await
            {
                warn!(camera_id = %camera_id, %err, "failed to persist stopped status");
            }
        }
    }

    /// Graceful shutdown (spec.md §4.5): signal every worker, wait up to
    /// `shutdown_grace_secs` total, and move on regardless so the process
    /// can still exit cleanly if a worker is stuck mid-read.
    async fn shutdown_all(&mut self) {
        info!(count = self.running.len(), "shutting down camera workers");
        let grace = Duration::from_secs(self.deps.config.shutdown_grace_secs);
        let camera_ids: Vec<CameraId> = self.running.keys().copied().collect();
        for camera_id in camera_ids {
            if let Some(running) = self.running.get(&camera_id) {
                let _ = running.cancel.send(true);
            }
        }
        for camera_id in self.running.keys().copied().collect::<Vec<_>>() {
            if let Some(running) = self.running.remove(&camera_id) {
                if tokio::time::timeout(grace, running.handle).await.is_err() {
                    warn!(camera_id = %camera_id, "worker did not stop within shutdown grace period");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use pvs_bus::{BusError, CameraMeta, EventStream, FrameStream};
    use pvs_crypto::CredentialCipher;
    use pvs_frame_source::{FrameDecoderFactory, FrameSourceError};
    use pvs_model::{Detector, InferenceDispatcher, SharedModel};
    use pvs_store::StoreError;
    use pvs_types::{Camera, DetectionMode, OrganizationId, SourceKind};

    /// A `Store` double whose camera list can be mutated between
    /// `reconcile()` calls, with every `update_camera_status` call
    /// recorded for assertions (the "round-trip of configuration" law,
    /// spec.md §8).
    struct MockStore {
        cameras: parking_lot::Mutex<Vec<Camera>>,
        status_updates: parking_lot::Mutex<Vec<(CameraId, RuntimeStatus)>>,
    }

    impl MockStore {
        fn new(cameras: Vec<Camera>) -> Self {
            Self {
                cameras: parking_lot::Mutex::new(cameras),
                status_updates: parking_lot::Mutex::new(Vec::new()),
            }
        }

        fn set_cameras(&self, cameras: Vec<Camera>) {
            *self.cameras.lock() = cameras;
        }
    }

    impl Store for MockStore {
        async fn active_cameras(&self) -> Result<Vec<Camera>, StoreError> {
            Ok(self.cameras.lock().clone())
        }

        async fn camera_by_id(&self, camera_id: CameraId) -> Result<Option<Camera>, StoreError> {
            Ok(self.cameras.lock().iter().find(|c| c.id == camera_id).cloned())
        }

        async fn update_camera_status(
            &self,
            camera_id: CameraId,
            status: RuntimeStatus,
            _last_error: Option<&str>,
        ) -> Result<(), StoreError> {
            self.status_updates.lock().push((camera_id, status));
            Ok(())
        }

        async fn insert_event(&self, _event: &pvs_types::Event) -> Result<(), StoreError> {
            Ok(())
        }

        async fn accumulate_daily_counters(
            &self,
            _organization_id: OrganizationId,
            _camera_id: CameraId,
            _date: chrono::NaiveDate,
            _counters: &pvs_types::DailyCounters,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert_event_tracking(
            &self,
            _camera_id: CameraId,
            _violation_key: &str,
            _event_id: pvs_types::EventId,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn prune_event_tracking(&self, _max_age: chrono::Duration) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn recent_events(
            &self,
            _camera_id: CameraId,
            _limit: i64,
        ) -> Result<Vec<pvs_types::Event>, StoreError> {
            Ok(Vec::new())
        }

        async fn daily_counters(
            &self,
            _organization_id: OrganizationId,
            _camera_id: CameraId,
            _date: chrono::NaiveDate,
        ) -> Result<pvs_types::DailyCounters, StoreError> {
            Ok(pvs_types::DailyCounters::default())
        }
    }

    /// A `Bus` double: never touches Redis, records nothing a test needs
    /// to assert on since these tests exercise `reconcile()`'s bookkeeping,
    /// not the publish path.
    struct FakeBus;

    impl Bus for FakeBus {
        async fn publish_frame(
            &self,
            _camera_id: CameraId,
            _frame: bytes::Bytes,
            _latest_frame_ttl: Duration,
        ) -> Result<(), BusError> {
            Ok(())
        }

        async fn latest_frame(&self, _camera_id: CameraId) -> Result<Option<bytes::Bytes>, BusError> {
            Ok(None)
        }

        async fn subscribe_frames(&self, _camera_id: CameraId) -> Result<FrameStream, BusError> {
            Ok(Box::pin(futures::stream::pending()))
        }

        async fn set_camera_meta(
            &self,
            _camera_id: CameraId,
            _meta: CameraMeta,
            _ttl: Duration,
        ) -> Result<(), BusError> {
            Ok(())
        }

        async fn camera_meta(&self, _camera_id: CameraId) -> Result<Option<CameraMeta>, BusError> {
            Ok(None)
        }

        async fn publish_event(
            &self,
            _organization_id: OrganizationId,
            _payload: bytes::Bytes,
        ) -> Result<(), BusError> {
            Ok(())
        }

        async fn subscribe_events(&self, _organization_id: OrganizationId) -> Result<EventStream, BusError> {
            Ok(Box::pin(futures::stream::pending()))
        }

        async fn subscriber_count(&self, _topic: &str) -> Result<usize, BusError> {
            Ok(0)
        }
    }

    /// Never actually invoked: test cameras carry no rtsp/placeholder/demo
    /// candidate, so source resolution falls straight through to the
    /// test-pattern source without calling the decoder.
    struct NeverCalledDecoder;

    impl FrameDecoderFactory for NeverCalledDecoder {
        fn open(&self, url: &str) -> futures::future::BoxFuture<'static, Result<pvs_frame_source::BoxFrameSource, FrameSourceError>> {
            let url = url.to_string();
            Box::pin(async move { Err(FrameSourceError::Unavailable(url)) })
        }
    }

    struct NoopDetector;
    impl Detector for NoopDetector {
        fn predict(
            &mut self,
            _frame: &image::RgbImage,
            _confidence: f32,
            _size: u32,
        ) -> Result<Vec<pvs_types::Detection>, pvs_model::InferenceError> {
            Ok(Vec::new())
        }
    }

    fn test_config() -> WorkerConfig {
        WorkerConfig::parse_from(["pvs-worker", "--database-url", "postgres://localhost/test"])
    }

    fn test_camera(name: &str) -> Camera {
        Camera {
            id: CameraId::new(),
            organization_id: OrganizationId::new(),
            name: name.into(),
            zone: None,
            source_kind: SourceKind::None,
            rtsp_url: None,
            credentials_encrypted: None,
            placeholder_video: None,
            use_placeholder: false,
            inference_width: 64,
            inference_height: 64,
            target_fps: 1.0,
            detection_mode: DetectionMode::Ppe,
            zone_polygon: None,
            confidence_threshold: 0.25,
            is_active: true,
            inference_enabled: true,
        }
    }

    fn test_deps() -> WorkerDeps<MockStore, FakeBus> {
        let store_for_materializer = Arc::new(MockStore::new(Vec::new()));
        let bus = Arc::new(FakeBus);
        let dedup = Arc::new(pvs_dedup::Deduplicator::new(Duration::from_secs(30), 3));
        let materializer = Arc::new(pvs_dedup::EventMaterializer::new(
            dedup,
            store_for_materializer,
            bus.clone(),
            std::env::temp_dir(),
        ));
        let cipher = Arc::new(CredentialCipher::from_base64_key(&STANDARD.encode([7u8; 32])).unwrap());
        let model = Arc::new(SharedModel::spawn(Box::new(NoopDetector)));
        WorkerDeps {
            store: Arc::new(MockStore::new(Vec::new())),
            bus,
            dispatcher: Arc::new(InferenceDispatcher::new(model)),
            materializer,
            cipher,
            decoder: Arc::new(NeverCalledDecoder),
            default_demo_url: None,
            config: Arc::new(test_config()),
            font: None,
        }
    }

    fn supervisor_with(store: Arc<MockStore>) -> CameraSupervisor<MockStore, FakeBus> {
        let mut deps = test_deps();
        deps.store = store.clone();
        CameraSupervisor::new(store, deps)
    }

    #[tokio::test]
    async fn reconcile_spawns_newly_active_cameras() {
        let camera = test_camera("cam-1");
        let store = Arc::new(MockStore::new(vec![camera.clone()]));
        let mut supervisor = supervisor_with(store);

        supervisor.reconcile().await;

        assert_eq!(supervisor.running.len(), 1);
        assert!(supervisor.running.contains_key(&camera.id));
    }

    #[tokio::test]
    async fn reconcile_stops_cameras_no_longer_returned() {
        let camera = test_camera("cam-1");
        let store = Arc::new(MockStore::new(vec![camera.clone()]));
        let mut supervisor = supervisor_with(store.clone());
        supervisor.reconcile().await;
        assert_eq!(supervisor.running.len(), 1);

        store.set_cameras(Vec::new());
        supervisor.reconcile().await;

        assert!(supervisor.running.is_empty());
        assert!(store
            .status_updates
            .lock()
            .iter()
            .any(|(id, status)| *id == camera.id && *status == RuntimeStatus::Stopped));
    }

    #[tokio::test]
    async fn reconcile_respawns_on_source_field_change_but_not_on_other_changes() {
        let camera = test_camera("cam-1");
        let store = Arc::new(MockStore::new(vec![camera.clone()]));
        let mut supervisor = supervisor_with(store.clone());
        supervisor.reconcile().await;
        let original_handle_id = format!("{:?}", supervisor.running[&camera.id].handle.id());

        // Non-source field change: mutated in place, same worker task.
        let mut same_source = camera.clone();
        same_source.target_fps = 2.0;
        store.set_cameras(vec![same_source.clone()]);
        supervisor.reconcile().await;
        assert_eq!(supervisor.running.len(), 1);
        let handle_id_after_inplace = format!("{:?}", supervisor.running[&camera.id].handle.id());
        assert_eq!(original_handle_id, handle_id_after_inplace);
        assert_eq!(
            supervisor.running[&camera.id].runtime.lock().camera.target_fps,
            2.0
        );

        // Source field change: old worker stopped, a new one spawned.
        let mut changed_source = same_source.clone();
        changed_source.source_kind = SourceKind::Rtsp;
        changed_source.rtsp_url = Some("rtsp://camera.local/stream".into());
        store.set_cameras(vec![changed_source]);
        supervisor.reconcile().await;
        assert_eq!(supervisor.running.len(), 1);
        let handle_id_after_respawn = format!("{:?}", supervisor.running[&camera.id].handle.id());
        assert_ne!(original_handle_id, handle_id_after_respawn);
    }

    #[tokio::test(start_paused = true)]
    async fn round_trip_of_configuration_add_change_remove() {
        let camera = test_camera("cam-1");
        let store = Arc::new(MockStore::new(vec![camera.clone()]));
        let mut supervisor = supervisor_with(store.clone());

        // add
        supervisor.reconcile().await;
        assert_eq!(supervisor.running.len(), 1);

        // change (non-source field, in place)
        let mut renamed = camera.clone();
        renamed.zone = Some("loading-dock".into());
        store.set_cameras(vec![renamed]);
        tokio::time::advance(Duration::from_millis(1)).await;
        supervisor.reconcile().await;
        assert_eq!(supervisor.running.len(), 1);
        assert_eq!(
            supervisor.running[&camera.id].runtime.lock().camera.zone,
            Some("loading-dock".into())
        );

        // remove
        store.set_cameras(Vec::new());
        tokio::time::advance(Duration::from_millis(1)).await;
        supervisor.reconcile().await;
        assert!(supervisor.running.is_empty());
    }
}
