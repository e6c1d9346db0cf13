use std::sync::Arc;
use std::time::{Duration, Instant};

use ab_glyph::FontRef;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use pvs_annotate::ZoneOverlayCache;
use pvs_bus::{Bus, CameraMeta};
use pvs_crypto::CredentialCipher;
use pvs_dedup::EventMaterializer;
use pvs_frame_source::{resolve_source, FrameDecoderFactory, FrameSource, SourceResolutionOptions};
use pvs_model::InferenceDispatcher;
use pvs_store::Store;
use pvs_types::{Camera, CameraId, DetectionMode, RuntimeStatus, WorkerConfig};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backoff::reconnect_delay;
use crate::runtime::SharedRuntime;

/// Everything a `CameraWorker` needs that is shared across every camera in
/// the process (spec.md §4.1). Grouped into one struct so spawning a new
/// worker from the supervisor's reconciliation loop is a single clone.
pub struct WorkerDeps<S, B> {
    pub store: Arc<S>,
    pub bus: Arc<B>,
    pub dispatcher: Arc<InferenceDispatcher>,
    pub materializer: Arc<EventMaterializer<S, B>>,
    pub cipher: Arc<CredentialCipher>,
    pub decoder: Arc<dyn FrameDecoderFactory>,
    pub default_demo_url: Option<String>,
    pub config: Arc<WorkerConfig>,
    pub font: Option<FontRef<'static>>,
}

impl<S, B> Clone for WorkerDeps<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
            dispatcher: self.dispatcher.clone(),
            materializer: self.materializer.clone(),
            cipher: self.cipher.clone(),
            decoder: self.decoder.clone(),
            default_demo_url: self.default_demo_url.clone(),
            config: self.config.clone(),
            font: self.font.clone(),
        }
    }
}

/// Drives one camera's streaming/inference/publish loop end to end (spec.md
/// §4.1). One of these is spawned per active camera by the
/// `CameraSupervisor`; it owns nothing the supervisor needs to reach into
/// directly except the shared `CameraRuntime` handle.
pub struct CameraWorker<S, B> {
    camera_id: CameraId,
    runtime: SharedRuntime,
    deps: WorkerDeps<S, B>,
    zone_cache: ZoneOverlayCache,
}

impl<S, B> CameraWorker<S, B>
where
    S: Store,
    B: Bus,
{
    pub fn new(camera_id: CameraId, runtime: SharedRuntime, deps: WorkerDeps<S, B>) -> Self {
        Self {
            camera_id,
            runtime,
            deps,
            zone_cache: ZoneOverlayCache::new(8),
        }
    }

    /// Runs until `cancel` is signalled or the reconnect budget is
    /// exhausted (spec.md §4.1.3: a camera that exhausts its retry budget
    /// moves to `error` and its worker task exits; the supervisor will not
    /// respawn it until the next reconciliation pass sees a config change).
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        let mut source = match self.connect(&mut cancel).await {
            Some(source) => source,
            None => return, // cancelled before ever connecting
        };

        let mut next_tick = Instant::now();
        loop {
            if *cancel.borrow() {
                break;
            }

            let read = tokio::select! {
                _ = cancel.changed() => break,
                frame = source.read_frame() => frame,
            };

            match read {
                Ok(frame) => {
                    self.runtime.lock().consecutive_failures = 0;
                    self.process_frame(frame).await;
                }
                Err(err) => {
                    let attempt = {
                        let mut guard = self.runtime.lock();
                        guard.consecutive_failures += 1;
                        guard.last_error = Some(err.to_string());
                        guard.consecutive_failures
                    };
                    warn!(camera_id = %self.camera_id, %err, attempt, "frame read failed");

                    if attempt >= self.deps.config.rtsp_max_retries {
                        self.set_status(RuntimeStatus::Error, Some(&err.to_string())).await;
                        info!(camera_id = %self.camera_id, "retry budget exhausted, worker exiting");
                        return;
                    }

                    let delay = reconnect_delay(
                        attempt - 1,
                        Duration::from_secs(self.deps.config.rtsp_base_delay_secs),
                        Duration::from_secs(self.deps.config.rtsp_max_delay_secs),
                    );
                    self.set_status(RuntimeStatus::Connecting, Some(&err.to_string())).await;
                    tokio::select! {
                        _ = cancel.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    source = match self.connect(&mut cancel).await {
                        Some(source) => source,
                        None => return,
                    };
                }
            }

            let min_period = target_period(self.deps.config.stream_fps_max);
            next_tick += min_period;
            let now = Instant::now();
            if next_tick > now {
                tokio::select! {
                    _ = cancel.changed() => break,
                    _ = tokio::time::sleep(next_tick - now) => {}
                }
            } else {
                next_tick = now;
            }
        }

        self.set_status(RuntimeStatus::Stopped, None).await;
    }

    async fn connect(&self, cancel: &mut watch::Receiver<bool>) -> Option<pvs_frame_source::BoxFrameSource> {
        self.set_status(RuntimeStatus::Connecting, None).await;
        let camera = self.runtime.lock().camera.clone();
        let opts = SourceResolutionOptions {
            cipher: &self.deps.cipher,
            default_demo_url: self.deps.default_demo_url.as_deref(),
            decoder: self.deps.decoder.as_ref(),
            rtsp_max_retries: self.deps.config.rtsp_max_retries,
            rtsp_base_delay: Duration::from_secs(self.deps.config.rtsp_base_delay_secs),
            rtsp_max_delay: Duration::from_secs(self.deps.config.rtsp_max_delay_secs),
        };
        tokio::select! {
            _ = cancel.changed() => None,
            result = resolve_source(&camera, &opts) => match result {
                Ok(source) => {
                    self.set_status(RuntimeStatus::Streaming, None).await;
                    Some(source)
                }
                Err(err) => {
                    // spec.md §7: a credential (or otherwise unrecoverable)
                    // source error moves the camera straight to `error`
                    // instead of cascading through the fallback chain.
                    warn!(camera_id = %self.camera_id, %err, "source resolution failed");
                    self.set_status(RuntimeStatus::Error, Some(&err.to_string())).await;
                    None
                }
            },
        }
    }

    /// The per-iteration contract of spec.md §4.1: resize, conditionally
    /// dispatch inference, annotate with whatever detections are currently
    /// cached, encode, publish, and update the stream-FPS EMA.
    async fn process_frame(&mut self, frame: pvs_frame_source::Frame) {
        let camera = self.runtime.lock().camera.clone();
        if !camera.is_active {
            return;
        }

        let (target_w, target_h) = camera.clamped_inference_size(self.deps.config.inference_size_cap_px);
        let resized = if frame.width() == target_w && frame.height() == target_h {
            frame.image.clone()
        } else {
            imageops::resize(&frame.image, target_w, target_h, FilterType::Triangle)
        };

        self.maybe_dispatch_inference(&camera, &resized, target_w.max(target_h));

        let detections = self.runtime.lock().last_detections.clone();
        let mut annotated = resized.clone();
        if camera.inference_enabled {
            match camera.detection_mode {
                DetectionMode::Ppe => {
                    pvs_annotate::annotate_ppe(&mut annotated, &detections, self.deps.font.as_ref())
                }
                DetectionMode::Zone => {
                    if let Some(polygon) = &camera.zone_polygon {
                        pvs_annotate::annotate_zone(
                            &mut annotated,
                            &detections,
                            polygon,
                            &mut self.zone_cache,
                            self.deps.font.as_ref(),
                        )
                    }
                }
            }
        } else {
            pvs_annotate::annotate_disabled(&mut annotated, self.deps.font.as_ref());
        }

        self.deps.materializer.record_frame(self.camera_id);

        let encoded = encode_jpeg(&annotated, self.deps.config.stream_jpeg_quality);
        self.publish(camera.id, encoded, &detections).await;

        let dt = frame.captured_at.elapsed().as_secs_f32().max(1e-3);
        let stream_fps = {
            let mut guard = self.runtime.lock();
            guard.frames_processed += 1;
            guard.last_frame_at = Some(Instant::now());
            guard.stream_fps_ema.observe(1.0 / dt)
        };
        debug!(camera_id = %self.camera_id, stream_fps, "frame published");
    }

    fn maybe_dispatch_inference(&self, camera: &Camera, resized: &RgbImage, size: u32) {
        if !camera.inference_enabled {
            return;
        }
        let target_interval = Duration::from_secs_f32(1.0 / camera.target_fps.max(0.01));
        let should_dispatch = {
            let mut guard = self.runtime.lock();
            if guard.inference_in_flight {
                false
            } else {
                let due = guard
                    .last_inference_at
                    .map(|t| t.elapsed() >= target_interval)
                    .unwrap_or(true);
                if due {
                    guard.inference_in_flight = true;
                }
                due
            }
        };
        if !should_dispatch {
            return;
        }

        let confidence = camera.confidence_threshold;
        let runtime = self.runtime.clone();
        let materializer = self.deps.materializer.clone();
        let camera = camera.clone();
        let frame_for_events = resized.clone();

        self.deps
            .dispatcher
            .dispatch(resized.clone(), confidence, size, move |outcome| async move {
                {
                    let mut guard = runtime.lock();
                    guard.inference_in_flight = false;
                    guard.last_inference_at = Some(Instant::now());
                    guard
                        .inference_fps_ema
                        .observe(1.0 / outcome.elapsed.as_secs_f32().max(1e-3));
                    if let Ok(detections) = &outcome.result {
                        guard.last_detections = detections.clone();
                    }
                }
                if let Ok(detections) = outcome.result {
                    let result = match camera.detection_mode {
                        DetectionMode::Ppe => {
                            materializer.process_ppe(&camera, &frame_for_events, &detections).await
                        }
                        DetectionMode::Zone => {
                            materializer.process_zone(&camera, &frame_for_events, &detections).await
                        }
                    };
                    if let Err(err) = result {
                        warn!(camera_id = %camera.id, %err, "event materialization failed");
                    }
                }
            });
    }

    async fn publish(&self, camera_id: CameraId, jpeg: Vec<u8>, detections: &[pvs_types::Detection]) {
        let ttl = Duration::from_secs(self.deps.config.latest_frame_ttl_secs);
        let topic = pvs_bus::frames_topic(camera_id);
        let subscribers = self.deps.bus.subscriber_count(&topic).await.unwrap_or(1);

        // SPEC_FULL.md §4.4 supplement: skip the publish step (not the
        // annotate/encode step, already done by the caller) when nobody is
        // watching, but never let `latest_frame` go stale past its own TTL
        // even with zero subscribers (spec.md §4.1 step 6, invariant #4,
        // and the cold-start scenario where no browser has subscribed yet).
        let due_for_ttl_refresh = {
            let guard = self.runtime.lock();
            guard
                .last_bus_publish_at
                .map(|t| t.elapsed() >= ttl)
                .unwrap_or(true)
        };
        if subscribers > 0 || due_for_ttl_refresh {
            if let Err(err) = self.deps.bus.publish_frame(camera_id, Bytes::from(jpeg), ttl).await {
                warn!(camera_id = %camera_id, %err, "frame publish failed");
            } else {
                self.runtime.lock().last_bus_publish_at = Some(Instant::now());
            }
        }

        let (stream_fps, inference_fps) = {
            let guard = self.runtime.lock();
            (guard.stream_fps_ema.get(), guard.inference_fps_ema.get())
        };
        let meta = CameraMeta {
            stream_fps,
            inference_fps,
            detection_count: detections.len() as u32,
        };
        let meta_ttl = Duration::from_secs(self.deps.config.camera_meta_ttl_secs);
        if let Err(err) = self.deps.bus.set_camera_meta(camera_id, meta, meta_ttl).await {
            warn!(camera_id = %camera_id, %err, "camera meta publish failed");
        }
    }

    async fn set_status(&self, status: RuntimeStatus, last_error: Option<&str>) {
        {
            let mut guard = self.runtime.lock();
            guard.status = status;
            if let Some(err) = last_error {
                guard.last_error = Some(err.to_string());
            }
        }
        if let Err(err) = self
            .deps
            .store
            .update_camera_status(self.camera_id, status, last_error)
            .await
        {
            warn!(camera_id = %self.camera_id, %err, "status update failed");
        }
    }
}

fn target_period(fps_max: f32) -> Duration {
    Duration::from_secs_f32(1.0 / fps_max.max(0.1))
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Vec<u8> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(image)
        .expect("jpeg encoding of an in-memory RgbImage cannot fail");
    bytes
}
