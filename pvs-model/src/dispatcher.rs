use crate::error::InferenceError;
use crate::shared_model::SharedModel;
use image::RgbImage;
use pvs_types::Detection;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a dispatched inference job produced, handed to the completion
/// callback regardless of success or failure so it can always clear the
/// camera's in-flight marker (spec.md §4.2: "errors ... do not propagate to
/// the per-camera loop; the in-flight marker is always cleared").
pub struct InferenceOutcome {
    pub result: Result<Vec<Detection>, InferenceError>,
    pub elapsed: Duration,
}

/// Runs detector jobs off the per-camera loop so the loop never blocks on
/// model latency (spec.md §4.2). Deliberately does not know about
/// `CameraRuntime` or the `EventMaterializer`: the completion callback
/// supplied by the caller (`pvs-worker`) owns updating the shared runtime
/// state and forwarding detections onward, keeping this crate's dependency
/// graph a leaf alongside `pvs-dedup` rather than routing through it.
pub struct InferenceDispatcher {
    model: Arc<SharedModel>,
}

impl InferenceDispatcher {
    pub fn new(model: Arc<SharedModel>) -> Self {
        Self { model }
    }

    /// Fire-and-forget dispatch of one inference job (spec.md §4.1 step 2:
    /// "hand a copy of the frame to the InferenceDispatcher ... as a
    /// fire-and-forget task"). `on_complete` runs on the spawned task after
    /// the model call returns; errors are logged here and also passed
    /// through so the callback can decide what, if anything, to do with
    /// them (spec.md §7: inference errors are caught, logged, and the
    /// camera's `last_detections` is left unchanged).
    pub fn dispatch<F, Fut>(&self, frame: RgbImage, confidence: f32, size: u32, on_complete: F)
    where
        F: FnOnce(InferenceOutcome) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let model = self.model.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            let result = model.predict(frame, confidence, size).await;
            if let Err(err) = &result {
                tracing::warn!(%err, "inference job failed");
            }
            let outcome = InferenceOutcome {
                result,
                elapsed: start.elapsed(),
            };
            on_complete(outcome).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;
    use pvs_types::{BBox, DetectionClass};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::oneshot;

    struct FlakyDetector {
        fail_next: bool,
    }

    impl Detector for FlakyDetector {
        fn predict(
            &mut self,
            _frame: &RgbImage,
            _confidence: f32,
            _size: u32,
        ) -> Result<Vec<Detection>, InferenceError> {
            if self.fail_next {
                Err(InferenceError::Predictor("boom".into()))
            } else {
                Ok(vec![Detection::new(
                    BBox { x1: 0, y1: 0, x2: 1, y2: 1 },
                    DetectionClass::Person,
                    0.5,
                )])
            }
        }
    }

    #[tokio::test]
    async fn success_forwards_detections_to_callback() {
        let model = Arc::new(SharedModel::spawn(Box::new(FlakyDetector {
            fail_next: false,
        })));
        let dispatcher = InferenceDispatcher::new(model);
        let (tx, rx) = oneshot::channel();
        dispatcher.dispatch(RgbImage::new(4, 4), 0.25, 4, move |outcome| async move {
            let _ = tx.send(outcome.result.map(|d| d.len()));
        });
        assert_eq!(rx.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn failure_is_still_delivered_to_callback_not_dropped() {
        let model = Arc::new(SharedModel::spawn(Box::new(FlakyDetector {
            fail_next: true,
        })));
        let dispatcher = InferenceDispatcher::new(model);
        let called = Arc::new(AtomicBool::new(false));
        let called2 = called.clone();
        let (tx, rx) = oneshot::channel();
        dispatcher.dispatch(RgbImage::new(4, 4), 0.25, 4, move |outcome| async move {
            called2.store(true, Ordering::SeqCst);
            let _ = tx.send(outcome.result.is_err());
        });
        assert!(rx.await.unwrap());
        assert!(called.load(Ordering::SeqCst));
    }
}
