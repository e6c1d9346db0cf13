use crate::detector::Detector;
use crate::error::InferenceError;
use image::RgbImage;
use pvs_types::Detection;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

struct Job {
    frame: RgbImage,
    confidence: f32,
    size: u32,
    reply: oneshot::Sender<Result<Vec<Detection>, InferenceError>>,
}

/// Wraps a single loaded [`Detector`] behind a dedicated worker task
/// reached over a bounded channel, so every call is serialized regardless
/// of whether the underlying predictor is reentrant (spec.md §4.2: "if the
/// underlying predictor is not reentrant, the dispatcher serializes access
/// via a single-worker queue").
///
/// Grounded on the shared-resource handoff in `strand-cam`'s
/// `frame_process_task.rs`: work is moved off the calling task into a
/// dedicated one, here via `spawn_blocking` since real detector backends
/// (ONNX Runtime, Torch) block the calling thread.
pub struct SharedModel {
    tx: mpsc::Sender<Job>,
    worker: JoinHandle<()>,
}

impl SharedModel {
    pub fn spawn(mut detector: Box<dyn Detector>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(32);
        let worker = tokio::task::spawn_blocking(move || {
            while let Some(job) = rx.blocking_recv() {
                let result = detector.predict(&job.frame, job.confidence, job.size);
                // The caller may have dropped its reply receiver (e.g. the
                // in-flight inference task was aborted); that is not a
                // model error, just a wasted prediction.
                let _ = job.reply.send(result);
            }
        });
        Self { tx, worker }
    }

    /// Runs one dummy inference to force lazy initialization before the
    /// first camera connects (SPEC_FULL.md §4.2 supplement, mirroring
    /// `app/worker/vision.py`'s lazy `load_model`).
    pub async fn warmup(&self, size: u32) -> Result<(), InferenceError> {
        let side = size.max(1);
        let dummy = RgbImage::new(side, side);
        self.predict(dummy, 1.0, side).await?;
        Ok(())
    }

    pub async fn predict(
        &self,
        frame: RgbImage,
        confidence: f32,
        size: u32,
    ) -> Result<Vec<Detection>, InferenceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            frame,
            confidence,
            size,
            reply: reply_tx,
        };
        self.tx
            .send(job)
            .await
            .map_err(|_| InferenceError::WorkerGone)?;
        reply_rx.await.map_err(|_| InferenceError::WorkerGone)?
    }
}

impl Drop for SharedModel {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvs_types::{BBox, DetectionClass};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingDetector {
        calls: Arc<AtomicU32>,
    }

    impl Detector for CountingDetector {
        fn predict(
            &mut self,
            frame: &RgbImage,
            _confidence: f32,
            _size: u32,
        ) -> Result<Vec<Detection>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Detection::new(
                BBox {
                    x1: 0,
                    y1: 0,
                    x2: frame.width() as i32,
                    y2: frame.height() as i32,
                },
                DetectionClass::Person,
                0.9,
            )])
        }
    }

    #[tokio::test]
    async fn predict_round_trips_detections() {
        let calls = Arc::new(AtomicU32::new(0));
        let model = SharedModel::spawn(Box::new(CountingDetector {
            calls: calls.clone(),
        }));
        let detections = model
            .predict(RgbImage::new(32, 32), 0.25, 32)
            .await
            .unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn warmup_runs_one_prediction() {
        let calls = Arc::new(AtomicU32::new(0));
        let model = SharedModel::spawn(Box::new(CountingDetector {
            calls: calls.clone(),
        }));
        model.warmup(320).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_are_serialized_by_the_worker() {
        let calls = Arc::new(AtomicU32::new(0));
        let model = Arc::new(SharedModel::spawn(Box::new(CountingDetector {
            calls: calls.clone(),
        })));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let model = model.clone();
            handles.push(tokio::spawn(async move {
                model.predict(RgbImage::new(8, 8), 0.25, 8).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }
}
