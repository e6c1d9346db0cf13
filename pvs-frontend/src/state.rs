use std::sync::Arc;
use std::time::Duration;

use pvs_bus::{Bus, SharedFrameBroadcaster};
use pvs_store::Store;

/// Shared axum state: one `Store` handle, one `Bus` handle, and a single
/// process-wide [`SharedFrameBroadcaster`] that fans the bus's per-camera
/// frame topics out to however many browsers are watching each camera
/// (spec.md §4.4).
pub struct AppState<S: Store, B: Bus> {
    pub store: Arc<S>,
    pub bus: Arc<B>,
    pub broadcaster: Arc<SharedFrameBroadcaster<B>>,
    pub default_event_page_size: i64,
    pub latest_frame_ttl: Duration,
}

impl<S: Store, B: Bus> Clone for AppState<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
            broadcaster: self.broadcaster.clone(),
            default_event_page_size: self.default_event_page_size,
            latest_frame_ttl: self.latest_frame_ttl,
        }
    }
}

impl<S: Store, B: Bus> AppState<S, B> {
    pub fn new(
        store: Arc<S>,
        bus: Arc<B>,
        broadcaster_queue_depth: usize,
        default_event_page_size: i64,
        latest_frame_ttl: Duration,
    ) -> Self {
        let broadcaster = Arc::new(SharedFrameBroadcaster::new(bus.clone(), broadcaster_queue_depth));
        Self {
            store,
            bus,
            broadcaster,
            default_event_page_size,
            latest_frame_ttl,
        }
    }
}
