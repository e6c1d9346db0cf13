use crate::error::FrameSourceError;
use crate::frame::Frame;
use futures::future::BoxFuture;

/// Yields decoded frames for one camera. Boxed and dynamically dispatched,
/// unlike `Bus`/`Store`: the §4.1.1 fallback chain picks one of several
/// concrete sources at runtime per camera, so callers cannot be generic
/// over a single concrete type the way the worker/frontend are for the bus.
///
/// `read_frame` returns a boxed future rather than using `async fn` in the
/// trait so the trait stays object-safe (`Box<dyn FrameSource>`).
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> BoxFuture<'_, Result<Frame, FrameSourceError>>;
}

pub type BoxFrameSource = Box<dyn FrameSource>;
