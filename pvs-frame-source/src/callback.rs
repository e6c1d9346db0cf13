use crate::error::FrameSourceError;
use crate::frame::Frame;
use crate::source::{BoxFrameSource, FrameSource};
use futures::future::BoxFuture;

/// Opens a decoder for `url` and returns a `FrameSource` that yields its
/// decoded frames. RTSP/file decoding is out of scope (spec.md §1: "RTSP
/// decoding (treated as a frame source yielding decoded raster frames)");
/// this is the seam a real deployment plugs an `ffmpeg`/`gstreamer`-backed
/// decoder into.
pub trait FrameDecoderFactory: Send + Sync {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<BoxFrameSource, FrameSourceError>>;
}

impl<F> FrameDecoderFactory for F
where
    F: Fn(&str) -> BoxFuture<'static, Result<BoxFrameSource, FrameSourceError>> + Send + Sync,
{
    fn open(&self, url: &str) -> BoxFuture<'static, Result<BoxFrameSource, FrameSourceError>> {
        (self)(url)
    }
}

/// A `FrameSource` that always fails. Used as the decoder factory default
/// in contexts (tests, demos) with no real decode backend wired up, so the
/// §4.1.1 fallback chain still exercises its resolution order correctly.
pub struct UnavailableSource(pub String);

impl FrameSource for UnavailableSource {
    fn read_frame(&mut self) -> BoxFuture<'_, Result<Frame, FrameSourceError>> {
        let reason = self.0.clone();
        Box::pin(async move { Err(FrameSourceError::Unavailable(reason)) })
    }
}
