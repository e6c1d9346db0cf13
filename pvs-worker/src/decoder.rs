use futures::future::BoxFuture;
use pvs_frame_source::{BoxFrameSource, FrameSourceError};

/// The decode seam spec.md §1 explicitly leaves out of scope ("RTSP
/// decoding treated as a frame source yielding decoded raster frames"):
/// every candidate URL fails to open, so the §4.1.1 fallback chain always
/// bottoms out at the test-pattern source. A real deployment wires an
/// `ffmpeg`/`gstreamer`-backed `FrameDecoderFactory` in here instead.
pub struct NullDecoder;

impl pvs_frame_source::FrameDecoderFactory for NullDecoder {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<BoxFrameSource, FrameSourceError>> {
        let url = url.to_string();
        Box::pin(async move {
            Err(FrameSourceError::Unavailable(format!(
                "no decoder backend configured for {url}"
            )))
        })
    }
}
