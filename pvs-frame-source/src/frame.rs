use image::RgbImage;
use std::time::Instant;

/// A single decoded raster frame (spec.md §1: "RTSP decoding treated as a
/// frame source yielding decoded raster frames"). `captured_at` is the wall
/// time the source produced it, used for the stream-FPS EMA (§4.1 step 8).
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
