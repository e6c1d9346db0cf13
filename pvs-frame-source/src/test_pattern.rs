use crate::error::FrameSourceError;
use crate::font::load_system_font;
use crate::frame::Frame;
use crate::source::FrameSource;
use ab_glyph::{FontRef, PxScale};
use futures::future::BoxFuture;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use std::time::{Duration, Instant};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Fallback source used when nothing else resolves (spec.md §4.1.4): a
/// synthesized gradient frame containing "DEMO MODE" and an increasing
/// frame counter, emitted at no more than 1 Hz. A valid source for every
/// downstream stage (inference, annotation, publish).
pub struct TestPatternSource {
    width: u32,
    height: u32,
    counter: u64,
    last_emitted: Option<Instant>,
    font: Option<FontRef<'static>>,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            counter: 0,
            last_emitted: None,
            font: load_system_font(),
        }
    }

    fn render(&self) -> RgbImage {
        let mut image = RgbImage::new(self.width, self.height);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let r = (255.0 * x as f32 / self.width.max(1) as f32) as u8;
            let g = (255.0 * y as f32 / self.height.max(1) as f32) as u8;
            *pixel = Rgb([r, g, 128]);
        }

        // Degrades to a bare gradient if no system font is found; the
        // gradient plus frame counter still makes this a valid source for
        // every downstream stage even without text.
        if let Some(font) = &self.font {
            let scale = PxScale::from(24.0);
            draw_text_mut(&mut image, Rgb([255, 255, 255]), 10, 10, scale, font, "DEMO MODE");
            draw_text_mut(
                &mut image,
                Rgb([255, 255, 255]),
                10,
                40,
                scale,
                font,
                &format!("frame {}", self.counter),
            );
        }
        image
    }
}

impl FrameSource for TestPatternSource {
    fn read_frame(&mut self) -> BoxFuture<'_, Result<Frame, FrameSourceError>> {
        Box::pin(async move {
            if let Some(last) = self.last_emitted {
                let elapsed = last.elapsed();
                if elapsed < MIN_INTERVAL {
                    tokio::time::sleep(MIN_INTERVAL - elapsed).await;
                }
            }
            self.counter += 1;
            self.last_emitted = Some(Instant::now());
            Ok(Frame::new(self.render()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_incrementing_counter() {
        let mut source = TestPatternSource::new(64, 48);
        let first = source.read_frame().await.unwrap();
        assert_eq!(first.width(), 64);
        assert_eq!(source.counter, 1);
    }
}
