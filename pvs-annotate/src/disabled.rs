use ab_glyph::{FontRef, PxScale};
use image::RgbImage;
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::style::WHITE;

const BANNER_TEXT: &str = "AI DISABLED";
const BANNER_BG: image::Rgb<u8> = image::Rgb([60, 60, 60]);

/// Stamps a centered banner on frames from cameras with inference turned
/// off, so the stream still shows *why* no boxes are drawn.
pub fn annotate_disabled(image: &mut RgbImage, font: Option<&FontRef<'static>>) {
    let Some(font) = font else { return };
    let scale = PxScale::from(28.0);
    let text_w = (BANNER_TEXT.len() as u32) * 16;
    let text_h = 36;
    let x = (image.width().saturating_sub(text_w)) / 2;
    let y = (image.height().saturating_sub(text_h)) / 2;

    let rect = Rect::at(x as i32, y as i32).of_size(text_w.max(1), text_h);
    draw_filled_rect_mut(image, rect, BANNER_BG);
    draw_text_mut(image, WHITE, x as i32 + 8, y as i32 + 4, scale, font, BANNER_TEXT);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_drawing_without_a_font() {
        let mut image = RgbImage::new(50, 50);
        let before = image.clone();
        annotate_disabled(&mut image, None);
        assert_eq!(image, before);
    }
}
