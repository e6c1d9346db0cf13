use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use pvs_types::BBox;

pub const GREEN: Rgb<u8> = Rgb([0, 200, 0]);
pub const RED: Rgb<u8> = Rgb([220, 30, 30]);
pub const YELLOW: Rgb<u8> = Rgb([220, 200, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLUE: Rgb<u8> = Rgb([40, 90, 220]);

/// Draws a bounding box with an optional label banner above it, matching
/// `app/worker/vision.py::draw_box`'s shape (a filled label background plus
/// white text) rendered with `imageproc`/`ab_glyph` instead of OpenCV.
pub fn draw_box_with_label(
    image: &mut RgbImage,
    bbox: &BBox,
    color: Rgb<u8>,
    label: &str,
    font: Option<&FontRef<'static>>,
) {
    let rect = clamp_rect(bbox, image.width(), image.height());
    draw_hollow_rect_mut(image, rect, color);

    if label.is_empty() {
        return;
    }
    if let Some(font) = font {
        let scale = PxScale::from(16.0);
        let text_w = (label.len() as i32) * 9 + 6;
        let x = bbox.x1.max(0);
        let y = (bbox.y1 - 18).max(0);
        let label_rect = Rect::at(x, y).of_size(text_w.max(1) as u32, 16);
        draw_filled_rect_mut(image, label_rect, color);
        draw_text_mut(image, WHITE, x + 2, y, scale, font, label);
    }
}

/// Clamps a bbox to the image bounds before it is handed to `imageproc`,
/// which panics on an out-of-range or zero-size rect.
fn clamp_rect(bbox: &BBox, width: u32, height: u32) -> Rect {
    let x1 = bbox.x1.clamp(0, width as i32);
    let y1 = bbox.y1.clamp(0, height as i32);
    let x2 = bbox.x2.clamp(0, width as i32);
    let y2 = bbox.y2.clamp(0, height as i32);
    let w = (x2 - x1).max(1) as u32;
    let h = (y2 - y1).max(1) as u32;
    Rect::at(x1, y1).of_size(w, h)
}
