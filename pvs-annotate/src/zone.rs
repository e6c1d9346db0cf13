use ab_glyph::FontRef;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use lru::LruCache;
use pvs_types::{Detection, DetectionClass, ZonePolygon};
use std::num::NonZeroUsize;

use crate::style::{self, BLUE, GREEN, RED};

const FILL_ALPHA: f32 = 0.2;

/// Interior pixels of a zone polygon at a given frame size, cached so the
/// scanline fill only runs once per distinct (size, polygon) combination
/// instead of every frame (spec.md §4.3 supplement).
pub struct ZoneOverlayCache {
    cache: LruCache<(u32, u32, String), Vec<(u32, u32)>>,
}

impl ZoneOverlayCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
        }
    }

    fn interior(&mut self, width: u32, height: u32, polygon: &ZonePolygon) -> &Vec<(u32, u32)> {
        let key = (width, height, polygon_key(polygon));
        if !self.cache.contains(&key) {
            let points = scan_interior(width, height, polygon);
            self.cache.put(key.clone(), points);
        }
        self.cache.get(&key).expect("just inserted")
    }
}

fn polygon_key(polygon: &ZonePolygon) -> String {
    polygon
        .0
        .iter()
        .map(|(x, y)| format!("{:.2},{:.2}", x, y))
        .collect::<Vec<_>>()
        .join(";")
}

fn scan_interior(width: u32, height: u32, polygon: &ZonePolygon) -> Vec<(u32, u32)> {
    let mut points = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if polygon.contains((x as f32, y as f32)) {
                points.push((x, y));
            }
        }
    }
    points
}

/// Draws the zone-violation overlay (spec.md §4.1.2, grounded on
/// `app/worker/vision.py::annotate_zone`): a translucent polygon fill plus a
/// per-person box and centroid dot, red if the centroid is inside the zone.
pub fn annotate_zone(
    image: &mut RgbImage,
    detections: &[Detection],
    polygon: &ZonePolygon,
    overlay_cache: &mut ZoneOverlayCache,
    font: Option<&FontRef<'static>>,
) {
    let (width, height) = (image.width(), image.height());
    let interior = overlay_cache.interior(width, height, polygon).clone();
    blend_fill(image, &interior, BLUE, FILL_ALPHA);
    draw_outline(image, polygon, BLUE);

    for person in detections.iter().filter(|d| d.class_id == DetectionClass::Person.id()) {
        let centroid = person.bbox.centroid();
        let in_zone = polygon.contains(centroid);
        let (color, label) = if in_zone { (RED, "VIOLATION") } else { (GREEN, "OK") };

        style::draw_box_with_label(image, &person.bbox, color, label, font);
        draw_filled_circle_mut(image, (centroid.0 as i32, centroid.1 as i32), 5, color);
    }
}

fn blend_fill(image: &mut RgbImage, points: &[(u32, u32)], color: Rgb<u8>, alpha: f32) {
    for &(x, y) in points {
        if x < image.width() && y < image.height() {
            let px = image.get_pixel_mut(x, y);
            for c in 0..3 {
                px.0[c] = (px.0[c] as f32 * (1.0 - alpha) + color.0[c] as f32 * alpha) as u8;
            }
        }
    }
}

fn draw_outline(image: &mut RgbImage, polygon: &ZonePolygon, color: Rgb<u8>) {
    let verts = &polygon.0;
    if verts.len() < 2 {
        return;
    }
    let n = verts.len();
    for i in 0..n {
        let (x1, y1) = verts[i];
        let (x2, y2) = verts[(i + 1) % n];
        imageproc::drawing::draw_line_segment_mut(image, (x1, y1), (x2, y2), color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvs_types::BBox;

    fn square() -> ZonePolygon {
        ZonePolygon(vec![(10.0, 10.0), (60.0, 10.0), (60.0, 60.0), (10.0, 60.0)])
    }

    #[test]
    fn overlay_cache_hits_on_repeated_polygon() {
        let mut cache = ZoneOverlayCache::new(4);
        let poly = square();
        let first = cache.interior(100, 100, &poly).clone();
        let second = cache.interior(100, 100, &poly).clone();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn person_inside_zone_is_violation() {
        let mut image = RgbImage::new(100, 100);
        let mut cache = ZoneOverlayCache::new(4);
        let poly = square();
        let inside = Detection::new(BBox { x1: 20, y1: 20, x2: 40, y2: 40 }, DetectionClass::Person, 0.9);
        annotate_zone(&mut image, &[inside], &poly, &mut cache, None);
        assert!(poly.contains((30.0, 30.0)));
    }
}
