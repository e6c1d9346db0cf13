use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, RgbImage};
use pvs_types::BBox;
use std::path::{Path, PathBuf};

use crate::error::AnnotateError;

const CROP_PADDING: i32 = 50;
const MAX_DIM: u32 = 640;
const JPEG_QUALITY: u8 = 70;

/// Crops around `bbox` with padding, downsamples to at most 640px on the
/// long side, and writes a JPEG thumbnail named `<event_id>.jpg` under
/// `output_dir` (spec.md §4.3 step 3, grounded on
/// `app/worker/frame_publisher.py::ThumbnailGenerator.generate`).
pub fn generate_thumbnail(
    frame: &RgbImage,
    event_id: &str,
    bbox: Option<&BBox>,
    output_dir: &Path,
) -> Result<PathBuf, AnnotateError> {
    let cropped = match bbox {
        Some(bbox) => crop_with_padding(frame, bbox),
        None => frame.clone(),
    };
    let resized = downscale_to_max_dim(&cropped, MAX_DIM);

    let path = output_dir.join(format!("{event_id}.jpg"));
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(&resized)?;

    std::fs::write(&path, &bytes).map_err(|source| AnnotateError::Write {
        path: path.display().to_string(),
        source,
    })?;

    Ok(path)
}

fn crop_with_padding(frame: &RgbImage, bbox: &BBox) -> RgbImage {
    let (w, h) = frame.dimensions();
    let x1 = (bbox.x1 - CROP_PADDING).clamp(0, w as i32) as u32;
    let y1 = (bbox.y1 - CROP_PADDING).clamp(0, h as i32) as u32;
    let x2 = (bbox.x2 + CROP_PADDING).clamp(0, w as i32) as u32;
    let y2 = (bbox.y2 + CROP_PADDING).clamp(0, h as i32) as u32;
    let crop_w = x2.saturating_sub(x1).max(1).min(w - x1);
    let crop_h = y2.saturating_sub(y1).max(1).min(h - y1);
    frame.view(x1, y1, crop_w, crop_h).to_image()
}

fn downscale_to_max_dim(image: &RgbImage, max_dim: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if longest <= max_dim {
        return image.clone();
    }
    let scale = max_dim as f32 / longest as f32;
    let new_w = ((w as f32) * scale).round().max(1.0) as u32;
    let new_h = ((h as f32) * scale).round().max(1.0) as u32;
    image::imageops::resize(image, new_w, new_h, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_clamps_to_frame_bounds() {
        let frame = RgbImage::new(100, 100);
        let bbox = BBox { x1: 0, y1: 0, x2: 20, y2: 20 };
        let cropped = crop_with_padding(&frame, &bbox);
        assert!(cropped.width() <= 100 && cropped.height() <= 100);
    }

    #[test]
    fn downscale_preserves_small_images() {
        let image = RgbImage::new(100, 50);
        let result = downscale_to_max_dim(&image, 640);
        assert_eq!(result.dimensions(), (100, 50));
    }

    #[test]
    fn downscale_shrinks_large_images_to_max_dim() {
        let image = RgbImage::new(1280, 640);
        let result = downscale_to_max_dim(&image, 640);
        assert_eq!(result.width(), 640);
        assert_eq!(result.height(), 320);
    }

    #[test]
    fn generate_writes_a_jpeg_file() {
        let dir = std::env::temp_dir().join("pvs-annotate-thumb-test");
        std::fs::create_dir_all(&dir).unwrap();
        let frame = RgbImage::new(100, 100);
        let bbox = BBox { x1: 10, y1: 10, x2: 30, y2: 30 };
        let path = generate_thumbnail(&frame, "evt-1", Some(&bbox), &dir).unwrap();
        assert!(path.exists());
        std::fs::remove_file(path).ok();
    }
}
