use std::sync::OnceLock;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// A flat slate-grey frame substituted for the real stream when no frame
/// has reached `latest_frame/<camera_id>` within its TTL (spec.md §7
/// "User-visible failure behavior"). Built once and reused for every
/// camera: it carries no per-camera state, just the fact that nothing is
/// currently available.
pub fn placeholder_jpeg() -> Bytes {
    static FRAME: OnceLock<Bytes> = OnceLock::new();
    FRAME
        .get_or_init(|| {
            let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([40, 40, 44]));
            for x in 0..WIDTH {
                image.put_pixel(x, HEIGHT / 2, Rgb([90, 90, 96]));
            }
            for y in 0..HEIGHT {
                image.put_pixel(WIDTH / 2, y, Rgb([90, 90, 96]));
            }

            let mut bytes = Vec::new();
            JpegEncoder::new_with_quality(&mut bytes, 70)
                .encode_image(&image)
                .expect("jpeg encoding of an in-memory RgbImage cannot fail");
            Bytes::from(bytes)
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_valid_jpeg_bytes() {
        let bytes = placeholder_jpeg();
        assert!(bytes.starts_with(&[0xFF, 0xD8]));
    }
}
