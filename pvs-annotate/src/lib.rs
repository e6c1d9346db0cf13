//! Frame annotation and thumbnail generation (spec.md §4.1.2, §4.3 step 3):
//! PPE-compliance boxes, zone-violation overlays, the "AI disabled" banner,
//! and event thumbnails, all built on `imageproc`/`ab_glyph` in place of the
//! original's OpenCV drawing calls.

mod disabled;
mod error;
mod ppe;
mod style;
mod thumbnail;
mod zone;

pub use disabled::annotate_disabled;
pub use error::AnnotateError;
pub use ppe::annotate_ppe;
pub use style::{draw_box_with_label, BLUE, GREEN, RED, WHITE, YELLOW};
pub use thumbnail::generate_thumbnail;
pub use zone::{annotate_zone, ZoneOverlayCache};

pub use pvs_frame_source::load_system_font;
