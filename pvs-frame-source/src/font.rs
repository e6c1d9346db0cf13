use ab_glyph::FontRef;

/// Common DejaVu Sans install locations across mainstream distros. No font
/// is bundled in this crate; annotation degrades to boxes/fills without
/// labels if none of these are present (matching `pvs-annotate`'s loader).
const CANDIDATE_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
];

pub fn load_system_font() -> Option<FontRef<'static>> {
    for path in CANDIDATE_PATHS {
        if let Ok(bytes) = std::fs::read(path) {
            let leaked: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if let Ok(font) = FontRef::try_from_slice(leaked) {
                return Some(font);
            }
        }
    }
    None
}
