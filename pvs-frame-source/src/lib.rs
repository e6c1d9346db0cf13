//! Frame sources (spec.md §4.1.1, §4.1.4): the §4.1.1 fallback chain, the
//! always-available test-pattern generator, and the pluggable decode seam
//! real RTSP/file decoding plugs into (out of scope per spec.md §1).

mod callback;
mod error;
mod font;
mod frame;
mod resolve;
mod source;
mod test_pattern;

pub use callback::{FrameDecoderFactory, UnavailableSource};
pub use error::FrameSourceError;
pub use font::load_system_font;
pub use frame::Frame;
pub use resolve::{resolve_source, SourceResolutionOptions};
pub use source::{BoxFrameSource, FrameSource};
pub use test_pattern::TestPatternSource;
