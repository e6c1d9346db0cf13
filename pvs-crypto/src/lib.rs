//! Credential encryption and RTSP URL construction for camera sources
//! (spec.md §6.1).

pub mod credential;
pub mod rtsp;

pub use credential::{CredentialCipher, CredentialError};
pub use rtsp::build_rtsp_url;
