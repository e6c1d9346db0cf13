//! The frontend-side relay (spec.md §1, §4.4): MJPEG frame fan-out via
//! [`pvs_bus::SharedFrameBroadcaster`], server-sent event relay per
//! organization, and thin REST reads over the `Store`. The HTML dashboard,
//! authentication, and session handling are explicitly out of scope
//! (spec.md §1) and have no counterpart here; the binary entry point lives
//! in `main.rs`.

mod config;
mod error;
mod mjpeg;
mod placeholder;
mod rest;
mod router;
mod sse;
mod state;

pub use config::FrontendConfig;
pub use error::FrontendError;
pub use router::router;
pub use state::AppState;
