//! HTTP API handlers for mvault
//!
//! REST endpoints plus one SSE stream that carries every `VaultEvent`.

pub mod health;
pub mod playback;
pub mod session;
pub mod sse;
pub mod tracks;
pub mod uploads;

pub use health::health_routes;
pub use playback::playback_routes;
pub use session::session_routes;
pub use sse::event_stream;
pub use tracks::track_routes;
pub use uploads::upload_routes;
