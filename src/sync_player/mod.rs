//! Sync player module
//!
//! Keeps a reference and a candidate track playing in phase so the audible
//! one can be switched without a seek.

mod drift;
mod media;
mod player;
mod session;
mod virtual_media;

pub use drift::{Correction, DriftPolicy};
pub use media::{MediaHandle, Track};
pub use player::{PlaybackSnapshot, SyncPlayer, TickOutcome};
pub use session::{CorrectionTimer, SyncSession};
pub use virtual_media::VirtualMedia;
