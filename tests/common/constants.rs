//! Shared constants for integration tests

// ============================================================================
// Library paths
// ============================================================================

pub const TRACK_A: &str = "/music/Artist - First Song.mp3";

pub const TRACK_B: &str = "/music/Artist - Second Song.mp3";

pub const TRACK_C: &str = "/music/Other Artist - Third Song.mp3";

// ============================================================================
// Manual URLs
// ============================================================================

pub const TIDAL_URL: &str = "https://tidal.com/browse/track/12345";

pub const SOUNDCLOUD_URL: &str = "https://soundcloud.com/artist/first-song";
