use std::time::Duration;

/// Synthetic source id used by the backend for the user's query.
pub const INPUT_SOURCE: &str = "INPUT";

/// Timeline ring buffer capacity (most recent queries kept)
pub const HISTORY_CAPACITY: usize = 10;

/// How long a batch of activated units stays lit without re-trigger
pub const DEFAULT_DISPLAY_WINDOW: Duration = Duration::from_millis(3000);

/// Characters of query text kept in a timeline entry
pub const EXCERPT_CHARS: usize = 50;

/// Latency under this is nominal (ms)
pub const NOMINAL_LATENCY_MS: f64 = 50.0;

/// Latency under this (and not nominal) is elevated; at or above is degraded (ms)
pub const ELEVATED_LATENCY_MS: f64 = 100.0;

/// Camera transition length
pub const CAMERA_ANIMATION: Duration = Duration::from_millis(1500);

/// Idle auto-orbit angular rate: one revolution per 120 s (rad/s)
pub const AUTO_ORBIT_RATE: f64 = std::f64::consts::TAU / 120.0;

/// Default camera position, looking at the origin
pub const DEFAULT_CAMERA_POSITION: [f64; 3] = [0.0, 0.0, 6.0];

/// Extra distance the camera keeps from a selected unit, along the ray from the origin
pub const SELECTION_DISTANCE: f64 = 2.5;

/// Delay between the processing arpeggio and the ambient hum
pub const AMBIENT_HUM_DELAY: Duration = Duration::from_millis(200);

/// How long the ambient hum sustains before its fade
pub const AMBIENT_HUM_HOLD: Duration = Duration::from_millis(2000);

/// Default master volume for audio cues
pub const DEFAULT_VOLUME: f64 = 0.3;

/// Fallback color for units missing from the catalog
pub const FALLBACK_COLOR: &str = "#8B92A8";

/// Goal sent when the operator leaves it blank
pub const DEFAULT_GOAL: &str = "general query";
