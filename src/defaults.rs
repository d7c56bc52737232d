//! Compiled-in defaults for the haptic plugins.
//!
//! Duration bounds and per-event buzz times are the shipped defaults; the
//! config file may override each duration.

use core::time::Duration;

/// Shortest accepted pulse duration, in seconds. Zero disables the event.
pub const MIN_DURATION: f32 = 0.0;

/// Longest accepted pulse duration, in seconds.
pub const MAX_DURATION: f32 = 2.0;

/// Default buzz time per lifecycle event (config key, seconds).
pub static DEFAULT_DURATIONS: &[(&str, f32)] = &[
    ("on_loaded", 0.25),
    ("on_handshake", 0.25),
    ("on_association", 0.10),
    ("on_deauthentication", 0.75),
    ("on_peer_detected", 1.50),
];

/// Settle window for the feedback switch.
pub const SWITCH_DEBOUNCE: Duration = Duration::from_millis(750);

/// Upper bound on the debounce hint handed to the GPIO driver. The logical
/// debounce in `switch` does the real filtering.
pub const EDGE_DEBOUNCE_HINT: Duration = Duration::from_millis(50);

/// Plugin name, also used as the config section and display element key.
pub const PLUGIN_NAME: &str = "haptic";

/// Config section of the shutdown plugin.
pub const SHUTDOWN_PLUGIN_NAME: &str = "gpio_shutdown";

/// Directory, relative to the plugin, holding the pre-rendered icons.
pub const ICONS_DIR: &str = "haptic_icons";

/// Icon edge length in pixels.
pub const ICON_SIZE: u32 = 15;

/// Look up the compiled-in default for a config key.
pub fn default_duration(config_key: &str) -> Option<f32> {
    DEFAULT_DURATIONS
        .iter()
        .find(|(key, _)| *key == config_key)
        .map(|&(_, secs)| secs)
}
