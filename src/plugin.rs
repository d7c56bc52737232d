//! Host plugin lifecycle interface.
//!
//! The host owns discovery, loading and event dispatch; a plugin only supplies
//! the hook bodies. Hooks return `()`: a plugin logs its own failures and
//! never hands an error back to the dispatcher.

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use crate::defaults;
use crate::display::StatusDisplay;
use crate::options::Options;

/// Device lifecycle events that can trigger feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleEvent {
    /// Plugin finished loading (also replayed when the switch turns on)
    Loaded,
    /// WPA handshake captured
    Handshake,
    /// Client association sent
    Association,
    /// Client deauthentication sent
    Deauthentication,
    /// Another unit seen nearby
    PeerDetected,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 5] = [
        LifecycleEvent::Loaded,
        LifecycleEvent::Handshake,
        LifecycleEvent::Association,
        LifecycleEvent::Deauthentication,
        LifecycleEvent::PeerDetected,
    ];

    /// Short event name used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            LifecycleEvent::Loaded => "loaded",
            LifecycleEvent::Handshake => "handshake",
            LifecycleEvent::Association => "association",
            LifecycleEvent::Deauthentication => "deauthentication",
            LifecycleEvent::PeerDetected => "peer_detected",
        }
    }

    /// Config key holding this event's pulse duration.
    pub fn config_key(self) -> &'static str {
        match self {
            LifecycleEvent::Loaded => "on_loaded",
            LifecycleEvent::Handshake => "on_handshake",
            LifecycleEvent::Association => "on_association",
            LifecycleEvent::Deauthentication => "on_deauthentication",
            LifecycleEvent::PeerDetected => "on_peer_detected",
        }
    }

    /// Compiled-in pulse duration in seconds.
    pub fn default_duration(self) -> f32 {
        defaults::default_duration(self.config_key()).unwrap_or(0.0)
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognised lifecycle event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent;

impl FromStr for LifecycleEvent {
    type Err = UnknownEvent;

    /// Accepts the wire name, the config key, and the host's hyphenated
    /// event names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix("on_").unwrap_or(name);
        match name {
            "loaded" | "load" => Ok(LifecycleEvent::Loaded),
            "handshake" | "handshake-captured" => Ok(LifecycleEvent::Handshake),
            "association" | "client-associated" => Ok(LifecycleEvent::Association),
            "deauthentication" | "client-deauthenticated" => {
                Ok(LifecycleEvent::Deauthentication)
            }
            "peer_detected" | "peer-detected" => Ok(LifecycleEvent::PeerDetected),
            _ => Err(UnknownEvent),
        }
    }
}

/// Plugin load state. Unload is only meaningful from `Loaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Unloaded,
    Loaded,
}

/// Lifecycle hooks invoked by the host.
pub trait Plugin: Send {
    /// Config section name under `main.plugins`.
    fn name(&self) -> &'static str;

    fn state(&self) -> PluginState;

    /// Validate `options` and claim hardware.
    fn on_loaded(&mut self, options: &Options);

    /// The display is ready; place any elements.
    fn on_ui_setup(&mut self, _display: Arc<dyn StatusDisplay>) {}

    /// Called on every display refresh.
    fn on_ui_update(&self) {}

    fn on_event(&self, _event: LifecycleEvent) {}

    /// Release hardware and display elements. No-op unless loaded.
    fn on_unload(&mut self);
}
