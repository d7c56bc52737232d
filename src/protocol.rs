//! JSON message protocol between the host event feed and the plugins.
//!
//! All messages are newline-delimited JSON (NDJSON). The host sends one
//! `{"event": ...}` object per line; the plugin side answers status requests.
//! Uses `heapless` types so messages are built without allocation.

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::plugin::LifecycleEvent;

/// Maximum length of an event name on the wire
pub type EventName = String<32>;

/// Messages sent from the plugins to the host
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum PluginMessage<'a> {
    /// Plugin status report
    #[serde(rename = "status")]
    Status {
        /// Plugin name
        plugin: &'a str,
        /// Whether the plugin holds its GPIO lines
        loaded: bool,
        /// Logical switch state, omitted when no switch is configured
        #[serde(skip_serializing_if = "Option::is_none")]
        switch: Option<bool>,
        /// Whether the motor is currently running
        pulsing: bool,
        /// Library version
        version: &'static str,
    },
}

/// Commands sent from the host to the plugins.
///
/// Deserialized via [`RawEvent`] in `comm::parse_command()`: the wire format
/// is a single string field, mapped onto variants by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// A lifecycle event that may trigger feedback
    Lifecycle(LifecycleEvent),
    /// Display refresh tick
    UiUpdate,
    /// Request a status report
    Status,
    /// Unload every plugin and stop
    Unload,
}

/// Wire format for host commands. Converted to [`HostCommand`] in
/// `comm::parse_command()`.
#[derive(Deserialize)]
pub(crate) struct RawEvent {
    pub event: EventName,
}

impl RawEvent {
    pub(crate) fn into_command(self) -> Option<HostCommand> {
        match self.event.as_str() {
            "ui_update" | "on_ui_update" => Some(HostCommand::UiUpdate),
            "status" => Some(HostCommand::Status),
            "unload" | "on_unload" => Some(HostCommand::Unload),
            name => name.parse().ok().map(HostCommand::Lifecycle),
        }
    }
}

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 256;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;
