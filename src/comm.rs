//! Communication layer: NDJSON host event transport.
//!
//! The host writes one JSON event per line; replies (status reports) go back
//! as NDJSON on the same transport. Dispatch fans each command out to every
//! loaded plugin.

use crate::haptic::Haptic;
use crate::plugin::Plugin;
use crate::protocol::{HostCommand, MsgBuffer, PluginMessage, RawEvent, MAX_MSG_LEN, VERSION};

/// What the transport should do after a command has been handled.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Keep reading
    Continue,
    /// Write this line back to the host, then keep reading
    Reply(MsgBuffer),
    /// All plugins are unloaded; stop reading
    Exit,
}

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a PluginMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &PluginMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Deserialize a HostCommand from a JSON byte slice.
pub fn parse_command(data: &[u8]) -> Option<HostCommand> {
    let trimmed = trim_whitespace(data);
    if trimmed.is_empty() {
        return None;
    }
    serde_json_core::from_slice::<RawEvent>(trimmed)
        .ok()
        .and_then(|(raw, _)| raw.into_command())
}

/// Build the NDJSON status line for the haptic plugin.
pub fn status_line(haptic: &Haptic) -> Option<MsgBuffer> {
    let status = haptic.status();
    let msg = PluginMessage::Status {
        plugin: haptic.name(),
        loaded: status.loaded,
        switch: status.switch,
        pulsing: status.pulsing,
        version: VERSION,
    };
    let mut buf = [0u8; MAX_MSG_LEN];
    let len = serialize_message(&msg, &mut buf)?;
    MsgBuffer::from_slice(&buf[..len]).ok()
}

/// Process a host command against the haptic plugin and any other loaded
/// plugins.
pub fn handle_command(
    cmd: HostCommand,
    haptic: &mut Haptic,
    others: &mut [Box<dyn Plugin>],
) -> Outcome {
    match cmd {
        HostCommand::Lifecycle(event) => {
            log::debug!("event: {}", event);
            haptic.on_event(event);
            for plugin in others.iter() {
                plugin.on_event(event);
            }
            Outcome::Continue
        }
        HostCommand::UiUpdate => {
            haptic.on_ui_update();
            for plugin in others.iter() {
                plugin.on_ui_update();
            }
            Outcome::Continue
        }
        HostCommand::Status => match status_line(haptic) {
            Some(line) => Outcome::Reply(line),
            None => {
                log::warn!("status report did not fit in {} bytes", MAX_MSG_LEN);
                Outcome::Continue
            }
        },
        HostCommand::Unload => {
            haptic.on_unload();
            for plugin in others.iter_mut() {
                plugin.on_unload();
            }
            Outcome::Exit
        }
    }
}

// ── NDJSON line reader ─────────────────────────────────────────────────

/// NDJSON reader state machine.
/// Accumulates bytes until a newline is found, then yields the line.
pub struct LineReader {
    buf: [u8; MAX_MSG_LEN],
    pos: usize,
    overflowed: bool,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_MSG_LEN],
            pos: 0,
            overflowed: false,
        }
    }

    /// Feed a byte into the reader. Returns a complete line (without newline)
    /// when one is detected. Over-long lines are dropped whole.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' || byte == b'\r' {
            let complete = self.pos > 0 && !self.overflowed;
            let len = self.pos;
            self.pos = 0;
            self.overflowed = false;
            if complete {
                Some(&self.buf[..len])
            } else {
                None
            }
        } else if self.overflowed {
            None
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            None
        } else {
            log::warn!("host line longer than {} bytes dropped", MAX_MSG_LEN);
            self.pos = 0;
            self.overflowed = true;
            None
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_whitespace(data: &[u8]) -> &[u8] {
    let is_ws = |b: &u8| matches!(b, b' ' | b'\n' | b'\r' | b'\t');
    let start = data.iter().position(|b| !is_ws(b)).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !is_ws(b)).map_or(start, |i| i + 1);
    &data[start..end]
}
