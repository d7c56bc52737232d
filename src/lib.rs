//! Haptic library: GPIO control core for WiFi-auditing companion devices.
//!
//! Turns device lifecycle events (plugin loaded, handshake captured, client
//! associated or deauthenticated, peer detected) into short buzzes of a
//! vibration motor, optionally gated by a debounced feedback switch, and
//! signals a status icon to the host display. Everything here is testable on
//! any host with `cargo test`; the Raspberry Pi binary in `rpi-std/` is a thin
//! consumer that supplies the GPIO driver, the config file and the event feed.
//!
//! The library is organized bottom-up:
//! - **Hardware**: `gpio` (capability trait, pin arena, mock backend),
//!   `switch`, `actuator`.
//! - **Configuration**: `options`, `defaults`, `binding`.
//! - **Host boundary**: `plugin`, `display`, `protocol`, `comm`.
//! - **Plugins**: `haptic`, `shutdown`.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod actuator;
pub mod binding;
pub mod comm;
pub mod defaults;
pub mod display;
pub mod error;
pub mod gpio;
pub mod haptic;
pub mod options;
pub mod plugin;
pub mod protocol;
pub mod shutdown;
pub mod switch;

pub use error::{Error, ErrorKind, Result};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate leaves its data consistent between
/// statements, so a poisoned lock is still safe to use.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
