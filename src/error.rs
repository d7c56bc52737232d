//! Error types for the haptic control core.
//!
//! Every variant maps onto one of three kinds: configuration problems abort a
//! load, resource problems are caught where the pin is touched, and value
//! problems fall back to a compiled-in default.

use thiserror::Error;

/// Result type for fallible control-core operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Coarse error classification used by callers to decide how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid setting; the feature is disabled.
    Configuration,
    /// GPIO access on a released or unavailable pin.
    Resource,
    /// Unparseable or out-of-range configured value; a default is used.
    Value,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("missing required option `{key}`")]
    MissingOption { key: &'static str },

    #[error("invalid value for option `{key}`: {value}")]
    InvalidOption { key: String, value: String },

    #[error("GPIO{pin} is already configured")]
    PinInUse { pin: u8 },

    #[error("GPIO{pin} is not configured as {expected}")]
    WrongDirection { pin: u8, expected: &'static str },

    #[error("GPIO{pin} has been released")]
    Released { pin: u8 },

    #[error("GPIO{pin} backend error: {reason}")]
    Backend { pin: u8, reason: String },

    #[error("failed to spawn {name} worker: {reason}")]
    Spawn { name: &'static str, reason: String },

    #[error("invalid duration for `{key}`: {value}")]
    InvalidDuration { key: String, value: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingOption { .. }
            | Error::InvalidOption { .. }
            | Error::PinInUse { .. }
            | Error::WrongDirection { .. } => ErrorKind::Configuration,
            Error::Released { .. } | Error::Backend { .. } | Error::Spawn { .. } => {
                ErrorKind::Resource
            }
            Error::InvalidDuration { .. } => ErrorKind::Value,
        }
    }

    /// Wrap a driver error for `pin`.
    pub fn backend(pin: u8, reason: impl core::fmt::Display) -> Self {
        Error::Backend {
            pin,
            reason: reason.to_string(),
        }
    }
}
