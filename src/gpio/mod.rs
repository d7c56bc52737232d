//! GPIO capability layer.
//!
//! Hardware access goes through [`GpioBackend`], a narrow per-pin capability
//! (configure, read, write, watch edges, release) implemented by the host
//! binary on top of the real driver and by [`mock::MockGpio`] in tests.
//!
//! [`Gpio`] is the pin arena: every line is claimed through it, so no two
//! components can configure the same pin, and each [`GpioLine`] releases its
//! pin exactly once, either explicitly or on drop.

pub mod mock;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::lock;

/// Pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Input pull resistor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
    Down,
}

/// Which electrical level means "on".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    pub fn from_active_high(active_high: bool) -> Self {
        if active_high {
            Polarity::ActiveHigh
        } else {
            Polarity::ActiveLow
        }
    }

    /// Convert a raw electrical level into a logical on/off state.
    #[inline]
    pub fn apply(self, raw_high: bool) -> bool {
        match self {
            Polarity::ActiveHigh => raw_high,
            Polarity::ActiveLow => !raw_high,
        }
    }
}

/// Edge selection for interrupt-driven notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    /// Whether a transition from `was_high` to `now_high` is selected.
    pub fn matches(self, was_high: bool, now_high: bool) -> bool {
        if was_high == now_high {
            return false;
        }
        match self {
            Edge::Rising => now_high,
            Edge::Falling => !now_high,
            Edge::Both => true,
        }
    }
}

/// A configured pin. Immutable once the line owning it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin {
    pub number: u8,
    pub direction: Direction,
    pub pull: Pull,
}

/// Edge callback. Receives the raw level after the edge and runs in the
/// driver's interrupt-delivery context, so it must not block.
pub type EdgeCallback = Box<dyn FnMut(bool) + Send + 'static>;

/// Per-pin hardware capability supplied by the platform.
///
/// Implementations must be callable from any thread.
pub trait GpioBackend: Send + Sync {
    /// Configure `pin` as an input with the given pull resistor.
    fn setup_input(&self, pin: u8, pull: Pull) -> Result<()>;

    /// Configure `pin` as a push-pull output, initially LOW.
    fn setup_output(&self, pin: u8) -> Result<()>;

    /// Read the raw electrical level.
    fn read(&self, pin: u8) -> Result<bool>;

    /// Drive an output pin.
    fn write(&self, pin: u8, high: bool) -> Result<()>;

    /// Register an edge callback. `debounce` is a driver-level hint only.
    fn watch(
        &self,
        pin: u8,
        edge: Edge,
        debounce: Option<Duration>,
        callback: EdgeCallback,
    ) -> Result<()>;

    /// Return the pin to its reset state and drop any edge callback.
    fn cleanup(&self, pin: u8) -> Result<()>;
}

type Claims = Arc<Mutex<BTreeSet<u8>>>;

/// Pin arena. Cheap to clone; clones share the same claims.
#[derive(Clone)]
pub struct Gpio {
    backend: Arc<dyn GpioBackend>,
    claimed: Claims,
}

impl Gpio {
    pub fn new(backend: Arc<dyn GpioBackend>) -> Self {
        Self {
            backend,
            claimed: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// Whether some live line currently owns `pin`.
    pub fn is_claimed(&self, pin: u8) -> bool {
        lock(&self.claimed).contains(&pin)
    }

    /// Claim `pin` and configure it as an input.
    pub fn input(&self, pin: u8, pull: Pull) -> Result<GpioLine> {
        self.claim(pin)?;
        if let Err(e) = self.backend.setup_input(pin, pull) {
            lock(&self.claimed).remove(&pin);
            return Err(e);
        }
        Ok(self.line(Pin {
            number: pin,
            direction: Direction::Input,
            pull,
        }))
    }

    /// Claim `pin` and configure it as an output driven LOW.
    pub fn output(&self, pin: u8) -> Result<GpioLine> {
        self.claim(pin)?;
        if let Err(e) = self.backend.setup_output(pin) {
            lock(&self.claimed).remove(&pin);
            return Err(e);
        }
        Ok(self.line(Pin {
            number: pin,
            direction: Direction::Output,
            pull: Pull::None,
        }))
    }

    fn claim(&self, pin: u8) -> Result<()> {
        if lock(&self.claimed).insert(pin) {
            Ok(())
        } else {
            Err(Error::PinInUse { pin })
        }
    }

    fn line(&self, pin: Pin) -> GpioLine {
        GpioLine {
            pin,
            backend: Arc::clone(&self.backend),
            claimed: Arc::clone(&self.claimed),
            released: AtomicBool::new(false),
        }
    }
}

/// Exclusive handle to one configured pin.
pub struct GpioLine {
    pin: Pin,
    backend: Arc<dyn GpioBackend>,
    claimed: Claims,
    released: AtomicBool,
}

impl GpioLine {
    pub fn pin(&self) -> Pin {
        self.pin
    }

    pub fn number(&self) -> u8 {
        self.pin.number
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Read the raw level.
    pub fn read_level(&self) -> Result<bool> {
        self.ensure_live()?;
        self.backend.read(self.pin.number)
    }

    /// Drive the line. Only valid on outputs.
    pub fn write_level(&self, high: bool) -> Result<()> {
        self.ensure_live()?;
        if self.pin.direction != Direction::Output {
            return Err(Error::WrongDirection {
                pin: self.pin.number,
                expected: "output",
            });
        }
        self.backend.write(self.pin.number, high)
    }

    /// Register an edge callback. Only valid on inputs.
    pub fn on_edge(
        &self,
        edge: Edge,
        debounce_hint: Option<Duration>,
        callback: EdgeCallback,
    ) -> Result<()> {
        self.ensure_live()?;
        if self.pin.direction != Direction::Input {
            return Err(Error::WrongDirection {
                pin: self.pin.number,
                expected: "input",
            });
        }
        self.backend
            .watch(self.pin.number, edge, debounce_hint, callback)
    }

    /// Release the pin back to the platform. Idempotent.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.backend.cleanup(self.pin.number) {
            log::warn!("GPIO{} cleanup failed: {}", self.pin.number, e);
        }
        lock(&self.claimed).remove(&self.pin.number);
        log::debug!("GPIO{} released", self.pin.number);
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            Err(Error::Released {
                pin: self.pin.number,
            })
        } else {
            Ok(())
        }
    }
}

impl Drop for GpioLine {
    fn drop(&mut self) {
        self.release();
    }
}
