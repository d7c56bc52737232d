//! In-memory GPIO backend.
//!
//! Tracks level, mode and every write per pin so tests (and the host's
//! `--dry-run` mode) can verify output timing without hardware. Input levels
//! are driven with [`MockGpio::set_input`], which fires any registered edge
//! callback on the calling thread, the way a driver delivers interrupts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::gpio::{Direction, Edge, EdgeCallback, GpioBackend, Pull};
use crate::lock;

struct Watcher {
    edge: Edge,
    callback: EdgeCallback,
}

#[derive(Default)]
struct MockPin {
    direction: Option<Direction>,
    level: bool,
    writes: Vec<(Instant, bool)>,
    watcher: Option<Watcher>,
    cleanups: usize,
}

/// Mock GPIO backend.
#[derive(Default)]
pub struct MockGpio {
    pins: Mutex<BTreeMap<u8, MockPin>>,
    failing: Mutex<BTreeSet<u8>>,
}

impl MockGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an external signal on an input pin.
    pub fn set_input(&self, pin: u8, high: bool) {
        // The callback runs without the pin table locked, so it may read
        // levels back through the backend.
        let fired = {
            let mut pins = lock(&self.pins);
            let Some(state) = pins.get_mut(&pin) else {
                return;
            };
            let was_high = state.level;
            state.level = high;
            match state.watcher.take() {
                Some(w) if w.edge.matches(was_high, high) => Some(w),
                other => {
                    state.watcher = other;
                    None
                }
            }
        };

        if let Some(mut watcher) = fired {
            (watcher.callback)(high);
            let mut pins = lock(&self.pins);
            if let Some(state) = pins.get_mut(&pin) {
                // Cleanup may have happened during the callback.
                if state.direction.is_some() && state.watcher.is_none() {
                    state.watcher = Some(watcher);
                }
            }
        }
    }

    /// Current raw level of a pin.
    pub fn level(&self, pin: u8) -> bool {
        lock(&self.pins).get(&pin).map(|s| s.level).unwrap_or(false)
    }

    /// Levels written to an output pin, oldest first.
    pub fn writes(&self, pin: u8) -> Vec<bool> {
        lock(&self.pins)
            .get(&pin)
            .map(|s| s.writes.iter().map(|&(_, level)| level).collect())
            .unwrap_or_default()
    }

    /// Writes with their timestamps.
    pub fn timed_writes(&self, pin: u8) -> Vec<(Instant, bool)> {
        lock(&self.pins)
            .get(&pin)
            .map(|s| s.writes.clone())
            .unwrap_or_default()
    }

    /// Duration of the first HIGH period on an output pin, if it has ended.
    pub fn first_pulse(&self, pin: u8) -> Option<Duration> {
        let writes = self.timed_writes(pin);
        let start = writes.iter().position(|&(_, high)| high)?;
        let (started, _) = writes[start];
        let (ended, _) = writes[start + 1..].iter().find(|&&(_, high)| !high)?;
        Some(ended.duration_since(started))
    }

    /// Number of rising transitions written to an output pin.
    pub fn pulse_count(&self, pin: u8) -> usize {
        let mut last = false;
        let mut count = 0;
        for high in self.writes(pin) {
            if high && !last {
                count += 1;
            }
            last = high;
        }
        count
    }

    pub fn is_configured(&self, pin: u8) -> bool {
        lock(&self.pins)
            .get(&pin)
            .map(|s| s.direction.is_some())
            .unwrap_or(false)
    }

    pub fn is_watched(&self, pin: u8) -> bool {
        lock(&self.pins)
            .get(&pin)
            .map(|s| s.watcher.is_some())
            .unwrap_or(false)
    }

    pub fn cleanup_count(&self, pin: u8) -> usize {
        lock(&self.pins).get(&pin).map(|s| s.cleanups).unwrap_or(0)
    }

    /// Make every subsequent setup/read/write on `pin` fail.
    pub fn fail_setup(&self, pin: u8) {
        lock(&self.failing).insert(pin);
    }

    fn check(&self, pin: u8) -> Result<()> {
        if lock(&self.failing).contains(&pin) {
            Err(Error::backend(pin, "injected failure"))
        } else {
            Ok(())
        }
    }

    fn configured(&self, pin: u8) -> Result<()> {
        if self.is_configured(pin) {
            Ok(())
        } else {
            Err(Error::backend(pin, "pin not configured"))
        }
    }
}

impl GpioBackend for MockGpio {
    fn setup_input(&self, pin: u8, pull: Pull) -> Result<()> {
        self.check(pin)?;
        let mut pins = lock(&self.pins);
        let state = pins.entry(pin).or_default();
        state.direction = Some(Direction::Input);
        // An open contact floats to whichever rail the pull resistor picks.
        state.level = pull == Pull::Up;
        Ok(())
    }

    fn setup_output(&self, pin: u8) -> Result<()> {
        self.check(pin)?;
        let mut pins = lock(&self.pins);
        let state = pins.entry(pin).or_default();
        state.direction = Some(Direction::Output);
        state.level = false;
        Ok(())
    }

    fn read(&self, pin: u8) -> Result<bool> {
        self.check(pin)?;
        self.configured(pin)?;
        Ok(self.level(pin))
    }

    fn write(&self, pin: u8, high: bool) -> Result<()> {
        self.check(pin)?;
        let mut pins = lock(&self.pins);
        match pins.get_mut(&pin) {
            Some(state) if state.direction == Some(Direction::Output) => {
                state.level = high;
                state.writes.push((Instant::now(), high));
                Ok(())
            }
            _ => Err(Error::backend(pin, "pin not configured as output")),
        }
    }

    fn watch(
        &self,
        pin: u8,
        edge: Edge,
        _debounce: Option<Duration>,
        callback: EdgeCallback,
    ) -> Result<()> {
        self.check(pin)?;
        self.configured(pin)?;
        if let Some(state) = lock(&self.pins).get_mut(&pin) {
            state.watcher = Some(Watcher { edge, callback });
        }
        Ok(())
    }

    fn cleanup(&self, pin: u8) -> Result<()> {
        let mut pins = lock(&self.pins);
        let state = pins.entry(pin).or_default();
        state.direction = None;
        state.watcher = None;
        state.level = false;
        state.cleanups += 1;
        Ok(())
    }
}
