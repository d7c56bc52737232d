//! Timed pulse driver for the vibration motor.
//!
//! `pulse()` drives the line HIGH on the caller's thread and hands the hold
//! time to a per-actuator worker, which sleeps and drives the line LOW again.
//! At most one pulse is in flight: a request that arrives while the motor is
//! running is dropped, so a burst of events produces one buzz.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::gpio::{GpioLine, Pin};
use crate::lock;

/// Actuator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorState {
    Idle,
    Pulsing { until: Instant },
}

/// Vibration motor (or any active-high load) on an output line.
pub struct PulseActuator {
    line: Arc<GpioLine>,
    state: Arc<Mutex<ActuatorState>>,
    worker: Mutex<Option<SyncSender<Duration>>>,
}

impl PulseActuator {
    /// Take ownership of an output line and start the pulse worker.
    pub fn new(line: GpioLine) -> Result<Self> {
        let line = Arc::new(line);
        let state = Arc::new(Mutex::new(ActuatorState::Idle));
        let (tx, rx) = mpsc::sync_channel::<Duration>(1);

        {
            let line = Arc::clone(&line);
            let state = Arc::clone(&state);
            thread::Builder::new()
                .name(format!("pulse-gpio{}", line.number()))
                .spawn(move || pulse_loop(rx, &line, &state))
                .map_err(|e| Error::Spawn {
                    name: "pulse",
                    reason: e.to_string(),
                })?;
        }

        Ok(Self {
            line,
            state,
            worker: Mutex::new(Some(tx)),
        })
    }

    /// Buzz for `seconds`. Returns whether a pulse was started.
    ///
    /// Non-positive durations are a no-op, as is any call while a pulse is
    /// already running.
    pub fn pulse(&self, seconds: f32) -> bool {
        if !(seconds > 0.0) {
            return false;
        }
        let hold = match Duration::try_from_secs_f32(seconds) {
            Ok(hold) => hold,
            Err(e) => {
                log::warn!("GPIO{} pulse of {}s rejected: {}", self.line.number(), seconds, e);
                return false;
            }
        };

        let mut state = lock(&self.state);
        if let ActuatorState::Pulsing { .. } = *state {
            log::debug!("GPIO{} busy, pulse dropped", self.line.number());
            return false;
        }
        if self.line.is_released() {
            return false;
        }

        if let Err(e) = self.line.write_level(true) {
            log::warn!("GPIO{} pulse start failed: {}", self.line.number(), e);
            force_low(&self.line);
            return false;
        }
        *state = ActuatorState::Pulsing {
            until: Instant::now() + hold,
        };

        let queued = lock(&self.worker)
            .as_ref()
            .map(|tx| tx.try_send(hold).is_ok())
            .unwrap_or(false);
        if !queued {
            log::warn!("GPIO{} pulse worker unavailable", self.line.number());
            force_low(&self.line);
            *state = ActuatorState::Idle;
            return false;
        }
        true
    }

    pub fn state(&self) -> ActuatorState {
        *lock(&self.state)
    }

    pub fn is_pulsing(&self) -> bool {
        matches!(self.state(), ActuatorState::Pulsing { .. })
    }

    pub fn pin(&self) -> Pin {
        self.line.pin()
    }

    /// Force the motor off and release the line. Does not wait for an
    /// in-flight pulse; its worker finds the line released and stops.
    pub fn release(&self) {
        lock(&self.worker).take();
        {
            let mut state = lock(&self.state);
            if !self.line.is_released() {
                force_low(&self.line);
            }
            *state = ActuatorState::Idle;
        }
        self.line.release();
    }
}

impl Drop for PulseActuator {
    fn drop(&mut self) {
        self.release();
    }
}

fn pulse_loop(rx: Receiver<Duration>, line: &GpioLine, state: &Mutex<ActuatorState>) {
    while let Ok(hold) = rx.recv() {
        thread::sleep(hold);
        finish(line, state);
    }
    log::debug!("pulse worker for GPIO{} stopped", line.number());
}

fn finish(line: &GpioLine, state: &Mutex<ActuatorState>) {
    let mut state = lock(state);
    if line.is_released() {
        log::debug!("GPIO{} released mid-pulse", line.number());
    } else if let Err(e) = line.write_level(false) {
        log::warn!("GPIO{} pulse end failed: {}", line.number(), e);
        force_low(line);
    }
    *state = ActuatorState::Idle;
}

fn force_low(line: &GpioLine) {
    if let Err(e) = line.write_level(false) {
        log::error!("GPIO{} could not be forced LOW: {}", line.number(), e);
    }
}
