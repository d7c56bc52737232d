//! Debounced feedback switch.
//!
//! Raw edges arrive from the driver's interrupt context. The first edge arms
//! a settle check on a dedicated worker thread; edges arriving while a check
//! is pending are coalesced. When the window elapses the worker re-reads the
//! line and notifies the handler only if the polarity-corrected level differs
//! from the last level it reported. Contact bounce therefore yields a single
//! notification, and a flip that reverts before settling yields none.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::defaults::EDGE_DEBOUNCE_HINT;
use crate::error::{Error, Result};
use crate::gpio::{Edge, GpioLine, Pin, Polarity};
use crate::lock;

/// State-change handler. Receives the new logical level.
pub type ChangeHandler = Box<dyn FnMut(bool) + Send + 'static>;

type Trigger = Arc<Mutex<Option<SyncSender<()>>>>;

struct Shared {
    pending: AtomicBool,
    last_notified: AtomicBool,
    handler: Mutex<Option<ChangeHandler>>,
}

/// A GPIO input turned into a clean on/off state.
pub struct DebouncedSwitch {
    line: Arc<GpioLine>,
    polarity: Polarity,
    window: Duration,
    shared: Arc<Shared>,
    trigger: Trigger,
}

impl DebouncedSwitch {
    /// Wrap an input line. Spawns the settle worker and subscribes to both
    /// edges of the line.
    pub fn new(line: GpioLine, polarity: Polarity, window: Duration) -> Result<Self> {
        let line = Arc::new(line);
        let initial = polarity.apply(line.read_level()?);
        let shared = Arc::new(Shared {
            pending: AtomicBool::new(false),
            last_notified: AtomicBool::new(initial),
            handler: Mutex::new(None),
        });

        let (tx, rx) = mpsc::sync_channel::<()>(1);
        let trigger: Trigger = Arc::new(Mutex::new(Some(tx)));

        {
            let line = Arc::clone(&line);
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(format!("switch-gpio{}", line.number()))
                .spawn(move || settle_loop(rx, &line, polarity, window, &shared))
                .map_err(|e| Error::Spawn {
                    name: "switch",
                    reason: e.to_string(),
                })?;
        }

        {
            let shared = Arc::clone(&shared);
            let trigger = Arc::clone(&trigger);
            line.on_edge(
                Edge::Both,
                Some(window.min(EDGE_DEBOUNCE_HINT)),
                Box::new(move |_raw: bool| on_edge(&shared, &trigger)),
            )?;
        }

        Ok(Self {
            line,
            polarity,
            window,
            shared,
            trigger,
        })
    }

    /// Register the change handler, replacing any previous one.
    pub fn on_change(&self, handler: impl FnMut(bool) + Send + 'static) {
        *lock(&self.shared.handler) = Some(Box::new(handler));
    }

    /// Read the current logical state directly from the line.
    pub fn try_is_on(&self) -> Result<bool> {
        self.line.read_level().map(|raw| self.polarity.apply(raw))
    }

    /// Current logical state. A line that cannot be read counts as off.
    pub fn is_on(&self) -> bool {
        self.try_is_on().unwrap_or_else(|e| {
            log::debug!("switch read failed: {}", e);
            false
        })
    }

    /// Level most recently reported to the handler.
    pub fn last_notified(&self) -> bool {
        self.shared.last_notified.load(Ordering::Acquire)
    }

    pub fn pin(&self) -> Pin {
        self.line.pin()
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Stop the settle worker and release the line. Idempotent.
    pub fn release(&self) {
        lock(&self.trigger).take();
        self.line.release();
    }
}

impl Drop for DebouncedSwitch {
    fn drop(&mut self) {
        self.release();
    }
}

/// Interrupt-context half: arm a settle check unless one is pending.
fn on_edge(shared: &Shared, trigger: &Mutex<Option<SyncSender<()>>>) {
    if shared
        .pending
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return;
    }
    let sent = lock(trigger)
        .as_ref()
        .map(|tx| tx.try_send(()).is_ok())
        .unwrap_or(false);
    if !sent {
        shared.pending.store(false, Ordering::Release);
    }
}

/// Worker half: wait out the window, re-read, notify on a settled change.
fn settle_loop(
    rx: Receiver<()>,
    line: &GpioLine,
    polarity: Polarity,
    window: Duration,
    shared: &Shared,
) {
    while rx.recv().is_ok() {
        thread::sleep(window);
        // Disarm before sampling so an edge from here on arms the next check.
        shared.pending.store(false, Ordering::Release);

        match line.read_level() {
            Ok(raw) => {
                let level = polarity.apply(raw);
                if shared.last_notified.swap(level, Ordering::AcqRel) != level {
                    notify(shared, line.number(), level);
                }
            }
            Err(e) => log::debug!("switch settle skipped: {}", e),
        }
    }
    log::debug!("switch worker for GPIO{} stopped", line.number());
}

fn notify(shared: &Shared, pin: u8, level: bool) {
    let mut handler = lock(&shared.handler);
    if let Some(handler) = handler.as_mut() {
        if panic::catch_unwind(AssertUnwindSafe(|| handler(level))).is_err() {
            log::error!("switch handler on GPIO{} panicked", pin);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use super::*;
    use crate::gpio::mock::MockGpio;
    use crate::gpio::{Gpio, Pull};

    const WINDOW: Duration = Duration::from_millis(30);

    fn switch(active_high: bool) -> (Arc<MockGpio>, Gpio, DebouncedSwitch) {
        let mock = Arc::new(MockGpio::new());
        let gpio = Gpio::new(mock.clone());
        let line = gpio.input(27, Pull::Up).unwrap();
        let sw = DebouncedSwitch::new(line, Polarity::from_active_high(active_high), WINDOW)
            .unwrap();
        (mock, gpio, sw)
    }

    fn recorder(sw: &DebouncedSwitch) -> Arc<Mutex<Vec<bool>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        sw.on_change(move |on| sink.lock().unwrap().push(on));
        seen
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    // ── Direct reads ───────────────────────────────────────────────

    #[test]
    fn open_active_low_switch_reads_off() {
        let (mock, _gpio, sw) = switch(false);
        assert!(!sw.is_on());
        mock.set_input(27, false);
        assert!(sw.is_on());
    }

    #[test]
    fn active_high_switch_follows_level() {
        let (mock, _gpio, sw) = switch(true);
        assert!(sw.is_on());
        mock.set_input(27, false);
        assert!(!sw.is_on());
    }

    // ── Debounce ───────────────────────────────────────────────────

    #[test]
    fn bounce_burst_notifies_once_with_settled_level() {
        let (mock, _gpio, sw) = switch(false);
        let seen = recorder(&sw);

        for &level in &[false, true, false, true, false] {
            mock.set_input(27, level);
        }

        assert!(wait_for(|| !seen.lock().unwrap().is_empty()));
        thread::sleep(WINDOW * 3);
        assert_eq!(*seen.lock().unwrap(), vec![true]);
        assert!(sw.last_notified());
    }

    #[test]
    fn reverted_flip_is_not_reported() {
        let (mock, _gpio, sw) = switch(false);
        let seen = recorder(&sw);

        mock.set_input(27, false);
        mock.set_input(27, true);

        thread::sleep(WINDOW * 4);
        assert!(seen.lock().unwrap().is_empty());
        assert!(!sw.last_notified());
    }

    #[test]
    fn separate_transitions_each_notify() {
        let (mock, _gpio, sw) = switch(false);
        let seen = recorder(&sw);

        mock.set_input(27, false);
        assert!(wait_for(|| seen.lock().unwrap().len() == 1));
        assert!(wait_for(|| !sw.shared.pending.load(Ordering::Acquire)));

        mock.set_input(27, true);
        assert!(wait_for(|| seen.lock().unwrap().len() == 2));
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn flip_during_handler_is_reported() {
        let (mock, _gpio, sw) = switch(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let input = mock.clone();
        sw.on_change(move |on| {
            sink.lock().unwrap().push(on);
            if on {
                input.set_input(27, true);
            }
        });

        mock.set_input(27, false);
        assert!(wait_for(|| seen.lock().unwrap().len() == 2));
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
        assert!(!sw.last_notified());
    }

    #[test]
    fn panicking_handler_keeps_worker_alive() {
        let (mock, _gpio, sw) = switch(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        sw.on_change(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("handler failure");
            }
        });

        mock.set_input(27, false);
        assert!(wait_for(|| calls.load(Ordering::SeqCst) == 1));
        assert!(wait_for(|| !sw.shared.pending.load(Ordering::Acquire)));

        mock.set_input(27, true);
        assert!(wait_for(|| calls.load(Ordering::SeqCst) == 2));
    }

    // ── Release ────────────────────────────────────────────────────

    #[test]
    fn release_frees_pin_and_silences_handler() {
        let (mock, gpio, sw) = switch(false);
        let seen = recorder(&sw);

        sw.release();
        sw.release();
        assert!(!gpio.is_claimed(27));
        assert_eq!(mock.cleanup_count(27), 1);
        assert!(!mock.is_watched(27));

        mock.set_input(27, false);
        thread::sleep(WINDOW * 3);
        assert!(seen.lock().unwrap().is_empty());
        assert!(!sw.is_on());
    }

    #[test]
    fn release_during_settle_is_silent() {
        let (mock, _gpio, sw) = switch(false);
        let seen = recorder(&sw);

        mock.set_input(27, false);
        sw.release();
        thread::sleep(WINDOW * 3);
        assert!(seen.lock().unwrap().is_empty());
    }
}
