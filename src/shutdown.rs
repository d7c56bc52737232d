//! GPIO shutdown button.
//!
//! Watches an input with pull-up for a falling edge (button to ground) and
//! runs the host's shutdown hook once. The trigger latches: later presses are
//! ignored until the plugin is reloaded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::defaults::SHUTDOWN_PLUGIN_NAME;
use crate::error::Result;
use crate::gpio::{Edge, Gpio, GpioLine, Pull};
use crate::options::Options;
use crate::plugin::{Plugin, PluginState};

/// Action run when the button is pressed.
pub type ShutdownHook = Arc<dyn Fn() + Send + Sync>;

pub struct GpioShutdown {
    gpio: Gpio,
    hook: ShutdownHook,
    line: Option<GpioLine>,
    triggered: Arc<AtomicBool>,
}

impl GpioShutdown {
    pub fn new(gpio: Gpio, hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            gpio,
            hook: Arc::new(hook),
            line: None,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the shutdown hook has run.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    fn arm(&self, pin: u8) -> Result<GpioLine> {
        let line = self.gpio.input(pin, Pull::Up)?;
        let hook = Arc::clone(&self.hook);
        let triggered = Arc::clone(&self.triggered);
        line.on_edge(
            Edge::Falling,
            None,
            Box::new(move |_raw: bool| {
                if !triggered.swap(true, Ordering::AcqRel) {
                    log::warn!("Received shutdown command from GPIO");
                    hook();
                }
            }),
        )?;
        Ok(line)
    }
}

impl Plugin for GpioShutdown {
    fn name(&self) -> &'static str {
        SHUTDOWN_PLUGIN_NAME
    }

    fn state(&self) -> PluginState {
        if self.line.is_some() {
            PluginState::Loaded
        } else {
            PluginState::Unloaded
        }
    }

    fn on_loaded(&mut self, options: &Options) {
        if self.line.is_some() {
            return;
        }
        let pin = match options.pin(&["gpio"]) {
            Ok(Some(pin)) => pin,
            Ok(None) => {
                log::warn!(
                    "GPIO Shutdown plugin misconfigured. Please provide \"main.plugins.{}.gpio = yourGpioNumber\"",
                    SHUTDOWN_PLUGIN_NAME
                );
                return;
            }
            Err(e) => {
                log::warn!("GPIO Shutdown plugin not loaded: {}", e);
                return;
            }
        };

        match self.arm(pin) {
            Ok(line) => {
                self.triggered.store(false, Ordering::Release);
                self.line = Some(line);
                log::info!("Added shutdown command to GPIO {}", pin);
            }
            Err(e) => log::warn!("GPIO Shutdown plugin not loaded: {}", e),
        }
    }

    fn on_unload(&mut self) {
        if let Some(line) = self.line.take() {
            line.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::gpio::mock::MockGpio;

    fn plugin() -> (Arc<MockGpio>, Gpio, GpioShutdown, Arc<AtomicUsize>) {
        let mock = Arc::new(MockGpio::new());
        let gpio = Gpio::new(mock.clone());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let plugin = GpioShutdown::new(gpio.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (mock, gpio, plugin, calls)
    }

    #[test]
    fn first_press_runs_hook_once() {
        let (mock, _gpio, mut p, calls) = plugin();
        p.on_loaded(&Options::new().with("gpio", 21i64));
        assert_eq!(p.state(), PluginState::Loaded);
        assert!(mock.is_watched(21));

        mock.set_input(21, false);
        mock.set_input(21, true);
        mock.set_input(21, false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(p.is_triggered());
    }

    #[test]
    fn rising_edge_is_ignored() {
        let (mock, _gpio, mut p, calls) = plugin();
        p.on_loaded(&Options::new().with("gpio", 21i64));
        mock.set_input(21, true);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_gpio_stays_unloaded() {
        let (_mock, _gpio, mut p, _calls) = plugin();
        p.on_loaded(&Options::new());
        assert_eq!(p.state(), PluginState::Unloaded);
        p.on_unload();
    }

    #[test]
    fn busy_pin_stays_unloaded() {
        let (_mock, gpio, mut p, _calls) = plugin();
        let _other = gpio.output(21).unwrap();
        p.on_loaded(&Options::new().with("gpio", 21i64));
        assert_eq!(p.state(), PluginState::Unloaded);
    }

    #[test]
    fn unload_releases_pin() {
        let (mock, gpio, mut p, calls) = plugin();
        p.on_loaded(&Options::new().with("gpio", 21i64));
        p.on_unload();
        p.on_unload();
        assert!(!gpio.is_claimed(21));
        assert_eq!(mock.cleanup_count(21), 1);

        mock.set_input(21, false);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
