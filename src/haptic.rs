//! Haptic feedback plugin.
//!
//! Buzzes a vibration motor on device lifecycle events. An optional toggle
//! switch gates all feedback: while it reads off, events are ignored, and
//! turning it on replays the `loaded` buzz so the user feels the change. The
//! plugin mirrors the switch state on the status display with a small icon.
//!
//! State lives in an `Arc<Shared>` created at load time. The switch's change
//! handler holds only a `Weak` to it, so unloading (dropping the last strong
//! reference) also retires the handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::actuator::PulseActuator;
use crate::binding::BindingTable;
use crate::defaults::{PLUGIN_NAME, SWITCH_DEBOUNCE};
use crate::display::{icon_origin, ElementMap, Icon, IconAsset, StatusDisplay};
use crate::error::{Error, Result};
use crate::gpio::{Gpio, Polarity, Pull};
use crate::lock;
use crate::options::Options;
use crate::plugin::{LifecycleEvent, Plugin, PluginState};
use crate::switch::DebouncedSwitch;

const GPIO_KEYS: &[&str] = &["gpio"];
const SWITCH_GPIO_KEYS: &[&str] = &["switch_gpio", "switch.gpio"];
const SWITCH_ACTIVE_HIGH_KEYS: &[&str] = &["switch_active_high", "switch.active_high"];
const SWITCH_DEBOUNCE_KEYS: &[&str] = &["switch_debounce_ms", "switch.debounce_ms"];

/// Snapshot of the plugin for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HapticStatus {
    pub loaded: bool,
    /// Logical switch state; `None` when no switch is configured
    pub switch: Option<bool>,
    pub pulsing: bool,
}

#[derive(Clone)]
struct UiSlot {
    display: Arc<dyn StatusDisplay>,
    origin: (i32, i32),
}

struct Shared {
    actuator: PulseActuator,
    switch: Option<DebouncedSwitch>,
    bindings: BindingTable,
    invert_icon: bool,
    icon_visible: AtomicBool,
    ui: Mutex<Option<UiSlot>>,
}

impl Shared {
    /// Buzz for `event` unless the switch is off or the duration is zero.
    fn fire(&self, event: LifecycleEvent) {
        if let Some(switch) = &self.switch {
            if !switch.is_on() {
                log::debug!("feedback off, {} ignored", event);
                return;
            }
        }
        let secs = self.bindings.duration_for(event);
        if secs > 0.0 {
            self.actuator.pulse(secs);
        }
    }

    fn icon(&self, on: bool, origin: (i32, i32)) -> Icon {
        Icon::new(IconAsset::for_state(on), origin, self.invert_icon)
    }

    /// Bring the icon (and feedback) in line with the switch.
    ///
    /// Called from both the switch worker and the display refresh. The
    /// visibility flag is swapped inside the display lock, so exactly one
    /// caller observes each change.
    fn reconcile(&self, on: bool) {
        if self.switch.is_none() {
            return;
        }

        let ui = lock(&self.ui).clone();
        let changed = match ui {
            Some(ui) => {
                let mut changed = false;
                ui.display.with_elements(&mut |map: &mut dyn ElementMap| {
                    if self.icon_visible.swap(on, Ordering::AcqRel) != on {
                        map.add_element(PLUGIN_NAME, self.icon(on, ui.origin));
                        changed = true;
                    }
                });
                changed
            }
            None => self.icon_visible.swap(on, Ordering::AcqRel) != on,
        };

        if changed {
            log::info!("switch state changed: {}", on_off(on));
            if on {
                self.fire(LifecycleEvent::Loaded);
            }
        }
    }

    fn release(&self) {
        self.actuator.release();
        if let Some(switch) = &self.switch {
            switch.release();
        }
    }
}

/// The haptic feedback plugin.
pub struct Haptic {
    gpio: Gpio,
    shared: Option<Arc<Shared>>,
}

impl Haptic {
    pub fn new(gpio: Gpio) -> Self {
        Self { gpio, shared: None }
    }

    pub fn status(&self) -> HapticStatus {
        match &self.shared {
            Some(shared) => HapticStatus {
                loaded: true,
                switch: shared.switch.as_ref().map(DebouncedSwitch::is_on),
                pulsing: shared.actuator.is_pulsing(),
            },
            None => HapticStatus {
                loaded: false,
                switch: None,
                pulsing: false,
            },
        }
    }

    /// Resolved duration table, once loaded.
    pub fn bindings(&self) -> Option<&BindingTable> {
        self.shared.as_ref().map(|s| &s.bindings)
    }

    fn load(&self, options: &Options) -> Result<Arc<Shared>> {
        let pin = options
            .pin(GPIO_KEYS)?
            .ok_or(Error::MissingOption { key: "gpio" })?;
        let switch_pin = options.pin(SWITCH_GPIO_KEYS)?;
        let window = options
            .uint(SWITCH_DEBOUNCE_KEYS)?
            .map(Duration::from_millis)
            .unwrap_or(SWITCH_DEBOUNCE);

        let bindings = BindingTable::from_options(options);
        if options.flag(&["debug"]) {
            bindings.log();
        }

        let actuator = PulseActuator::new(self.gpio.output(pin)?)?;

        let switch = match switch_pin {
            Some(switch_pin) => {
                let active_high = options.flag(SWITCH_ACTIVE_HIGH_KEYS);
                log::info!("switch is active {}", if active_high { "high" } else { "low" });
                let line = self.gpio.input(switch_pin, Pull::Up)?;
                let switch =
                    DebouncedSwitch::new(line, Polarity::from_active_high(active_high), window)?;
                log::info!("feedback is currently {}", on_off(switch.is_on()));
                Some(switch)
            }
            None => None,
        };

        let visible = switch.as_ref().map(DebouncedSwitch::is_on).unwrap_or(true);
        let shared = Arc::new(Shared {
            actuator,
            switch,
            bindings,
            invert_icon: options.flag(&["invert_icon"]),
            icon_visible: AtomicBool::new(visible),
            ui: Mutex::new(None),
        });

        if let Some(switch) = &shared.switch {
            let weak: Weak<Shared> = Arc::downgrade(&shared);
            switch.on_change(move |on| {
                if let Some(shared) = weak.upgrade() {
                    shared.reconcile(on);
                }
            });
        }

        log::info!("plugin loaded and ready on pin {}", pin);
        shared.fire(LifecycleEvent::Loaded);
        Ok(shared)
    }
}

impl Plugin for Haptic {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn state(&self) -> PluginState {
        if self.shared.is_some() {
            PluginState::Loaded
        } else {
            PluginState::Unloaded
        }
    }

    fn on_loaded(&mut self, options: &Options) {
        if self.shared.is_some() {
            log::warn!("plugin already loaded");
            return;
        }
        match self.load(options) {
            Ok(shared) => self.shared = Some(shared),
            Err(Error::MissingOption { key }) => log::warn!(
                "plugin misconfigured. Please provide \"main.plugins.{}.{} = yourGpioNumber\"",
                PLUGIN_NAME,
                key
            ),
            Err(e) => log::warn!("plugin not loaded: {}", e),
        }
    }

    fn on_ui_setup(&mut self, display: Arc<dyn StatusDisplay>) {
        let Some(shared) = &self.shared else {
            return;
        };
        let slot = UiSlot {
            origin: icon_origin(display.width()),
            display,
        };
        *lock(&shared.ui) = Some(slot.clone());

        slot.display.with_elements(&mut |map: &mut dyn ElementMap| {
            let visible = shared
                .switch
                .as_ref()
                .map(DebouncedSwitch::is_on)
                .unwrap_or(true);
            shared.icon_visible.store(visible, Ordering::Release);
            map.add_element(PLUGIN_NAME, shared.icon(visible, slot.origin));
        });
    }

    fn on_ui_update(&self) {
        if let Some(shared) = &self.shared {
            if let Some(switch) = &shared.switch {
                shared.reconcile(switch.is_on());
            }
        }
    }

    fn on_event(&self, event: LifecycleEvent) {
        if let Some(shared) = &self.shared {
            shared.fire(event);
        }
    }

    fn on_unload(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        log::info!("plugin disabled");
        shared.release();

        let ui = lock(&shared.ui).take();
        if let Some(ui) = ui {
            ui.display.with_elements(&mut |map: &mut dyn ElementMap| {
                if map.has_element(PLUGIN_NAME) {
                    map.remove_element(PLUGIN_NAME);
                }
            });
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
