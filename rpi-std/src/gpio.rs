//! rppal-backed GPIO.
//!
//! Each configured pin is held as an rppal `InputPin` or `OutputPin` until
//! cleanup drops it, which resets the pin to its original mode. Edge
//! callbacks use rppal's async interrupt thread.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use haptic::gpio::{Edge, EdgeCallback, GpioBackend, Pull};
use haptic::{Error, Result};
use rppal::gpio::{Event, Gpio, InputPin, OutputPin, Trigger};

enum PinSlot {
    Input(InputPin),
    Output(OutputPin),
}

pub struct RppalGpio {
    gpio: Gpio,
    pins: Mutex<HashMap<u8, PinSlot>>,
}

impl RppalGpio {
    pub fn new() -> anyhow::Result<Self> {
        let gpio = Gpio::new()?;
        Ok(Self {
            gpio,
            pins: Mutex::new(HashMap::new()),
        })
    }

    fn with_pin<T>(&self, pin: u8, f: impl FnOnce(&mut PinSlot) -> Result<T>) -> Result<T> {
        let mut pins = self.pins.lock().map_err(|_| Error::backend(pin, "pin table poisoned"))?;
        match pins.get_mut(&pin) {
            Some(slot) => f(slot),
            None => Err(Error::backend(pin, "pin not configured")),
        }
    }

    fn insert(&self, pin: u8, slot: PinSlot) -> Result<()> {
        self.pins
            .lock()
            .map_err(|_| Error::backend(pin, "pin table poisoned"))?
            .insert(pin, slot);
        Ok(())
    }
}

impl GpioBackend for RppalGpio {
    fn setup_input(&self, pin: u8, pull: Pull) -> Result<()> {
        let raw = self.gpio.get(pin).map_err(|e| Error::backend(pin, e))?;
        let input = match pull {
            Pull::None => raw.into_input(),
            Pull::Up => raw.into_input_pullup(),
            Pull::Down => raw.into_input_pulldown(),
        };
        self.insert(pin, PinSlot::Input(input))
    }

    fn setup_output(&self, pin: u8) -> Result<()> {
        let raw = self.gpio.get(pin).map_err(|e| Error::backend(pin, e))?;
        self.insert(pin, PinSlot::Output(raw.into_output_low()))
    }

    fn read(&self, pin: u8) -> Result<bool> {
        self.with_pin(pin, |slot| {
            Ok(match slot {
                PinSlot::Input(input) => input.is_high(),
                PinSlot::Output(output) => output.is_set_high(),
            })
        })
    }

    fn write(&self, pin: u8, high: bool) -> Result<()> {
        self.with_pin(pin, |slot| match slot {
            PinSlot::Output(output) => {
                if high {
                    output.set_high();
                } else {
                    output.set_low();
                }
                Ok(())
            }
            PinSlot::Input(_) => Err(Error::backend(pin, "pin is an input")),
        })
    }

    fn watch(
        &self,
        pin: u8,
        edge: Edge,
        debounce: Option<Duration>,
        mut callback: EdgeCallback,
    ) -> Result<()> {
        let trigger = match edge {
            Edge::Rising => Trigger::RisingEdge,
            Edge::Falling => Trigger::FallingEdge,
            Edge::Both => Trigger::Both,
        };
        self.with_pin(pin, |slot| match slot {
            PinSlot::Input(input) => input
                .set_async_interrupt(trigger, debounce, move |event: Event| {
                    callback(event.trigger == Trigger::RisingEdge)
                })
                .map_err(|e| Error::backend(pin, e)),
            PinSlot::Output(_) => Err(Error::backend(pin, "pin is an output")),
        })
    }

    fn cleanup(&self, pin: u8) -> Result<()> {
        let removed = self
            .pins
            .lock()
            .map_err(|_| Error::backend(pin, "pin table poisoned"))?
            .remove(&pin);
        if let Some(PinSlot::Input(mut input)) = removed {
            if let Err(e) = input.clear_async_interrupt() {
                log::debug!("GPIO{} interrupt clear failed: {}", pin, e);
            }
        }
        Ok(())
    }
}
