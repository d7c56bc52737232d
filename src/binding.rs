//! Event-to-duration binding.
//!
//! Each lifecycle event's pulse duration is resolved once at load time from
//! the plugin options. A missing value uses the compiled-in default; a value
//! that is not a number or lies outside `[MIN_DURATION, MAX_DURATION]` is
//! reported and also replaced by the default. Values are never clamped.

use crate::defaults::{MAX_DURATION, MIN_DURATION, PLUGIN_NAME};
use crate::error::{Error, Result};
use crate::options::{OptionValue, Options};
use crate::plugin::LifecycleEvent;

/// Interpret a configured duration, in seconds.
pub fn parse_duration(key: &str, value: &OptionValue) -> Result<f32> {
    let invalid = || Error::InvalidDuration {
        key: key.to_string(),
        value: value.to_string(),
    };
    let secs = value.as_f64().ok_or_else(invalid)?;
    // Range check before narrowing: values just above the bound round to it in f32.
    if secs.is_nan() || !(f64::from(MIN_DURATION)..=f64::from(MAX_DURATION)).contains(&secs) {
        return Err(invalid());
    }
    Ok(secs as f32)
}

/// Resolve one duration, falling back to `default` with a warning when the
/// configured value is unusable.
pub fn resolve(key: &str, configured: Option<&OptionValue>, default: f32) -> f32 {
    let Some(value) = configured else {
        return default;
    };
    match parse_duration(key, value) {
        Ok(secs) => secs,
        Err(_) => {
            log::warn!(
                "invalid option for main.plugins.{}.{}. Value must be >= {} and <= {}. Got: {}. Using default: {}",
                PLUGIN_NAME,
                key,
                MIN_DURATION,
                MAX_DURATION,
                value,
                default
            );
            default
        }
    }
}

/// Resolved duration for every lifecycle event. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingTable {
    durations: [f32; 5],
}

impl BindingTable {
    /// Table of compiled-in defaults.
    pub fn defaults() -> Self {
        Self {
            durations: LifecycleEvent::ALL.map(LifecycleEvent::default_duration),
        }
    }

    pub fn from_options(options: &Options) -> Self {
        Self {
            durations: LifecycleEvent::ALL.map(|event| {
                let key = event.config_key();
                resolve(key, options.get(key), event.default_duration())
            }),
        }
    }

    pub fn duration_for(&self, event: LifecycleEvent) -> f32 {
        self.durations[index(event)]
    }

    pub fn iter(&self) -> impl Iterator<Item = (LifecycleEvent, f32)> + '_ {
        LifecycleEvent::ALL
            .iter()
            .map(move |&event| (event, self.duration_for(event)))
    }

    /// Log the resolved table, one `key=seconds` line per event.
    pub fn log(&self) {
        for (event, secs) in self.iter() {
            log::info!("{}={}", event.config_key(), secs);
        }
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::defaults()
    }
}

fn index(event: LifecycleEvent) -> usize {
    match event {
        LifecycleEvent::Loaded => 0,
        LifecycleEvent::Handshake => 1,
        LifecycleEvent::Association => 2,
        LifecycleEvent::Deauthentication => 3,
        LifecycleEvent::PeerDetected => 4,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, Once};
    use std::thread::{self, ThreadId};

    use log::{Level, LevelFilter, Log, Metadata, Record};

    use super::*;

    // ── Log capture ────────────────────────────────────────────────

    /// Records every log line with the thread that emitted it, so parallel
    /// tests only see their own output.
    struct Capture {
        records: Mutex<Vec<(ThreadId, Level, String)>>,
    }

    impl Log for Capture {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            let line = record.args().to_string();
            crate::lock(&self.records).push((thread::current().id(), record.level(), line));
        }

        fn flush(&self) {}
    }

    static CAPTURE: Capture = Capture {
        records: Mutex::new(Vec::new()),
    };
    static INSTALL: Once = Once::new();

    /// Run `f` and return the records it logged on this thread.
    fn captured(f: impl FnOnce()) -> Vec<(Level, String)> {
        INSTALL.call_once(|| {
            log::set_logger(&CAPTURE).unwrap();
            log::set_max_level(LevelFilter::Trace);
        });
        let me = thread::current().id();
        crate::lock(&CAPTURE.records).retain(|(id, _, _)| *id != me);
        f();
        crate::lock(&CAPTURE.records)
            .iter()
            .filter(|(id, _, _)| *id == me)
            .map(|(_, level, line)| (*level, line.clone()))
            .collect()
    }

    // ── resolve ────────────────────────────────────────────────────

    #[test]
    fn out_of_range_string_uses_default() {
        let v = OptionValue::from("5.0");
        assert_eq!(resolve("on_association", Some(&v), 0.10), 0.10);
    }

    #[test]
    fn out_of_range_value_warns_with_raw_value() {
        let v = OptionValue::from("5.0");
        let records = captured(|| {
            assert_eq!(resolve("on_association", Some(&v), 0.10), 0.10);
        });
        assert_eq!(records.len(), 1);
        let (level, line) = &records[0];
        assert_eq!(*level, Level::Warn);
        assert!(line.contains("main.plugins.haptic.on_association"));
        assert!(line.contains("Got: 5.0"));
        assert!(line.contains("Using default: 0.1"));
    }

    #[test]
    fn float_out_of_range_logs_as_written() {
        let records = captured(|| {
            resolve("on_handshake", Some(&OptionValue::Float(5.0)), 0.25);
        });
        assert_eq!(records.len(), 1);
        assert!(records[0].1.contains("Got: 5.0."));
    }

    #[test]
    fn absent_and_valid_values_log_nothing() {
        let records = captured(|| {
            assert_eq!(resolve("on_association", None, 0.10), 0.10);
            assert_eq!(
                resolve("on_association", Some(&OptionValue::from("0.2")), 0.10),
                0.2
            );
        });
        assert!(records.is_empty());
    }

    #[test]
    fn just_above_max_is_rejected() {
        assert_eq!(
            resolve("on_peer_detected", Some(&OptionValue::Float(2.00000001)), 1.5),
            1.5
        );
        assert_eq!(
            resolve("on_peer_detected", Some(&OptionValue::from("2.00000001")), 1.5),
            1.5
        );
        assert!(parse_duration("on_peer_detected", &OptionValue::Float(2.00000001)).is_err());
        assert!(parse_duration("on_peer_detected", &OptionValue::Float(-1e-9)).is_err());
    }

    #[test]
    fn in_range_string_is_used() {
        let v = OptionValue::from("0.2");
        assert_eq!(resolve("on_association", Some(&v), 0.10), 0.2);
    }

    #[test]
    fn absent_uses_default() {
        assert_eq!(resolve("on_association", None, 0.10), 0.10);
    }

    #[test]
    fn bounds_are_inclusive() {
        assert_eq!(resolve("on_handshake", Some(&OptionValue::Int(0)), 0.25), 0.0);
        assert_eq!(resolve("on_handshake", Some(&OptionValue::Int(2)), 0.25), 2.0);
        assert_eq!(
            resolve("on_handshake", Some(&OptionValue::Float(2.01)), 0.25),
            0.25
        );
        assert_eq!(
            resolve("on_handshake", Some(&OptionValue::Float(-0.1)), 0.25),
            0.25
        );
    }

    #[test]
    fn non_numbers_use_default() {
        assert_eq!(resolve("on_loaded", Some(&OptionValue::from("abc")), 0.25), 0.25);
        assert_eq!(resolve("on_loaded", Some(&OptionValue::Bool(true)), 0.25), 0.25);
        assert_eq!(resolve("on_loaded", Some(&OptionValue::from("NaN")), 0.25), 0.25);
    }

    #[test]
    fn parse_error_carries_raw_value() {
        let err = parse_duration("on_handshake", &OptionValue::from("lots")).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidDuration {
                key: "on_handshake".into(),
                value: "lots".into()
            }
        );
        assert_eq!(err.kind(), crate::ErrorKind::Value);
    }

    // ── BindingTable ───────────────────────────────────────────────

    #[test]
    fn table_mixes_overrides_and_defaults() {
        let opts = Options::new()
            .with("on_handshake", 0.5)
            .with("on_peer_detected", 9.0)
            .with("on_association", 0i64);
        let table = BindingTable::from_options(&opts);
        assert_eq!(table.duration_for(LifecycleEvent::Loaded), 0.25);
        assert_eq!(table.duration_for(LifecycleEvent::Handshake), 0.5);
        assert_eq!(table.duration_for(LifecycleEvent::Association), 0.0);
        assert_eq!(table.duration_for(LifecycleEvent::Deauthentication), 0.75);
        assert_eq!(table.duration_for(LifecycleEvent::PeerDetected), 1.5);
    }

    #[test]
    fn empty_options_give_defaults() {
        assert_eq!(BindingTable::from_options(&Options::new()), BindingTable::defaults());
        assert_eq!(BindingTable::default().iter().count(), 5);
    }
}
