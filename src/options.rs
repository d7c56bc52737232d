//! Plugin configuration dictionary.
//!
//! The host hands each plugin the table found at `main.plugins.<name>` in its
//! config file. Values keep whatever type the file gave them; typed accessors
//! interpret them on demand so a bad value can be reported with its key.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::error::{Error, Result};

/// A single configured value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<OptionValue>),
    Table(BTreeMap<String, OptionValue>),
}

impl OptionValue {
    /// Numeric view of the value. Strings are parsed; booleans are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Int(n) => Some(*n as f64),
            OptionValue::Float(f) => Some(*f),
            OptionValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Truthiness used for on/off flags.
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Bool(b) => *b,
            OptionValue::Int(n) => *n != 0,
            OptionValue::Float(f) => *f != 0.0,
            OptionValue::Str(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "on" | "1"
            ),
            OptionValue::List(_) | OptionValue::Table(_) => false,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Int(n) => write!(f, "{n}"),
            OptionValue::Float(x) => write!(f, "{x:?}"),
            OptionValue::Str(s) => write!(f, "{s}"),
            OptionValue::List(items) => write!(f, "[{} items]", items.len()),
            OptionValue::Table(t) => write!(f, "{{{} keys}}", t.len()),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

/// Configuration table handed to a plugin at load time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: BTreeMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and the dry-run host.
    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a key. A flat key wins; otherwise `a.b` walks nested tables.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        if let Some(v) = self.values.get(key) {
            return Some(v);
        }
        let mut parts = key.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            match current {
                OptionValue::Table(t) => current = t.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// First of several alias keys that is present, with the key that matched.
    pub fn first_of<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, &OptionValue)> {
        keys.iter().find_map(|&k| self.get(k).map(|v| (k, v)))
    }

    /// GPIO pin number under any of `keys`. Absent is `Ok(None)`.
    pub fn pin(&self, keys: &[&str]) -> Result<Option<u8>> {
        let Some((key, value)) = self.first_of(keys) else {
            return Ok(None);
        };
        let number = match value {
            OptionValue::Int(n) => Some(*n),
            OptionValue::Str(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        number
            .and_then(|n| u8::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| Error::InvalidOption {
                key: key.to_string(),
                value: value.to_string(),
            })
    }

    /// Boolean flag under any of `keys`; absent is false.
    pub fn flag(&self, keys: &[&str]) -> bool {
        self.first_of(keys)
            .map(|(_, v)| v.is_truthy())
            .unwrap_or(false)
    }

    /// Non-negative integer under any of `keys`.
    pub fn uint(&self, keys: &[&str]) -> Result<Option<u64>> {
        let Some((key, value)) = self.first_of(keys) else {
            return Ok(None);
        };
        match value {
            OptionValue::Int(n) if *n >= 0 => Ok(Some(*n as u64)),
            OptionValue::Str(s) => s.trim().parse::<u64>().map(Some).map_err(|_| {
                Error::InvalidOption {
                    key: key.to_string(),
                    value: value.to_string(),
                }
            }),
            _ => Err(Error::InvalidOption {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_key_wins_over_nested() {
        let opts: Options = toml::from_str(
            r#"
            switch_gpio = 22
            [switch]
            gpio = 27
            "#,
        )
        .unwrap();
        assert_eq!(opts.pin(&["switch_gpio", "switch.gpio"]).unwrap(), Some(22));
        assert_eq!(opts.pin(&["switch.gpio"]).unwrap(), Some(27));
    }

    #[test]
    fn nested_switch_table() {
        let opts: Options = toml::from_str(
            r#"
            enabled = true
            gpio = 17
            on_handshake = 0.5
            [switch]
            gpio = 27
            active_high = true
            "#,
        )
        .unwrap();
        assert_eq!(opts.pin(&["gpio"]).unwrap(), Some(17));
        assert_eq!(opts.pin(&["switch_gpio", "switch.gpio"]).unwrap(), Some(27));
        assert!(opts.flag(&["switch_active_high", "switch.active_high"]));
        assert_eq!(opts.get("on_handshake"), Some(&OptionValue::Float(0.5)));
    }

    #[test]
    fn missing_pin_is_none() {
        let opts = Options::new().with("debug", true);
        assert_eq!(opts.pin(&["gpio"]).unwrap(), None);
    }

    #[test]
    fn pin_out_of_range_is_rejected() {
        let opts = Options::new().with("gpio", 300i64);
        let err = opts.pin(&["gpio"]).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidOption {
                key: "gpio".into(),
                value: "300".into()
            }
        );

        let opts = Options::new().with("gpio", "seventeen");
        assert!(opts.pin(&["gpio"]).is_err());

        let opts = Options::new().with("gpio", -1i64);
        assert!(opts.pin(&["gpio"]).is_err());
    }

    #[test]
    fn pin_from_string() {
        let opts = Options::new().with("gpio", " 17 ");
        assert_eq!(opts.pin(&["gpio"]).unwrap(), Some(17));
    }

    #[test]
    fn flag_truthiness() {
        let opts = Options::new()
            .with("a", true)
            .with("b", "yes")
            .with("c", "false")
            .with("d", 1i64)
            .with("e", 0i64);
        assert!(opts.flag(&["a"]));
        assert!(opts.flag(&["b"]));
        assert!(!opts.flag(&["c"]));
        assert!(opts.flag(&["d"]));
        assert!(!opts.flag(&["e"]));
        assert!(!opts.flag(&["missing"]));
    }

    #[test]
    fn numeric_view() {
        assert_eq!(OptionValue::from("0.2").as_f64(), Some(0.2));
        assert_eq!(OptionValue::from(2i64).as_f64(), Some(2.0));
        assert_eq!(OptionValue::from("abc").as_f64(), None);
        assert_eq!(OptionValue::from(true).as_f64(), None);
    }

    #[test]
    fn float_display_keeps_fraction() {
        assert_eq!(OptionValue::Float(5.0).to_string(), "5.0");
        assert_eq!(OptionValue::Float(0.25).to_string(), "0.25");
        assert_eq!(OptionValue::Int(5).to_string(), "5");
    }

    #[test]
    fn uint_accessor() {
        let opts = Options::new().with("switch_debounce_ms", 20i64);
        assert_eq!(
            opts.uint(&["switch_debounce_ms", "switch.debounce_ms"]).unwrap(),
            Some(20)
        );
        let opts = Options::new().with("switch_debounce_ms", -5i64);
        assert!(opts.uint(&["switch_debounce_ms"]).is_err());
    }

    #[test]
    fn collects_from_pairs() {
        let opts: Options = [("gpio", OptionValue::Int(4))].into_iter().collect();
        assert_eq!(opts.pin(&["gpio"]).unwrap(), Some(4));
        assert!(!opts.is_empty());
    }
}
