//! Device configuration file.
//!
//! Plugins read their settings from `main.plugins.<name>` in the device's
//! TOML config. A plugin runs only when its section sets `enabled = true`.

use std::fs;
use std::path::Path;

use anyhow::Context;
use haptic::options::Options;

pub fn load(path: &Path) -> anyhow::Result<toml::Table> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing config file {}", path.display()))
}

pub fn parse(text: &str) -> anyhow::Result<toml::Table> {
    Ok(toml::from_str(text)?)
}

/// Options for plugin `name`, or `None` if its section is missing or the
/// plugin is not enabled.
pub fn plugin_options(config: &toml::Table, name: &str) -> anyhow::Result<Option<Options>> {
    let section = config
        .get("main")
        .and_then(|main| main.get("plugins"))
        .and_then(|plugins| plugins.get(name));
    let Some(section) = section else {
        return Ok(None);
    };
    let options: Options = section
        .clone()
        .try_into()
        .with_context(|| format!("main.plugins.{name} is not a table of plain values"))?;
    if !options.flag(&["enabled"]) {
        log::info!("plugin {} not enabled", name);
        return Ok(None);
    }
    Ok(Some(options))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [main.plugins.haptic]
        enabled = true
        gpio = 17
        on_handshake = 0.5
        switch.gpio = 27

        [main.plugins.gpio_shutdown]
        enabled = false
        gpio = 21
    "#;

    #[test]
    fn reads_enabled_plugin_section() {
        let config = parse(SAMPLE).unwrap();
        let opts = plugin_options(&config, "haptic").unwrap().unwrap();
        assert_eq!(opts.pin(&["gpio"]).unwrap(), Some(17));
        assert_eq!(opts.pin(&["switch_gpio", "switch.gpio"]).unwrap(), Some(27));
    }

    #[test]
    fn disabled_or_missing_section_is_none() {
        let config = parse(SAMPLE).unwrap();
        assert!(plugin_options(&config, "gpio_shutdown").unwrap().is_none());
        assert!(plugin_options(&config, "grid").unwrap().is_none());
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(parse("[main.plugins.haptic\ngpio = ").is_err());
    }
}
