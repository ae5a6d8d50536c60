use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration from config.toml. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Data directory override (default: $XDG_DATA_HOME/taskmaster)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Ring the terminal bell when alerts fire
    #[serde(default = "default_true")]
    pub sound: bool,
    /// Raise a desktop notification per alert
    #[serde(default = "default_true")]
    pub desktop: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            sound: true,
            desktop: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Scan period in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            tick_ms: default_tick_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// trace | debug | info | warn | error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfig {
    /// Hex color overrides keyed by theme slot (e.g. `highlight = "#FB4196"`)
    #[serde(default)]
    pub colors: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.store.dir.is_none());
        assert!(config.alerts.sound);
        assert!(config.alerts.desktop);
        assert_eq!(config.clock.tick_ms, 1000);
        assert_eq!(config.log.level, "info");
        assert!(config.ui.colors.is_empty());
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config: Config = toml::from_str(
            r##"
[alerts]
desktop = false

[ui.colors]
highlight = "#FF0000"
"##,
        )
        .unwrap();
        assert!(config.alerts.sound);
        assert!(!config.alerts.desktop);
        assert_eq!(config.ui.colors.get("highlight").unwrap(), "#FF0000");
    }
}
