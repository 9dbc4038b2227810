// Rawkeys Settings Module
// Hook mode, interception and frame-loop settings loaded from TOML

use std::path::{Path, PathBuf};

use crate::Key;

/// Lowest and highest frame rates the frame loop accepts
pub const FRAME_RATE_RANGE: std::ops::RangeInclusive<u32> = 1..=1000;

/// Settings for a rawkeys service and the frame loop that drives it.
///
/// Loaded from a TOML file (default: ~/.config/rawkeys/settings.toml).
/// A missing file yields the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Keep receiving keys while the host is not pumping the hook
    pub run_in_background: bool,

    /// Swallow hooked keys instead of passing them on
    pub intercept_messages: bool,

    /// Device names or paths to hook; empty means every keyboard
    pub devices: Vec<String>,

    /// Frames per second of the host loop
    pub frame_rate_hz: u32,

    /// Keys whose per-frame phase the host reports
    pub watch: Vec<Key>,

    /// Path to the settings file (for reload)
    source_path: Option<PathBuf>,
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),
}

/// TOML representation for deserializing settings
#[derive(Debug, Clone, serde::Deserialize, Default)]
struct SettingsToml {
    #[serde(default)]
    hook: Option<HookSettings>,

    #[serde(default)]
    devices: Option<DeviceSettings>,

    #[serde(default)]
    frame: Option<FrameSettings>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct HookSettings {
    #[serde(default)]
    run_in_background: Option<toml::Value>,
    #[serde(default)]
    intercept_messages: Option<toml::Value>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct DeviceSettings {
    #[serde(default)]
    only: Vec<String>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct FrameSettings {
    #[serde(default)]
    rate_hz: Option<i64>,
    #[serde(default)]
    watch: Option<Vec<String>>,
}

impl Settings {
    pub fn new() -> Self {
        Self {
            run_in_background: true,
            intercept_messages: false,
            devices: Vec::new(),
            frame_rate_hz: 60,
            watch: vec![Key::SPACE],
            source_path: None,
        }
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(&path)?;
        let mut settings = Self::from_toml(&content)?;
        settings.source_path = Some(path.as_ref().to_path_buf());
        Ok(settings)
    }

    /// Load settings from TOML string
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let parsed: SettingsToml =
            toml::from_str(content).map_err(|e| SettingsError::TomlParse(e.to_string()))?;

        let mut settings = Self::new();

        if let Some(hook) = parsed.hook {
            if let Some(value) = hook.run_in_background {
                settings.run_in_background = parse_bool_value(&value)?;
            }
            if let Some(value) = hook.intercept_messages {
                settings.intercept_messages = parse_bool_value(&value)?;
            }
        }

        if let Some(devices) = parsed.devices {
            settings.devices = devices.only;
        }

        if let Some(frame) = parsed.frame {
            if let Some(rate) = frame.rate_hz {
                settings.frame_rate_hz = parse_frame_rate(rate)?;
            }
            if let Some(names) = frame.watch {
                settings.watch = names
                    .iter()
                    .map(|name| {
                        name.parse::<Key>()
                            .map_err(SettingsError::InvalidValue)
                    })
                    .collect::<Result<_, _>>()?;
            }
        }

        Ok(settings)
    }

    /// Get the default settings path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rawkeys").join("settings.toml"))
    }

    /// Load from default location (~/.config/rawkeys/settings.toml)
    pub fn load_default() -> Result<Self, SettingsError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        Ok(Self::new())
    }

    /// Reload settings from the original file
    pub fn reload(&mut self) -> Result<(), SettingsError> {
        if let Some(ref path) = self.source_path {
            *self = Self::from_file(path.clone())?;
            Ok(())
        } else {
            Err(SettingsError::InvalidValue("No source path set".to_string()))
        }
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Validate and set the frame rate
    pub fn set_frame_rate(&mut self, rate_hz: u32) -> Result<(), SettingsError> {
        self.frame_rate_hz = parse_frame_rate(i64::from(rate_hz))?;
        Ok(())
    }

    /// Time budget of one frame
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(1) / self.frame_rate_hz.max(1)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_frame_rate(rate: i64) -> Result<u32, SettingsError> {
    u32::try_from(rate)
        .ok()
        .filter(|r| FRAME_RATE_RANGE.contains(r))
        .ok_or_else(|| {
            SettingsError::InvalidValue(format!(
                "frame rate {} outside {}..={}",
                rate,
                FRAME_RATE_RANGE.start(),
                FRAME_RATE_RANGE.end()
            ))
        })
}

/// Parse a TOML value as a boolean
fn parse_bool_value(value: &toml::Value) -> Result<bool, SettingsError> {
    match value {
        toml::Value::Boolean(b) => Ok(*b),
        toml::Value::Integer(1) => Ok(true),
        toml::Value::Integer(0) => Ok(false),
        toml::Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(SettingsError::InvalidValue(format!(
                "Cannot convert '{}' to boolean",
                s
            ))),
        },
        _ => Err(SettingsError::InvalidValue(format!(
            "Cannot convert {:?} to boolean",
            value
        ))),
    }
}

/// Create default settings content for a new installation
pub fn default_settings_content() -> &'static str {
    r#"# Rawkeys Settings
# Place this file at: ~/.config/rawkeys/settings.toml

[hook]
# Keep receiving keys on a hook thread instead of only when pumped
run_in_background = true
# Swallow hooked keys so no other application sees them
intercept_messages = false

[devices]
# Device names or /dev/input paths; empty hooks every keyboard
only = []

[frame]
rate_hz = 60
# Keys whose Down/Held/Up phase is logged every frame
watch = ["SPACE"]
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::new();
        assert!(settings.run_in_background);
        assert!(!settings.intercept_messages);
        assert!(settings.devices.is_empty());
        assert_eq!(settings.frame_rate_hz, 60);
        assert_eq!(settings.watch, vec![Key::SPACE]);
    }

    #[test]
    fn test_default_content_matches_defaults() {
        let settings = Settings::from_toml(default_settings_content()).unwrap();
        assert_eq!(settings, Settings::new());
    }

    #[test]
    fn test_settings_from_toml() {
        let toml = r#"
[hook]
run_in_background = false
intercept_messages = "yes"

[devices]
only = ["/dev/input/event3", "AT Translated Set 2 keyboard"]

[frame]
rate_hz = 144
watch = ["a", "left_shift"]
"#;

        let settings = Settings::from_toml(toml).unwrap();
        assert!(!settings.run_in_background);
        assert!(settings.intercept_messages);
        assert_eq!(settings.devices.len(), 2);
        assert_eq!(settings.frame_rate_hz, 144);
        assert_eq!(settings.watch, vec![Key::A, Key::LEFT_SHIFT]);
    }

    #[test]
    fn test_bool_spellings() {
        for (raw, expected) in [("true", true), ("on", true), ("1", false), ("off", false)] {
            let toml = if raw == "1" {
                "[hook]\nintercept_messages = 0\n".to_string()
            } else {
                format!("[hook]\nintercept_messages = \"{}\"\n", raw)
            };
            let settings = Settings::from_toml(&toml).unwrap();
            assert_eq!(settings.intercept_messages, expected, "{}", raw);
        }
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        let result = Settings::from_toml("[hook]\nintercept_messages = \"maybe\"\n");
        assert!(matches!(result, Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn test_unknown_watch_key_is_rejected() {
        let result = Settings::from_toml("[frame]\nwatch = [\"SPACE\", \"HYPERDRIVE\"]\n");
        assert!(matches!(result, Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn test_frame_rate_bounds() {
        assert!(matches!(
            Settings::from_toml("[frame]\nrate_hz = 0\n"),
            Err(SettingsError::InvalidValue(_))
        ));
        assert!(matches!(
            Settings::from_toml("[frame]\nrate_hz = -5\n"),
            Err(SettingsError::InvalidValue(_))
        ));

        let mut settings = Settings::new();
        assert!(settings.set_frame_rate(1001).is_err());
        settings.set_frame_rate(50).unwrap();
        assert_eq!(settings.frame_interval(), std::time::Duration::from_millis(20));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Settings::from_toml("[hook"),
            Err(SettingsError::TomlParse(_))
        ));
    }

    #[test]
    fn test_reload_without_source_path() {
        let mut settings = Settings::new();
        assert!(settings.reload().is_err());
        assert!(settings.source_path().is_none());
    }
}
