use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NudgeError, Result};

/// Top-level configuration for the Nudge engine.
///
/// Loaded from `~/.nudge/config.toml` by default. Every section falls back to
/// its defaults when omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub geofence: GeofenceConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub companion: CompanionConfig,
}

impl NudgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NudgeConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let esc = &self.escalation;
        if esc.quiet_start_hour > 23 || esc.quiet_end_hour > 23 {
            return Err(NudgeError::Config(format!(
                "quiet hours must be 0-23, got {}-{}",
                esc.quiet_start_hour, esc.quiet_end_hour
            )));
        }
        if esc.snooze_secs <= 0 {
            return Err(NudgeError::Config("snooze_secs must be positive".into()));
        }
        if !self.geofence.default_radius_meters.is_finite()
            || self.geofence.default_radius_meters <= 0.0
        {
            return Err(NudgeError::Config(format!(
                "default_radius_meters must be positive, got {}",
                self.geofence.default_radius_meters
            )));
        }
        if self.events.channel_capacity == 0 {
            return Err(NudgeError::Config(
                "events.channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Escalation ladder and snooze settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Seconds between escalation steps. Values below 60 are raised to 60.
    pub interval_secs: i64,
    /// Delay of a snoozed alert, in seconds.
    pub snooze_secs: i64,
    /// First local hour of the silent window (inclusive).
    pub quiet_start_hour: u32,
    /// Local hour the silent window ends (exclusive).
    pub quiet_end_hour: u32,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            snooze_secs: 300,
            quiet_start_hour: 22,
            quiet_end_hour: 7,
        }
    }
}

/// Geofence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    /// Radius offered when the caller does not pick one.
    pub default_radius_meters: f64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            default_radius_meters: 100.0,
        }
    }
}

/// Domain event stream settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Buffered events per subscriber before slow receivers start lagging.
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Companion-device mirroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    pub enabled: bool,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NudgeConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.escalation.interval_secs, 300);
        assert_eq!(config.escalation.snooze_secs, 300);
        assert_eq!(config.escalation.quiet_start_hour, 22);
        assert_eq!(config.escalation.quiet_end_hour, 7);
        assert_eq!(config.geofence.default_radius_meters, 100.0);
        assert_eq!(config.events.channel_capacity, 256);
        assert!(config.companion.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_section_defaults() {
        let toml_str = r#"
            [escalation]
            interval_secs = 600
        "#;
        let config: NudgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.escalation.interval_secs, 600);
        assert_eq!(config.escalation.snooze_secs, 300);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = NudgeConfig::default();
        config.escalation.interval_secs = 120;
        config.companion.enabled = false;
        config.save(&path).unwrap();

        let loaded = NudgeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = NudgeConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config, NudgeConfig::default());
    }

    #[test]
    fn test_load_or_default_on_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[escalation]\nquiet_start_hour = 30\n").unwrap();

        assert!(matches!(NudgeConfig::load(&path), Err(NudgeError::Config(_))));
        assert_eq!(NudgeConfig::load_or_default(&path), NudgeConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = NudgeConfig::default();
        config.escalation.snooze_secs = 0;
        assert!(config.validate().is_err());

        let mut config = NudgeConfig::default();
        config.geofence.default_radius_meters = -1.0;
        assert!(config.validate().is_err());

        let mut config = NudgeConfig::default();
        config.events.channel_capacity = 0;
        assert!(config.validate().is_err());
    }
}
