use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, WaybillError};

/// Shortest typing simulation the widget will use.
pub const MIN_TYPING_DELAY_MS: u64 = 800;
/// Longest typing simulation the widget will use.
pub const MAX_TYPING_DELAY_MS: u64 = 1000;

/// Top-level configuration for the Waybill assistant.
///
/// Loaded from `~/.waybill/config.toml` by default. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaybillConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

impl WaybillConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WaybillConfig = toml::from_str(&content)?;
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
        let content =
            toml::to_string_pretty(self).map_err(|e| WaybillError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
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

/// Timing and input limits of the assistant widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Simulated typing time before a reply is revealed. Clamped to 800..=1000.
    pub typing_delay_ms: u64,
    /// Delay after load before the unread badge is shown.
    pub badge_delay_ms: u64,
    /// Quiet period after a navigation notification before the active
    /// section is read again.
    pub navigation_debounce_ms: u64,
    /// Longest accepted free-text submission, in characters.
    pub max_message_length: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            typing_delay_ms: 900,
            badge_delay_ms: 3000,
            navigation_debounce_ms: 500,
            max_message_length: 500,
        }
    }
}

impl AssistantConfig {
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(
            self.typing_delay_ms
                .clamp(MIN_TYPING_DELAY_MS, MAX_TYPING_DELAY_MS),
        )
    }

    pub fn badge_delay(&self) -> Duration {
        Duration::from_millis(self.badge_delay_ms)
    }

    pub fn navigation_debounce(&self) -> Duration {
        Duration::from_millis(self.navigation_debounce_ms)
    }
}

/// Knowledge catalog source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Path to a custom catalog (`.toml` or `.json`). Empty means the
    /// built-in catalog.
    pub path: String,
}

impl KnowledgeConfig {
    /// The custom catalog path, if one is configured.
    pub fn custom_path(&self) -> Option<&Path> {
        let trimmed = self.path.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Path::new(trimmed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = WaybillConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.assistant.typing_delay_ms, 900);
        assert_eq!(config.assistant.badge_delay_ms, 3000);
        assert_eq!(config.assistant.navigation_debounce_ms, 500);
        assert_eq!(config.assistant.max_message_length, 500);
        assert!(config.knowledge.custom_path().is_none());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[assistant]
typing_delay_ms = 850
badge_delay_ms = 5000
navigation_debounce_ms = 250
max_message_length = 120

[knowledge]
path = "/etc/waybill/catalog.toml"
"#;
        let file = create_temp_config(content);
        let config = WaybillConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.assistant.typing_delay(), Duration::from_millis(850));
        assert_eq!(config.assistant.badge_delay(), Duration::from_secs(5));
        assert_eq!(
            config.assistant.navigation_debounce(),
            Duration::from_millis(250)
        );
        assert_eq!(config.assistant.max_message_length, 120);
        assert_eq!(
            config.knowledge.custom_path(),
            Some(Path::new("/etc/waybill/catalog.toml"))
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let content = r#"
[assistant]
badge_delay_ms = 10
"#;
        let file = create_temp_config(content);
        let config = WaybillConfig::load(file.path()).unwrap();
        assert_eq!(config.assistant.badge_delay_ms, 10);
        assert_eq!(config.assistant.typing_delay_ms, 900);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_typing_delay_is_clamped() {
        let fast = AssistantConfig {
            typing_delay_ms: 5,
            ..AssistantConfig::default()
        };
        assert_eq!(fast.typing_delay(), Duration::from_millis(800));

        let slow = AssistantConfig {
            typing_delay_ms: 60_000,
            ..AssistantConfig::default()
        };
        assert_eq!(slow.typing_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_blank_knowledge_path_means_builtin() {
        let config = KnowledgeConfig {
            path: "   ".to_string(),
        };
        assert!(config.custom_path().is_none());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = WaybillConfig::load(Path::new("/nonexistent/waybill.toml"));
        assert!(matches!(result, Err(WaybillError::Io(_))));
    }

    #[test]
    fn test_load_or_default_on_invalid_toml() {
        let file = create_temp_config("[assistant\ntyping_delay_ms = ");
        let config = WaybillConfig::load_or_default(file.path());
        assert_eq!(config.assistant, AssistantConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = WaybillConfig::default();
        config.assistant.typing_delay_ms = 950;
        config.general.log_level = "warn".to_string();
        config.save(&path).unwrap();

        let loaded = WaybillConfig::load(&path).unwrap();
        assert_eq!(loaded.assistant.typing_delay_ms, 950);
        assert_eq!(loaded.general.log_level, "warn");
    }
}
