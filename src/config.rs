use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::station::input::{Direction, Key, KeyBindings};
use crate::util::vec3::Vec3;

/// Station configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Maximum sideways camera shift when the desktop occupant looks behind (meters)
    pub desktop_head_x_offset: f32,
    /// Desktop adjustment speed (meters per second per held direction)
    pub transition_speed: f32,
    /// Resting seat offset, used on init and whenever a remote occupant leaves
    pub default_offset: Vec3,
    /// Keys for the six desktop adjustment directions
    pub bindings: KeyBindings,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            desktop_head_x_offset: 0.25,
            transition_speed: 0.2,
            default_offset: Vec3::DOWN * 0.6,
            bindings: KeyBindings::default(),
        }
    }
}

impl StationConfig {
    /// Load config from `STATION_CONFIG_PATH` (JSON) and environment, or use defaults
    pub fn load_or_default() -> Self {
        let mut config = match std::env::var("STATION_CONFIG_PATH") {
            Ok(path) => match Self::from_json_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to load station config '{}': {}, using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };

        if let Ok(value) = std::env::var("STATION_HEAD_X_OFFSET") {
            match value.parse::<f32>() {
                Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => {
                    config.desktop_head_x_offset = parsed;
                }
                _ => tracing::warn!("Invalid STATION_HEAD_X_OFFSET '{}', using default", value),
            }
        }

        if let Ok(value) = std::env::var("STATION_TRANSITION_SPEED") {
            match value.parse::<f32>() {
                Ok(parsed) if parsed.is_finite() && parsed > 0.0 => {
                    config.transition_speed = parsed;
                }
                _ => tracing::warn!("Invalid STATION_TRANSITION_SPEED '{}', using default", value),
            }
        }

        if let Ok(value) = std::env::var("STATION_DEFAULT_OFFSET") {
            match Vec3::parse_csv(&value) {
                Some(parsed) => config.default_offset = parsed,
                None => tracing::warn!("Invalid STATION_DEFAULT_OFFSET '{}', expected x,y,z", value),
            }
        }

        for direction in Direction::ALL {
            let var = format!("STATION_KEY_{}", direction.env_suffix());
            if let Ok(value) = std::env::var(&var) {
                match value.parse::<Key>() {
                    Ok(key) => config.bindings.set(direction, key),
                    Err(e) => tracing::warn!("Invalid {} '{}': {}", var, value, e),
                }
            }
        }

        config
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.desktop_head_x_offset.is_finite() || self.desktop_head_x_offset < 0.0 {
            return Err(ConfigError::Invalid(
                "desktop_head_x_offset must be a finite, non-negative number".to_string(),
            ));
        }
        if !self.transition_speed.is_finite() || self.transition_speed <= 0.0 {
            return Err(ConfigError::Invalid(
                "transition_speed must be a finite, positive number".to_string(),
            ));
        }
        let o = self.default_offset;
        if !(o.x.is_finite() && o.y.is_finite() && o.z.is_finite()) {
            return Err(ConfigError::Invalid("default_offset must be finite".to_string()));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
