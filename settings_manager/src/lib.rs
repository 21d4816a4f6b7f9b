//! Configuration management for the spatial voice client
//!
//! This crate handles loading, saving and accessing
//! application configuration.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use voice_core::Error;

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Signaling server, e.g. `http://localhost:8080`
    pub server_address: String,

    /// Session token handed out by the game server
    pub session_id: String,

    /// List of STUN/TURN servers for WebRTC connectivity
    pub ice_servers: Vec<String>,

    /// Seconds between keep-alive packets
    pub keep_alive_secs: u64,

    /// Volume of newly seen players
    pub default_volume: f32,

    /// Upper bound for per-player volume
    pub max_volume: f32,

    /// User's display name
    pub username: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: "http://localhost:8080".to_string(),
            session_id: String::new(),
            ice_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:3478".to_string(),
                "stun:stun2.l.google.com:19302".to_string(),
            ],
            keep_alive_secs: 15,
            default_volume: 1.0,
            max_volume: 2.0,
            username: "Anonymous".to_string(),
        }
    }
}

impl Settings {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Reject values the session cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.keep_alive_secs == 0 {
            return Err(Error::Config(
                "keep_alive_secs must be at least 1".to_string(),
            ));
        }
        if !(self.max_volume.is_finite() && self.max_volume >= 0.0) {
            return Err(Error::Config(format!(
                "max_volume must be a non-negative number, got {}",
                self.max_volume
            )));
        }
        if !(0.0..=self.max_volume).contains(&self.default_volume) {
            return Err(Error::Config(format!(
                "default_volume must be between 0 and {}, got {}",
                self.max_volume, self.default_volume
            )));
        }
        Ok(())
    }
}

/// Configuration manager
pub struct ConfigManager {
    settings: Settings,
    config_file: PathBuf,
}

impl ConfigManager {
    /// Load settings from the user's config directory, or defaults
    pub fn new() -> Result<Self, Error> {
        let config_file = Self::default_path()?;
        Self::with_file(config_file)
    }

    /// `<config dir>/spatial_voice/config.toml`
    pub fn default_path() -> Result<PathBuf, Error> {
        let mut config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Failed to determine config directory".to_string()))?;
        config_dir.push("spatial_voice");
        Ok(config_dir.join("config.toml"))
    }

    /// Create a ConfigManager backed by a specific file
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_file = path.as_ref().to_path_buf();
        let settings = if config_file.exists() {
            Self::load_from_file(&config_file)?
        } else {
            debug!("Config file {:?} not found, using defaults", config_file);
            Settings::default()
        };

        Ok(Self {
            settings,
            config_file,
        })
    }

    /// Load settings from a TOML file
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Settings, Error> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let settings: Settings = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
        settings.validate()?;

        info!("Loaded config from {:?}", path.as_ref());
        Ok(settings)
    }

    /// Save settings to the config file
    pub fn save(&self) -> Result<(), Error> {
        self.settings.validate()?;
        let toml = toml::to_string_pretty(&self.settings)
            .map_err(|e| Error::Config(format!("Failed to serialize settings: {}", e)))?;

        // Ensure parent directory exists
        if let Some(parent) = self.config_file.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        fs::write(&self.config_file, toml)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        debug!("Saved config to {:?}", self.config_file);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config_file
    }

    /// Get the current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a mutable reference to settings
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.keep_alive(), Duration::from_secs(15));
        assert_eq!(settings.default_volume, 1.0);
        assert_eq!(settings.max_volume, 2.0);
        assert!(!settings.ice_servers.is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test_log::test]
    fn save_and_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = ConfigManager::with_file(&config_path).unwrap();
        config.settings_mut().server_address = "https://voice.example.org".to_string();
        config.settings_mut().session_id = "abc123".to_string();
        config.settings_mut().max_volume = 3.0;

        config.save().unwrap();
        assert!(config_path.exists());

        let loaded = ConfigManager::with_file(&config_path).unwrap();
        assert_eq!(loaded.settings(), config.settings());
        assert_eq!(loaded.path(), config_path.as_path());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "session_id = \"s1\"\nkeep_alive_secs = 5\n").unwrap();

        let config = ConfigManager::with_file(&config_path).unwrap();
        assert_eq!(config.settings().session_id, "s1");
        assert_eq!(config.settings().keep_alive(), Duration::from_secs(5));
        assert_eq!(config.settings().username, "Anonymous");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "default_volume = 5.0\nmax_volume = 2.0\n").unwrap();
        assert!(matches!(
            ConfigManager::with_file(&config_path),
            Err(Error::Config(_))
        ));

        fs::write(&config_path, "keep_alive_secs = \"often\"\n").unwrap();
        assert!(matches!(
            ConfigManager::with_file(&config_path),
            Err(Error::Config(_))
        ));

        let mut config = ConfigManager::with_file(temp_dir.path().join("other.toml")).unwrap();
        config.settings_mut().keep_alive_secs = 0;
        assert!(config.save().is_err());
    }

    #[test]
    fn file_not_found_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let nonexistent_path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigManager::with_file(&nonexistent_path).unwrap();
        assert_eq!(config.settings(), &Settings::default());
    }
}
