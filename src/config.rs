//! Configuration management for the kiosk controller
//!
//! Provides loading, saving, and validation of camera, session, printer,
//! and directory settings.

use crate::errors::KioskError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskConfig {
    pub camera: CameraConfig,
    pub session: SessionConfig,
    pub printer: PrinterConfig,
    pub directory: DirectoryConfig,
}

/// Camera-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera device id ("0" = first enumerated device)
    pub device_id: String,
    /// Scan resolution [width, height]
    pub resolution: [u32; 2],
    /// Delay between decode attempts in milliseconds
    pub frame_interval_ms: u64,
    /// Consecutive frame failures before the stream is declared lost
    pub max_frame_failures: u32,
}

/// Session / state machine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Result screen dwell before scanning auto-resumes, in milliseconds
    pub dwell_ms: u64,
    /// Prefix stripped from decoded tokens (e.g. "MEAL:")
    pub token_prefix: String,
    /// Play feedback tones
    pub audio_enabled: bool,
}

/// Receipt printer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterConfig {
    /// Printer socket address, e.g. "192.168.1.100:9100"
    pub addr: String,
    /// Paper width in characters (58mm = 32, 80mm = 48)
    pub width: usize,
    /// Connect/print timeout in milliseconds
    pub timeout_ms: u64,
    /// Receipt header line (store name)
    pub header: String,
    /// Receipt footer line
    pub footer: String,
}

/// Order directory endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL of the order directory API
    pub base_url: String,
    /// Optional bearer token
    pub auth_token: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                device_id: "0".to_string(),
                resolution: [1280, 720],
                frame_interval_ms: 100,
                max_frame_failures: 30,
            },
            session: SessionConfig {
                dwell_ms: 3000,
                token_prefix: String::new(),
                audio_enabled: true,
            },
            printer: PrinterConfig {
                addr: "192.168.1.100:9100".to_string(),
                width: 32,
                timeout_ms: 5000,
                header: "CAMPUS EATS".to_string(),
                footer: "Thank you!".to_string(),
            },
            directory: DirectoryConfig {
                base_url: "http://localhost:8080/api".to_string(),
                auth_token: None,
                timeout_ms: 5000,
            },
        }
    }
}

impl KioskConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, KioskError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| KioskError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: KioskConfig = toml::from_str(&contents)
            .map_err(|e| KioskError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), KioskError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                KioskError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| KioskError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| KioskError::ConfigError(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("mealkiosk.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.resolution[0] == 0 || self.camera.resolution[1] == 0 {
            return Err("Invalid camera resolution".to_string());
        }
        if self.camera.frame_interval_ms == 0 {
            return Err("Frame interval must be at least 1ms".to_string());
        }
        if self.camera.max_frame_failures == 0 {
            return Err("Max frame failures must be at least 1".to_string());
        }
        if self.session.dwell_ms == 0 {
            return Err("Dwell must be at least 1ms".to_string());
        }
        if self.printer.width == 0 || self.printer.width > 64 {
            return Err("Printer width must be between 1 and 64 characters".to_string());
        }
        if self.directory.base_url.is_empty() {
            return Err("Directory base URL must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KioskConfig::default();
        assert_eq!(config.camera.resolution, [1280, 720]);
        assert_eq!(config.session.dwell_ms, 3000);
        assert!(config.session.audio_enabled);
    }

    #[test]
    fn test_config_validation() {
        let config = KioskConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_config = config.clone();
        bad_config.camera.resolution = [0, 0];
        assert!(bad_config.validate().is_err());

        let mut bad_dwell = KioskConfig::default();
        bad_dwell.session.dwell_ms = 0;
        assert!(bad_dwell.validate().is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mealkiosk.toml");

        let mut config = KioskConfig::default();
        config.session.token_prefix = "MEAL:".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = KioskConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.session.token_prefix, "MEAL:");
        assert_eq!(loaded.printer.width, 32);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let loaded = KioskConfig::load_from_file("/nonexistent/mealkiosk.toml").unwrap();
        assert_eq!(loaded.camera.device_id, "0");
    }
}
