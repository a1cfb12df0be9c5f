use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;
use crate::models::{FadeConfig, QualityHint};

/// Retry policy for failed stream resolution and playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorRetryConfig {
    /// Consecutive failures before the player pauses itself
    pub player_retries: u32,
    /// Failures on one song before it is skipped
    pub song_retries: u32,
    pub backoff_base_ms: u64,
    /// Also clear the per-song error count when a song starts playing
    pub reset_song_errors_on_success: bool,
}

impl Default for ErrorRetryConfig {
    fn default() -> Self {
        Self {
            player_retries: 10,
            song_retries: 5,
            backoff_base_ms: 500,
            reset_song_errors_on_success: false,
        }
    }
}

impl ErrorRetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

/// Player configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Songs after the current one kept loaded in the pool
    pub preload_count: usize,
    pub quality: QualityHint,
    /// Idle channels kept for reuse; extra ones are dropped
    pub free_channel_capacity: usize,
    pub throttle_window_ms: u64,
    pub loop_playlist: bool,
    pub playlist_directory: PathBuf,
    pub error_retry: ErrorRetryConfig,
    pub fade: FadeConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            preload_count: 2,
            quality: QualityHint::default(),
            free_channel_capacity: 4,
            throttle_window_ms: 500,
            loop_playlist: true,
            playlist_directory: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
                .join("poolplay")
                .join("playlists"),
            error_retry: ErrorRetryConfig::default(),
            fade: FadeConfig::default(),
        }
    }
}

impl PlayerConfig {
    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_window_ms)
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::with_path(config_path)
    }

    /// Manager backed by an explicit file. A missing file yields defaults.
    pub fn with_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let config = Self::load_config(&config_path)?;

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PlayerConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_fade(&mut self, fade: FadeConfig) -> Result<(), ConfigError> {
        self.config.fade = fade;
        self.save_config()
    }

    pub fn set_preload_count(&mut self, count: usize) -> Result<(), ConfigError> {
        self.config.preload_count = count;
        self.save_config()
    }

    pub fn set_quality(&mut self, quality: QualityHint) -> Result<(), ConfigError> {
        self.config.quality = quality;
        self.save_config()
    }

    pub fn set_retries(&mut self, player_retries: u32, song_retries: u32) -> Result<(), ConfigError> {
        self.config.error_retry.player_retries = player_retries.max(1);
        self.config.error_retry.song_retries = song_retries.max(1);
        self.save_config()
    }

    pub fn set_playlist_directory(&mut self, directory: PathBuf) -> Result<(), ConfigError> {
        self.config.playlist_directory = directory;
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = PlayerConfig::default();
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::NoHomeDirectory)?
            .join(".config")
            .join("poolplay");

        std::fs::create_dir_all(&config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}
