//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - Environment variables (through the CLI)
//! - CLI arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod types;

use types::*;

use crate::transport::{ChannelRef, TransportSettings};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Camera capture configuration
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Render loop configuration
    #[serde(default)]
    pub render: RenderConfig,
    /// Outgoing encoder configuration
    #[serde(default)]
    pub encoder: EncoderConfig,
    /// Call transport configuration
    #[serde(default)]
    pub transport: TransportConfig,
    /// AR effect configuration
    #[serde(default)]
    pub effect: EffectConfig,
    /// Participant view configuration
    #[serde(default)]
    pub participants: ParticipantsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Default config file location (`<config dir>/arcall/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("arcall").join("config.toml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            anyhow::bail!(
                "Invalid capture resolution: {}x{}",
                self.capture.width,
                self.capture.height
            );
        }
        if self.capture.fps == 0 {
            anyhow::bail!("Capture fps must be non-zero");
        }
        if !matches!(self.capture.orientation_degrees, 0 | 90 | 180 | 270) {
            anyhow::bail!(
                "Invalid capture orientation: {} degrees",
                self.capture.orientation_degrees
            );
        }

        let render = &self.render;
        if render.display_width == 0
            || render.display_height == 0
            || render.export_width == 0
            || render.export_height == 0
        {
            anyhow::bail!(
                "Invalid surface sizes: display {}x{}, export {}x{}",
                render.display_width,
                render.display_height,
                render.export_width,
                render.export_height
            );
        }
        if render.target_fps == 0 {
            anyhow::bail!("Render target_fps must be non-zero");
        }

        if self.encoder.width == 0 || self.encoder.height == 0 || self.encoder.frame_rate == 0 {
            anyhow::bail!(
                "Invalid encoder configuration: {}x{} @ {} fps",
                self.encoder.width,
                self.encoder.height,
                self.encoder.frame_rate
            );
        }
        // Frames beyond the render cadence would only repeat
        if self.encoder.frame_rate > render.target_fps {
            anyhow::bail!(
                "Encoder frame rate ({}) cannot exceed render target_fps ({})",
                self.encoder.frame_rate,
                render.target_fps
            );
        }

        if self.transport.channel.trim().is_empty() {
            anyhow::bail!("Transport channel name is empty");
        }

        if self.participants.max_views == 0 {
            anyhow::bail!("participants.max_views must be at least 1");
        }

        if self.effect.initial.slot.is_empty() {
            anyhow::bail!("Initial effect slot is empty");
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, channel: Option<String>, max_views: Option<usize>) -> Self {
        if let Some(channel) = channel {
            self.transport.channel = channel;
        }
        if let Some(max_views) = max_views {
            self.participants.max_views = max_views;
        }
        self
    }

    /// Channel to join
    pub fn channel(&self) -> ChannelRef {
        ChannelRef::new(self.transport.channel.clone())
    }

    /// Settings applied to the transport at pipeline start
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            encoder: self.encoder.clone(),
            channel_profile: self.transport.channel_profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert_eq!(config.transport.channel, "channel");
        assert_eq!(config.participants.max_views, 4);
        assert_eq!(config.effect.initial.to_string(), "mask:aviators");
        assert_eq!(config.render.color_bits, [8, 8, 8, 8]);
        assert_eq!(config.render.depth_bits, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_views() {
        let mut config = Config::default_config();
        config.participants.max_views = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_encoder_faster_than_render() {
        let mut config = Config::default_config();
        config.encoder.frame_rate = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default_config();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_surface() {
        let mut config = Config::default_config();
        config.render.export_height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_overrides() {
        let config = Config::default_config().with_overrides(Some("room".to_string()), Some(2));
        assert_eq!(config.channel().name(), "room");
        assert_eq!(config.participants.max_views, 2);

        let unchanged = Config::default_config().with_overrides(None, None);
        assert_eq!(unchanged.transport.channel, "channel");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[transport]
channel = "studio"

[participants]
max_views = 3
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.transport.channel, "studio");
        assert_eq!(config.participants.max_views, 3);
        assert_eq!(config.encoder.frame_rate, 15);
        assert_eq!(
            config.transport.channel_profile,
            ChannelProfile::LiveBroadcasting
        );
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[participants]\nmax_views = 0").unwrap();
        assert!(Config::load(file.path()).is_err());

        assert!(Config::load("/nonexistent/arcall.toml").is_err());
    }

    #[test]
    fn test_transport_settings() {
        let settings = Config::default_config().transport_settings();
        assert_eq!(settings.encoder.width, 480);
        assert_eq!(settings.channel_profile, ChannelProfile::LiveBroadcasting);
    }
}
