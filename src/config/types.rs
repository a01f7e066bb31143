//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::frame::{CaptureFormat, Orientation, PixelFormat};
use crate::effect::EffectRef;

/// Camera capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Capture width in pixels
    pub width: u32,

    /// Capture height in pixels
    pub height: u32,

    /// Native capture rate
    pub fps: u32,

    /// Pixel layout delivered by the device
    #[serde(default = "default_pixel_format")]
    pub format: PixelFormat,

    /// Sensor rotation in degrees (0, 90, 180, 270)
    #[serde(default)]
    pub orientation_degrees: u32,

    /// Front-facing camera (frames are mirrored)
    #[serde(default = "default_true")]
    pub mirrored: bool,
}

fn default_pixel_format() -> PixelFormat {
    PixelFormat::Nv21
}

fn default_true() -> bool {
    true
}

impl CaptureConfig {
    /// Capture format announced by the device
    ///
    /// Unknown rotations fall back to upright.
    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            width: self.width,
            height: self.height,
            fps: self.fps,
            format: self.format,
            orientation: Orientation::from_degrees(self.orientation_degrees)
                .unwrap_or(Orientation::Deg0),
            mirrored: self.mirrored,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            format: default_pixel_format(),
            orientation_degrees: 0,
            mirrored: true,
        }
    }
}

/// Render loop and surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Render loop cadence
    pub target_fps: u32,

    /// On-screen surface width
    pub display_width: u32,

    /// On-screen surface height
    pub display_height: u32,

    /// Export surface width (should match the encoder)
    pub export_width: u32,

    /// Export surface height
    pub export_height: u32,

    /// Red, green, blue, alpha bits of the framebuffer config
    #[serde(default = "default_color_bits")]
    pub color_bits: [u8; 4],

    /// Depth buffer bits
    #[serde(default = "default_depth_bits")]
    pub depth_bits: u8,
}

fn default_color_bits() -> [u8; 4] {
    [8, 8, 8, 8]
}

fn default_depth_bits() -> u8 {
    16
}

impl RenderConfig {
    /// Time budget of one render cycle
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            display_width: 480,
            display_height: 480,
            export_width: 480,
            export_height: 480,
            color_bits: default_color_bits(),
            depth_bits: default_depth_bits(),
        }
    }
}

/// Encoder orientation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationMode {
    /// Follow the captured orientation
    Adaptive,
    /// Always encode landscape
    FixedLandscape,
    /// Always encode portrait
    FixedPortrait,
}

/// Outgoing video encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Encoded width
    pub width: u32,

    /// Encoded height
    pub height: u32,

    /// Encoded frame rate
    pub frame_rate: u32,

    /// Target bitrate in kbps (0 = engine's standard bitrate)
    #[serde(default)]
    pub bitrate_kbps: u32,

    /// Orientation policy
    #[serde(default = "default_orientation_mode")]
    pub orientation_mode: OrientationMode,
}

fn default_orientation_mode() -> OrientationMode {
    OrientationMode::FixedPortrait
}

impl EncoderConfig {
    /// Check if the engine picks the bitrate itself
    pub fn uses_standard_bitrate(&self) -> bool {
        self.bitrate_kbps == 0
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 480,
            frame_rate: 15,
            bitrate_kbps: 0,
            orientation_mode: default_orientation_mode(),
        }
    }
}

/// Channel usage profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelProfile {
    /// Everyone publishes
    Communication,
    /// Broadcasters publish, audience watches
    LiveBroadcasting,
}

/// Local client role in a broadcasting channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Publishes video
    Broadcaster,
    /// Receives only
    Audience,
}

/// How a remote video is fitted into its view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteRenderMode {
    /// Fill the view, cropping overflow
    Hidden,
    /// Fit inside the view, letterboxing
    Fit,
}

/// Call transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Channel to join
    pub channel: String,

    /// Channel usage profile
    #[serde(default = "default_channel_profile")]
    pub channel_profile: ChannelProfile,

    /// Role set before joining
    #[serde(default = "default_client_role")]
    pub client_role: ClientRole,

    /// Render mode of remote views
    #[serde(default = "default_remote_render_mode")]
    pub remote_render_mode: RemoteRenderMode,

    /// Simulated join latency of the loopback transport in milliseconds
    #[serde(default = "default_join_latency_ms")]
    pub join_latency_ms: u64,
}

fn default_channel_profile() -> ChannelProfile {
    ChannelProfile::LiveBroadcasting
}

fn default_client_role() -> ClientRole {
    ClientRole::Broadcaster
}

fn default_remote_render_mode() -> RemoteRenderMode {
    RemoteRenderMode::Hidden
}

fn default_join_latency_ms() -> u64 {
    120
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            channel: "channel".to_string(),
            channel_profile: default_channel_profile(),
            client_role: default_client_role(),
            remote_render_mode: default_remote_render_mode(),
            join_latency_ms: default_join_latency_ms(),
        }
    }
}

/// AR effect configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectConfig {
    /// Effect switched in once the engine reports initialization
    pub initial: EffectRef,

    /// Simulated initialization time of the overlay engine in milliseconds
    #[serde(default = "default_init_delay_ms")]
    pub init_delay_ms: u64,
}

fn default_init_delay_ms() -> u64 {
    200
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            initial: EffectRef::new("mask", "aviators"),
            init_delay_ms: default_init_delay_ms(),
        }
    }
}

/// Participant view configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantsConfig {
    /// Total views including the local one
    pub max_views: usize,
}

impl Default for ParticipantsConfig {
    fn default() -> Self {
        Self { max_views: 4 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Directory for daily-rotated log files
    pub log_dir: Option<PathBuf>,

    /// Enable metrics collection
    pub metrics: bool,

    /// Frames between periodic pipeline statistics
    #[serde(default = "default_stats_interval")]
    pub stats_interval_frames: u64,
}

fn default_stats_interval() -> u64 {
    100
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            metrics: true,
            stats_interval_frames: default_stats_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_format_from_config() {
        let config = CaptureConfig {
            orientation_degrees: 270,
            ..CaptureConfig::default()
        };
        let format = config.capture_format();
        assert_eq!(format.orientation, Orientation::Deg270);
        assert_eq!(format.format, PixelFormat::Nv21);
        assert!(format.mirrored);
    }

    #[test]
    fn test_invalid_rotation_falls_back_to_upright() {
        let config = CaptureConfig {
            orientation_degrees: 45,
            ..CaptureConfig::default()
        };
        assert_eq!(config.capture_format().orientation, Orientation::Deg0);
    }

    #[test]
    fn test_encoder_defaults() {
        let encoder = EncoderConfig::default();
        assert_eq!((encoder.width, encoder.height, encoder.frame_rate), (480, 480, 15));
        assert!(encoder.uses_standard_bitrate());
        assert_eq!(encoder.orientation_mode, OrientationMode::FixedPortrait);
    }

    #[test]
    fn test_enum_serialization() {
        let toml = toml::to_string(&TransportConfig::default()).unwrap();
        assert!(toml.contains("channel_profile = \"live_broadcasting\""));
        assert!(toml.contains("client_role = \"broadcaster\""));
    }
}
