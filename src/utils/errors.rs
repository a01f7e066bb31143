//! User-Friendly Error Formatting
//!
//! Provides user-friendly error messages with troubleshooting hints
//! for common error scenarios.

use std::fmt::Write;

use crate::error::PipelineError;

/// Broad area an error belongs to, used to pick troubleshooting hints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Camera device acquisition
    Camera,
    /// Graphics context and surfaces
    Graphics,
    /// Call transport
    Transport,
    /// Configuration file or CLI values
    Config,
    /// Anything else
    General,
}

impl ErrorCategory {
    /// Classify an error chain
    pub fn classify(error: &anyhow::Error) -> Self {
        if let Some(pipeline) = error
            .chain()
            .find_map(|cause| cause.downcast_ref::<PipelineError>())
        {
            return match pipeline.root_cause() {
                PipelineError::DeviceUnavailable(_) | PipelineError::AlreadyOpen => Self::Camera,
                PipelineError::ContextCreationFailed(_) => Self::Graphics,
                PipelineError::TransportError(_) => Self::Transport,
                _ => Self::General,
            };
        }

        let message = format!("{:#}", error).to_lowercase();
        if message.contains("config") {
            Self::Config
        } else if message.contains("camera") {
            Self::Camera
        } else {
            Self::General
        }
    }
}

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    match ErrorCategory::classify(error) {
        ErrorCategory::Camera => format_camera_error(&mut output),
        ErrorCategory::Graphics => format_graphics_error(&mut output),
        ErrorCategory::Transport => format_transport_error(&mut output),
        ErrorCategory::Config => format_config_error(&mut output),
        ErrorCategory::General => format_generic_error(&mut output, &error.to_string()),
    }

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: arcall -vv"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Write logs to a file: arcall --log-file arcall.log"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();

    output
}

fn format_camera_error(output: &mut String) {
    writeln!(output, "Camera Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not open the camera for capture.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Camera is used by another application").ok();
    writeln!(output, "     → Close other video call or camera apps").ok();
    writeln!(output, "     → Check: fuser /dev/video0").ok();
    writeln!(output).ok();
    writeln!(output, "  2. No permission to access the camera").ok();
    writeln!(
        output,
        "     → Add your user to the video group: sudo usermod -aG video $USER"
    )
    .ok();
    writeln!(output, "     → Log out and log back in").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Unsupported capture format").ok();
    writeln!(
        output,
        "     → Lower [capture] width, height, or fps in config.toml"
    )
    .ok();
}

fn format_graphics_error(output: &mut String) {
    writeln!(output, "Graphics Context Error").ok();
    writeln!(output).ok();
    writeln!(
        output,
        "Could not create the shared display and export surfaces."
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Unsupported framebuffer configuration").ok();
    writeln!(
        output,
        "     → Use color_bits = [8, 8, 8, 8] in the [render] section"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Zero-sized surface").ok();
    writeln!(
        output,
        "     → Check display and export sizes in the [render] section"
    )
    .ok();
}

fn format_transport_error(output: &mut String) {
    writeln!(output, "Call Transport Error").ok();
    writeln!(output).ok();
    writeln!(output, "The call engine rejected an operation.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Already in a channel").ok();
    writeln!(output, "     → End the current call before joining again").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid channel name").ok();
    writeln!(
        output,
        "     → Set [transport] channel or pass --channel <name>"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  3. Network unavailable").ok();
    writeln!(output, "     → Check connectivity and firewall rules").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Configuration file not found").ok();
    writeln!(
        output,
        "     → Default location: ~/.config/arcall/config.toml"
    )
    .ok();
    writeln!(
        output,
        "     → Or specify: arcall --config /path/to/config.toml"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Out-of-range values").ok();
    writeln!(
        output,
        "     → Sizes and rates must be non-zero, max_views at least 1"
    )
    .ok();
    writeln!(
        output,
        "     → Encoder frame_rate cannot exceed render target_fps"
    )
    .ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Pipeline Error").ok();
    writeln!(output).ok();
    writeln!(output, "An error occurred while running the call pipeline.").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
    writeln!(output).ok();
    writeln!(output, "Troubleshooting:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Re-run with -vv and check the last log lines").ok();
    writeln!(
        output,
        "  2. Try the default configuration by moving config.toml aside"
    )
    .ok();
}
