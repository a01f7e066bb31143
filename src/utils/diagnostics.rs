//! System Diagnostics and Status Reporting
//!
//! Host information logged at startup and a session summary logged at
//! shutdown.

use std::path::PathBuf;
use sysinfo::System;
use tracing::info;

use crate::call::controller::PipelineStats;
use crate::config::Config;
use crate::utils::metrics::{metric_names, MetricsCollector};

/// System information for diagnostics
#[derive(Debug, Clone)]
pub struct SystemInfo {
    /// Operating system name
    pub os_name: String,
    /// Operating system version string
    pub os_version: String,

    /// Kernel version string
    pub kernel_version: String,

    /// Number of logical CPU cores
    pub cpu_count: usize,

    /// Total system memory in megabytes
    pub total_memory_mb: u64,

    /// System hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Gather system information
    pub fn gather() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        Self {
            os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version().unwrap_or_else(|| "Unknown".to_string()),
            cpu_count: sys.cpus().len(),
            total_memory_mb: sys.total_memory() / 1024 / 1024,
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    /// Log system information
    pub fn log(&self) {
        info!("=== System Information ===");
        info!("  OS: {} {}", self.os_name, self.os_version);
        info!("  Kernel: {}", self.kernel_version);
        info!("  Hostname: {}", self.hostname);
        info!("  CPUs: {}", self.cpu_count);
        info!("  Memory: {} MB", self.total_memory_mb);
    }
}

/// List V4L2 camera device nodes present on the host
pub fn detect_video_devices() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };

    let mut devices: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("video"))
        })
        .collect();
    devices.sort();
    devices
}

/// Log complete diagnostics on startup
pub fn log_startup_diagnostics(config: &Config) {
    info!("=== Startup Diagnostics ===");

    SystemInfo::gather().log();

    info!("=== Camera ===");
    let devices = detect_video_devices();
    if devices.is_empty() {
        info!("  Video devices: none (synthetic camera only)");
    } else {
        for device in &devices {
            info!("  Video device: {}", device.display());
        }
    }
    info!(
        "  Capture: {}x{} @ {} fps ({:?})",
        config.capture.width, config.capture.height, config.capture.fps, config.capture.format
    );

    info!("=== Pipeline Configuration ===");
    info!(
        "  Render: {} fps, display {}x{}, export {}x{}",
        config.render.target_fps,
        config.render.display_width,
        config.render.display_height,
        config.render.export_width,
        config.render.export_height
    );
    info!(
        "  Encoder: {}x{} @ {} fps, {:?}",
        config.encoder.width,
        config.encoder.height,
        config.encoder.frame_rate,
        config.encoder.orientation_mode
    );
    info!(
        "  Channel: {} ({:?}, {:?})",
        config.transport.channel, config.transport.channel_profile, config.transport.client_role
    );
    info!("  Max views: {}", config.participants.max_views);
    info!("  Initial effect: {}", config.effect.initial);

    info!("=== Build ===");
    info!("  Version: {}", env!("CARGO_PKG_VERSION"));
    info!("  Commit: {} ({} {})", env!("GIT_HASH"), env!("BUILD_DATE"), env!("BUILD_TIME"));
    #[cfg(debug_assertions)]
    info!("  Build: debug");
    #[cfg(not(debug_assertions))]
    info!("  Build: release");
}

/// Log a summary of a finished session
pub fn log_session_summary(stats: &PipelineStats, metrics: &MetricsCollector) {
    let counter = |name: &str| metrics.get_counter(name).unwrap_or(0);

    info!("=== Session Summary ===");
    info!(
        "  Frames captured: {} ({} dropped before processing)",
        stats.frames_delivered,
        counter(metric_names::FRAMES_DROPPED)
    );
    info!("  Render cycles: {}", stats.renderer.cycles);
    info!(
        "  Exports: {} offered, {} overwritten, {} sent",
        stats.renderer.handoff.offered,
        stats.renderer.handoff.overwritten,
        stats.renderer.exports_sent
    );
    if let Some(cycle) = metrics.get_histogram(metric_names::RENDER_CYCLE_US) {
        info!(
            "  Render cycle: {:.0} us mean, {:.0} us p95, {:.0} us max",
            cycle.mean, cycle.p95, cycle.max
        );
    }
    info!(
        "  Capacity rejections: {}",
        counter(metric_names::CAPACITY_REJECTIONS)
    );
    info!(
        "  Transport warnings: {}",
        counter(metric_names::TRANSPORT_WARNINGS)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_info_gather() {
        let info = SystemInfo::gather();
        assert!(!info.os_name.is_empty());
        assert!(info.cpu_count > 0);
        assert!(info.total_memory_mb > 0);
    }

    #[test]
    fn test_video_devices_are_sorted_device_nodes() {
        let devices = detect_video_devices();
        assert!(devices.windows(2).all(|w| w[0] <= w[1]));
        assert!(devices.iter().all(|d| d.starts_with("/dev")));
    }
}
