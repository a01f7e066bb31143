//! Utility Functions and Diagnostics
//!
//! System diagnostics, pipeline metrics, and user-friendly error formatting.
//!
//! # Overview
//!
//! 1. **Diagnostics** - host information and camera device detection
//! 2. **Metrics** - counters, gauges, and histograms for the pipeline
//! 3. **Error Formatting** - user-facing messages with troubleshooting hints
//!
//! ## Metrics
//!
//! ```rust
//! use arcall::utils::{metric_names, MetricsCollector};
//!
//! let metrics = MetricsCollector::new();
//! metrics.increment_counter(metric_names::EXPORTS_SENT, 1);
//! metrics.record_histogram(metric_names::RENDER_CYCLE_US, 850.0);
//!
//! assert_eq!(metrics.get_counter(metric_names::EXPORTS_SENT), Some(1));
//! println!("{}", metrics.export_prometheus());
//! ```
//!
//! ## Error Formatting
//!
//! Error categories with context-aware help:
//! - Camera errors → device busy, permissions, capture format
//! - Graphics errors → framebuffer configuration, surface sizes
//! - Transport errors → channel state, channel name, network
//! - Config errors → file location, syntax, value ranges

pub mod diagnostics;
pub mod errors;
pub mod metrics;

pub use diagnostics::{
    detect_video_devices, log_session_summary, log_startup_diagnostics, SystemInfo,
};
pub use errors::{format_user_error, ErrorCategory};
pub use metrics::{metric_names, HistogramStats, MetricsCollector, MetricsSnapshot};
