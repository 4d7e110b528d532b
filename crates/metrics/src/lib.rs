//! Metrics collection and export for postern.
//!
//! Library crates record through the `metrics` facade macros re-exported
//! here; nothing is collected until a recorder is installed with
//! [`init_metrics`]. With the `prometheus` feature the recorder is the
//! Prometheus exporter, optionally serving `/metrics` over HTTP.
//!
//! ```rust,ignore
//! use postern_metrics::{counter, relay};
//!
//! counter!(relay::REPLIES_DROPPED_TOTAL).increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, histogram};
