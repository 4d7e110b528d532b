//! Metrics recorder initialization and configuration.

use std::net::SocketAddr;

use {anyhow::Result, tracing::info};

/// Handle to the metrics system, providing access to exported metrics.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    /// Render metrics in Prometheus text format.
    ///
    /// Empty when metrics are disabled, the exporter is not compiled in, or
    /// the exporter owns its own HTTP listener.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle
                .as_ref()
                .map(|h| h.render())
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Serve `/metrics` on this address (Prometheus exporter only)
    pub listen: Option<SocketAddr>,
}

/// Initialize the metrics system.
///
/// Call once at startup, inside the tokio runtime when `listen` is set. When
/// disabled, no recorder is installed and the facade macros are no-ops.
///
/// # Errors
///
/// Returns an error if the exporter fails to install.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(MetricsHandle::default());
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = init_prometheus(config)?;
        info!("prometheus metrics exporter initialized");
        Ok(handle)
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = config;
        info!("metrics feature not enabled at compile time");
        Ok(MetricsHandle::default())
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    use {
        crate::{buckets, telegram},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(telegram::UPDATE_DURATION_SECONDS.to_string()),
        &buckets::UPDATE_DURATION,
    )?;

    match config.listen {
        Some(addr) => {
            builder.with_http_listener(addr).install()?;
            info!(%addr, "serving prometheus metrics");
            Ok(MetricsHandle {
                prometheus_handle: None,
            })
        },
        None => {
            let handle = builder.install_recorder()?;
            Ok(MetricsHandle {
                prometheus_handle: Some(handle),
            })
        },
    }
}
