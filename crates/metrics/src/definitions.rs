//! Metric name and label definitions.
//!
//! Every metric the relay records is named here so the set of exported
//! series is documented in one place.

/// Routing core metrics
pub mod relay {
    /// Inbound correspondent messages relayed to the operator
    pub const INBOUND_RELAYED_TOTAL: &str = "postern_relay_inbound_relayed_total";
    /// Operator replies delivered to a correspondent
    pub const REPLIES_DELIVERED_TOTAL: &str = "postern_relay_replies_delivered_total";
    /// Operator replies to messages with no route
    pub const REPLIES_DROPPED_TOTAL: &str = "postern_relay_replies_dropped_total";
    /// Routes registered (including overwrites)
    pub const ROUTES_REGISTERED_TOTAL: &str = "postern_relay_routes_registered_total";
    /// Routes evicted because the table was full
    pub const ROUTES_EVICTED_TOTAL: &str = "postern_relay_routes_evicted_total";
    /// Annotated sends that degraded to plain fallback text
    pub const ANNOTATION_FALLBACKS_TOTAL: &str = "postern_relay_annotation_fallbacks_total";
}

/// Telegram transport metrics
pub mod telegram {
    /// Updates received from Telegram
    pub const UPDATES_RECEIVED_TOTAL: &str = "postern_telegram_updates_received_total";
    /// Update handling duration in seconds
    pub const UPDATE_DURATION_SECONDS: &str = "postern_telegram_update_duration_seconds";
    /// Update handling errors
    pub const UPDATE_ERRORS_TOTAL: &str = "postern_telegram_update_errors_total";
    /// Bot API requests that hit flood control
    pub const RATE_LIMITED_TOTAL: &str = "postern_telegram_rate_limited_total";
    /// getUpdates failures
    pub const POLLING_ERRORS_TOTAL: &str = "postern_telegram_polling_errors_total";
}

/// Common label keys
pub mod labels {
    pub const KIND: &str = "kind";
}

/// Standard histogram buckets for different metric types
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Update handling duration buckets (in seconds)
    /// Covers 5ms to 60s (includes transport round trips and flood-control waits)
    pub static UPDATE_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });
}
