/// Config schema types (telegram bot, relay core, metrics).
use std::{net::SocketAddr, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PosternConfig {
    pub telegram: TelegramConfig,
    pub relay: RelayConfig,
    pub metrics: MetricsConfig,
}

/// Telegram bot account and relay policy.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Telegram user id of the operator. Every other sender is a
    /// correspondent.
    pub operator_id: i64,

    /// Reply to `/start` from correspondents.
    pub greeting: String,

    /// Sent to a correspondent after their message was relayed. Empty
    /// disables the acknowledgement.
    pub acknowledgement: String,

    /// Confirm each delivered reply to the operator.
    pub confirm_delivery: bool,

    /// Tell the operator when a message could not be routed.
    pub notify_unroutable: bool,

    /// Title line of the header sent ahead of each relayed message.
    pub header_title: String,

    /// Custom emoji id shown at the start of the header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_glyph_id: Option<String>,

    /// Long-polling timeout passed to `getUpdates` (seconds).
    pub poll_timeout_secs: u32,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("operator_id", &self.operator_id)
            .field("confirm_delivery", &self.confirm_delivery)
            .field("notify_unroutable", &self.notify_unroutable)
            .field("header_glyph_id", &self.header_glyph_id)
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            operator_id: 0,
            greeting: "Hi! Write a message and I will pass it on to our team.".into(),
            acknowledgement: "Message sent. Please wait for a reply.".into(),
            confirm_delivery: false,
            notify_unroutable: true,
            header_title: "New message from a correspondent".into(),
            header_glyph_id: None,
            poll_timeout_secs: 30,
        }
    }
}

/// Route table sizing and composer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum number of live routes; the oldest registration is evicted
    /// first.
    pub route_capacity: usize,

    /// Seconds after which a route expires. `0` disables expiry.
    pub route_ttl_secs: u64,

    /// Placeholder character annotated as a custom glyph. Must be a single
    /// UTF-16 code unit.
    pub placeholder: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            route_capacity: 10_000,
            route_ttl_secs: 7 * 24 * 60 * 60,
            placeholder: "\u{2B50}".into(),
        }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn route_ttl(&self) -> Option<Duration> {
        (self.route_ttl_secs > 0).then(|| Duration::from_secs(self.route_ttl_secs))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Serve Prometheus `/metrics` on this address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<SocketAddr>,
}
