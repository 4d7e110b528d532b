use std::fmt;

use serde::{Deserialize, Serialize};

/// Label used when a correspondent has no public handle.
pub const HIDDEN_HANDLE_LABEL: &str = "no public username";

/// Identifier the transport assigns to a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub i64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Address the transport delivers to (a chat id on Telegram).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryTarget(pub i64);

impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An existing message: the chat it lives in and its artifact id there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub chat: DeliveryTarget,
    pub artifact: ArtifactId,
}

impl SourceRef {
    #[must_use]
    pub fn new(chat: DeliveryTarget, artifact: ArtifactId) -> Self {
        Self { chat, artifact }
    }
}

/// External party writing to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correspondent {
    /// Stable numeric user id.
    pub id: i64,
    /// Where replies for this correspondent are delivered.
    pub address: DeliveryTarget,
    /// Public handle without the leading `@`, if the user has one.
    pub handle: Option<String>,
}

impl Correspondent {
    #[must_use]
    pub fn new(id: i64, address: DeliveryTarget) -> Self {
        Self {
            id,
            address,
            handle: None,
        }
    }

    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// `@handle`, or the fallback label for users without a public handle.
    #[must_use]
    pub fn handle_label(&self) -> String {
        match self.handle.as_deref().filter(|h| !h.is_empty()) {
            Some(handle) => format!("@{handle}"),
            None => HIDDEN_HANDLE_LABEL.to_string(),
        }
    }
}

/// A message from a correspondent, ready to be relayed to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub correspondent: Correspondent,
    /// The original message in the correspondent's chat.
    pub source: SourceRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_label_prefixes_at_sign() {
        let c = Correspondent::new(7, DeliveryTarget(7)).with_handle("alice");
        assert_eq!(c.handle_label(), "@alice");
    }

    #[test]
    fn handle_label_falls_back_without_public_handle() {
        let c = Correspondent::new(7, DeliveryTarget(7));
        assert_eq!(c.handle_label(), HIDDEN_HANDLE_LABEL);

        let empty = Correspondent::new(7, DeliveryTarget(7)).with_handle("");
        assert_eq!(empty.handle_label(), HIDDEN_HANDLE_LABEL);
    }
}
