use async_trait::async_trait;

use crate::{
    composer::Annotation,
    error::TransportError,
    types::{ArtifactId, DeliveryTarget, SourceRef},
};

/// Delivery primitives the relay core needs from a messaging backend.
///
/// Implementations own connection handling and any transport-level retry
/// (e.g. flood control). The core never retries.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Send `text` to `target`, decorated with `annotations` (offsets in
    /// UTF-16 code units). Returns the id of the delivered message.
    async fn send(
        &self,
        target: DeliveryTarget,
        text: &str,
        annotations: &[Annotation],
    ) -> Result<ArtifactId, TransportError>;

    /// Reproduce an existing message of any content type at `target`,
    /// attributed to the service rather than the original author.
    async fn relay_verbatim(
        &self,
        target: DeliveryTarget,
        source: SourceRef,
    ) -> Result<ArtifactId, TransportError>;
}
