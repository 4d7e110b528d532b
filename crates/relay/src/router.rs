//! Session router: relays correspondent messages to the operator and routes
//! operator replies back by the id of the message replied to.

use std::sync::Arc;

use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use postern_metrics::{counter, relay as relay_metrics};

use crate::{
    composer::{Composer, DeliveryPath, send_annotated},
    error::Result,
    notice::NoticeTemplate,
    table::RouteTable,
    transport::RelayTransport,
    types::{ArtifactId, DeliveryTarget, InboundMessage, SourceRef},
};

/// Artifacts produced in the operator's chat for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRelay {
    /// Every artifact registered for the correspondent, in send order.
    pub artifacts: Vec<ArtifactId>,
    /// How the header was delivered, `None` if it could not be sent.
    pub header_path: Option<DeliveryPath>,
}

/// Result of routing an operator reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Delivered {
        target: DeliveryTarget,
        artifact: ArtifactId,
    },
    /// The replied-to message is not (or no longer) in the route table.
    Dropped,
}

/// Owns the route table and the operator identity.
///
/// Constructed once at startup and shared behind an `Arc` by every update
/// handler.
pub struct SessionRouter<T: ?Sized> {
    transport: Arc<T>,
    routes: RouteTable,
    operator: DeliveryTarget,
    composer: Composer,
    notice: NoticeTemplate,
}

impl<T> SessionRouter<T>
where
    T: RelayTransport + ?Sized,
{
    pub fn new(transport: Arc<T>, routes: RouteTable, operator: DeliveryTarget) -> Self {
        Self {
            transport,
            routes,
            operator,
            composer: Composer::default(),
            notice: NoticeTemplate::default(),
        }
    }

    #[must_use]
    pub fn with_composer(mut self, composer: Composer) -> Self {
        self.composer = composer;
        self
    }

    #[must_use]
    pub fn with_notice(mut self, notice: NoticeTemplate) -> Self {
        self.notice = notice;
        self
    }

    #[must_use]
    pub fn operator(&self) -> DeliveryTarget {
        self.operator
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Point `artifact` at `target`, replacing any previous mapping.
    pub fn register_route(&self, artifact: ArtifactId, target: DeliveryTarget) {
        if let Some(evicted) = self.routes.insert(artifact, target) {
            debug!(%evicted, "route table full, evicted oldest route");
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::ROUTES_EVICTED_TOTAL).increment(1);
        }
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::ROUTES_REGISTERED_TOTAL).increment(1);
    }

    #[must_use]
    pub fn resolve_route(&self, artifact: ArtifactId) -> Option<DeliveryTarget> {
        self.routes.get(artifact)
    }

    /// Send the header notice and a verbatim copy of the message to the
    /// operator, registering a route for each delivered artifact.
    ///
    /// A failed header does not stop the copy. Fails only when the copy
    /// fails; routes already registered are kept.
    pub async fn relay_inbound(&self, message: &InboundMessage) -> Result<InboundRelay> {
        let target = message.correspondent.address;
        let mut relay = InboundRelay {
            artifacts: Vec::with_capacity(2),
            header_path: None,
        };

        let (header, fallback) = self.notice.render(&self.composer, &message.correspondent);
        match send_annotated(self.transport.as_ref(), self.operator, &header, &fallback).await {
            Ok(sent) => {
                self.register_route(sent.artifact, target);
                relay.artifacts.push(sent.artifact);
                relay.header_path = Some(sent.path);
            },
            Err(e) => {
                warn!(
                    correspondent = message.correspondent.id,
                    error = %e,
                    "failed to send operator header, relaying message without it"
                );
            },
        }

        let copy = self
            .transport
            .relay_verbatim(self.operator, message.source)
            .await?;
        self.register_route(copy, target);
        relay.artifacts.push(copy);

        info!(
            correspondent = message.correspondent.id,
            chat_id = %target,
            artifacts = ?relay.artifacts,
            "relayed inbound message to operator"
        );
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::INBOUND_RELAYED_TOTAL).increment(1);

        Ok(relay)
    }

    /// Relay the operator's message `source` to whoever `replied_to` was
    /// routed for. Unknown artifacts are dropped without side effects.
    pub async fn relay_reply(
        &self,
        replied_to: ArtifactId,
        source: SourceRef,
    ) -> Result<ReplyOutcome> {
        let Some(target) = self.resolve_route(replied_to) else {
            debug!(%replied_to, "reply to unrouted message dropped");
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::REPLIES_DROPPED_TOTAL).increment(1);
            return Ok(ReplyOutcome::Dropped);
        };

        let artifact = self.transport.relay_verbatim(target, source).await?;
        info!(%replied_to, chat_id = %target, %artifact, "relayed operator reply");
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::REPLIES_DELIVERED_TOTAL).increment(1);

        Ok(ReplyOutcome::Delivered { target, artifact })
    }
}
