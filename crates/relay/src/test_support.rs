use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{
    composer::Annotation,
    error::TransportError,
    transport::RelayTransport,
    types::{ArtifactId, DeliveryTarget, SourceRef},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSend {
    pub target: DeliveryTarget,
    pub text: String,
    pub annotations: Vec<Annotation>,
    pub artifact: ArtifactId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRelay {
    pub target: DeliveryTarget,
    pub source: SourceRef,
    pub artifact: ArtifactId,
}

/// In-memory transport recording successful deliveries.
pub struct MockTransport {
    next_id: AtomicI64,
    attempts: AtomicUsize,
    reject_annotated: AtomicBool,
    reject_all_sends: AtomicBool,
    fail_sends: AtomicBool,
    fail_relays: AtomicBool,
    sends: Mutex<Vec<RecordedSend>>,
    relays: Mutex<Vec<RecordedRelay>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1_000),
            attempts: AtomicUsize::new(0),
            reject_annotated: AtomicBool::new(false),
            reject_all_sends: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            fail_relays: AtomicBool::new(false),
            sends: Mutex::new(Vec::new()),
            relays: Mutex::new(Vec::new()),
        }
    }
}

impl MockTransport {
    pub fn reject_annotated(&self) {
        self.reject_annotated.store(true, Ordering::SeqCst);
    }

    pub fn reject_all_sends(&self) {
        self.reject_all_sends.store(true, Ordering::SeqCst);
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn fail_relays(&self) {
        self.fail_relays.store(true, Ordering::SeqCst);
    }

    /// Number of `send` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().unwrap().clone()
    }

    pub fn relays(&self) -> Vec<RecordedRelay> {
        self.relays.lock().unwrap().clone()
    }

    fn next_artifact(&self) -> ArtifactId {
        ArtifactId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl RelayTransport for MockTransport {
    async fn send(
        &self,
        target: DeliveryTarget,
        text: &str,
        annotations: &[Annotation],
    ) -> Result<ArtifactId, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::failed("send message", std::io::Error::other("connection reset")));
        }
        if self.reject_all_sends.load(Ordering::SeqCst)
            || (self.reject_annotated.load(Ordering::SeqCst) && !annotations.is_empty())
        {
            return Err(TransportError::rejected("Bad Request: ENTITY_TEXT_INVALID"));
        }
        let artifact = self.next_artifact();
        self.sends.lock().unwrap().push(RecordedSend {
            target,
            text: text.to_string(),
            annotations: annotations.to_vec(),
            artifact,
        });
        Ok(artifact)
    }

    async fn relay_verbatim(
        &self,
        target: DeliveryTarget,
        source: SourceRef,
    ) -> Result<ArtifactId, TransportError> {
        if self.fail_relays.load(Ordering::SeqCst) {
            return Err(TransportError::failed("copy message", std::io::Error::other("connection reset")));
        }
        let artifact = self.next_artifact();
        self.relays.lock().unwrap().push(RecordedRelay {
            target,
            source,
            artifact,
        });
        Ok(artifact)
    }
}
