use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{
        RequestError,
        payloads::SendMessageSetters,
        prelude::*,
        types::{ChatId, MessageEntity, MessageEntityKind, MessageId},
    },
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use postern_metrics::{counter, telegram as tg_metrics};

use postern_relay::{
    Annotation, AnnotationKind, ArtifactId, DeliveryTarget, RelayTransport, SourceRef,
    TransportError,
};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Relay transport backed by the Telegram Bot API.
///
/// Annotated text goes out through `sendMessage` with an explicit entity
/// list (no parse mode); verbatim relays use `copyMessage`, which carries
/// any content type without a forwarding attribution.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn run_request_with_retry<T, F, Fut>(
        &self,
        target: DeliveryTarget,
        operation: &'static str,
        mut request: F,
    ) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    #[cfg(feature = "metrics")]
                    counter!(tg_metrics::RATE_LIMITED_TOTAL).increment(1);

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id = target.0,
                            operation,
                            retries,
                            max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id = target.0,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

#[async_trait]
impl RelayTransport for TelegramTransport {
    async fn send(
        &self,
        target: DeliveryTarget,
        text: &str,
        annotations: &[Annotation],
    ) -> Result<ArtifactId, TransportError> {
        let chat_id = ChatId(target.0);
        let entities = to_message_entities(annotations);

        let message = self
            .run_request_with_retry(target, "send message", || {
                let mut req = self.bot.send_message(chat_id, text);
                if !entities.is_empty() {
                    req = req.entities(entities.clone());
                }
                async move { req.await }
            })
            .await
            .map_err(|e| map_request_error("send message", e))?;

        debug!(
            chat_id = target.0,
            message_id = message.id.0,
            entities = entities.len(),
            "telegram message sent"
        );
        Ok(ArtifactId(i64::from(message.id.0)))
    }

    async fn relay_verbatim(
        &self,
        target: DeliveryTarget,
        source: SourceRef,
    ) -> Result<ArtifactId, TransportError> {
        let to = ChatId(target.0);
        let from = ChatId(source.chat.0);
        let message_id = to_message_id(source.artifact)?;

        let copied = self
            .run_request_with_retry(target, "copy message", || {
                let req = self.bot.copy_message(to, from, message_id);
                async move { req.await }
            })
            .await
            .map_err(|e| map_request_error("copy message", e))?;

        debug!(
            chat_id = target.0,
            from_chat_id = source.chat.0,
            source_message_id = message_id.0,
            message_id = copied.0,
            "telegram message copied"
        );
        Ok(ArtifactId(i64::from(copied.0)))
    }
}

/// Map relay annotations onto Telegram message entities.
///
/// Offsets and lengths are already UTF-16 code units, which is what the Bot
/// API expects, so they pass through unchanged.
pub fn to_message_entities(annotations: &[Annotation]) -> Vec<MessageEntity> {
    annotations
        .iter()
        .map(|a| {
            let kind = match &a.kind {
                AnnotationKind::Emphasis => MessageEntityKind::Bold,
                AnnotationKind::GlyphRef { glyph_id } => MessageEntityKind::CustomEmoji {
                    custom_emoji_id: glyph_id.clone().into(),
                },
            };
            MessageEntity::new(kind, a.offset, a.length)
        })
        .collect()
}

/// Telegram message ids are `i32`; anything outside that range cannot name a
/// real message.
fn to_message_id(artifact: ArtifactId) -> Result<MessageId, TransportError> {
    i32::try_from(artifact.0)
        .map(MessageId)
        .map_err(|_| TransportError::rejected(format!("message id {artifact} out of range")))
}

/// The Bot API answering with an error means it looked at the request and
/// refused it; everything else (network, decoding, exhausted rate-limit
/// retries) leaves the outcome unknown.
fn map_request_error(operation: &'static str, err: RequestError) -> TransportError {
    match err {
        RequestError::Api(api) => TransportError::rejected(api.to_string()),
        other => TransportError::failed(operation, other),
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}
