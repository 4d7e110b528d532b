use {
    teloxide::types::{MediaKind, Message, MessageKind, User},
    tracing::{debug, info, warn},
};

use postern_relay::{
    ArtifactId, Correspondent, DeliveryTarget, InboundMessage, RelayTransport, ReplyOutcome,
    SourceRef,
};

use crate::{error::Result, state::RelayState};

/// Sent to the operator after a reply reached its correspondent.
pub const DELIVERED_NOTICE: &str = "\u{2705} Delivered.";

/// Sent to the operator when a message cannot be routed to anyone.
pub const UNROUTABLE_NOTICE: &str = "\u{26A0}\u{FE0F} Not delivered. Reply to a relayed message \
                                     to answer a correspondent; links expire after a while.";

/// Who sent an update, from the relay's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sender {
    Operator,
    Correspondent,
}

/// Entry point for every `Message` update.
pub async fn handle_message(msg: Message, state: &RelayState) -> Result<()> {
    if !msg.chat.is_private() {
        debug!(chat_id = msg.chat.id.0, "ignoring message outside a private chat");
        return Ok(());
    }
    if !matches!(msg.kind, MessageKind::Common(_)) {
        debug!(chat_id = msg.chat.id.0, "ignoring service message");
        return Ok(());
    }
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = msg.chat.id.0, "ignoring message without a sender");
        return Ok(());
    };
    if user.is_bot {
        debug!(user_id = user.id.0, "ignoring message from a bot");
        return Ok(());
    }

    match classify_sender(user, state.operator_id()) {
        Sender::Operator => handle_operator_message(&msg, state).await,
        Sender::Correspondent => handle_correspondent_message(&msg, user, state).await,
    }
}

async fn handle_operator_message(msg: &Message, state: &RelayState) -> Result<()> {
    let operator = state.router.operator();

    let Some(replied) = msg.reply_to_message() else {
        debug!("operator message is not a reply");
        if state.config.notify_unroutable {
            notify(state, operator, UNROUTABLE_NOTICE).await;
        }
        return Ok(());
    };

    let replied_to = ArtifactId(i64::from(replied.id.0));
    let source = SourceRef::new(DeliveryTarget(msg.chat.id.0), ArtifactId(i64::from(msg.id.0)));

    match state.router.relay_reply(replied_to, source).await? {
        ReplyOutcome::Delivered { target, .. } => {
            debug!(%replied_to, chat_id = %target, "operator reply delivered");
            if state.config.confirm_delivery {
                notify(state, operator, DELIVERED_NOTICE).await;
            }
        },
        ReplyOutcome::Dropped => {
            if state.config.notify_unroutable {
                notify(state, operator, UNROUTABLE_NOTICE).await;
            }
        },
    }
    Ok(())
}

async fn handle_correspondent_message(
    msg: &Message,
    user: &User,
    state: &RelayState,
) -> Result<()> {
    let chat = DeliveryTarget(msg.chat.id.0);

    if is_start_command(msg, state.bot_username.as_deref()) {
        debug!(chat_id = %chat, "start command");
        notify(state, chat, &state.config.greeting).await;
        return Ok(());
    }

    let Ok(id) = i64::try_from(user.id.0) else {
        warn!(user_id = user.id.0, "user id out of range, message not relayed");
        return Ok(());
    };
    let mut correspondent = Correspondent::new(id, chat);
    if let Some(handle) = user.username.as_deref() {
        correspondent = correspondent.with_handle(handle);
    }

    let inbound = InboundMessage {
        correspondent,
        source: SourceRef::new(chat, ArtifactId(i64::from(msg.id.0))),
    };
    let relay = state.router.relay_inbound(&inbound).await?;
    info!(
        chat_id = %chat,
        artifacts = relay.artifacts.len(),
        "correspondent message relayed"
    );

    if !state.config.acknowledgement.is_empty() {
        notify(state, chat, &state.config.acknowledgement).await;
    }
    Ok(())
}

/// Best-effort plain notice. Failures are logged, never propagated: the relay
/// itself already succeeded or failed on its own terms.
async fn notify(state: &RelayState, target: DeliveryTarget, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Err(e) = state.router.transport().send(target, text, &[]).await {
        warn!(chat_id = %target, error = %e, "failed to send notice");
    }
}

fn classify_sender(user: &User, operator_id: i64) -> Sender {
    if i64::try_from(user.id.0).is_ok_and(|id| id == operator_id) {
        Sender::Operator
    } else {
        Sender::Correspondent
    }
}

fn extract_text(msg: &Message) -> Option<&str> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(t) => Some(t.text.as_str()),
            _ => None,
        },
        _ => None,
    }
}

/// `/start`, optionally addressed as `/start@botname`, with any payload.
fn is_start_command(msg: &Message, bot_username: Option<&str>) -> bool {
    let Some(command) = extract_text(msg).and_then(|t| t.split_whitespace().next()) else {
        return false;
    };
    match command.split_once('@') {
        Some((cmd, addressee)) => {
            cmd == "/start" && bot_username.is_none_or(|u| u.eq_ignore_ascii_case(addressee))
        },
        None => command == "/start",
    }
}
