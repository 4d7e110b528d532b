use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, UpdateKind},
    },
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tokio_util::{sync::CancellationToken, task::TaskTracker},
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use postern_metrics::{counter, histogram, labels, telegram as tg_metrics};

use {
    postern_config::PosternConfig,
    postern_relay::{Composer, DeliveryTarget, NoticeTemplate, Placeholder, RouteTable, SessionRouter},
};

use crate::{
    error::{Error, Result},
    handlers,
    state::RelayState,
    transport::TelegramTransport,
};

/// Extra slack on top of the long-polling timeout so the HTTP client does not
/// abort a `getUpdates` call before Telegram answers.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(15);
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);
const ROUTE_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// A running polling loop.
pub struct Polling {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    router: Arc<SessionRouter<TelegramTransport>>,
}

impl Polling {
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn router(&self) -> &Arc<SessionRouter<TelegramTransport>> {
        &self.router
    }

    /// Stop polling and wait for the loop and every in-flight update handler
    /// to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "telegram polling task ended abnormally");
        }
    }

    /// Wait for the loop to end on its own (cancellation or token conflict).
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "telegram polling task ended abnormally");
        }
    }
}

/// Build the session router for a bot from config.
pub fn build_router(bot: Bot, config: &PosternConfig) -> Result<SessionRouter<TelegramTransport>> {
    let placeholder: Placeholder = config.relay.placeholder.parse()?;
    let routes = RouteTable::new(config.relay.route_capacity, config.relay.route_ttl());
    let notice = NoticeTemplate::new(
        config.telegram.header_title.clone(),
        config.telegram.header_glyph_id.clone(),
    );

    Ok(SessionRouter::new(
        Arc::new(TelegramTransport::new(bot)),
        routes,
        DeliveryTarget(config.telegram.operator_id),
    )
    .with_composer(Composer::new(placeholder))
    .with_notice(notice))
}

/// Connect the bot and start polling.
///
/// Spawns a background task that processes updates until the returned
/// handle is shut down or another instance takes over the token.
pub async fn start_polling(config: PosternConfig) -> Result<Polling> {
    let telegram = config.telegram.clone();
    if telegram.operator_id <= 0 {
        return Err(Error::message("telegram.operator_id must be a positive user id"));
    }

    let poll_timeout = Duration::from_secs(u64::from(telegram.poll_timeout_secs));
    let client = teloxide::net::default_reqwest_settings()
        .timeout(poll_timeout + CLIENT_TIMEOUT_SLACK)
        .build()?;
    let bot = Bot::with_client(telegram.token.expose_secret(), client);

    // Verify credentials and get bot username.
    let me = bot.get_me().await?;
    let bot_username = me.username.clone();

    // Delete any existing webhook so long polling works.
    bot.delete_webhook().send().await?;

    info!(
        username = ?bot_username,
        operator_id = telegram.operator_id,
        "telegram bot connected (webhook cleared)"
    );

    let router = Arc::new(build_router(bot.clone(), &config)?);
    let state = Arc::new(RelayState {
        bot_username,
        config: telegram,
        router,
    });

    Ok(spawn_polling(bot, state))
}

fn spawn_polling(bot: Bot, state: Arc<RelayState>) -> Polling {
    let router = Arc::clone(&state.router);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_polling_loop(bot, state, cancel.clone()));

    Polling {
        cancel,
        task,
        router,
    }
}

async fn run_polling_loop(bot: Bot, state: Arc<RelayState>, cancel: CancellationToken) {
    info!("starting telegram polling loop");
    let poll_timeout = state.config.poll_timeout_secs;
    let mut offset: i32 = 0;

    let tracker = TaskTracker::new();
    tracker.spawn(sweep_expired_routes(
        Arc::clone(&state.router),
        ROUTE_SWEEP_INTERVAL,
        cancel.clone(),
    ));

    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = bot
                .get_updates()
                .offset(offset)
                .timeout(poll_timeout)
                .allowed_updates(vec![AllowedUpdate::Message])
                .send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    match update.kind {
                        UpdateKind::Message(msg) => {
                            #[cfg(feature = "metrics")]
                            counter!(tg_metrics::UPDATES_RECEIVED_TOTAL).increment(1);
                            tracker.spawn(dispatch_message(msg, Arc::clone(&state)));
                        },
                        other => {
                            debug!("ignoring non-message update: {other:?}");
                        },
                    }
                }
            },
            Err(e) => {
                if is_conflict(&e) {
                    warn!(
                        "telegram polling disabled: another instance is already running with this token"
                    );
                    cancel.cancel();
                    break;
                }

                #[cfg(feature = "metrics")]
                counter!(tg_metrics::POLLING_ERRORS_TOTAL).increment(1);
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }

    // Every exit path above has fired `cancel`, which also stops the sweep.
    tracker.close();
    if !tracker.is_empty() {
        debug!(pending = tracker.len(), "waiting for in-flight update handlers");
    }
    tracker.wait().await;
    info!("telegram polling stopped");
}

/// Periodically drop expired routes until `cancel` fires.
///
/// Runs beside the long-poll so a sweep never interrupts a pending
/// `getUpdates` call.
async fn sweep_expired_routes(
    router: Arc<SessionRouter<TelegramTransport>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut sweep = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = sweep.tick() => {
                let removed = router.routes().evict_expired();
                if removed > 0 {
                    debug!(removed, remaining = router.routes().len(), "expired routes swept");
                }
            },
        }
    }
}

async fn dispatch_message(msg: Message, state: Arc<RelayState>) {
    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();

    let chat_id = msg.chat.id.0;
    debug!(chat_id, message_id = msg.id.0, "received telegram message");
    if let Err(e) = handlers::handle_message(msg, &state).await {
        #[cfg(feature = "metrics")]
        counter!(tg_metrics::UPDATE_ERRORS_TOTAL, labels::KIND => "message").increment(1);
        error!(chat_id, error = %e, "error handling telegram message");
    }

    #[cfg(feature = "metrics")]
    histogram!(tg_metrics::UPDATE_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
}

fn is_conflict(err: &RequestError) -> bool {
    matches!(err, RequestError::Api(ApiError::TerminatedByOtherGetUpdates))
}
