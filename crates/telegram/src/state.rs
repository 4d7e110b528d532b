use std::sync::Arc;

use {postern_config::TelegramConfig, postern_relay::SessionRouter};

use crate::transport::TelegramTransport;

/// Runtime state shared by every update handler task.
pub struct RelayState {
    pub bot_username: Option<String>,
    pub config: TelegramConfig,
    pub router: Arc<SessionRouter<TelegramTransport>>,
}

impl RelayState {
    /// Telegram user id of the operator.
    #[must_use]
    pub fn operator_id(&self) -> i64 {
        self.config.operator_id
    }
}
