//! Telegram front end for the postern relay.
//!
//! Implements the relay's transport seam with teloxide (`sendMessage` with
//! entities, `copyMessage` for verbatim relays) and drives the router from a
//! long-polling update loop.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod state;
pub mod transport;

pub use {
    bot::{Polling, build_router, start_polling},
    error::{Error, Result},
    state::RelayState,
    transport::TelegramTransport,
};
