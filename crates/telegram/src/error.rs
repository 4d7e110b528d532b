use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Relay(#[from] postern_relay::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl From<postern_relay::TransportError> for Error {
    fn from(err: postern_relay::TransportError) -> Self {
        Self::Relay(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
