use std::error::Error as StdError;

/// Crate-wide result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`RelayTransport`](crate::RelayTransport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote API refused the payload (malformed entities, unknown
    /// glyph id, message not found, ...). Nothing was delivered.
    #[error("transport rejected request: {reason}")]
    Rejected { reason: String },

    /// The request could not be completed (network, I/O, decoding).
    #[error("transport request failed: {context}: {source}")]
    Failed {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl TransportError {
    #[must_use]
    pub fn rejected(reason: impl std::fmt::Display) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn failed(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Typed relay errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A placeholder character does not occupy exactly one UTF-16 code unit.
    #[error("invalid placeholder {placeholder:?}: encodes to {units} UTF-16 code units, expected 1")]
    InvalidPlaceholder { placeholder: String, units: usize },

    /// An annotation does not fit the text it decorates.
    #[error("invalid annotation: {message}")]
    InvalidAnnotation { message: String },

    /// The transport failed and no fallback applied.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    #[must_use]
    pub fn invalid_annotation(message: impl std::fmt::Display) -> Self {
        Self::InvalidAnnotation {
            message: message.to_string(),
        }
    }
}
