//! The `error` module defines the error type shared by every part of `hare`.
//!
//! Broker rejections and connectivity failures are kept apart so that callers
//! can tell a misconfigured topology from an unreachable broker. Body decode
//! failures never appear here: the codec recovers from them locally.

use lapin::protocol::{AMQPErrorKind, AMQPSoftError};
use thiserror::Error;

/// Underlying cause carried by [`HareError::Connection`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum HareError {
    /// The broker refused a declare, bind or consume request.
    #[error("broker rejected {operation}: {reason}")]
    Protocol {
        operation: &'static str,
        reason: String,
    },

    /// The broker could not be reached or the channel is no longer usable.
    #[error("broker connection failed during {operation}: {source}")]
    Connection {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Two subscription definitions were registered under the same name.
    #[error("subscription `{0}` is already registered")]
    DuplicateSubscription(String),
}

impl HareError {
    pub fn protocol(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            operation,
            reason: reason.into(),
        }
    }

    pub fn connection(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            operation,
            source: source.into(),
        }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}

impl HareError {
    /// Classifies a `lapin` failure raised while performing `operation`.
    pub(crate) fn from_lapin(operation: &'static str, err: lapin::Error) -> Self {
        match err {
            lapin::Error::ProtocolError(amqp) => Self::protocol(operation, amqp.to_string()),
            other => Self::connection(operation, other),
        }
    }
}

/// True when the broker answered `NOT_FOUND`, e.g. to a passive declare.
pub(crate) fn is_not_found(err: &lapin::Error) -> bool {
    matches!(
        err,
        lapin::Error::ProtocolError(amqp)
            if matches!(amqp.kind(), AMQPErrorKind::Soft(AMQPSoftError::NOTFOUND))
    )
}

pub type Result<T> = std::result::Result<T, HareError>;
