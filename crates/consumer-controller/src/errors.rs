//! Consumer controller error types.
//!
//! Every operation on a [`crate::actors::ConsumerHandle`] fails with exactly one
//! of these. Remote failures are never retried here; the caller decides.

use crate::channel::ChannelError;
use thiserror::Error;
use worker_protocol::{CodecError, Method};

/// Consumer operation error.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Caller input rejected before any remote call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The worker rejected the request or could not be reached.
    #[error("Request {method} failed: {reason}")]
    Request {
        method: Method,
        reason: ChannelError,
    },

    /// The worker response could not be decoded. Consumer state is unchanged.
    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    /// The consumer is closed.
    #[error("Consumer closed")]
    Closed,

    /// The consumer actor is gone or dropped the reply.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConsumerError {
    /// Bounded label for metrics.
    #[must_use]
    pub const fn error_type_label(&self) -> &'static str {
        match self {
            ConsumerError::Validation(_) => "validation",
            ConsumerError::Request { .. } => "request",
            ConsumerError::Decode(_) => "decode",
            ConsumerError::Closed => "closed",
            ConsumerError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_labels() {
        assert_eq!(
            ConsumerError::Validation("x".to_string()).error_type_label(),
            "validation"
        );
        assert_eq!(
            ConsumerError::Request {
                method: Method::ConsumerPause,
                reason: ChannelError::Unreachable("gone".to_string()),
            }
            .error_type_label(),
            "request"
        );
        assert_eq!(
            ConsumerError::Decode(CodecError::InsufficientData).error_type_label(),
            "decode"
        );
        assert_eq!(ConsumerError::Closed.error_type_label(), "closed");
        assert_eq!(
            ConsumerError::Internal("x".to_string()).error_type_label(),
            "internal"
        );
    }

    #[test]
    fn test_display_formatting() {
        let err = ConsumerError::Request {
            method: Method::ConsumerSetPriority,
            reason: ChannelError::Remote("invalid priority".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Request consumer.set_priority failed: Worker rejected request: invalid priority"
        );

        let err: ConsumerError = CodecError::UnknownDiscriminant {
            field: "consumer_type",
            value: 7,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Decode error: Unknown discriminant for consumer_type: 7"
        );
    }
}
