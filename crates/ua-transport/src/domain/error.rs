//! Transport error taxonomy.
//!
//! Every failure a pending request can end with is one [`TransportError`].
//! Port-level errors ([`CodecError`], [`PostError`]) are converted at the
//! boundary so callers only ever match on one type.

use crate::domain::status::StatusCode;
use thiserror::Error;

/// Coarse classification of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Deadline elapsed locally or in the timeout sweep.
    Timeout,
    /// Aborted by the caller or by channel close.
    Cancelled,
    /// Outbound (or inbound) message exceeds the configured size.
    EncodingLimitExceeded,
    /// Response bytes could not be parsed.
    DecodingFailure,
    /// Transport-level I/O, TLS or HTTP failure.
    CommunicationFailure,
    /// Peer answered with a well-formed fault.
    ApplicationFault,
    /// Operation not implemented by this channel type.
    Unsupported,
    /// Failure inside the transport itself.
    Internal,
}

/// Error completing a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("encoding limits exceeded: {0}")]
    EncodingLimitExceeded(String),

    #[error("decoding failed: {0}")]
    DecodingFailure(String),

    #[error("communication failure ({status}): {message}")]
    CommunicationFailure {
        status: StatusCode,
        /// HTTP status of the response, when one was received
        http_status: Option<u16>,
        message: String,
    },

    #[error("application fault ({status}): {reason}")]
    ApplicationFault { status: StatusCode, reason: String },

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("transport channel is closed")]
    ChannelClosed,

    #[error("internal transport error: {0}")]
    Internal(String),
}

impl TransportError {
    pub fn communication(status: StatusCode, message: impl Into<String>) -> Self {
        Self::CommunicationFailure {
            status,
            http_status: None,
            message: message.into(),
        }
    }

    pub fn fault(status: StatusCode, reason: impl Into<String>) -> Self {
        Self::ApplicationFault {
            status,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::EncodingLimitExceeded(_) => ErrorKind::EncodingLimitExceeded,
            Self::DecodingFailure(_) => ErrorKind::DecodingFailure,
            Self::CommunicationFailure { .. } | Self::ChannelClosed => {
                ErrorKind::CommunicationFailure
            }
            Self::ApplicationFault { .. } => ErrorKind::ApplicationFault,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// OPC UA status code reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Timeout => StatusCode::BAD_TIMEOUT,
            Self::Cancelled => StatusCode::BAD_REQUEST_CANCELLED_BY_REQUEST,
            Self::EncodingLimitExceeded(_) => StatusCode::BAD_ENCODING_LIMITS_EXCEEDED,
            Self::DecodingFailure(_) => StatusCode::BAD_DECODING_ERROR,
            Self::CommunicationFailure { status, .. } => *status,
            Self::ApplicationFault { status, .. } => *status,
            Self::Unsupported(_) => StatusCode::BAD_NOT_SUPPORTED,
            Self::ChannelClosed => StatusCode::BAD_CONNECTION_CLOSED,
            Self::Internal(_) => StatusCode::BAD_INTERNAL_ERROR,
        }
    }
}

/// Errors raised by a [`MessageCodec`](crate::ports::outbound::MessageCodec).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{what} {limit} < {actual}")]
    LimitExceeded {
        what: &'static str,
        limit: u32,
        actual: u64,
    },

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("decoding failed: {0}")]
    Decoding(String),
}

impl From<CodecError> for TransportError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::LimitExceeded { .. } => Self::EncodingLimitExceeded(err.to_string()),
            CodecError::Encoding(msg) => Self::communication(StatusCode::BAD_ENCODING_ERROR, msg),
            CodecError::Decoding(msg) => Self::DecodingFailure(msg),
        }
    }
}

/// Errors raised by an [`HttpPoster`](crate::ports::outbound::HttpPoster).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("peer certificate rejected: {0}")]
    CertificateRejected(String),

    #[error("{status}: {body}")]
    Status { status: u16, body: String },

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("operation aborted")]
    Aborted,

    #[error("client has been shut down")]
    Shutdown,
}

const TLS_REJECTED_MESSAGE: &str = "Could not negotiate a TLS security cipher or the server did not provide a valid certificate.";

impl From<PostError> for TransportError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::Connect(msg) | PostError::Io(msg) => {
                Self::communication(StatusCode::BAD_COMMUNICATION_ERROR, msg)
            }
            PostError::CertificateRejected(detail) => Self::communication(
                StatusCode::BAD_SECURITY_POLICY_REJECTED,
                format!("{} {}", TLS_REJECTED_MESSAGE, detail),
            ),
            PostError::Status { status, ref body } => {
                let code = if status == 501 {
                    StatusCode::BAD_SERVICE_UNSUPPORTED
                } else {
                    StatusCode::BAD_UNKNOWN_RESPONSE
                };
                Self::CommunicationFailure {
                    status: code,
                    http_status: Some(status),
                    message: format!("{}: {}", status, body),
                }
            }
            PostError::Aborted => Self::Cancelled,
            PostError::Shutdown => Self::ChannelClosed,
        }
    }
}

/// Result alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_501_maps_to_service_unsupported() {
        let err: TransportError = PostError::Status {
            status: 501,
            body: "not implemented".into(),
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::CommunicationFailure);
        assert_eq!(err.status_code(), StatusCode::BAD_SERVICE_UNSUPPORTED);
        match err {
            TransportError::CommunicationFailure {
                http_status,
                message,
                ..
            } => {
                assert_eq!(http_status, Some(501));
                assert_eq!(message, "501: not implemented");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_other_http_status_maps_to_unknown_response() {
        let err: TransportError = PostError::Status {
            status: 404,
            body: String::new(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_UNKNOWN_RESPONSE);
    }

    #[test]
    fn test_certificate_rejection() {
        let err: TransportError = PostError::CertificateRejected("unknown issuer".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_SECURITY_POLICY_REJECTED);
        assert!(err.to_string().contains("unknown issuer"));
    }

    #[test]
    fn test_codec_errors_map_to_kinds() {
        let limit: TransportError = CodecError::LimitExceeded {
            what: "MaxMessageSize",
            limit: 10,
            actual: 11,
        }
        .into();
        assert_eq!(limit.kind(), ErrorKind::EncodingLimitExceeded);
        assert_eq!(
            limit,
            TransportError::EncodingLimitExceeded("MaxMessageSize 10 < 11".into())
        );

        let decode: TransportError = CodecError::Decoding("truncated".into()).into();
        assert_eq!(decode.kind(), ErrorKind::DecodingFailure);
        assert_eq!(decode.status_code(), StatusCode::BAD_DECODING_ERROR);
    }

    #[test]
    fn test_channel_closed_is_communication_failure() {
        assert_eq!(
            TransportError::ChannelClosed.kind(),
            ErrorKind::CommunicationFailure
        );
        assert_eq!(
            TransportError::ChannelClosed.status_code(),
            StatusCode::BAD_CONNECTION_CLOSED
        );
    }
}
