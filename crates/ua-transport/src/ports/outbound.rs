//! Outbound ports: the codec and the HTTP exchange the transport drives.

use crate::domain::config::EncodingLimits;
use crate::domain::error::{CodecError, PostError};
use crate::domain::message::{InboundMessage, ServiceRequest, ServiceResponse};
use async_trait::async_trait;
use bytes::Bytes;

/// Binary codec for one request/response message family.
///
/// `compute_size` and `encode` fail with [`CodecError::LimitExceeded`] when the
/// message would exceed `limits.max_message_size`; `decode` fails with
/// [`CodecError::Decoding`] on malformed input.
pub trait MessageCodec: Send + Sync + 'static {
    type Request: ServiceRequest;
    type Response: ServiceResponse + Clone;

    /// Encoded size in bytes, computed before any buffer is allocated.
    fn compute_size(&self, request: &Self::Request, limits: &EncodingLimits)
        -> Result<u64, CodecError>;

    fn encode(&self, request: &Self::Request, limits: &EncodingLimits)
        -> Result<Bytes, CodecError>;

    fn decode(
        &self,
        body: &[u8],
        limits: &EncodingLimits,
    ) -> Result<InboundMessage<Self::Response>, CodecError>;
}

/// One HTTP POST.
#[derive(Debug, Clone)]
pub struct PostRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

/// POST a body and return the response body of a `200 OK`.
///
/// Dropping the returned future aborts the exchange.
#[async_trait]
pub trait HttpPoster: Send + Sync {
    async fn post(&self, request: PostRequest) -> Result<Bytes, PostError>;

    /// Release pooled connections. Later posts fail with [`PostError::Shutdown`].
    fn shutdown(&self) {}
}
