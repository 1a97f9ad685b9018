//! Bincode codec adapter.
//!
//! Requests are serialized as-is. Response bodies carry a [`WireMessage`]
//! so the client can tell a response from a fault or an error reply.
//! Only `max_message_size` is enforced here; the per-field limits belong to
//! the generated message encoders.

use crate::domain::config::EncodingLimits;
use crate::domain::error::CodecError;
use crate::domain::message::{
    ErrorMessage, InboundMessage, ServiceFault, ServiceRequest, ServiceResponse,
};
use crate::ports::outbound::MessageCodec;
use bincode::Options;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Envelope of a response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireMessage<T> {
    Response(T),
    Fault(ServiceFault),
    Error(ErrorMessage),
}

impl<T> From<WireMessage<T>> for InboundMessage<T> {
    fn from(message: WireMessage<T>) -> Self {
        match message {
            WireMessage::Response(response) => InboundMessage::Response(response),
            WireMessage::Fault(fault) => InboundMessage::Fault(fault),
            WireMessage::Error(err) => InboundMessage::Error(err),
        }
    }
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

fn check_size(limits: &EncodingLimits, size: u64) -> Result<(), CodecError> {
    if EncodingLimits::within(limits.max_message_size, size) {
        Ok(())
    } else {
        Err(CodecError::LimitExceeded {
            what: "MaxMessageSize",
            limit: limits.max_message_size,
            actual: size,
        })
    }
}

/// Fixed-int little-endian bincode for one request/response pair.
pub struct BincodeCodec<Req, Resp> {
    _marker: PhantomData<fn() -> (Req, Resp)>,
}

impl<Req, Resp> BincodeCodec<Req, Resp> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<Req, Resp> Default for BincodeCodec<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp> BincodeCodec<Req, Resp>
where
    Req: DeserializeOwned,
    Resp: Serialize,
{
    /// Server side: decode a request body.
    pub fn decode_request(&self, body: &[u8]) -> Result<Req, CodecError> {
        options()
            .deserialize(body)
            .map_err(|e| CodecError::Decoding(e.to_string()))
    }

    /// Server side: encode a reply body.
    pub fn encode_reply(&self, reply: &WireMessage<Resp>) -> Result<Bytes, CodecError> {
        options()
            .serialize(reply)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encoding(e.to_string()))
    }
}

impl<Req, Resp> MessageCodec for BincodeCodec<Req, Resp>
where
    Req: ServiceRequest + Serialize,
    Resp: ServiceResponse + Clone + DeserializeOwned,
{
    type Request = Req;
    type Response = Resp;

    fn compute_size(&self, request: &Req, limits: &EncodingLimits) -> Result<u64, CodecError> {
        let size = options()
            .serialized_size(request)
            .map_err(|e| CodecError::Encoding(e.to_string()))?;
        check_size(limits, size)?;
        Ok(size)
    }

    fn encode(&self, request: &Req, limits: &EncodingLimits) -> Result<Bytes, CodecError> {
        self.compute_size(request, limits)?;
        options()
            .serialize(request)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encoding(e.to_string()))
    }

    fn decode(
        &self,
        body: &[u8],
        limits: &EncodingLimits,
    ) -> Result<InboundMessage<Resp>, CodecError> {
        check_size(limits, body.len() as u64)?;
        options()
            .deserialize::<WireMessage<Resp>>(body)
            .map(InboundMessage::from)
            .map_err(|e| CodecError::Decoding(e.to_string()))
    }
}
