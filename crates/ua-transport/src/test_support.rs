//! In-memory codec and poster for unit tests.

use crate::domain::config::EncodingLimits;
use crate::domain::error::{CodecError, PostError};
use crate::domain::message::{
    ErrorMessage, InboundMessage, RequestHeader, ResponseHeader, ServiceFault, ServiceRequest,
    ServiceResponse,
};
use crate::domain::pending::PostTarget;
use crate::domain::status::StatusCode;
use crate::ports::outbound::{HttpPoster, MessageCodec, PostRequest};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeRequest {
    pub header: RequestHeader,
    pub payload: Vec<u8>,
}

impl ProbeRequest {
    pub fn new(payload_len: usize) -> Self {
        Self {
            header: RequestHeader::default(),
            payload: vec![0xAB; payload_len],
        }
    }

    pub fn with_hint(mut self, timeout_ms: u32) -> Self {
        self.header.timeout_hint = timeout_ms;
        self
    }
}

impl ServiceRequest for ProbeRequest {
    fn type_name(&self) -> &'static str {
        "ProbeRequest"
    }

    fn timeout_hint(&self) -> u32 {
        self.header.timeout_hint
    }

    fn set_timeout_hint(&mut self, timeout_ms: u32) {
        self.header.timeout_hint = timeout_ms;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResponse {
    pub header: ResponseHeader,
    pub echoed: usize,
}

impl ServiceResponse for ProbeResponse {
    fn service_result(&self) -> StatusCode {
        self.header.service_result
    }
}

/// Body layout: one tag byte, then payload.
///
/// Tags: `0` response (payload length echoed), `1` service fault,
/// `2` error message, `3` response with a bad service result.
pub struct ProbeCodec;

impl MessageCodec for ProbeCodec {
    type Request = ProbeRequest;
    type Response = ProbeResponse;

    fn compute_size(
        &self,
        request: &ProbeRequest,
        _limits: &EncodingLimits,
    ) -> Result<u64, CodecError> {
        Ok(request.payload.len() as u64)
    }

    fn encode(&self, request: &ProbeRequest, limits: &EncodingLimits) -> Result<Bytes, CodecError> {
        let size = self.compute_size(request, limits)?;
        if !EncodingLimits::within(limits.max_message_size, size) {
            return Err(CodecError::LimitExceeded {
                what: "MaxMessageSize",
                limit: limits.max_message_size,
                actual: size,
            });
        }
        Ok(Bytes::from(request.payload.clone()))
    }

    fn decode(
        &self,
        body: &[u8],
        _limits: &EncodingLimits,
    ) -> Result<InboundMessage<ProbeResponse>, CodecError> {
        match body.first() {
            Some(0) => Ok(InboundMessage::Response(ProbeResponse {
                header: ResponseHeader::default(),
                echoed: body.len() - 1,
            })),
            Some(1) => Ok(InboundMessage::Fault(ServiceFault {
                response_header: ResponseHeader {
                    service_result: StatusCode::BAD_SERVICE_UNSUPPORTED,
                    ..ResponseHeader::default()
                },
            })),
            Some(2) => Ok(InboundMessage::Error(ErrorMessage {
                error: StatusCode::BAD_SECURITY_CHECKS_FAILED,
                reason: "rejected".into(),
            })),
            Some(3) => Ok(InboundMessage::Response(ProbeResponse {
                header: ResponseHeader {
                    service_result: StatusCode::BAD_UNEXPECTED_ERROR,
                    ..ResponseHeader::default()
                },
                echoed: body.len() - 1,
            })),
            Some(tag) => Err(CodecError::Decoding(format!("unknown tag {tag}"))),
            None => Err(CodecError::Decoding("empty body".into())),
        }
    }
}

pub fn echo_reply(body: &[u8]) -> Bytes {
    let mut reply = BytesMut::with_capacity(body.len() + 1);
    reply.put_u8(0);
    reply.put_slice(body);
    reply.freeze()
}

pub fn probe_target() -> PostTarget {
    PostTarget {
        url: "https://localhost:4843".into(),
        headers: vec![
            ("OPCUA-SecurityPolicy", crate::domain::config::SECURITY_POLICY_NONE.into()),
            ("Content-Type", "application/octet-stream".into()),
        ],
        limits: EncodingLimits::default(),
    }
}

pub enum Behavior {
    /// Answer with a tag-0 reply echoing the body
    Echo,
    /// Echo after a delay
    Delay(Duration),
    /// Return a fixed result
    Reply(Result<Bytes, PostError>),
    /// Never answer
    Hang,
    /// Echo once the gate is opened
    Gate(Arc<Notify>),
    /// Panic inside the post
    Panic,
}

pub struct ScriptedPoster {
    behavior: Behavior,
    calls: AtomicUsize,
    called: Notify,
    shutdowns: AtomicUsize,
    requests: Mutex<Vec<PostRequest>>,
}

impl ScriptedPoster {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            called: Notify::new(),
            shutdowns: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<PostRequest> {
        self.requests.lock().last().cloned()
    }

    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.called.notified();
            if self.calls() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl HttpPoster for ScriptedPoster {
    async fn post(&self, request: PostRequest) -> Result<Bytes, PostError> {
        // Registered before the call is counted so an opened gate is never missed.
        let gate = match &self.behavior {
            Behavior::Gate(gate) => Some(gate.notified()),
            _ => None,
        };
        let body = request.body.clone();
        self.requests.lock().push(request);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.called.notify_waiters();

        match &self.behavior {
            Behavior::Echo => Ok(echo_reply(&body)),
            Behavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(echo_reply(&body))
            }
            Behavior::Reply(result) => result.clone(),
            Behavior::Hang => std::future::pending::<Result<Bytes, PostError>>().await,
            Behavior::Gate(_) => {
                if let Some(gate) = gate {
                    gate.await;
                }
                Ok(echo_reply(&body))
            }
            Behavior::Panic => panic!("poster exploded"),
        }
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
