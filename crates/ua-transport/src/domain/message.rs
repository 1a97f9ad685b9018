//! Message contracts the transport needs from service payloads.
//!
//! The generated request/response structures live outside this crate; the
//! transport only needs to read and stamp the timeout hint on the way out and
//! to tell a response, a service fault, and an error message apart on the way
//! back in.

use crate::domain::error::TransportError;
use crate::domain::status::StatusCode;
use serde::{Deserialize, Serialize};

/// An outbound service request.
pub trait ServiceRequest: Send + Sync + 'static {
    /// Message type name, used in logs.
    fn type_name(&self) -> &'static str;

    /// Timeout hint in milliseconds. `0` means no hint.
    fn timeout_hint(&self) -> u32;

    fn set_timeout_hint(&mut self, timeout_ms: u32);
}

/// An inbound service response.
pub trait ServiceResponse: Send + 'static {
    /// Overall result reported in the response header.
    fn service_result(&self) -> StatusCode;
}

/// Common header of every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub authentication_token: Vec<u8>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub request_handle: u32,
    pub return_diagnostics: u32,
    pub audit_entry_id: Option<String>,
    /// Milliseconds; `0` means no hint
    pub timeout_hint: u32,
}

/// Common header of every response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub timestamp: i64,
    pub request_handle: u32,
    pub service_result: StatusCode,
    pub string_table: Vec<String>,
}

/// Response sent in place of the expected one when a service fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFault {
    pub response_header: ResponseHeader,
}

impl ServiceResponse for ServiceFault {
    fn service_result(&self) -> StatusCode {
        self.response_header.service_result
    }
}

/// Transport-level error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: StatusCode,
    pub reason: String,
}

/// A decoded HTTP response body.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage<R> {
    Response(R),
    Fault(ServiceFault),
    Error(ErrorMessage),
}

impl<R> InboundMessage<R> {
    /// Turn fault and error replies into [`TransportError::ApplicationFault`].
    pub fn into_result(self) -> Result<R, TransportError> {
        match self {
            Self::Response(response) => Ok(response),
            Self::Fault(fault) => {
                let status = fault.response_header.service_result;
                let reason = fault
                    .response_header
                    .string_table
                    .first()
                    .cloned()
                    .unwrap_or_else(|| status.to_string());
                Err(TransportError::fault(status, reason))
            }
            Self::Error(err) => Err(TransportError::fault(err.error, err.reason)),
        }
    }
}
