//! Nominal secure channel over the HTTPS transport.
//!
//! HTTPS has no OPC UA secure-channel handshake: TLS already protects the
//! connection. Opening a channel only hands out an id so that requests can be
//! grouped and cancelled together when the channel closes.

use crate::channel::HttpsTransportChannel;
use crate::domain::error::TransportError;
use crate::domain::message::ServiceResponse;
use crate::domain::request_id::SecureChannelId;
use crate::domain::result::ResultFuture;
use crate::domain::status::StatusCode;
use crate::ports::outbound::MessageCodec;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

pub struct HttpsSecureChannel<C: MessageCodec> {
    transport: Arc<HttpsTransportChannel<C>>,
    id: Mutex<Option<SecureChannelId>>,
}

impl<C: MessageCodec> HttpsSecureChannel<C> {
    pub fn new(transport: Arc<HttpsTransportChannel<C>>) -> Self {
        Self {
            transport,
            id: Mutex::new(None),
        }
    }

    /// Issue a channel id. Returns the existing id when already open.
    pub fn open(&self) -> Result<SecureChannelId, TransportError> {
        if self.transport.is_closed() {
            return Err(TransportError::ChannelClosed);
        }

        let mut slot = self.id.lock();
        if let Some(id) = *slot {
            return Ok(id);
        }
        let id = self.transport.next_secure_channel_id();
        *slot = Some(id);
        info!(
            secure_channel_id = %id,
            endpoint = %self.transport.config().endpoint_url,
            "Secure channel opened"
        );
        Ok(id)
    }

    pub fn is_open(&self) -> bool {
        self.id.lock().is_some()
    }

    pub fn secure_channel_id(&self) -> Option<SecureChannelId> {
        *self.id.lock()
    }

    pub fn transport(&self) -> &Arc<HttpsTransportChannel<C>> {
        &self.transport
    }

    /// Send and block the calling thread until the response arrives or the
    /// request's wait bound passes.
    ///
    /// A response whose header carries a bad service result is returned as
    /// [`TransportError::ApplicationFault`].
    pub fn service_request(&self, request: C::Request) -> Result<C::Response, TransportError> {
        let id = self.current_id()?;
        let dispatched = self.transport.dispatch_on(request, id);
        let bound = self.transport.wait_bound(&dispatched);
        let response = self.transport.wait_blocking(dispatched, bound)?;

        let status = response.service_result();
        if status.is_bad() {
            debug!(secure_channel_id = %id, status = %status, "Service returned a bad result");
            return Err(TransportError::fault(status, status.to_string()));
        }
        Ok(response)
    }

    pub fn service_request_async(&self, request: C::Request) -> ResultFuture<C::Response> {
        match self.current_id() {
            Ok(id) => self.transport.dispatch_on(request, id).result,
            Err(err) => ResultFuture::failed(err),
        }
    }

    /// Cancel this channel's pending requests and forget its id. Idempotent.
    pub fn close(&self) {
        let Some(id) = self.id.lock().take() else {
            return;
        };
        let cancelled = self.transport.cancel_channel(id);
        info!(secure_channel_id = %id, cancelled = cancelled, "Secure channel closed");
    }

    /// Renewal needs the OPC UA secure-channel handshake, which HTTPS lacks.
    pub fn renew(&self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported(
            "secure channel renewal over HTTPS".into(),
        ))
    }

    fn current_id(&self) -> Result<SecureChannelId, TransportError> {
        self.secure_channel_id().ok_or_else(|| {
            TransportError::communication(
                StatusCode::BAD_SERVER_NOT_CONNECTED,
                "secure channel is not open",
            )
        })
    }
}
