//! Pending Request - one in-flight call.
//!
//! A pending request owns its payload, its [`ResultFuture`], an optional
//! deadline and an abort token. Every way a request can finish goes through
//! [`RequestTable::remove_if_present`]: only the path that removes the entry
//! writes the result.
//!
//! ```text
//!              insert                      remove_if_present
//!   create ──────────────▶ [ in table ] ──────────────────────┬──▶ complete (response / error)
//!                              │                              ├──▶ cancel   (Cancelled)
//!                              │ execute()                    └──▶ timeout  (Timeout)
//!                              ▼
//!                encode ─▶ post ─▶ decode
//! ```

use crate::domain::config::EncodingLimits;
use crate::domain::error::TransportError;
use crate::domain::message::ServiceRequest;
use crate::domain::request_id::{RequestId, SecureChannelId};
use crate::domain::result::ResultFuture;
use crate::domain::table::RequestTable;
use crate::ports::outbound::{HttpPoster, MessageCodec, PostRequest};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a request was aborted before its response was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Cancelled,
    TimedOut,
}

impl AbortReason {
    pub fn into_error(self) -> TransportError {
        match self {
            Self::Cancelled => TransportError::Cancelled,
            Self::TimedOut => TransportError::Timeout,
        }
    }
}

/// Timeout applied to a request: the request's hint, else the channel
/// default. `None` when both are zero.
pub fn effective_timeout(hint_ms: u32, channel_default: Duration) -> Option<Duration> {
    if hint_ms > 0 {
        Some(Duration::from_millis(u64::from(hint_ms)))
    } else if !channel_default.is_zero() {
        Some(channel_default)
    } else {
        None
    }
}

/// Where and how request bodies are posted.
#[derive(Debug, Clone)]
pub struct PostTarget {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub limits: EncodingLimits,
}

/// A request that has been dispatched and not yet removed from the table.
pub struct PendingRequest<Req, Resp> {
    id: RequestId,
    request: Req,
    created_at: Instant,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    channel: Option<SecureChannelId>,
    abort_reason: OnceLock<AbortReason>,
    abort: CancellationToken,
    result: ResultFuture<Resp>,
}

impl<Req: ServiceRequest, Resp> PendingRequest<Req, Resp> {
    /// Build a pending request.
    ///
    /// When the request carries no timeout hint, the channel default is
    /// written into it so the server sees the same deadline.
    pub fn create(
        id: RequestId,
        mut request: Req,
        channel_default: Duration,
        channel: Option<SecureChannelId>,
    ) -> Self {
        let timeout = effective_timeout(request.timeout_hint(), channel_default);
        if request.timeout_hint() == 0 {
            if let Some(timeout) = timeout {
                let hint = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
                request.set_timeout_hint(hint);
            }
        }

        let created_at = Instant::now();
        Self {
            id,
            request,
            created_at,
            timeout,
            deadline: timeout.and_then(|t| created_at.checked_add(t)),
            channel,
            abort_reason: OnceLock::new(),
            abort: CancellationToken::new(),
            result: ResultFuture::new(),
        }
    }

    /// Encode, post and decode.
    ///
    /// Never completes the result itself; the caller routes the returned
    /// value through [`PendingRequest::complete`]. If the request was aborted
    /// at any point the abort error is returned and the network result is
    /// discarded.
    pub async fn execute<C>(
        &self,
        codec: &C,
        poster: &dyn HttpPoster,
        target: &PostTarget,
    ) -> Result<Resp, TransportError>
    where
        C: MessageCodec<Request = Req, Response = Resp>,
    {
        self.check_aborted()?;

        let limits = &target.limits;
        let size = codec.compute_size(&self.request, limits)?;
        if !EncodingLimits::within(limits.max_message_size, size) {
            warn!(
                request_id = %self.id,
                message = self.request.type_name(),
                size = size,
                max_message_size = limits.max_message_size,
                "Request exceeds maximum message size"
            );
            return Err(TransportError::EncodingLimitExceeded(format!(
                "MaxMessageSize {} < {}",
                limits.max_message_size, size
            )));
        }
        let body = codec.encode(&self.request, limits)?;

        self.check_aborted()?;

        let post = poster.post(PostRequest {
            url: target.url.clone(),
            headers: target.headers.clone(),
            body,
        });
        let posted = tokio::select! {
            biased;
            _ = self.abort.cancelled() => return Err(self.abort_error()),
            posted = post => posted,
        };

        let raw = match posted {
            Ok(raw) => raw,
            Err(err) => {
                // An aborted exchange surfaces as an I/O failure; report the abort instead.
                self.check_aborted()?;
                debug!(request_id = %self.id, error = %err, "Post failed");
                return Err(err.into());
            }
        };

        self.check_aborted()?;

        codec.decode(&raw, limits)?.into_result()
    }

    /// Apply the outcome of [`execute`](Self::execute).
    ///
    /// Returns `false` when another path already removed the request.
    pub fn complete(
        &self,
        outcome: Result<Resp, TransportError>,
        table: &RequestTable<Req, Resp>,
    ) -> bool {
        if table.remove_if_present(self.id).is_none() {
            return false;
        }
        match outcome {
            Ok(response) => self.result.set_result(response),
            Err(err) => self.result.set_error(err),
        };
        true
    }

    /// Abort with [`AbortReason::Cancelled`].
    pub fn cancel(&self, table: &RequestTable<Req, Resp>) -> bool {
        self.abort(AbortReason::Cancelled, table)
    }

    /// Abort with [`AbortReason::TimedOut`].
    pub fn timeout(&self, table: &RequestTable<Req, Resp>) -> bool {
        self.abort(AbortReason::TimedOut, table)
    }

    fn abort(&self, reason: AbortReason, table: &RequestTable<Req, Resp>) -> bool {
        if table.remove_if_present(self.id).is_none() {
            return false;
        }
        let _ = self.abort_reason.set(reason);
        self.abort.cancel();
        self.result.set_error(reason.into_error());
        true
    }

    fn check_aborted(&self) -> Result<(), TransportError> {
        match self.abort_reason.get() {
            Some(reason) => Err(reason.into_error()),
            None => Ok(()),
        }
    }

    fn abort_error(&self) -> TransportError {
        self.abort_reason
            .get()
            .map(|reason| reason.into_error())
            .unwrap_or(TransportError::Cancelled)
    }

    pub fn request(&self) -> &Req {
        &self.request
    }
}

impl<Req, Resp> PendingRequest<Req, Resp> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn channel(&self) -> Option<SecureChannelId> {
        self.channel
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason.get().copied()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    pub fn result(&self) -> &ResultFuture<Resp> {
        &self.result
    }
}
