//! HTTPS Transport Channel - the component callers talk to.
//!
//! ## Flow
//!
//! 1. `send_async` assigns a [`RequestId`] and builds a [`PendingRequest`]
//! 2. The request goes into the [`RequestTable`] and the timer is re-armed
//! 3. `execute()` is spawned on the runtime; the caller gets a [`ResultFuture`]
//! 4. Response, timeout sweep, `cancel` or `close` removes the entry; the
//!    remover fills the result
//!
//! Blocking `send` waits on the future from the calling thread and must not be
//! called from inside an async task.

use crate::domain::config::TransportConfig;
use crate::domain::error::TransportError;
use crate::domain::message::ServiceRequest;
use crate::domain::pending::{PendingRequest, PostTarget};
use crate::domain::request_id::{
    RequestId, RequestIdGenerator, SecureChannelId, SecureChannelIdGenerator,
};
use crate::domain::result::ResultFuture;
use crate::domain::stats::{StatsSnapshot, TransportStats};
use crate::domain::table::RequestTable;
use crate::ports::outbound::{HttpPoster, MessageCodec};
use crate::scheduler::{DeadlineSource, TimeoutScheduler};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Header carrying the endpoint security policy.
pub const SECURITY_POLICY_HEADER: &str = "OPCUA-SecurityPolicy";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const CONTENT_TYPE_BINARY: &str = "application/octet-stream";

type Pending<C> =
    PendingRequest<<C as MessageCodec>::Request, <C as MessageCodec>::Response>;

/// A request accepted by [`HttpsTransportChannel::dispatch`].
#[derive(Debug)]
pub struct Dispatched<T> {
    pub request_id: RequestId,
    /// Local timeout applied to the request, if any
    pub timeout: Option<Duration>,
    pub result: ResultFuture<T>,
}

struct ChannelCore<C: MessageCodec> {
    config: TransportConfig,
    target: PostTarget,
    codec: C,
    poster: Arc<dyn HttpPoster>,
    table: RequestTable<C::Request, C::Response>,
    scheduler: TimeoutScheduler,
    request_ids: RequestIdGenerator,
    secure_channel_ids: SecureChannelIdGenerator,
    closed: AtomicBool,
    runtime: Handle,
    stats: TransportStats,
}

/// Client transport that POSTs each request to one HTTPS endpoint.
pub struct HttpsTransportChannel<C: MessageCodec> {
    core: Arc<ChannelCore<C>>,
}

impl<C: MessageCodec> HttpsTransportChannel<C> {
    /// Create a channel on the current Tokio runtime.
    pub fn new(
        config: TransportConfig,
        codec: C,
        poster: Arc<dyn HttpPoster>,
    ) -> Result<Self, TransportError> {
        let runtime = Handle::try_current().map_err(|_| {
            TransportError::Internal("no Tokio runtime available for the transport".into())
        })?;
        Self::with_runtime(config, codec, poster, runtime)
    }

    /// Create a channel that runs requests and timers on `runtime`.
    pub fn with_runtime(
        config: TransportConfig,
        codec: C,
        poster: Arc<dyn HttpPoster>,
        runtime: Handle,
    ) -> Result<Self, TransportError> {
        config
            .validate()
            .map_err(|e| TransportError::Internal(e.to_string()))?;

        let target = PostTarget {
            url: config.endpoint_url.clone(),
            headers: vec![
                (SECURITY_POLICY_HEADER, config.security_policy_uri.clone()),
                (CONTENT_TYPE_HEADER, CONTENT_TYPE_BINARY.to_string()),
            ],
            limits: config.limits,
        };

        info!(
            endpoint = %config.endpoint_url,
            security_policy = %config.security_policy_uri,
            "HTTPS transport channel created"
        );

        Ok(Self {
            core: Arc::new(ChannelCore {
                target,
                codec,
                poster,
                table: RequestTable::new(),
                scheduler: TimeoutScheduler::new(runtime.clone()),
                request_ids: RequestIdGenerator::new(),
                secure_channel_ids: SecureChannelIdGenerator::new(),
                closed: AtomicBool::new(false),
                runtime,
                stats: TransportStats::default(),
                config,
            }),
        })
    }

    /// Dispatch without waiting. Never blocks on network I/O.
    pub fn send_async(&self, request: C::Request) -> ResultFuture<C::Response> {
        self.dispatch(request).result
    }

    /// Dispatch and also return the assigned id and timeout.
    pub fn dispatch(&self, request: C::Request) -> Dispatched<C::Response> {
        ChannelCore::dispatch(&self.core, request, None)
    }

    pub(crate) fn dispatch_on(
        &self,
        request: C::Request,
        channel: SecureChannelId,
    ) -> Dispatched<C::Response> {
        ChannelCore::dispatch(&self.core, request, Some(channel))
    }

    /// Dispatch and block the calling thread for at most `timeout`.
    ///
    /// On local expiry the request is cancelled best-effort and
    /// [`TransportError::Timeout`] is returned, unless a response slipped in
    /// first.
    pub fn send(&self, request: C::Request, timeout: Duration) -> Result<C::Response, TransportError> {
        let dispatched = self.dispatch(request);
        self.wait_blocking(dispatched, timeout)
    }

    pub(crate) fn wait_blocking(
        &self,
        dispatched: Dispatched<C::Response>,
        timeout: Duration,
    ) -> Result<C::Response, TransportError> {
        match dispatched.result.wait_for_result(timeout) {
            Err(TransportError::Timeout) if !dispatched.result.is_done() => {
                self.give_up(&dispatched)
            }
            other => other,
        }
    }

    /// Dispatch and await the response.
    ///
    /// The wait is bounded by the request's timeout, or the configured
    /// fallback when it has none.
    pub async fn request(&self, request: C::Request) -> Result<C::Response, TransportError> {
        let dispatched = self.dispatch(request);
        let bound = self.wait_bound(&dispatched);
        match tokio::time::timeout(bound, dispatched.result.wait()).await {
            Ok(result) => result,
            Err(_) => self.give_up(&dispatched),
        }
    }

    /// Local wait bound for a dispatched request.
    pub fn wait_bound<T>(&self, dispatched: &Dispatched<T>) -> Duration {
        dispatched
            .timeout
            .unwrap_or(self.core.config.timeouts.fallback_wait)
    }

    /// Local wait expired: cancel best-effort. A response that won the race
    /// against the cancel is still returned.
    fn give_up(&self, dispatched: &Dispatched<C::Response>) -> Result<C::Response, TransportError> {
        if self.cancel(dispatched.request_id) {
            debug!(request_id = %dispatched.request_id, "Local wait expired, request cancelled");
        }
        match dispatched.result.try_result() {
            Some(Ok(response)) => Ok(response),
            _ => Err(TransportError::Timeout),
        }
    }

    /// Cancel an in-flight request. Returns `false` if it already finished.
    pub fn cancel(&self, request_id: RequestId) -> bool {
        let Some(pending) = self.core.table.get(request_id) else {
            return false;
        };
        let cancelled = pending.cancel(&self.core.table);
        if cancelled {
            TransportStats::incr(&self.core.stats.cancelled);
            debug!(request_id = %request_id, "Request cancelled");
            self.core.scheduler.reschedule(&self.core);
        }
        cancelled
    }

    /// Cancel every pending request opened on `channel`.
    pub(crate) fn cancel_channel(&self, channel: SecureChannelId) -> usize {
        let cancelled = self
            .core
            .table
            .snapshot_values()
            .into_iter()
            .filter(|pending| pending.channel() == Some(channel))
            .filter(|pending| pending.cancel(&self.core.table))
            .count();
        if cancelled > 0 {
            for _ in 0..cancelled {
                TransportStats::incr(&self.core.stats.cancelled);
            }
            self.core.scheduler.reschedule(&self.core);
        }
        cancelled
    }

    pub(crate) fn next_secure_channel_id(&self) -> SecureChannelId {
        self.core.secure_channel_ids.next_id()
    }

    /// Stop accepting requests, cancel everything in flight and release
    /// the connection pool. Idempotent.
    pub fn close(&self) {
        self.core.close();
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::Acquire)
    }

    pub fn pending_count(&self) -> usize {
        self.core.table.len()
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.core.table.contains(request_id)
    }

    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = self.core.stats.snapshot();
        snapshot.timers_armed = self.core.scheduler.timers_armed();
        snapshot
    }

    pub fn config(&self) -> &TransportConfig {
        &self.core.config
    }

    /// Deadline the shared timeout timer is armed for.
    pub fn armed_deadline(&self) -> Option<Instant> {
        self.core.scheduler.armed_deadline()
    }
}

impl<C: MessageCodec> Drop for HttpsTransportChannel<C> {
    fn drop(&mut self) {
        self.core.close();
    }
}

impl<C: MessageCodec> ChannelCore<C> {
    fn dispatch(
        this: &Arc<Self>,
        request: C::Request,
        channel: Option<SecureChannelId>,
    ) -> Dispatched<C::Response> {
        let request_id = this.request_ids.next_id();
        if this.closed.load(Ordering::Acquire) {
            debug!(request_id = %request_id, "Dispatch rejected, channel closed");
            return Dispatched {
                request_id,
                timeout: None,
                result: ResultFuture::failed(TransportError::ChannelClosed),
            };
        }

        let pending = Arc::new(PendingRequest::create(
            request_id,
            request,
            this.config.timeouts.operation_timeout,
            channel,
        ));
        let dispatched = Dispatched {
            request_id,
            timeout: pending.timeout_duration(),
            result: pending.result().clone(),
        };

        this.table.insert(Arc::clone(&pending));
        TransportStats::incr(&this.stats.dispatched);
        debug!(
            request_id = %request_id,
            message = pending.request().type_name(),
            timeout_ms = dispatched.timeout.map(|t| t.as_millis() as u64),
            "Dispatching request"
        );

        // close() may have taken its snapshot before the insert above.
        if this.closed.load(Ordering::Acquire) {
            if pending.cancel(&this.table) {
                TransportStats::incr(&this.stats.cancelled);
            }
            return dispatched;
        }

        if pending.deadline().is_some() {
            this.scheduler.reschedule(this);
        }

        let core = Arc::clone(this);
        this.runtime.spawn(async move {
            let outcome = AssertUnwindSafe(pending.execute(&core.codec, core.poster.as_ref(), &core.target))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    error!(request_id = %pending.id(), panic = %message, "Request execution panicked");
                    Err(TransportError::Internal(message))
                });
            core.finish(&pending, outcome);
        });

        dispatched
    }

    fn finish(
        self: &Arc<Self>,
        pending: &Pending<C>,
        outcome: Result<C::Response, TransportError>,
    ) {
        let request_id = pending.id();
        let elapsed_ms = pending.created_at().elapsed().as_millis() as u64;
        let failure = outcome.as_ref().err().cloned();

        if !pending.complete(outcome, &self.table) {
            TransportStats::incr(&self.stats.late_completions_discarded);
            debug!(request_id = %request_id, "Late completion discarded");
            return;
        }

        match failure {
            None => {
                TransportStats::incr(&self.stats.succeeded);
                debug!(request_id = %request_id, elapsed_ms = elapsed_ms, "Request completed");
            }
            Some(err) => {
                TransportStats::incr(&self.stats.failed);
                warn!(
                    request_id = %request_id,
                    elapsed_ms = elapsed_ms,
                    error = %err,
                    "Request failed"
                );
            }
        }

        if pending.deadline().is_some() {
            self.scheduler.reschedule(self);
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.scheduler.shutdown();

        let mut cancelled = 0usize;
        for pending in self.table.snapshot_values() {
            if pending.cancel(&self.table) {
                TransportStats::incr(&self.stats.cancelled);
                cancelled += 1;
            }
        }

        self.poster.shutdown();
        info!(
            endpoint = %self.config.endpoint_url,
            cancelled = cancelled,
            "HTTPS transport channel closed"
        );
    }
}

impl<C: MessageCodec> DeadlineSource for ChannelCore<C> {
    fn scheduler(&self) -> &TimeoutScheduler {
        &self.scheduler
    }

    fn earliest_deadline(&self) -> Option<Instant> {
        self.table.earliest_deadline()
    }

    fn expire(&self, now: Instant) -> usize {
        let mut expired = 0;
        for pending in self.table.snapshot_values() {
            if !pending.is_expired(now) {
                continue;
            }
            if pending.timeout(&self.table) {
                TransportStats::incr(&self.stats.timed_out);
                expired += 1;
                warn!(
                    request_id = %pending.id(),
                    message = pending.request().type_name(),
                    elapsed_ms = pending.created_at().elapsed().as_millis() as u64,
                    timeout_ms = pending.timeout_duration().map(|t| t.as_millis() as u64),
                    "Request timed out"
                );
            }
        }
        expired
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "request execution panicked".to_string()
    }
}
