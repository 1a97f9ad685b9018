//! Result Future - the caller-facing completion handle.
//!
//! A single-assignment slot shared between the pending request that fills it
//! and any number of caller handles. The first `set_result`/`set_error` wins;
//! later calls are ignored and return `false`.
//!
//! Callers can block a thread ([`ResultFuture::wait_for_result`]) or await
//! ([`ResultFuture::wait`], or `.await` the handle directly). Waiting never
//! changes request state: giving up on a wait is the channel's business.

use crate::domain::error::TransportError;
use futures::future::BoxFuture;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Completion state of a [`ResultFuture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Waiting,
    Succeeded,
    Failed,
}

struct Slot<T> {
    value: Mutex<Option<Result<T, TransportError>>>,
    /// Wakes blocked threads
    ready: Condvar,
    /// Wakes async waiters
    notify: Notify,
}

/// Shared handle to the eventual result of a request.
pub struct ResultFuture<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for ResultFuture<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for ResultFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultFuture<T> {
    /// An unfilled result.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Slot {
                value: Mutex::new(None),
                ready: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// A result that has already failed.
    pub fn failed(error: TransportError) -> Self {
        let future = Self::new();
        future.set_error(error);
        future
    }

    /// Fill with a value. Returns `false` if already filled.
    pub fn set_result(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Fill with an error. Returns `false` if already filled.
    pub fn set_error(&self, error: TransportError) -> bool {
        self.complete(Err(error))
    }

    fn complete(&self, result: Result<T, TransportError>) -> bool {
        {
            let mut value = self.slot.value.lock();
            if value.is_some() {
                return false;
            }
            *value = Some(result);
        }
        self.slot.ready.notify_all();
        self.slot.notify.notify_waiters();
        true
    }

    pub fn is_done(&self) -> bool {
        self.slot.value.lock().is_some()
    }

    pub fn status(&self) -> ResultStatus {
        match &*self.slot.value.lock() {
            None => ResultStatus::Waiting,
            Some(Ok(_)) => ResultStatus::Succeeded,
            Some(Err(_)) => ResultStatus::Failed,
        }
    }

    /// The error, if the result failed.
    pub fn error(&self) -> Option<TransportError> {
        match &*self.slot.value.lock() {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// True if both handles share the same slot.
    pub fn same_slot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T: Clone> ResultFuture<T> {
    /// The result, if filled.
    pub fn try_result(&self) -> Option<Result<T, TransportError>> {
        self.slot.value.lock().clone()
    }

    /// Block the current thread until filled or `timeout` elapses.
    ///
    /// Returns [`TransportError::Timeout`] on elapse; the request itself is
    /// left untouched.
    pub fn wait_for_result(&self, timeout: Duration) -> Result<T, TransportError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut value = self.slot.value.lock();
        loop {
            if let Some(result) = value.as_ref() {
                return result.clone();
            }
            match deadline {
                Some(deadline) => {
                    if self.slot.ready.wait_until(&mut value, deadline).timed_out() {
                        return match value.as_ref() {
                            Some(result) => result.clone(),
                            None => Err(TransportError::Timeout),
                        };
                    }
                }
                // Timeout too large to represent
                None => self.slot.ready.wait(&mut value),
            }
        }
    }

    /// Wait asynchronously until filled.
    pub async fn wait(&self) -> Result<T, TransportError> {
        loop {
            // Register before checking so a completion in between is not missed.
            let notified = self.slot.notify.notified();
            if let Some(result) = self.try_result() {
                return result;
            }
            notified.await;
        }
    }
}

impl<T: Clone + Send + 'static> IntoFuture for ResultFuture<T> {
    type Output = Result<T, TransportError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}

impl<T> fmt::Debug for ResultFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultFuture")
            .field("status", &self.status())
            .finish()
    }
}
