//! Local identifiers for in-flight requests and nominal secure channels.
//!
//! Neither identifier goes on the wire; both only correlate state inside
//! this process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Key of a pending request in the request table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Monotonic request id source, one per transport channel.
///
/// The first id handed out is `0`.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Nominal secure channel id issued by the HTTPS transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecureChannelId(u32);

impl SecureChannelId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SecureChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SecureChannelId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Secure channel id source. The first id handed out is `1`.
#[derive(Debug, Default)]
pub struct SecureChannelIdGenerator {
    last: AtomicU32,
}

impl SecureChannelIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> SecureChannelId {
        SecureChannelId(self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1))
    }
}
