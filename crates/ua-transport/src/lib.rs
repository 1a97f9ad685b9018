//! # OPC UA HTTPS Transport
//!
//! Client-side request/response transport for OPC UA over HTTPS. Every service
//! request is one HTTP POST; the response body carries the reply.
//!
//! ## Purpose
//!
//! Turns a service request into a [`ResultFuture`] that completes exactly once
//! with a response, a timeout, a cancellation or a failure. Many requests may
//! be in flight at once; a single shared timer enforces their deadlines.
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement |
//! |-----------|-------------|
//! | Exactly one outcome per request | `domain/pending.rs` - removal from the table gates completion |
//! | Request ids unique per channel | `domain/request_id.rs` - atomic counter |
//! | One armed timer per channel | `scheduler.rs` - slot guarded by a mutex |
//! | Nothing sent after cancel or close | `domain/pending.rs` - abort checks around the post |
//! | Oversize requests never reach the network | `domain/pending.rs` - size check before encode |
//!
//! ## Request Lifecycle
//!
//! ```text
//! send_async ──▶ [PENDING] ──post ok──▶ decode ──▶ [SUCCEEDED]
//!                    │  │
//!                    │  └──post/decode error──────▶ [FAILED]
//!                    ├──deadline passed─────────────▶ [FAILED: Timeout]
//!                    └──cancel / close───────────────▶ [FAILED: Cancelled]
//! ```
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/codec.rs - BincodeCodec                               │
//! │  adapters/http.rs  - ReqwestPoster (HTTPS client, TLS policy)   │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/outbound.rs - MessageCodec, HttpPoster traits           │
//! │  channel.rs        - HttpsTransportChannel                     │
//! │  secure_channel.rs - HttpsSecureChannel                        │
//! │  scheduler.rs      - TimeoutScheduler                          │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/pending.rs - PendingRequest state machine              │
//! │  domain/table.rs   - RequestTable                              │
//! │  domain/result.rs  - ResultFuture                              │
//! │  domain/error.rs   - TransportError taxonomy                   │
//! │  domain/config.rs  - TransportConfig                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let config = TransportConfig::from_file("transport.toml")?;
//! let poster = Arc::new(ReqwestPoster::new(&config)?);
//! let channel = HttpsTransportChannel::new(config, BincodeCodec::<ReadRequest, ReadResponse>::new(), poster)?;
//!
//! let response = channel.send_async(read_request).await?;
//! channel.close();
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod channel;
pub mod domain;
pub mod ports;
pub mod scheduler;
pub mod secure_channel;

#[cfg(test)]
mod test_support;

pub use adapters::{BincodeCodec, ReqwestPoster, WireMessage};
pub use channel::{Dispatched, HttpsTransportChannel};
pub use domain::*;
pub use ports::{HttpPoster, MessageCodec, PostRequest};
pub use scheduler::{DeadlineSource, TimeoutScheduler};
pub use secure_channel::HttpsSecureChannel;
