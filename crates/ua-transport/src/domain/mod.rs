//! # Domain Layer - HTTPS Transport
//!
//! Transport-independent types and the per-request state machine.
//!
//! ## Components
//!
//! - `status`: OPC UA status codes
//! - `error`: `TransportError` taxonomy plus codec and poster errors
//! - `config`: `TransportConfig`, encoding limits, timeouts, TLS policy
//! - `message`: service request/response traits and reply envelopes
//! - `request_id`: request and secure channel id generators
//! - `result`: `ResultFuture`, the write-once completion slot
//! - `pending`: `PendingRequest` (create, execute, cancel, timeout)
//! - `table`: `RequestTable` of in-flight requests
//! - `stats`: lock-free counters

pub mod config;
pub mod error;
pub mod message;
pub mod pending;
pub mod request_id;
pub mod result;
pub mod stats;
pub mod status;
pub mod table;

pub use config::*;
pub use error::*;
pub use message::*;
pub use pending::*;
pub use request_id::*;
pub use result::*;
pub use stats::*;
pub use status::StatusCode;
pub use table::*;
