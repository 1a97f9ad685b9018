//! Ports layer for the HTTPS transport.
//!
//! Only driven (outbound) ports: the message codec and the HTTP poster the
//! channel delegates to.

pub mod outbound;

pub use outbound::*;
