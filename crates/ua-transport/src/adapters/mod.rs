//! Adapters layer: concrete codec and HTTPS client.

pub mod codec;
pub mod http;

pub use codec::{BincodeCodec, WireMessage};
pub use http::ReqwestPoster;
