//! OPC UA status codes used by the transport.
//!
//! Only the codes the client transport produces or inspects are named here.
//! The top two bits carry severity: `00` good, `01` uncertain, `10` bad.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-bit OPC UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCode(pub u32);

/// Well-known status code values.
pub mod codes {
    pub const GOOD: u32 = 0x0000_0000;
    pub const BAD_UNEXPECTED_ERROR: u32 = 0x8001_0000;
    pub const BAD_INTERNAL_ERROR: u32 = 0x8002_0000;
    pub const BAD_COMMUNICATION_ERROR: u32 = 0x8005_0000;
    pub const BAD_ENCODING_ERROR: u32 = 0x8006_0000;
    pub const BAD_DECODING_ERROR: u32 = 0x8007_0000;
    pub const BAD_ENCODING_LIMITS_EXCEEDED: u32 = 0x8008_0000;
    pub const BAD_UNKNOWN_RESPONSE: u32 = 0x8009_0000;
    pub const BAD_TIMEOUT: u32 = 0x800A_0000;
    pub const BAD_SERVICE_UNSUPPORTED: u32 = 0x800B_0000;
    pub const BAD_SHUTDOWN: u32 = 0x800C_0000;
    pub const BAD_SERVER_NOT_CONNECTED: u32 = 0x800D_0000;
    pub const BAD_SECURITY_CHECKS_FAILED: u32 = 0x8013_0000;
    pub const BAD_NOT_SUPPORTED: u32 = 0x803D_0000;
    pub const BAD_SECURITY_POLICY_REJECTED: u32 = 0x8055_0000;
    pub const BAD_REQUEST_CANCELLED_BY_REQUEST: u32 = 0x805A_0000;
    pub const BAD_CONNECTION_CLOSED: u32 = 0x80AE_0000;
}

const SEVERITY_MASK: u32 = 0xC000_0000;
const SEVERITY_BAD: u32 = 0x8000_0000;
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;

impl StatusCode {
    pub const GOOD: Self = Self(codes::GOOD);
    pub const BAD_UNEXPECTED_ERROR: Self = Self(codes::BAD_UNEXPECTED_ERROR);
    pub const BAD_INTERNAL_ERROR: Self = Self(codes::BAD_INTERNAL_ERROR);
    pub const BAD_COMMUNICATION_ERROR: Self = Self(codes::BAD_COMMUNICATION_ERROR);
    pub const BAD_ENCODING_ERROR: Self = Self(codes::BAD_ENCODING_ERROR);
    pub const BAD_DECODING_ERROR: Self = Self(codes::BAD_DECODING_ERROR);
    pub const BAD_ENCODING_LIMITS_EXCEEDED: Self = Self(codes::BAD_ENCODING_LIMITS_EXCEEDED);
    pub const BAD_UNKNOWN_RESPONSE: Self = Self(codes::BAD_UNKNOWN_RESPONSE);
    pub const BAD_TIMEOUT: Self = Self(codes::BAD_TIMEOUT);
    pub const BAD_SERVICE_UNSUPPORTED: Self = Self(codes::BAD_SERVICE_UNSUPPORTED);
    pub const BAD_SHUTDOWN: Self = Self(codes::BAD_SHUTDOWN);
    pub const BAD_SERVER_NOT_CONNECTED: Self = Self(codes::BAD_SERVER_NOT_CONNECTED);
    pub const BAD_SECURITY_CHECKS_FAILED: Self = Self(codes::BAD_SECURITY_CHECKS_FAILED);
    pub const BAD_NOT_SUPPORTED: Self = Self(codes::BAD_NOT_SUPPORTED);
    pub const BAD_SECURITY_POLICY_REJECTED: Self = Self(codes::BAD_SECURITY_POLICY_REJECTED);
    pub const BAD_REQUEST_CANCELLED_BY_REQUEST: Self =
        Self(codes::BAD_REQUEST_CANCELLED_BY_REQUEST);
    pub const BAD_CONNECTION_CLOSED: Self = Self(codes::BAD_CONNECTION_CLOSED);

    /// Raw 32-bit value.
    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_good(self) -> bool {
        self.0 & SEVERITY_MASK == 0
    }

    pub fn is_uncertain(self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_UNCERTAIN
    }

    pub fn is_bad(self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_BAD
    }

    /// Symbolic name, if this is one of the codes in [`codes`].
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            codes::GOOD => "Good",
            codes::BAD_UNEXPECTED_ERROR => "Bad_UnexpectedError",
            codes::BAD_INTERNAL_ERROR => "Bad_InternalError",
            codes::BAD_COMMUNICATION_ERROR => "Bad_CommunicationError",
            codes::BAD_ENCODING_ERROR => "Bad_EncodingError",
            codes::BAD_DECODING_ERROR => "Bad_DecodingError",
            codes::BAD_ENCODING_LIMITS_EXCEEDED => "Bad_EncodingLimitsExceeded",
            codes::BAD_UNKNOWN_RESPONSE => "Bad_UnknownResponse",
            codes::BAD_TIMEOUT => "Bad_Timeout",
            codes::BAD_SERVICE_UNSUPPORTED => "Bad_ServiceUnsupported",
            codes::BAD_SHUTDOWN => "Bad_Shutdown",
            codes::BAD_SERVER_NOT_CONNECTED => "Bad_ServerNotConnected",
            codes::BAD_SECURITY_CHECKS_FAILED => "Bad_SecurityChecksFailed",
            codes::BAD_NOT_SUPPORTED => "Bad_NotSupported",
            codes::BAD_SECURITY_POLICY_REJECTED => "Bad_SecurityPolicyRejected",
            codes::BAD_REQUEST_CANCELLED_BY_REQUEST => "Bad_RequestCancelledByRequest",
            codes::BAD_CONNECTION_CLOSED => "Bad_ConnectionClosed",
            _ => return None,
        };
        Some(name)
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::GOOD
    }
}

impl From<u32> for StatusCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::GOOD.is_bad());
        assert!(StatusCode::BAD_TIMEOUT.is_bad());
        assert!(StatusCode(0x4000_0000).is_uncertain());
        assert!(!StatusCode(0x4000_0000).is_bad());
    }

    #[test]
    fn test_display_names_known_codes() {
        assert_eq!(
            StatusCode::BAD_TIMEOUT.to_string(),
            "Bad_Timeout (0x800A0000)"
        );
        assert_eq!(StatusCode(0x8123_0000).to_string(), "0x81230000");
    }
}
