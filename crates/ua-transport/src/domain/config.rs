//! Transport configuration with validation.
//!
//! Loaded from TOML; every section has defaults so a file only needs to name
//! the endpoint.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Security policy URI sent when none is configured.
pub const SECURITY_POLICY_NONE: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

/// Main transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// URL every request is POSTed to
    pub endpoint_url: String,
    /// Value of the `OPCUA-SecurityPolicy` header
    pub security_policy_uri: String,
    /// Encoder/decoder limits
    pub limits: EncodingLimits,
    /// Request and connection timeouts
    pub timeouts: TimeoutConfig,
    /// HTTPS client settings
    pub https: HttpsConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "https://localhost:4843".to_string(),
            security_policy_uri: SECURITY_POLICY_NONE.to_string(),
            limits: EncodingLimits::default(),
            timeouts: TimeoutConfig::default(),
            https: HttpsConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Config for `endpoint_url` with every other field defaulted.
    pub fn for_endpoint(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme = self
            .endpoint_url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase());
        match scheme.as_deref() {
            Some("https") | Some("http") => {}
            _ => {
                return Err(ConfigError::InvalidEndpoint(format!(
                    "unsupported protocol in {}",
                    self.endpoint_url
                )))
            }
        }

        if self.security_policy_uri.is_empty() {
            return Err(ConfigError::Invalid(
                "security_policy_uri cannot be empty".into(),
            ));
        }

        if self.https.max_connections == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_connections cannot be 0".into(),
            ));
        }

        if self.timeouts.fallback_wait.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "fallback_wait cannot be 0".into(),
            ));
        }

        if self.https.username.is_some() != self.https.password.is_some() {
            return Err(ConfigError::Invalid(
                "username and password must be set together".into(),
            ));
        }

        Ok(())
    }
}

/// Encoder limits. A value of `0` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingLimits {
    pub max_array_length: u32,
    pub max_string_length: u32,
    pub max_byte_string_length: u32,
    pub max_message_size: u32,
}

impl Default for EncodingLimits {
    fn default() -> Self {
        Self {
            max_array_length: 0,
            max_string_length: 0,
            max_byte_string_length: 0,
            max_message_size: 4 * 1024 * 1024,
        }
    }
}

impl EncodingLimits {
    /// No limits at all.
    pub fn unbounded() -> Self {
        Self {
            max_array_length: 0,
            max_string_length: 0,
            max_byte_string_length: 0,
            max_message_size: 0,
        }
    }

    /// True if `len` is within `limit` (`0` = unbounded).
    pub fn within(limit: u32, len: u64) -> bool {
        limit == 0 || len <= u64::from(limit)
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Used when a request carries no timeout hint. Zero disables the local deadline.
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,
    /// TCP/TLS connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Bound on a blocking wait when no other timeout is known
    #[serde(with = "humantime_serde")]
    pub fallback_wait: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
            fallback_wait: Duration::from_secs(100),
        }
    }
}

/// TLS versions offered by the HTTPS transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpsSecurityPolicy {
    #[serde(rename = "TLS-1-0")]
    Tls1_0,
    #[serde(rename = "TLS-1-1")]
    Tls1_1,
    #[serde(rename = "TLS-1-2")]
    Tls1_2,
}

impl HttpsSecurityPolicy {
    /// Policies used when none are configured.
    pub const ALL: [HttpsSecurityPolicy; 2] = [Self::Tls1_0, Self::Tls1_1];

    pub fn uri(self) -> &'static str {
        match self {
            Self::Tls1_0 => "http://opcfoundation.org/UA/SecurityPolicy#TLS-1-0",
            Self::Tls1_1 => "http://opcfoundation.org/UA/SecurityPolicy#TLS-1-1",
            Self::Tls1_2 => "http://opcfoundation.org/UA/SecurityPolicy#TLS-1-2",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        [Self::Tls1_0, Self::Tls1_1, Self::Tls1_2]
            .into_iter()
            .find(|p| p.uri() == uri)
    }
}

/// Client certificate and key, both PEM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
}

/// HTTPS client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpsConfig {
    /// Idle connections kept per host
    pub max_connections: usize,
    /// Offered TLS policies; the last entry is used
    pub tls_policies: Vec<HttpsSecurityPolicy>,
    /// Extra trusted CA certificate (PEM)
    pub ca_certificate: Option<PathBuf>,
    /// Client certificate for mutual TLS
    pub client_identity: Option<ClientIdentity>,
    /// Skip hostname verification of the server certificate
    pub accept_invalid_hostnames: bool,
    /// HTTP basic auth user
    pub username: Option<String>,
    /// HTTP basic auth password
    pub password: Option<String>,
}

impl Default for HttpsConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            tls_policies: HttpsSecurityPolicy::ALL.to_vec(),
            ca_certificate: None,
            client_identity: None,
            accept_invalid_hostnames: true,
            username: None,
            password: None,
        }
    }
}

impl HttpsConfig {
    /// Policy the client negotiates with.
    pub fn selected_policy(&self) -> HttpsSecurityPolicy {
        self.tls_policies
            .last()
            .copied()
            .unwrap_or(HttpsSecurityPolicy::Tls1_1)
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(String),
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// Endpoint URL is malformed or not http(s)
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// TLS material could not be loaded
    #[error("invalid TLS configuration: {0}")]
    Tls(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
