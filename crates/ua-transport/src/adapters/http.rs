//! Reqwest-backed HTTPS poster.

use crate::domain::config::{ConfigError, HttpsSecurityPolicy, TransportConfig};
use crate::domain::error::PostError;
use crate::ports::outbound::{HttpPoster, PostRequest};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::error::Error as StdError;
use std::path::Path;
use tracing::debug;

/// HTTPS client shared by every request of a transport channel.
pub struct ReqwestPoster {
    client: RwLock<Option<reqwest::Client>>,
    credentials: Option<(String, String)>,
}

impl ReqwestPoster {
    /// Build the client from the HTTPS section of `config`.
    pub fn new(config: &TransportConfig) -> Result<Self, ConfigError> {
        let https = &config.https;
        let policy = https.selected_policy();

        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.timeouts.connect_timeout)
            .pool_max_idle_per_host(https.max_connections)
            .min_tls_version(min_tls_version(policy))
            .danger_accept_invalid_hostnames(https.accept_invalid_hostnames);

        if let Some(path) = &https.ca_certificate {
            let pem = read_pem(path)?;
            let certificate =
                reqwest::Certificate::from_pem(&pem).map_err(|e| ConfigError::Tls(e.to_string()))?;
            builder = builder.add_root_certificate(certificate);
        }

        if let Some(identity) = &https.client_identity {
            let mut pem = read_pem(&identity.certificate_path)?;
            pem.extend(read_pem(&identity.private_key_path)?);
            let identity =
                reqwest::Identity::from_pem(&pem).map_err(|e| ConfigError::Tls(e.to_string()))?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| ConfigError::Tls(e.to_string()))?;

        debug!(
            tls_policy = policy.uri(),
            max_connections = https.max_connections,
            "HTTPS client built"
        );

        Ok(Self {
            client: RwLock::new(Some(client)),
            credentials: https.username.clone().zip(https.password.clone()),
        })
    }
}

#[async_trait]
impl HttpPoster for ReqwestPoster {
    async fn post(&self, request: PostRequest) -> Result<Bytes, PostError> {
        let client = self.client.read().clone().ok_or(PostError::Shutdown)?;

        let mut builder = client.post(&request.url).body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some((username, password)) = &self.credentials {
            builder = builder.basic_auth(username, Some(password));
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(PostError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.bytes().await.map_err(classify)
    }

    fn shutdown(&self) {
        if self.client.write().take().is_some() {
            debug!("HTTPS client released");
        }
    }
}

fn min_tls_version(policy: HttpsSecurityPolicy) -> reqwest::tls::Version {
    match policy {
        HttpsSecurityPolicy::Tls1_0 => reqwest::tls::Version::TLS_1_0,
        HttpsSecurityPolicy::Tls1_1 => reqwest::tls::Version::TLS_1_1,
        HttpsSecurityPolicy::Tls1_2 => reqwest::tls::Version::TLS_1_2,
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|e| ConfigError::Tls(format!("{}: {}", path.display(), e)))
}

fn classify(err: reqwest::Error) -> PostError {
    if mentions_certificate(&err) {
        PostError::CertificateRejected(root_cause(&err))
    } else if err.is_connect() {
        PostError::Connect(root_cause(&err))
    } else {
        PostError::Io(root_cause(&err))
    }
}

fn mentions_certificate(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.to_string().to_ascii_lowercase().contains("certificate") {
            return true;
        }
        current = err.source();
    }
    false
}

fn root_cause(err: &(dyn StdError + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{ClientIdentity, TransportConfig};
    use std::path::PathBuf;

    #[test]
    fn test_min_tls_version_follows_policy() {
        assert_eq!(
            min_tls_version(HttpsSecurityPolicy::Tls1_2),
            reqwest::tls::Version::TLS_1_2
        );
        assert_eq!(
            min_tls_version(HttpsSecurityPolicy::Tls1_0),
            reqwest::tls::Version::TLS_1_0
        );
    }

    #[test]
    fn test_missing_ca_file_is_config_error() {
        let mut config = TransportConfig::default();
        config.https.ca_certificate = Some(PathBuf::from("/nonexistent/ca.pem"));
        assert!(matches!(ReqwestPoster::new(&config), Err(ConfigError::Tls(_))));
    }

    #[test]
    fn test_missing_identity_is_config_error() {
        let mut config = TransportConfig::default();
        config.https.client_identity = Some(ClientIdentity {
            certificate_path: PathBuf::from("/nonexistent/client.pem"),
            private_key_path: PathBuf::from("/nonexistent/client.key"),
        });
        assert!(matches!(ReqwestPoster::new(&config), Err(ConfigError::Tls(_))));
    }

    #[tokio::test]
    async fn test_post_after_shutdown_fails() {
        let poster = ReqwestPoster::new(&TransportConfig::default()).expect("client");
        poster.shutdown();

        let result = poster
            .post(PostRequest {
                url: "http://127.0.0.1:9/".into(),
                headers: Vec::new(),
                body: Bytes::new(),
            })
            .await;

        assert_eq!(result, Err(PostError::Shutdown));
    }

    #[tokio::test]
    async fn test_refused_connection_is_connect_error() {
        // Grab a free port and release it so nothing is listening.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|listener| listener.local_addr())
            .map(|addr| addr.port())
            .expect("free port");
        let poster = ReqwestPoster::new(&TransportConfig::default()).expect("client");

        let result = poster
            .post(PostRequest {
                url: format!("http://127.0.0.1:{port}/"),
                headers: Vec::new(),
                body: Bytes::from_static(b"x"),
            })
            .await;

        assert!(matches!(result, Err(PostError::Connect(_))), "{result:?}");
    }
}
