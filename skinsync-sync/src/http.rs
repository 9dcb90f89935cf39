//! HTTP client helper with native-tls support.

use crate::error::TransportError;
use crate::fetcher::Transport;
use std::time::Duration;
use ureq::Agent;
use ureq::tls::{RootCerts, TlsConfig, TlsProvider};

/// Global timeout for all HTTP operations (30 seconds).
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum response body size per artifact (1 MB).
pub const MAX_ARTIFACT_SIZE: u64 = 1024 * 1024;

const USER_AGENT: &str = concat!("skinsync/", env!("CARGO_PKG_VERSION"));

/// Hosts allowed to serve artifacts over plain HTTP (local development).
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]", "::1"];

/// Validate that a URL is acceptable for artifact retrieval.
///
/// Enforces:
/// - HTTPS scheme, or HTTP to a loopback host
/// - A host component is present
pub fn validate_source_url(url: &str) -> Result<(), TransportError> {
    let invalid = |reason: String| TransportError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = url::Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    let host = parsed.host_str().unwrap_or("");
    if host.is_empty() {
        return Err(invalid("URL has no host".to_string()));
    }

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if LOOPBACK_HOSTS.contains(&host) => Ok(()),
        "http" => Err(invalid(format!(
            "plain HTTP is only allowed for loopback hosts, not '{host}'"
        ))),
        scheme => Err(invalid(format!(
            "scheme '{scheme}' rejected; only HTTPS is allowed"
        ))),
    }
}

/// Join an artifact filename onto a source base URL.
///
/// The base is treated as a directory: a missing trailing `/` is added so
/// `https://cdn/skins` and `https://cdn/skins/` resolve the same way.
pub fn artifact_url(base_url: &str, filename: &str) -> String {
    let base = base_url.trim();
    if base.ends_with('/') {
        format!("{base}{filename}")
    } else {
        format!("{base}/{filename}")
    }
}

/// Create a new HTTP agent configured with native-tls and a global timeout.
pub fn agent() -> Agent {
    let tls_config = TlsConfig::builder()
        .provider(TlsProvider::NativeTls)
        .root_certs(RootCerts::PlatformVerifier)
        .build();

    Agent::config_builder()
        .tls_config(tls_config)
        .timeout_global(Some(HTTP_TIMEOUT))
        .build()
        .into()
}

/// Production [`Transport`] backed by a shared `ureq` agent.
pub struct HttpTransport {
    agent: Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { agent: agent() }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, credential: Option<&str>) -> Result<String, TransportError> {
        validate_source_url(url)?;

        let mut request = self.agent.get(url).header("User-Agent", USER_AGENT);
        if let Some(token) = credential {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.call().map_err(|e| match e {
            ureq::Error::StatusCode(status) => TransportError::Status {
                url: url.to_string(),
                status,
            },
            other => TransportError::Network {
                url: url.to_string(),
                message: other.to_string(),
            },
        })?;

        response
            .into_body()
            .with_config()
            .limit(MAX_ARTIFACT_SIZE)
            .read_to_string()
            .map_err(|e| TransportError::Body {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned response on loopback. The thread yields the raw request head.
    fn serve_once(
        status_line: &'static str,
        body: Vec<u8>,
    ) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            let header = format!(
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            // The client may hang up early once it has seen enough.
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body);
            String::from_utf8_lossy(&head).into_owned()
        });
        (format!("http://{addr}/skins/style.css"), handle)
    }

    #[test]
    fn test_get_sends_bearer_credential() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", b"g{}".to_vec());
        let body = HttpTransport::new().get(&url, Some("tok-123")).unwrap();
        assert_eq!(body, "g{}");

        let head = server.join().unwrap().to_ascii_lowercase();
        assert!(head.starts_with("get /skins/style.css "), "{head}");
        assert!(head.contains("authorization: bearer tok-123"), "{head}");
    }

    #[test]
    fn test_get_without_credential_sends_no_authorization() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", b"ok".to_vec());
        HttpTransport::new().get(&url, None).unwrap();
        let head = server.join().unwrap().to_ascii_lowercase();
        assert!(!head.contains("authorization:"), "{head}");
    }

    #[test]
    fn test_get_maps_error_status() {
        let (url, server) = serve_once("HTTP/1.1 404 Not Found", b"missing".to_vec());
        let err = HttpTransport::new().get(&url, Some("tok")).unwrap_err();
        assert!(
            matches!(err, TransportError::Status { status: 404, .. }),
            "{err:?}"
        );
        server.join().unwrap();
    }

    #[test]
    fn test_get_rejects_oversized_body() {
        let oversized = vec![b'a'; MAX_ARTIFACT_SIZE as usize + 10];
        let (url, _server) = serve_once("HTTP/1.1 200 OK", oversized);
        let err = HttpTransport::new().get(&url, None).unwrap_err();
        assert!(matches!(err, TransportError::Body { .. }), "{err:?}");
    }

    #[test]
    fn test_get_validates_before_connecting() {
        let err = HttpTransport::new()
            .get("http://cdn.example.com/style.css", None)
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn test_https_accepted() {
        assert!(validate_source_url("https://cdn.example.com/skins/style.css").is_ok());
    }

    #[test]
    fn test_http_loopback_accepted() {
        assert!(validate_source_url("http://localhost:8080/style.css").is_ok());
        assert!(validate_source_url("http://127.0.0.1/style.css").is_ok());
    }

    #[test]
    fn test_http_remote_rejected() {
        let err = validate_source_url("http://cdn.example.com/style.css").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cdn.example.com"), "{msg}");
        assert!(msg.contains("loopback"), "{msg}");
    }

    #[test]
    fn test_file_scheme_rejected() {
        let err = validate_source_url("file:///etc/passwd").unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(validate_source_url("not a url").is_err());
    }

    #[test]
    fn test_artifact_url_join() {
        assert_eq!(
            artifact_url("https://cdn.example.com/skins", "style.css"),
            "https://cdn.example.com/skins/style.css"
        );
        assert_eq!(
            artifact_url("https://cdn.example.com/skins/", "style.css"),
            "https://cdn.example.com/skins/style.css"
        );
    }
}
