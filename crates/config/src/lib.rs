use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::debug;

/// Deployment configuration, read from the environment once at startup.
///
/// The host/port pair fixes the redirect URI: the same byte-identical
/// string goes into the authorization request and the token exchange.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// Public hostname the browser reaches the tool on.
    pub host: String,
    /// HTTPS port the tool listens on.
    pub port: u16,
    /// Spool directory for session files.
    pub session_dir: PathBuf,
    /// Upper bound on each outbound token endpoint request.
    #[serde(skip)]
    pub request_timeout: Duration,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8443,
            session_dir: std::env::temp_dir().join("tokenscope-sessions"),
            request_timeout: Duration::from_secs(30),
            cert_path: PathBuf::from("certs/cert.pem"),
            key_path: PathBuf::from("certs/key.pem"),
        }
    }
}

impl AppConfig {
    /// Read `TOKENSCOPE_*` variables, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("TOKENSCOPE_HOST") {
            if !host.is_empty() {
                config.host = host;
            }
        }
        if let Ok(port) = std::env::var("TOKENSCOPE_PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("TOKENSCOPE_PORT is not a port number: {port}"))?;
        }
        if let Ok(dir) = std::env::var("TOKENSCOPE_SESSION_DIR") {
            config.session_dir = PathBuf::from(dir);
        }
        if let Ok(secs) = std::env::var("TOKENSCOPE_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("TOKENSCOPE_REQUEST_TIMEOUT_SECS is not a number: {secs}"))?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(cert) = std::env::var("TOKENSCOPE_CERT") {
            config.cert_path = PathBuf::from(cert);
        }
        if let Ok(key) = std::env::var("TOKENSCOPE_KEY") {
            config.key_path = PathBuf::from(key);
        }
        debug!(host = %config.host, port = config.port, "loaded configuration");
        Ok(config)
    }

    /// The fixed callback URL registered with the authorization server.
    /// Port 443 is elided, matching what browsers put in the address bar.
    pub fn redirect_uri(&self) -> String {
        if self.port == 443 {
            format!("https://{}/callback", self.host)
        } else {
            format!("https://{}:{}/callback", self.host, self.port)
        }
    }
}
