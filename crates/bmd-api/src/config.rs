use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use bmd_core::Endpoints;
use compute_api::TlsOptions;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub endpoints: Endpoints,
    pub ssl_no_verify: bool,
    pub ssl_cacert: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            get(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let listen_addr = get("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".into())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "LISTEN_ADDR",
                reason: e.to_string(),
            })?;

        let ssl_no_verify = match get("SSL_NO_VERIFY") {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                name: "SSL_NO_VERIFY",
                reason: format!("expected a boolean, got {raw:?}"),
            })?,
        };

        Ok(Self {
            listen_addr,
            endpoints: Endpoints {
                compute_url: required("COMPUTE_API_URL")?,
                image_url: required("IMAGE_API_URL")?,
                network_url: required("NETWORK_API_URL")?,
            },
            ssl_no_verify,
            ssl_cacert: get("SSL_CACERT")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// TLS settings for the outbound HTTP client, reading the CA bundle if one
    /// is configured.
    pub fn tls(&self) -> Result<TlsOptions, ConfigError> {
        let ca_cert_pem = match &self.ssl_cacert {
            Some(path) => Some(std::fs::read(path).map_err(|e| ConfigError::Invalid {
                name: "SSL_CACERT",
                reason: format!("{}: {e}", path.display()),
            })?),
            None => None,
        };
        Ok(TlsOptions {
            insecure: self.ssl_no_verify,
            ca_cert_pem,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
