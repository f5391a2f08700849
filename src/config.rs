use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port cannot be 0")]
    ZeroPort,
    #[error("metrics port {0} collides with the relay port")]
    MetricsPortCollision(u16),
    #[error("max_peers must be at least 1")]
    NoPeers,
    #[error("relay url must start with https://, got '{0}'")]
    InsecureUrl(String),
    #[error("reconnect backoff initial ({initial:?}) exceeds max ({max:?})")]
    BackoffInverted { initial: Duration, max: Duration },
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: IpAddr,
    /// WebTransport port
    pub port: u16,
    /// Port of the plain HTTP metrics/status endpoint
    pub metrics_port: u16,
    /// Connections beyond this are refused before a peer id is assigned
    pub max_peers: usize,
    /// Path to TLS certificate file (if not using the dev cert)
    pub tls_cert_path: Option<String>,
    /// Path to TLS key file (if not using the dev cert)
    pub tls_key_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4433,
            metrics_port: 9090,
            max_peers: 32,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

fn env_port(name: &str) -> Option<u16> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u16>() {
        Ok(0) => {
            tracing::warn!("{} must be > 0, using default", name);
            None
        }
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.bind_address = parsed;
            } else {
                tracing::warn!("Invalid BIND_ADDRESS '{}', using default", addr);
            }
        }

        if let Some(port) = env_port("PORT") {
            config.port = port;
        }
        if let Some(port) = env_port("METRICS_PORT") {
            config.metrics_port = port;
        }

        if let Ok(max_peers) = std::env::var("MAX_PEERS") {
            match max_peers.parse::<usize>() {
                Ok(parsed) if parsed > 0 && parsed <= 1024 => config.max_peers = parsed,
                Ok(_) => tracing::warn!("MAX_PEERS must be 1-1024, using default"),
                Err(_) => tracing::warn!("Invalid MAX_PEERS '{}', using default", max_peers),
            }
        }

        if let Ok(cert_path) = std::env::var("TLS_CERT_PATH") {
            config.tls_cert_path = Some(cert_path);
        }

        if let Ok(key_path) = std::env::var("TLS_KEY_PATH") {
            config.tls_key_path = Some(key_path);
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.metrics_port == self.port {
            return Err(ConfigError::MetricsPortCollision(self.metrics_port));
        }
        if self.max_peers == 0 {
            return Err(ConfigError::NoPeers);
        }
        Ok(())
    }
}

/// Headless peer / client transport configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub relay_url: String,
    /// Base64 SHA-256 of a self-signed relay certificate
    pub cert_hash: Option<String>,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "https://127.0.0.1:4433".to_string(),
            cert_hash: None,
            reconnect_initial: Duration::from_millis(1000),
            reconnect_max: Duration::from_millis(10_000),
        }
    }
}

impl ClientConfig {
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("RELAY_URL") {
            config.relay_url = url;
        }
        if let Ok(hash) = std::env::var("RELAY_CERT_HASH") {
            if !hash.trim().is_empty() {
                config.cert_hash = Some(hash.trim().to_string());
            }
        }
        if let Some(initial) = env_millis("RECONNECT_INITIAL_MS") {
            config.reconnect_initial = initial;
        }
        if let Some(max) = env_millis("RECONNECT_MAX_MS") {
            config.reconnect_max = max;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.relay_url.starts_with("https://") {
            return Err(ConfigError::InsecureUrl(self.relay_url.clone()));
        }
        if self.reconnect_initial > self.reconnect_max {
            return Err(ConfigError::BackoffInverted {
                initial: self.reconnect_initial,
                max: self.reconnect_max,
            });
        }
        Ok(())
    }
}
