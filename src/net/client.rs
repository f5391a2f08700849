//! Client transport adapter
//!
//! Owns the WebTransport connection to the relay, reconnecting with
//! exponential backoff. Callers publish [`ClientMessage`]s and subscribe to
//! [`ClientEvent`]s; they never see the socket.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use wtransport::{ClientConfig as WtClientConfig, Endpoint};

use crate::config::ClientConfig;
use crate::net::framing::{read_message, write_message, FramingError};
use crate::net::protocol::{decode, encode, ClientMessage, ServerMessage};
use crate::net::tls::parse_cert_hash;

/// Relative jitter applied to each backoff delay
const JITTER: f64 = 0.2;
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport adapter closed")]
    Closed,
    #[error("invalid relay certificate hash: {0}")]
    CertHash(String),
    #[error("failed to create client endpoint: {0}")]
    Endpoint(String),
}

/// What subscribers see
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A new connection is up; the relay will assign a fresh peer id
    Connected,
    Disconnected,
    Message(ServerMessage),
}

/// Exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Delay before the next attempt; doubles up to the cap
    pub fn next_delay<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);
        let factor = 1.0 + rng.gen_range(-JITTER..=JITTER);
        base.mul_f64(factor)
    }
}

/// Handle to the background connection task
pub struct RelayClient {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    events: broadcast::Sender<ClientEvent>,
    task: JoinHandle<()>,
}

impl RelayClient {
    /// Start connecting in the background
    pub fn spawn(config: ClientConfig) -> Result<Self, ClientError> {
        let tls = match &config.cert_hash {
            Some(hash) => {
                let digest =
                    parse_cert_hash(hash).map_err(|e| ClientError::CertHash(e.to_string()))?;
                WtClientConfig::builder()
                    .with_bind_default()
                    .with_server_certificate_hashes([wtransport::tls::Sha256Digest::new(digest)])
                    .build()
            }
            None => WtClientConfig::builder()
                .with_bind_default()
                .with_native_certs()
                .build(),
        };
        let endpoint = Endpoint::client(tls).map_err(|e| ClientError::Endpoint(e.to_string()))?;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let task = tokio::spawn(run(endpoint, config, outbound_rx, events.clone()));

        Ok(Self {
            outbound,
            events,
            task,
        })
    }

    /// Queue a message; dropped silently if no connection is up when it is flushed
    pub fn publish(&self, msg: ClientMessage) -> Result<(), ClientError> {
        self.outbound.send(msg).map_err(|_| ClientError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn run(
    endpoint: Endpoint<wtransport::endpoint::endpoint_side::Client>,
    config: ClientConfig,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
    events: broadcast::Sender<ClientEvent>,
) {
    let mut backoff = Backoff::new(config.reconnect_initial, config.reconnect_max);

    loop {
        match endpoint.connect(&config.relay_url).await {
            Ok(connection) => {
                tracing::info!("Connected to relay {}", config.relay_url);
                backoff.reset();
                match session(connection, &mut outbound, &events).await {
                    SessionEnd::Closed => tracing::info!("Relay connection closed"),
                    SessionEnd::Shutdown => return,
                }
                let _ = events.send(ClientEvent::Disconnected);
            }
            Err(e) => tracing::warn!("Connect to {} failed: {}", config.relay_url, e),
        }

        // Messages produced while offline belong to the old identity
        while outbound.try_recv().is_ok() {}

        let delay = backoff.next_delay(&mut rand::thread_rng());
        tracing::debug!("Reconnecting in {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}

enum SessionEnd {
    Closed,
    /// Every publisher is gone
    Shutdown,
}

async fn session(
    connection: wtransport::Connection,
    outbound: &mut mpsc::UnboundedReceiver<ClientMessage>,
    events: &broadcast::Sender<ClientEvent>,
) -> SessionEnd {
    let (mut send, mut recv) = match connection.open_bi().await {
        Ok(opening) => match opening.await {
            Ok(streams) => streams,
            Err(e) => {
                tracing::warn!("Failed to open stream: {}", e);
                return SessionEnd::Closed;
            }
        },
        Err(e) => {
            tracing::warn!("Failed to open stream: {}", e);
            return SessionEnd::Closed;
        }
    };
    let _ = events.send(ClientEvent::Connected);

    let reader_events = events.clone();
    let mut reader = tokio::spawn(async move {
        loop {
            match read_message(&mut recv).await {
                Ok(bytes) => match decode::<ServerMessage>(&bytes) {
                    Ok(msg) => {
                        let _ = reader_events.send(ClientEvent::Message(msg));
                    }
                    Err(e) => tracing::warn!("Failed to decode relay message: {}", e),
                },
                Err(FramingError::ConnectionClosed) => break,
                Err(e) => {
                    tracing::warn!("Relay stream error: {}", e);
                    break;
                }
            }
        }
    });

    let end = loop {
        tokio::select! {
            _ = &mut reader => break SessionEnd::Closed,
            next = outbound.recv() => {
                let Some(msg) = next else {
                    break SessionEnd::Shutdown;
                };
                let bytes = match encode(&msg) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!("Failed to encode {}: {}", msg.name(), e);
                        continue;
                    }
                };
                if let Err(e) = write_message(&mut send, &bytes).await {
                    tracing::warn!("Write to relay failed: {}", e);
                    break SessionEnd::Closed;
                }
            }
        }
    };

    reader.abort();
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));
        let mut bases = Vec::new();
        for _ in 0..6 {
            bases.push(backoff.current);
            backoff.next_delay(&mut rng);
        }
        let secs: Vec<u64> = bases.iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));
            let delay = backoff.next_delay(&mut rng);
            assert!(delay >= Duration::from_millis(800));
            assert!(delay <= Duration::from_millis(1200));
        }
    }

    #[test]
    fn test_backoff_reset() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));
        for _ in 0..4 {
            backoff.next_delay(&mut rng);
        }
        backoff.reset();
        assert_eq!(backoff.current, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_bad_cert_hash_rejected() {
        let config = ClientConfig {
            cert_hash: Some("definitely-not-base64!".into()),
            ..ClientConfig::default()
        };
        assert!(matches!(
            RelayClient::spawn(config),
            Err(ClientError::CertHash(_))
        ));
    }
}
