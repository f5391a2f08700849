//! WebTransport relay server
//!
//! Each peer opens one bidirectional stream. Frames read from it are decoded
//! into [`ClientMessage`]s and handed to the [`Relay`]; the resulting sends
//! are encoded once per recipient and queued on that peer's writer task.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::game::constants::player::RESPAWN_SECS;
use crate::metrics::Metrics;
use crate::net::framing::{frame, read_message, FramingError};
use crate::net::protocol::{decode, encode, ClientMessage, PeerId, ServerMessage};
use crate::net::tls::TlsConfig;
use crate::relay::{Effects, Relay};

type Outbox = mpsc::UnboundedSender<Vec<u8>>;

struct HubInner {
    relay: Relay,
    outboxes: HashMap<PeerId, Outbox>,
}

/// Relay state plus the per-peer outbound queues
///
/// Everything runs under one short synchronous lock; nothing awaits while it
/// is held, so per-peer send order equals relay decision order.
pub struct Hub {
    inner: Mutex<HubInner>,
    metrics: Arc<Metrics>,
    respawn_delay: Duration,
}

impl Hub {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self::with_relay(Relay::new(metrics.clone()), metrics)
    }

    pub fn with_relay(relay: Relay, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Mutex::new(HubInner {
                relay,
                outboxes: HashMap::new(),
            }),
            metrics,
            respawn_delay: Duration::from_secs_f32(RESPAWN_SECS),
        }
    }

    pub fn peer_count(&self) -> usize {
        self.inner.lock().relay.peer_count()
    }

    pub fn host_id(&self) -> Option<PeerId> {
        self.inner.lock().relay.host_id()
    }

    /// Register a connection and queue its welcome sequence
    pub fn connect(self: &Arc<Self>, outbox: Outbox) -> PeerId {
        let mut inner = self.inner.lock();
        let id = uuid::Uuid::new_v4();
        inner.outboxes.insert(id, outbox);
        let fx = inner.relay.connect_with_id(id);
        self.dispatch(&inner, fx);
        id
    }

    pub fn on_message(self: &Arc<Self>, from: PeerId, msg: ClientMessage) {
        let mut inner = self.inner.lock();
        let fx = inner.relay.on_message(from, msg);
        self.dispatch(&inner, fx);
    }

    pub fn disconnect(self: &Arc<Self>, id: PeerId) {
        let mut inner = self.inner.lock();
        inner.outboxes.remove(&id);
        let fx = inner.relay.on_disconnect(id);
        self.dispatch(&inner, fx);
    }

    fn dispatch(self: &Arc<Self>, inner: &HubInner, fx: Effects) {
        for (to, msg) in fx.sends {
            // Peers that already left are skipped
            let Some(outbox) = inner.outboxes.get(&to) else {
                continue;
            };
            let framed = match encode_frame(&msg) {
                Ok(framed) => framed,
                Err(e) => {
                    tracing::warn!("Failed to encode {} for {}: {}", msg.name(), to, e);
                    continue;
                }
            };
            let len = framed.len();
            if outbox.send(framed).is_ok() {
                self.metrics.record_sent(len);
            }
        }

        for victim in fx.respawns {
            let hub = Arc::clone(self);
            let delay = self.respawn_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let mut inner = hub.inner.lock();
                let fx = inner.relay.respawn_peer(victim);
                hub.dispatch(&inner, fx);
            });
        }
    }
}

fn encode_frame(msg: &ServerMessage) -> anyhow::Result<Vec<u8>> {
    Ok(frame(&encode(msg)?)?)
}

/// WebTransport relay server
pub struct RelayServer {
    config: ServerConfig,
    tls_config: TlsConfig,
    hub: Arc<Hub>,
    metrics: Arc<Metrics>,
}

impl RelayServer {
    pub async fn new(config: ServerConfig, metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let tls_config = TlsConfig::load(&config).await?;
        let hub = Arc::new(Hub::new(metrics.clone()));
        Ok(Self {
            config,
            tls_config,
            hub,
            metrics,
        })
    }

    /// Get the certificate hash for client configuration
    pub fn cert_hash(&self) -> &str {
        &self.tls_config.cert_hash
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.port)
    }

    /// Run the accept loop
    pub async fn run(self) -> anyhow::Result<()> {
        use wtransport::Endpoint;
        use wtransport::ServerConfig;

        // with_bind_default listens dual-stack on the configured port
        let server_config = ServerConfig::builder()
            .with_bind_default(self.config.port)
            .with_identity(self.tls_config.identity)
            .build();

        let server = Endpoint::server(server_config)?;

        tracing::info!("Relay listening on port {}", self.config.port);
        tracing::info!("Certificate hash: {}", self.tls_config.cert_hash);

        loop {
            let incoming = server.accept().await;
            let hub = self.hub.clone();
            let metrics = self.metrics.clone();
            let max_peers = self.config.max_peers;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(incoming, hub, metrics, max_peers).await {
                    tracing::warn!("Connection error: {}", e);
                }
            });
        }
    }
}

/// Handle a single WebTransport connection for its whole lifetime
async fn handle_connection(
    incoming: wtransport::endpoint::IncomingSession,
    hub: Arc<Hub>,
    metrics: Arc<Metrics>,
    max_peers: usize,
) -> anyhow::Result<()> {
    let session_request = incoming.await?;

    if hub.peer_count() >= max_peers {
        metrics.connections_refused.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("Refusing connection: relay full ({} peers)", max_peers);
        session_request.forbidden().await;
        return Ok(());
    }

    tracing::debug!(
        "New session from {:?}, path {}",
        session_request.authority(),
        session_request.path()
    );
    let connection = session_request.accept().await?;
    let (mut send, mut recv) = connection.accept_bi().await?;
    metrics.connections_total.fetch_add(1, Ordering::Relaxed);

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let peer_id = hub.connect(tx);

    let writer = tokio::spawn(async move {
        while let Some(framed) = rx.recv().await {
            if let Err(e) = send.write_all(&framed).await {
                tracing::debug!("Write to {} failed: {}", peer_id, e);
                break;
            }
        }
    });

    loop {
        match read_message(&mut recv).await {
            Ok(bytes) => match decode::<ClientMessage>(&bytes) {
                Ok(msg) => {
                    metrics.record_received(msg.name(), bytes.len());
                    hub.on_message(peer_id, msg);
                }
                Err(e) => {
                    metrics.decode_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Failed to decode message from {}: {}", peer_id, e);
                }
            },
            Err(FramingError::ConnectionClosed) => break,
            Err(e) => {
                tracing::warn!("Stream error from {}: {}", peer_id, e);
                break;
            }
        }
    }

    hub.disconnect(peer_id);
    writer.abort();
    Ok(())
}
