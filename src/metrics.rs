//! Prometheus-compatible metrics and status endpoint
//!
//! Default endpoints on the metrics port:
//! `/metrics` (Prometheus text), `/metrics/json`, `/status`, `/health`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics_extended")]
use hashbrown::HashMap;
use parking_lot::RwLock;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::net::protocol::PeerId;

/// Relay counters, shared between connection tasks
#[derive(Debug)]
pub struct Metrics {
    pub peers_connected: AtomicU64,
    pub connections_total: AtomicU64,
    pub connections_refused: AtomicU64,

    pub messages_received: AtomicU64,
    pub messages_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub decode_errors: AtomicU64,

    /// Host-only messages dropped because the sender wasn't the host
    pub unauthorized_drops: AtomicU64,
    pub damage_requests_forwarded: AtomicU64,
    pub host_migrations: AtomicU64,
    pub room_resets: AtomicU64,

    start_time: Instant,
    host: RwLock<Option<PeerId>>,

    #[cfg(feature = "metrics_extended")]
    by_type: parking_lot::Mutex<HashMap<&'static str, u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            peers_connected: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            connections_refused: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            unauthorized_drops: AtomicU64::new(0),
            damage_requests_forwarded: AtomicU64::new(0),
            host_migrations: AtomicU64::new(0),
            room_resets: AtomicU64::new(0),
            start_time: Instant::now(),
            host: RwLock::new(None),
            #[cfg(feature = "metrics_extended")]
            by_type: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn set_host(&self, host: Option<PeerId>) {
        *self.host.write() = host;
    }

    pub fn host(&self) -> Option<PeerId> {
        *self.host.read()
    }

    /// Count one inbound message of the given event type
    pub fn record_received(&self, event: &'static str, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        #[cfg(feature = "metrics_extended")]
        {
            *self.by_type.lock().entry(event).or_insert(0) += 1;
        }
        #[cfg(not(feature = "metrics_extended"))]
        let _ = event;
    }

    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn uptime_secs_f64(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("horde_relay_peers", "Connected peers", "gauge",
            self.peers_connected.load(Ordering::Relaxed));
        metric!("horde_relay_connections_total", "Accepted connections", "counter",
            self.connections_total.load(Ordering::Relaxed));
        metric!("horde_relay_connections_refused_total", "Connections refused at capacity", "counter",
            self.connections_refused.load(Ordering::Relaxed));

        metric!("horde_relay_messages_received_total", "Total messages received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("horde_relay_messages_sent_total", "Total messages sent", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("horde_relay_bytes_received_total", "Total bytes received", "counter",
            self.bytes_received.load(Ordering::Relaxed));
        metric!("horde_relay_bytes_sent_total", "Total bytes sent", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("horde_relay_decode_errors_total", "Frames that failed to decode", "counter",
            self.decode_errors.load(Ordering::Relaxed));

        metric!("horde_relay_unauthorized_drops_total", "Host-only messages dropped from non-hosts", "counter",
            self.unauthorized_drops.load(Ordering::Relaxed));
        metric!("horde_relay_damage_requests_forwarded_total", "Guest damage requests forwarded to the host", "counter",
            self.damage_requests_forwarded.load(Ordering::Relaxed));
        metric!("horde_relay_host_migrations_total", "Host hand-offs after a host disconnect", "counter",
            self.host_migrations.load(Ordering::Relaxed));
        metric!("horde_relay_room_resets_total", "Room state resets on empty room", "counter",
            self.room_resets.load(Ordering::Relaxed));
        metric!("horde_relay_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        #[cfg(feature = "metrics_extended")]
        {
            let by_type = self.by_type.lock();
            if !by_type.is_empty() {
                output.push_str("# HELP horde_relay_messages_by_type_total Inbound messages per event type\n");
                output.push_str("# TYPE horde_relay_messages_by_type_total counter\n");
                let mut events: Vec<_> = by_type.iter().collect();
                events.sort_unstable_by_key(|(name, _)| **name);
                for (name, count) in events {
                    output.push_str(&format!(
                        "horde_relay_messages_by_type_total{{event=\"{}\"}} {}\n",
                        name, count
                    ));
                }
            }
        }

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        let value = json!({
            "peers": {
                "connected": self.peers_connected.load(Ordering::Relaxed),
                "connections_total": self.connections_total.load(Ordering::Relaxed),
                "refused": self.connections_refused.load(Ordering::Relaxed),
                "host": self.host().map(|h| h.to_string()),
            },
            "network": {
                "messages_received": self.messages_received.load(Ordering::Relaxed),
                "messages_sent": self.messages_sent.load(Ordering::Relaxed),
                "bytes_received": self.bytes_received.load(Ordering::Relaxed),
                "bytes_sent": self.bytes_sent.load(Ordering::Relaxed),
                "decode_errors": self.decode_errors.load(Ordering::Relaxed),
            },
            "relay": {
                "unauthorized_drops": self.unauthorized_drops.load(Ordering::Relaxed),
                "damage_requests_forwarded": self.damage_requests_forwarded.load(Ordering::Relaxed),
                "host_migrations": self.host_migrations.load(Ordering::Relaxed),
                "room_resets": self.room_resets.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }

    /// Body of `/status`: `{ players, uptime, host }`
    pub fn to_status_json(&self) -> String {
        json!({
            "players": self.peers_connected.load(Ordering::Relaxed),
            "uptime": self.uptime_secs_f64(),
            "host": self.host().map(|h| h.to_string()),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

/// Build the full HTTP response for a raw request
pub fn respond(metrics: &Metrics, request: &str) -> String {
    let path = request
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("GET "))
        .and_then(|rest| rest.split_whitespace().next());

    match path {
        Some("/metrics/json") | Some("/json") => {
            http_response("200 OK", "application/json", &metrics.to_json())
        }
        Some("/metrics") => http_response(
            "200 OK",
            "text/plain; version=0.0.4",
            &metrics.to_prometheus(),
        ),
        Some("/status") | Some("/api/status") => {
            http_response("200 OK", "application/json", &metrics.to_status_json())
        }
        Some("/health") | Some("/") => http_response("200 OK", "text/plain", "OK"),
        _ => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
