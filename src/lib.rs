//! Horde co-op relay and client core
//!
//! A WebTransport relay that elects one peer as host and forwards its
//! authoritative horde simulation to everyone else, plus the client-side
//! session that runs that simulation.
//!
//! # Features
//!
//! - `metrics_extended` - Per-message-type counters and byte accounting (enabled by default)

pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod relay;
pub mod util;
