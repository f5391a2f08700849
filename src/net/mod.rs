//! Wire protocol and WebTransport plumbing for both ends of a session.

pub mod client;
pub mod framing;
pub mod protocol;
pub mod tls;
pub mod transport;
