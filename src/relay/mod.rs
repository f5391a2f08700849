//! Relay server core: peer registry, host election and message routing

pub mod join_order;
pub mod peer;
pub mod room;
pub mod router;

pub use join_order::JoinOrder;
pub use room::RoomState;
pub use router::{Effects, Relay};
