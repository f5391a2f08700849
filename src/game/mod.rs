//! Client-side simulation: the horde director, its building blocks and the
//! per-peer session that ties them to the relay protocol.

pub mod ai;
pub mod constants;
pub mod damage;
pub mod director;
pub mod enemy;
pub mod mirror;
pub mod ports;
pub mod progression;
pub mod registry;
pub mod role;
pub mod scheduler;
pub mod session;
pub mod weapons;

pub use director::{DirectorEvent, HordeDirector};
pub use ports::{HudSink, Intent, RenderSink};
pub use role::Role;
pub use session::Session;
