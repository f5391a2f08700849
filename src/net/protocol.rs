use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::enemy::{Enemy, EnemyId, EnemyKind, EnemyState};
use crate::game::weapons::WeaponKind;

pub use crate::relay::room::RoomState;

/// Relay-assigned session identity, stable for one connection
pub type PeerId = Uuid;

/// Position plus yaw
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub ry: f32,
}

/// `player:move` payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub transform: Transform,
    pub weapon: WeaponKind,
}

/// Peer table entry sent in `state:update` and `player:join`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    pub id: PeerId,
    pub transform: Transform,
    pub weapon: WeaponKind,
    pub health: f32,
    pub max_health: f32,
    pub kills: u32,
    pub deaths: u32,
    /// Team color index, assigned round-robin at join
    pub color: u8,
}

/// One enemy as seen by guests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyProjection {
    pub id: EnemyId,
    pub kind: EnemyKind,
    pub level: u32,
    pub x: f32,
    pub z: f32,
    pub yaw: f32,
    pub health: f32,
    pub max_health: f32,
    pub state: EnemyState,
    pub alive: bool,
}

impl EnemyProjection {
    pub fn from_enemy(enemy: &Enemy) -> Self {
        Self {
            id: enemy.id,
            kind: enemy.kind,
            level: enemy.level,
            x: enemy.position.x,
            z: enemy.position.z,
            yaw: enemy.yaw,
            health: enemy.health,
            max_health: enemy.max_health,
            state: enemy.state,
            alive: enemy.alive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageRequest {
    pub enemy_id: EnemyId,
    pub amount: f32,
    pub headshot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BossInfo {
    pub enemy_id: EnemyId,
    pub level: u32,
    pub health: f32,
    pub max_health: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Airdrop {
    pub id: u32,
    pub x: f32,
    pub z: f32,
}

/// Messages from client to relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// `player:move`, rate-limited by the sender
    Move(Movement),
    /// `player:shoot` at another peer; damage is resolved by the relay
    Shoot {
        target: PeerId,
        weapon: WeaponKind,
        headshot: bool,
    },
    /// `npc:kill` notice from the peer that applied the fatal damage
    NpcKill { enemy_id: EnemyId, is_boss: bool },
    /// `npc:damageRequest`, guest to host
    NpcDamageRequest(DamageRequest),
    /// `npc:stateSync` (host only)
    NpcStateSync(Vec<EnemyProjection>),
    /// `boss:spawn` (host only)
    BossSpawn(BossInfo),
    /// `boss:death` (host only)
    BossDeath { enemy_id: EnemyId },
    /// `airdrop:spawn` (host only)
    AirdropSpawn(Airdrop),
    /// `npc:killConfirm` for a guest-initiated kill (host only)
    NpcKillConfirm {
        to: PeerId,
        enemy_id: EnemyId,
        kind: EnemyKind,
    },
    /// `npc:attack` against a remote player (host only)
    NpcAttack {
        to: PeerId,
        enemy_id: EnemyId,
        damage: f32,
    },
    Ping { timestamp: u64 },
}

impl ClientMessage {
    /// Types the relay drops unless they come from the current host
    pub fn is_host_only(&self) -> bool {
        matches!(
            self,
            ClientMessage::NpcStateSync(_)
                | ClientMessage::BossSpawn(_)
                | ClientMessage::BossDeath { .. }
                | ClientMessage::AirdropSpawn(_)
                | ClientMessage::NpcKillConfirm { .. }
                | ClientMessage::NpcAttack { .. }
        )
    }

    /// Event name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Move(_) => "player:move",
            ClientMessage::Shoot { .. } => "player:shoot",
            ClientMessage::NpcKill { .. } => "npc:kill",
            ClientMessage::NpcDamageRequest(_) => "npc:damageRequest",
            ClientMessage::NpcStateSync(_) => "npc:stateSync",
            ClientMessage::BossSpawn(_) => "boss:spawn",
            ClientMessage::BossDeath { .. } => "boss:death",
            ClientMessage::AirdropSpawn(_) => "airdrop:spawn",
            ClientMessage::NpcKillConfirm { .. } => "npc:killConfirm",
            ClientMessage::NpcAttack { .. } => "npc:attack",
            ClientMessage::Ping { .. } => "ping",
        }
    }
}

/// Messages from relay to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// First message on every connection
    Welcome { peer_id: PeerId },
    /// `state:update`, full peer table for a new joiner
    StateUpdate {
        players: HashMap<PeerId, PeerSnapshot>,
        room_state: RoomState,
    },
    /// `host:assign`; carries the room state on promotion
    HostAssign {
        is_host: bool,
        room_state: Option<RoomState>,
    },
    /// `host:changed` (informational)
    HostChanged { host_id: PeerId },
    /// `gameState:sync`
    GameStateSync(RoomState),
    PlayerJoin(PeerSnapshot),
    PlayerLeave { id: PeerId },
    PlayerMove { id: PeerId, movement: Movement },
    /// PvP hit confirmation to the shooter
    PlayerHit {
        target: PeerId,
        damage: f32,
        headshot: bool,
        killed: bool,
    },
    PlayerDeath { killer: PeerId, victim: PeerId },
    /// Sent to the respawned peer only
    PlayerRespawn { transform: Transform },
    NpcKill {
        from: PeerId,
        enemy_id: EnemyId,
        is_boss: bool,
    },
    /// Forwarded to the host, tagged with the requester
    NpcDamageRequest { from: PeerId, request: DamageRequest },
    NpcStateSync(Vec<EnemyProjection>),
    BossSpawn(BossInfo),
    BossDeath { enemy_id: EnemyId },
    AirdropSpawn(Airdrop),
    NpcKillConfirm { enemy_id: EnemyId, kind: EnemyKind },
    NpcAttack { enemy_id: EnemyId, damage: f32 },
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

impl ServerMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::StateUpdate { .. } => "state:update",
            ServerMessage::HostAssign { .. } => "host:assign",
            ServerMessage::HostChanged { .. } => "host:changed",
            ServerMessage::GameStateSync(_) => "gameState:sync",
            ServerMessage::PlayerJoin(_) => "player:join",
            ServerMessage::PlayerLeave { .. } => "player:leave",
            ServerMessage::PlayerMove { .. } => "player:move",
            ServerMessage::PlayerHit { .. } => "player:hit",
            ServerMessage::PlayerDeath { .. } => "player:death",
            ServerMessage::PlayerRespawn { .. } => "player:respawn",
            ServerMessage::NpcKill { .. } => "npc:kill",
            ServerMessage::NpcDamageRequest { .. } => "npc:damageRequest",
            ServerMessage::NpcStateSync(_) => "npc:stateSync",
            ServerMessage::BossSpawn(_) => "boss:spawn",
            ServerMessage::BossDeath { .. } => "boss:death",
            ServerMessage::AirdropSpawn(_) => "airdrop:spawn",
            ServerMessage::NpcKillConfirm { .. } => "npc:killConfirm",
            ServerMessage::NpcAttack { .. } => "npc:attack",
            ServerMessage::Pong { .. } => "pong",
        }
    }
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
