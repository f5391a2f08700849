//! Boundaries to the collaborators the core drives but never queries:
//! the renderer, the HUD and the input layer.

use tokio::sync::mpsc;

use super::enemy::{EnemyId, EnemyKind};
use super::weapons::WeaponKind;
use crate::net::protocol::{PeerId, Transform};

/// Scene handle the render collaborator keys its objects by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    Enemy(EnemyId),
    Player(PeerId),
    Airdrop(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Enemy(EnemyKind),
    Player { color: u8 },
    Airdrop,
}

pub trait RenderSink: Send {
    fn add_entity(&mut self, id: EntityId, kind: EntityKind, transform: Transform);
    fn remove_entity(&mut self, id: EntityId);
    fn update_transform(&mut self, id: EntityId, transform: Transform);
}

/// Notifications only; the HUD is never read back
pub trait HudSink: Send {
    fn on_kill_count_changed(&mut self, kill_count: u32);
    fn on_boss_alert(&mut self, text: &str);
    fn on_hit_marker(&mut self, headshot: bool);

    fn on_health_changed(&mut self, _health: f32, _max_health: f32) {}
    fn on_coins_changed(&mut self, _coins: u32) {}
    fn on_level_up(&mut self, _level: u32) {}
    fn on_weapon_drop(&mut self, _weapon: WeaponKind) {}
    /// One-time store interaction after a boss kill
    fn on_store_opened(&mut self) {}
}

/// Who an enemy attack lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The player owned by this client
    Local,
    Remote(PeerId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NpcAttack {
    pub target: Target,
    pub enemy_id: EnemyId,
    pub damage: f32,
}

/// Receives damage-to-player events from the enemy state machine
pub trait PlayerDamageSink: Send {
    fn on_attack(&mut self, attack: NpcAttack);
}

impl PlayerDamageSink for mpsc::UnboundedSender<NpcAttack> {
    fn on_attack(&mut self, attack: NpcAttack) {
        if let Err(e) = self.send(attack) {
            tracing::debug!("Attack from enemy {} dropped, receiver gone", e.0.enemy_id);
        }
    }
}

/// What a fired shot connected with, resolved upstream by the physics layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Enemy { id: EnemyId, headshot: bool },
    Player { id: PeerId, headshot: bool },
}

/// Normalized input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// Desired ground-plane direction; zero stops
    Move { dx: f32, dz: f32 },
    Aim { yaw: f32 },
    Fire { hit: Option<Hit> },
    SwitchSlot(usize),
    Reload,
}

pub struct NullRender;

impl RenderSink for NullRender {
    fn add_entity(&mut self, _id: EntityId, _kind: EntityKind, _transform: Transform) {}
    fn remove_entity(&mut self, _id: EntityId) {}
    fn update_transform(&mut self, _id: EntityId, _transform: Transform) {}
}

pub struct NullHud;

impl HudSink for NullHud {
    fn on_kill_count_changed(&mut self, _kill_count: u32) {}
    fn on_boss_alert(&mut self, _text: &str) {}
    fn on_hit_marker(&mut self, _headshot: bool) {}
}
