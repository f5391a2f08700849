use rand::Rng;

use crate::game::constants::player::{BASE_HEALTH, RESPAWN_SCATTER};
use crate::game::weapons::WeaponKind;
use crate::net::protocol::{Movement, PeerId, PeerSnapshot, Transform};

/// Spawn height handed to the physics collaborator
const SPAWN_Y: f32 = 5.0;

/// Relay-side record of one connected player
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: PeerId,
    pub transform: Transform,
    pub weapon: WeaponKind,
    pub health: f32,
    pub max_health: f32,
    pub kills: u32,
    pub deaths: u32,
    pub color: u8,
}

impl Peer {
    pub fn new<R: Rng + ?Sized>(id: PeerId, color: u8, rng: &mut R) -> Self {
        Self {
            id,
            transform: scatter_transform(rng),
            weapon: WeaponKind::BasicGun,
            health: BASE_HEALTH as f32,
            max_health: BASE_HEALTH as f32,
            kills: 0,
            deaths: 0,
            color,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn apply_move(&mut self, movement: &Movement) {
        self.transform = movement.transform;
        self.weapon = movement.weapon;
    }

    /// Subtract PvP damage; returns true if this hit killed the peer
    pub fn take_hit(&mut self, damage: f32) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.health -= damage;
        if self.health <= 0.0 {
            self.deaths += 1;
            true
        } else {
            false
        }
    }

    pub fn respawn<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.health = self.max_health;
        self.transform = scatter_transform(rng);
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            id: self.id,
            transform: self.transform,
            weapon: self.weapon,
            health: self.health,
            max_health: self.max_health,
            kills: self.kills,
            deaths: self.deaths,
            color: self.color,
        }
    }
}

fn scatter_transform<R: Rng + ?Sized>(rng: &mut R) -> Transform {
    Transform {
        x: rng.gen_range(-RESPAWN_SCATTER..=RESPAWN_SCATTER),
        y: SPAWN_Y,
        z: rng.gen_range(-RESPAWN_SCATTER..=RESPAWN_SCATTER),
        ry: 0.0,
    }
}
