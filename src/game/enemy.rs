//! Enemy catalogue and the pure simulation record
//!
//! An [`Enemy`] carries no render handles; the render collaborator keys its
//! own objects by [`EnemyId`].

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::constants::{boss, npc, scaling, spawn};
use crate::util::vec2::Vec2;

/// Registry slot index, stable across respawns
pub type EnemyId = u32;

/// Rarity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyTier {
    Normal,
    Rare,
    Unique,
    Boss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    Normal,
    Fast,
    Tank,
    Shield,
    Stalker,
    Brute,
    Reaper,
    Colossus,
    Boss,
}

/// Level-1 stats for a kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseStats {
    pub health: f64,
    pub speed: f32,
    pub damage: f32,
    pub coins: u32,
    pub xp: u32,
}

impl EnemyKind {
    pub const ALL: [EnemyKind; 9] = [
        EnemyKind::Normal,
        EnemyKind::Fast,
        EnemyKind::Tank,
        EnemyKind::Shield,
        EnemyKind::Stalker,
        EnemyKind::Brute,
        EnemyKind::Reaper,
        EnemyKind::Colossus,
        EnemyKind::Boss,
    ];

    pub fn tier(self) -> EnemyTier {
        match self {
            EnemyKind::Normal | EnemyKind::Fast | EnemyKind::Tank | EnemyKind::Shield => {
                EnemyTier::Normal
            }
            EnemyKind::Stalker | EnemyKind::Brute => EnemyTier::Rare,
            EnemyKind::Reaper | EnemyKind::Colossus => EnemyTier::Unique,
            EnemyKind::Boss => EnemyTier::Boss,
        }
    }

    pub fn base(self) -> BaseStats {
        let (health, speed, damage, coins, xp) = match self {
            EnemyKind::Normal => (50.0, 7.0, 10.0, 10, 1),
            EnemyKind::Fast => (70.0, 9.0, 20.0, 20, 2),
            EnemyKind::Tank => (150.0, 8.0, 20.0, 25, 2),
            EnemyKind::Shield => (220.0, 6.5, 20.0, 30, 3),
            EnemyKind::Stalker => (300.0, 10.0, 30.0, 60, 5),
            EnemyKind::Brute => (450.0, 7.5, 35.0, 70, 6),
            EnemyKind::Reaper => (700.0, 11.0, 45.0, 120, 10),
            EnemyKind::Colossus => (1000.0, 6.0, 60.0, 150, 12),
            EnemyKind::Boss => (3000.0, 9.5, 80.0, 300, 15),
        };
        BaseStats {
            health,
            speed,
            damage,
            coins,
            xp,
        }
    }

    pub fn is_boss(self) -> bool {
        self == EnemyKind::Boss
    }

    pub fn attack_cooldown(self) -> f32 {
        if self.is_boss() {
            npc::BOSS_ATTACK_COOLDOWN_SECS
        } else {
            npc::ATTACK_COOLDOWN_SECS
        }
    }

    /// Weighted random non-boss kind; rarer tiers unlock as the room kill total grows
    pub fn roll<R: Rng + ?Sized>(kill_count: u32, rng: &mut R) -> EnemyKind {
        let table: &[(EnemyKind, u32)] = if kill_count >= spawn::UNIQUE_UNLOCK_KILLS {
            &[
                (EnemyKind::Normal, 30),
                (EnemyKind::Fast, 18),
                (EnemyKind::Tank, 14),
                (EnemyKind::Shield, 12),
                (EnemyKind::Stalker, 9),
                (EnemyKind::Brute, 8),
                (EnemyKind::Reaper, 5),
                (EnemyKind::Colossus, 4),
            ]
        } else if kill_count >= spawn::RARE_UNLOCK_KILLS {
            &[
                (EnemyKind::Normal, 40),
                (EnemyKind::Fast, 20),
                (EnemyKind::Tank, 15),
                (EnemyKind::Shield, 12),
                (EnemyKind::Stalker, 7),
                (EnemyKind::Brute, 6),
            ]
        } else {
            &[
                (EnemyKind::Normal, 55),
                (EnemyKind::Fast, 20),
                (EnemyKind::Tank, 15),
                (EnemyKind::Shield, 10),
            ]
        };

        let total: u32 = table.iter().map(|(_, w)| w).sum();
        let mut pick = rng.gen_range(0..total);
        for &(kind, weight) in table {
            if pick < weight {
                return kind;
            }
            pick -= weight;
        }
        EnemyKind::Normal
    }
}

#[inline]
fn level_factor(per_level: f64, level: u32) -> f64 {
    1.0 + per_level * (level.max(1) - 1) as f64
}

/// Max health at `level`; the boss uses its own exponential curve instead
pub fn max_health_for(kind: EnemyKind, level: u32, boss_kill_count: u32) -> f32 {
    let base = kind.base().health;
    let raw = if kind.is_boss() {
        base * boss::HEALTH_GROWTH.powi(boss_kill_count as i32)
    } else {
        base * level_factor(scaling::HEALTH_PER_LEVEL, level)
    };
    (raw + scaling::FLOOR_EPSILON).floor() as f32
}

pub fn damage_for(kind: EnemyKind, level: u32) -> f32 {
    (kind.base().damage as f64 * level_factor(scaling::DAMAGE_PER_LEVEL, level)) as f32
}

pub fn speed_for(kind: EnemyKind, level: u32) -> f32 {
    (kind.base().speed as f64 * level_factor(scaling::SPEED_PER_LEVEL, level)) as f32
}

/// Level an enemy of `kind` spawns at in a room at `zombie_level`
pub fn level_for(kind: EnemyKind, zombie_level: u32) -> u32 {
    if kind.is_boss() {
        zombie_level + boss::LEVEL_OFFSET
    } else {
        zombie_level
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyState {
    Patrol,
    Chase,
    Attack,
}

/// Host-side simulation record
#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: EnemyId,
    pub kind: EnemyKind,
    pub level: u32,
    pub position: Vec2,
    pub yaw: f32,
    /// Spawn point; patrol wanders around it and respawns return to it
    pub home: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub damage: f32,
    pub speed: f32,
    pub state: EnemyState,
    pub aggro_timer: f32,
    pub attack_cooldown: f32,
    pub waypoint: Option<Vec2>,
    pub repick_timer: f32,
    pub alive: bool,
}

impl Enemy {
    pub fn spawn(
        id: EnemyId,
        kind: EnemyKind,
        home: Vec2,
        zombie_level: u32,
        boss_kill_count: u32,
    ) -> Self {
        let level = level_for(kind, zombie_level);
        let max_health = max_health_for(kind, level, boss_kill_count);
        Self {
            id,
            kind,
            level,
            position: home,
            yaw: 0.0,
            home,
            health: max_health,
            max_health,
            damage: damage_for(kind, level),
            speed: speed_for(kind, level),
            state: EnemyState::Patrol,
            aggro_timer: 0.0,
            attack_cooldown: 0.0,
            waypoint: None,
            repick_timer: 0.0,
            alive: true,
        }
    }

    /// Recompute stats for a new level and refill health
    pub fn relevel(&mut self, level: u32) {
        self.level = level;
        self.max_health = max_health_for(self.kind, level, 0);
        self.health = self.max_health;
        self.damage = damage_for(self.kind, level);
        self.speed = speed_for(self.kind, level);
    }

    /// Bring a dead slot back as `kind` at its spawn point
    pub fn respawn_as(&mut self, kind: EnemyKind, zombie_level: u32, boss_kill_count: u32) {
        *self = Enemy::spawn(self.id, kind, self.home, zombie_level, boss_kill_count);
    }
}

/// Spawn point for a registry slot; the initial horde fills the fixed points in order
pub fn home_for(id: EnemyId, kind: EnemyKind) -> Vec2 {
    if kind.is_boss() {
        return Vec2::new(boss::SPAWN_X, boss::SPAWN_Z);
    }
    let (x, z) = spawn::POINTS[id as usize % spawn::POINTS.len()];
    Vec2::new(x, z)
}
