use hashbrown::HashMap;

use super::constants::spawn::MAX_ENEMIES;
use super::enemy::{home_for, Enemy, EnemyId, EnemyKind};
use crate::net::protocol::EnemyProjection;
use crate::util::vec2::Vec2;

/// Host-owned enemy arena, indexed by [`EnemyId`] in insertion order
///
/// Slots are never removed while the host holds the role: a dead enemy keeps
/// its slot until it respawns, so ids stay stable for guests and the render
/// adapter.
#[derive(Debug, Default)]
pub struct EnemyRegistry {
    slots: Vec<Enemy>,
}

impl EnemyRegistry {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn get(&self, id: EnemyId) -> Option<&Enemy> {
        self.slots.get(id as usize)
    }

    pub fn get_mut(&mut self, id: EnemyId) -> Option<&mut Enemy> {
        self.slots.get_mut(id as usize)
    }

    /// Append a new enemy at the next id
    pub fn spawn(
        &mut self,
        kind: EnemyKind,
        zombie_level: u32,
        boss_kill_count: u32,
    ) -> EnemyId {
        let id = self.slots.len() as EnemyId;
        let home = home_for(id, kind);
        self.slots
            .push(Enemy::spawn(id, kind, home, zombie_level, boss_kill_count));
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = &Enemy> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Enemy> {
        self.slots.iter_mut()
    }

    pub fn alive(&self) -> impl Iterator<Item = &Enemy> {
        self.slots.iter().filter(|e| e.alive)
    }

    pub fn alive_count(&self) -> usize {
        self.alive().count()
    }

    pub fn living_boss(&self) -> Option<&Enemy> {
        self.alive().find(|e| e.kind.is_boss())
    }

    pub fn living_boss_count(&self) -> usize {
        self.alive().filter(|e| e.kind.is_boss()).count()
    }

    /// Dead boss slot that can be reused for the next boss
    pub fn dead_boss_slot(&self) -> Option<EnemyId> {
        self.slots
            .iter()
            .find(|e| !e.alive && e.kind.is_boss())
            .map(|e| e.id)
    }

    /// Compact projection broadcast to guests
    pub fn snapshot(&self) -> Vec<EnemyProjection> {
        self.slots.iter().map(EnemyProjection::from_enemy).collect()
    }

    /// Rebuild the arena from a mirrored snapshot (promotion)
    ///
    /// Ids, positions and health are kept; any gap in the id sequence is
    /// filled with a dead placeholder so indices stay aligned. Ids at or
    /// above [`MAX_ENEMIES`] are dropped.
    pub fn adopt(&mut self, snapshot: &[EnemyProjection], boss_kill_count: u32) {
        self.slots.clear();
        let by_id: HashMap<EnemyId, &EnemyProjection> = snapshot
            .iter()
            .filter(|p| (p.id as usize) < MAX_ENEMIES)
            .map(|p| (p.id, p))
            .collect();
        let skipped = snapshot.len() - by_id.len();
        if skipped > 0 {
            tracing::warn!("Dropped {} out-of-range or duplicate enemies from snapshot", skipped);
        }
        let Some(max_id) = by_id.keys().copied().max() else {
            return;
        };
        self.slots.reserve(max_id as usize + 1);
        for id in 0..=max_id {
            let enemy = match by_id.get(&id) {
                Some(p) => {
                    let mut enemy = Enemy::spawn(id, p.kind, home_for(id, p.kind), 1, boss_kill_count);
                    enemy.relevel_to_projection(p);
                    enemy
                }
                None => {
                    let mut placeholder =
                        Enemy::spawn(id, EnemyKind::Normal, home_for(id, EnemyKind::Normal), 1, 0);
                    placeholder.alive = false;
                    placeholder.health = 0.0;
                    placeholder
                }
            };
            self.slots.push(enemy);
        }
    }
}

impl Enemy {
    fn relevel_to_projection(&mut self, p: &EnemyProjection) {
        if !self.kind.is_boss() {
            self.relevel(p.level);
        } else {
            self.level = p.level;
            self.damage = super::enemy::damage_for(self.kind, p.level);
            self.speed = super::enemy::speed_for(self.kind, p.level);
        }
        self.max_health = p.max_health;
        self.health = if p.alive { p.health.max(0.0) } else { 0.0 };
        self.alive = p.alive;
        self.position = Vec2::new(p.x, p.z);
        self.yaw = p.yaw;
        self.state = p.state;
    }
}
