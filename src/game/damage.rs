//! Damage routing
//!
//! [`apply_damage`] is the only code path that lowers enemy health. It is
//! reachable only through the host's [`HordeDirector`](super::director::HordeDirector);
//! guests turn their hits into `npc:damageRequest` messages instead.

use super::constants::aggro;
use super::enemy::{EnemyId, EnemyKind};
use super::registry::EnemyRegistry;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    pub enemy_id: EnemyId,
    pub kind: EnemyKind,
    /// Health after the hit, before clamping; may be negative on the fatal hit
    pub new_health: f32,
    pub died: bool,
}

/// Apply `amount` to a living enemy and alert its pack
///
/// Returns `None` for a dead or unknown id and for non-positive amounts;
/// stale requests are expected under latency and are not errors.
pub fn apply_damage(
    registry: &mut EnemyRegistry,
    enemy_id: EnemyId,
    amount: f32,
) -> Option<DamageOutcome> {
    if amount.is_nan() || amount <= 0.0 {
        return None;
    }
    let enemy = registry.get_mut(enemy_id).filter(|e| e.alive)?;

    let new_health = enemy.health - amount;
    let died = new_health <= 0.0;
    if died {
        enemy.health = 0.0;
        enemy.alive = false;
        enemy.aggro_timer = 0.0;
    } else {
        enemy.health = new_health;
        enemy.aggro_timer = aggro::SELF_SECS;
    }
    let outcome = DamageOutcome {
        enemy_id,
        kind: enemy.kind,
        new_health,
        died,
    };
    let origin = enemy.position;

    alert_pack(registry, enemy_id, origin);
    Some(outcome)
}

/// Linear scan; every other living, un-aggroed enemy in range starts chasing
fn alert_pack(registry: &mut EnemyRegistry, source: EnemyId, origin: Vec2) {
    let radius_sq = aggro::ALLY_RADIUS * aggro::ALLY_RADIUS;
    for ally in registry.iter_mut() {
        if ally.id == source || !ally.alive || ally.aggro_timer > 0.0 {
            continue;
        }
        if ally.position.distance_sq_to(origin) <= radius_sq {
            ally.aggro_timer = aggro::ALLY_SECS;
        }
    }
}
