//! Per-enemy patrol / chase / attack state machine
//!
//! One call to [`step`] is one simulation tick for one enemy. States are
//! re-evaluated every tick with attack taking priority over chase over patrol.

use std::f32::consts::TAU;

use rand::Rng;

use super::constants::{npc, spawn};
use super::enemy::{Enemy, EnemyState};
use super::ports::Target;
use crate::util::vec2::Vec2;

/// A player the enemy can see
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetView {
    pub target: Target,
    pub position: Vec2,
}

/// Advance one enemy by `dt`; returns the target hit when an attack lands
pub fn step<R: Rng + ?Sized>(
    enemy: &mut Enemy,
    targets: &[TargetView],
    dt: f32,
    rng: &mut R,
) -> Option<Target> {
    if !enemy.alive {
        return None;
    }
    enemy.aggro_timer = (enemy.aggro_timer - dt).max(0.0);
    enemy.attack_cooldown = (enemy.attack_cooldown - dt).max(0.0);

    let nearest = targets
        .iter()
        .map(|t| (t, enemy.position.distance_to(t.position)))
        .min_by(|a, b| a.1.total_cmp(&b.1));

    enemy.state = match nearest {
        Some((_, d)) if d < npc::ATTACK_RANGE => EnemyState::Attack,
        Some((_, d)) if d < npc::DETECT_RANGE || enemy.aggro_timer > 0.0 => EnemyState::Chase,
        _ => EnemyState::Patrol,
    };

    match (enemy.state, nearest) {
        (EnemyState::Attack, Some((view, _))) => {
            face(enemy, view.position);
            if enemy.attack_cooldown <= 0.0 {
                enemy.attack_cooldown = enemy.kind.attack_cooldown();
                return Some(view.target);
            }
        }
        (EnemyState::Chase, Some((view, _))) => {
            enemy.waypoint = None;
            move_toward(enemy, view.position, enemy.speed, dt);
        }
        _ => patrol(enemy, dt, rng),
    }
    None
}

fn patrol<R: Rng + ?Sized>(enemy: &mut Enemy, dt: f32, rng: &mut R) {
    enemy.repick_timer -= dt;
    if enemy.waypoint.is_none() || enemy.repick_timer <= 0.0 {
        let angle = rng.gen_range(0.0..TAU);
        let radius = rng.gen_range(0.0..npc::PATROL_RADIUS);
        enemy.waypoint = Some(enemy.home + Vec2::from_angle(angle) * radius);
        enemy.repick_timer = rng.gen_range(npc::PATROL_REPICK_MIN_SECS..npc::PATROL_REPICK_MAX_SECS);
    }
    if let Some(waypoint) = enemy.waypoint {
        if enemy.position.distance_to(waypoint) > npc::WAYPOINT_EPSILON {
            move_toward(enemy, waypoint, enemy.speed * npc::PATROL_SPEED_FACTOR, dt);
        }
    }
}

fn face(enemy: &mut Enemy, target: Vec2) {
    if let Some(yaw) = enemy.position.yaw_towards(target) {
        enemy.yaw = yaw;
    }
}

/// Straight-line step that never overshoots, then keeps out of the safe zone
fn move_toward(enemy: &mut Enemy, target: Vec2, speed: f32, dt: f32) {
    let offset = target - enemy.position;
    let distance = offset.length();
    if distance < 1.0 {
        return;
    }
    face(enemy, target);
    let stride = (speed * dt).min(distance);
    let next = enemy.position + offset.normalize() * stride;
    enemy.position = keep_out_of_safe_zone(next).clamp_square(spawn::WORLD_HALF_EXTENT);
}

fn keep_out_of_safe_zone(position: Vec2) -> Vec2 {
    let d = position.length();
    if d >= spawn::SAFE_ZONE_RADIUS {
        return position;
    }
    let dir = if d > 0.0 {
        position.normalize()
    } else {
        Vec2::new(0.0, 1.0)
    };
    dir * spawn::SAFE_ZONE_RADIUS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::enemy::EnemyKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn enemy_at(kind: EnemyKind, x: f32, z: f32) -> Enemy {
        let mut enemy = Enemy::spawn(0, kind, Vec2::new(x, z), 1, 0);
        enemy.position = Vec2::new(x, z);
        enemy
    }

    fn local_at(x: f32, z: f32) -> TargetView {
        TargetView {
            target: Target::Local,
            position: Vec2::new(x, z),
        }
    }

    #[test]
    fn test_no_targets_patrols_near_home() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut enemy = enemy_at(EnemyKind::Normal, 30.0, 30.0);
        for _ in 0..600 {
            step(&mut enemy, &[], 1.0 / 60.0, &mut rng);
            assert_eq!(enemy.state, EnemyState::Patrol);
        }
        assert!(enemy.position.distance_to(enemy.home) <= npc::PATROL_RADIUS + 0.01);
    }

    #[test]
    fn test_detect_range_triggers_chase() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut enemy = enemy_at(EnemyKind::Normal, 30.0, 30.0);
        let before = enemy.position.distance_to(Vec2::new(30.0, 10.0));

        step(&mut enemy, &[local_at(30.0, 10.0)], 0.1, &mut rng);
        assert_eq!(enemy.state, EnemyState::Chase);
        assert!(enemy.position.distance_to(Vec2::new(30.0, 10.0)) < before);
    }

    #[test]
    fn test_aggro_forces_chase_out_of_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut enemy = enemy_at(EnemyKind::Normal, 30.0, 30.0);
        enemy.aggro_timer = 5.0;

        step(&mut enemy, &[local_at(-60.0, -60.0)], 0.1, &mut rng);
        assert_eq!(enemy.state, EnemyState::Chase);

        enemy.aggro_timer = 0.05;
        step(&mut enemy, &[local_at(-60.0, -60.0)], 0.1, &mut rng);
        assert_eq!(enemy.state, EnemyState::Patrol);
    }

    #[test]
    fn test_attack_respects_cooldown() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut enemy = enemy_at(EnemyKind::Normal, 30.0, 30.0);
        let targets = [local_at(31.0, 30.0)];

        assert_eq!(step(&mut enemy, &targets, 0.1, &mut rng), Some(Target::Local));
        assert_eq!(enemy.state, EnemyState::Attack);

        let mut hits = 0;
        // 1.4s more: still cooling
        for _ in 0..14 {
            if step(&mut enemy, &targets, 0.1, &mut rng).is_some() {
                hits += 1;
            }
        }
        assert_eq!(hits, 0);
        assert!(step(&mut enemy, &targets, 0.11, &mut rng).is_some());
    }

    #[test]
    fn test_boss_attacks_faster() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut enemy = enemy_at(EnemyKind::Boss, 0.0, -60.0);
        let targets = [local_at(0.0, -58.5)];
        let mut hits = 0;
        for _ in 0..30 {
            if step(&mut enemy, &targets, 0.1, &mut rng).is_some() {
                hits += 1;
            }
        }
        // t = 0.1, 0.9, 1.7, 2.5 (with float slack)
        assert!((3..=4).contains(&hits));
    }

    #[test]
    fn test_nearest_target_wins() {
        let mut rng = StdRng::seed_from_u64(1);
        let remote = uuid::Uuid::new_v4();
        let mut enemy = enemy_at(EnemyKind::Normal, 30.0, 30.0);
        let targets = [
            local_at(30.0, 20.0),
            TargetView {
                target: Target::Remote(remote),
                position: Vec2::new(31.0, 31.0),
            },
        ];
        assert_eq!(step(&mut enemy, &targets, 0.1, &mut rng), Some(Target::Remote(remote)));
    }

    #[test]
    fn test_chase_never_enters_safe_zone() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut enemy = enemy_at(EnemyKind::Fast, 20.0, 0.0);
        let targets = [local_at(0.0, 0.0)];
        for _ in 0..300 {
            step(&mut enemy, &targets, 1.0 / 60.0, &mut rng);
            assert!(enemy.position.length() >= spawn::SAFE_ZONE_RADIUS - 1e-3);
        }
    }

    #[test]
    fn test_dead_enemy_is_inert() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut enemy = enemy_at(EnemyKind::Normal, 30.0, 30.0);
        enemy.alive = false;
        assert!(step(&mut enemy, &[local_at(30.0, 31.0)], 0.1, &mut rng).is_none());
        assert_eq!(enemy.position, Vec2::new(30.0, 30.0));
    }
}
