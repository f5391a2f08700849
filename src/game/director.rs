//! Horde director: the host-only NPC combat state machine
//!
//! Owns the enemy registry, the host's view of the room counters and every
//! host-only timer (respawns, boss countdown, airdrops, snapshots). Nothing
//! outside this type mutates enemy health. Stopping the director on demotion
//! drops all of it at once.

use rand::rngs::StdRng;
use rand::Rng;

use super::ai::{self, TargetView};
use super::constants::{airdrop, boss, net, npc, spawn};
use super::damage::{self, DamageOutcome};
use super::enemy::{level_for, max_health_for, Enemy, EnemyId, EnemyKind};
use super::ports::{NpcAttack, PlayerDamageSink};
use super::registry::EnemyRegistry;
use super::scheduler::{Scheduler, TaskToken};
use crate::net::protocol::{Airdrop, BossInfo, EnemyProjection, RoomState};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTask {
    Respawn(EnemyId),
    SpawnBoss,
    Airdrop,
    Snapshot,
}

/// Something the session must publish or present
#[derive(Debug, Clone, PartialEq)]
pub enum DirectorEvent {
    Killed { enemy_id: EnemyId, kind: EnemyKind },
    BossWarning,
    BossSpawned(BossInfo),
    Respawned(EnemyId),
    Airdrop(Airdrop),
    Snapshot(Vec<EnemyProjection>),
}

pub struct HordeDirector {
    registry: EnemyRegistry,
    room: RoomState,
    tasks: Scheduler<HostTask>,
    boss_countdown: Option<TaskToken>,
    attacks: Box<dyn PlayerDamageSink>,
    events: Vec<DirectorEvent>,
    rng: StdRng,
    active: bool,
    next_airdrop: u32,
}

impl HordeDirector {
    pub fn new(attacks: Box<dyn PlayerDamageSink>, rng: StdRng) -> Self {
        Self {
            registry: EnemyRegistry::new(),
            room: RoomState::default(),
            tasks: Scheduler::new(),
            boss_countdown: None,
            attacks,
            events: Vec::new(),
            rng,
            active: false,
            next_airdrop: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn registry(&self) -> &EnemyRegistry {
        &self.registry
    }

    pub fn room(&self) -> &RoomState {
        &self.room
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn boss_pending(&self) -> bool {
        self.boss_countdown.is_some()
    }

    /// Begin simulating, seeded from `room`
    ///
    /// `mirror` is the last snapshot this peer rendered; when present its
    /// enemies are adopted as-is. Calling this while already active only
    /// merges the room, so a solo peer promoted to host keeps its horde.
    pub fn start(&mut self, room: &RoomState, mirror: &[EnemyProjection]) {
        if self.active {
            self.merge_room(room);
            return;
        }
        self.room = *room;
        self.tasks = Scheduler::new();
        self.boss_countdown = None;

        if mirror.is_empty() {
            self.spawn_initial_horde();
        } else {
            self.registry.adopt(mirror, self.room.boss_kill_count);
            let dead: Vec<EnemyId> = self
                .registry
                .iter()
                .filter(|e| !e.alive && !e.kind.is_boss())
                .map(|e| e.id)
                .collect();
            for id in dead {
                self.tasks.schedule_in(npc::RESPAWN_SECS, HostTask::Respawn(id));
            }
        }

        if self.room.boss_alive && self.registry.living_boss().is_none() {
            self.restore_boss();
        }
        self.sync_boss_flag();

        self.tasks.schedule_in(airdrop::INTERVAL_SECS, HostTask::Airdrop);
        self.tasks.schedule_in(snapshot_interval(), HostTask::Snapshot);
        self.active = true;
        tracing::info!(
            "Director started: {} enemies, kill count {}, zombie level {}",
            self.registry.alive_count(),
            self.room.kill_count,
            self.room.zombie_level
        );
    }

    /// Stop simulating; cancels every host-only timer and drops the horde
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        let cancelled = self.tasks.cancel_where(|_| true);
        self.boss_countdown = None;
        self.registry.clear();
        self.events.clear();
        self.active = false;
        tracing::info!("Director stopped, {} host tasks cancelled", cancelled);
    }

    /// Take-max merge of an incoming room record
    ///
    /// A higher zombie level re-levels the survivors exactly as a local
    /// boss kill would.
    pub fn merge_room(&mut self, incoming: &RoomState) {
        let level_before = self.room.zombie_level;
        self.room.merge_max(incoming);
        if self.active {
            if self.room.zombie_level > level_before {
                self.relevel_survivors();
            }
            self.sync_boss_flag();
        }
    }

    /// The only legitimate path to lower enemy health
    pub fn apply_damage(&mut self, enemy_id: EnemyId, amount: f32) -> Option<DamageOutcome> {
        if !self.active {
            return None;
        }
        let outcome = damage::apply_damage(&mut self.registry, enemy_id, amount)?;
        if outcome.kind.is_boss() {
            self.room.observe_boss_health(outcome.new_health);
        }
        if outcome.died {
            self.on_kill(outcome.enemy_id, outcome.kind);
        }
        Some(outcome)
    }

    /// Spawn one enemy outside the normal flow
    ///
    /// A boss goes through the same path as a countdown spawn and is refused
    /// while one is already alive.
    pub fn spawn_enemy(&mut self, kind: EnemyKind) -> Option<EnemyId> {
        if kind.is_boss() {
            let id = self.spawn_boss(None);
            self.sync_boss_flag();
            return id;
        }
        let id = self
            .registry
            .spawn(kind, self.room.zombie_level, self.room.boss_kill_count);
        Some(id)
    }

    /// One simulation tick
    pub fn tick(&mut self, dt: f32, targets: &[TargetView]) {
        if !self.active {
            return;
        }
        for (_, task) in self.tasks.advance(dt) {
            self.run_task(task);
        }
        for enemy in self.registry.iter_mut() {
            if let Some(target) = ai::step(enemy, targets, dt, &mut self.rng) {
                self.attacks.on_attack(NpcAttack {
                    target,
                    enemy_id: enemy.id,
                    damage: enemy.damage,
                });
            }
        }
    }

    pub fn drain_events(&mut self) -> Vec<DirectorEvent> {
        std::mem::take(&mut self.events)
    }

    fn run_task(&mut self, task: HostTask) {
        match task {
            HostTask::Respawn(id) => {
                let kind = EnemyKind::roll(self.room.kill_count, &mut self.rng);
                let (level, bkc) = (self.room.zombie_level, self.room.boss_kill_count);
                if let Some(enemy) = self.registry.get_mut(id).filter(|e| !e.alive) {
                    enemy.respawn_as(kind, level, bkc);
                    tracing::debug!("Enemy {} respawned as {:?}", id, kind);
                    self.events.push(DirectorEvent::Respawned(id));
                }
            }
            HostTask::SpawnBoss => {
                self.boss_countdown = None;
                self.spawn_boss(None);
            }
            HostTask::Airdrop => {
                let id = self.next_airdrop;
                self.next_airdrop += 1;
                let drop = Airdrop {
                    id,
                    x: self.rng.gen_range(-airdrop::SCATTER..=airdrop::SCATTER),
                    z: self.rng.gen_range(-airdrop::SCATTER..=airdrop::SCATTER),
                };
                self.events.push(DirectorEvent::Airdrop(drop));
                self.tasks.schedule_in(airdrop::INTERVAL_SECS, HostTask::Airdrop);
            }
            HostTask::Snapshot => {
                self.events.push(DirectorEvent::Snapshot(self.registry.snapshot()));
                self.tasks.schedule_in(snapshot_interval(), HostTask::Snapshot);
            }
        }
    }

    fn on_kill(&mut self, enemy_id: EnemyId, kind: EnemyKind) {
        let is_boss = kind.is_boss();
        self.room.record_kill(is_boss);
        self.events.push(DirectorEvent::Killed { enemy_id, kind });

        if is_boss {
            tracing::info!("Boss down, zombie level now {}", self.room.zombie_level);
            self.relevel_survivors();
        } else {
            self.tasks
                .schedule_in(npc::RESPAWN_SECS, HostTask::Respawn(enemy_id));
        }

        if self.room.kill_count % boss::KILL_INTERVAL == 0
            && self.registry.living_boss().is_none()
            && self.boss_countdown.is_none()
        {
            tracing::info!("Boss incoming at kill {}", self.room.kill_count);
            self.boss_countdown = Some(self.tasks.schedule_in(boss::WARNING_SECS, HostTask::SpawnBoss));
            self.events.push(DirectorEvent::BossWarning);
        }
        self.sync_boss_flag();
    }

    fn relevel_survivors(&mut self) {
        let level = self.room.zombie_level;
        for enemy in self.registry.iter_mut() {
            if enemy.alive && !enemy.kind.is_boss() {
                enemy.relevel(level);
            }
        }
    }

    fn spawn_initial_horde(&mut self) {
        self.registry.clear();
        for _ in 0..spawn::POINTS.len() {
            let kind = EnemyKind::roll(self.room.kill_count, &mut self.rng);
            self.registry
                .spawn(kind, self.room.zombie_level, self.room.boss_kill_count);
        }
    }

    /// Boss reported alive by the room but absent from the adopted snapshot
    fn restore_boss(&mut self) {
        let health = (self.room.boss_health > 0).then_some(self.room.boss_health as f32);
        if self.spawn_boss(health).is_none() {
            tracing::warn!("Room reports a boss but none could be restored");
        }
    }

    fn spawn_boss(&mut self, health: Option<f32>) -> Option<EnemyId> {
        if self.registry.living_boss().is_some() {
            return None;
        }
        let level = level_for(EnemyKind::Boss, self.room.zombie_level);
        let max_health = if health.is_some() && self.room.boss_max_health > 0 {
            self.room.boss_max_health as f32
        } else {
            max_health_for(EnemyKind::Boss, level, self.room.boss_kill_count)
        };

        let id = match self.registry.dead_boss_slot() {
            Some(id) => id,
            None => self.registry.spawn(EnemyKind::Boss, self.room.zombie_level, self.room.boss_kill_count),
        };
        let enemy = self.registry.get_mut(id)?;
        *enemy = Enemy::spawn(
            id,
            EnemyKind::Boss,
            Vec2::new(boss::SPAWN_X, boss::SPAWN_Z),
            self.room.zombie_level,
            self.room.boss_kill_count,
        );
        enemy.max_health = max_health;
        enemy.health = health.unwrap_or(max_health).min(max_health);

        let info = BossInfo {
            enemy_id: id,
            level: enemy.level,
            health: enemy.health,
            max_health: enemy.max_health,
        };
        self.room.boss_spawned(info.health, info.max_health);
        tracing::info!("Boss spawned: level {}, health {}", info.level, info.health);
        self.events.push(DirectorEvent::BossSpawned(info));
        Some(id)
    }

    /// `boss_alive` mirrors the registry
    fn sync_boss_flag(&mut self) {
        let living = self.registry.living_boss().map(|b| b.health);
        match living {
            Some(health) => {
                self.room.boss_alive = true;
                self.room.boss_health = health.max(0.0) as u32;
            }
            None => self.room.boss_died(),
        }
    }
}

fn snapshot_interval() -> f32 {
    1.0 / net::SNAPSHOT_RATE_HZ as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ports::Target;
    use rand::SeedableRng;
    use tokio::sync::mpsc;

    fn director() -> (HordeDirector, mpsc::UnboundedReceiver<NpcAttack>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (HordeDirector::new(Box::new(tx), StdRng::seed_from_u64(11)), rx)
    }

    fn started() -> HordeDirector {
        let (mut d, _rx) = director();
        d.start(&RoomState::default(), &[]);
        d
    }

    fn kill(d: &mut HordeDirector, id: EnemyId) -> DamageOutcome {
        d.apply_damage(id, 1_000_000.0).unwrap()
    }

    #[test]
    fn test_start_spawns_initial_horde() {
        let d = started();
        assert!(d.is_active());
        assert_eq!(d.registry().len(), 8);
        assert_eq!(d.registry().alive_count(), 8);
        assert!(d.registry().iter().all(|e| !e.kind.is_boss()));
        assert!(!d.room().boss_alive);
    }

    #[test]
    fn test_inactive_director_never_damages() {
        let (mut d, _rx) = director();
        assert!(d.apply_damage(0, 10.0).is_none());
    }

    #[test]
    fn test_kill_schedules_respawn() {
        let mut d = started();
        let outcome = kill(&mut d, 3);
        assert!(outcome.died);
        assert_eq!(d.room().kill_count, 1);
        assert!(!d.registry().get(3).unwrap().alive);

        for _ in 0..(9 * 60) {
            d.tick(1.0 / 60.0, &[]);
        }
        assert!(!d.registry().get(3).unwrap().alive);
        for _ in 0..61 {
            d.tick(1.0 / 60.0, &[]);
        }
        assert!(d.registry().get(3).unwrap().alive);
        assert!(d
            .drain_events()
            .iter()
            .any(|e| *e == DirectorEvent::Respawned(3)));
    }

    #[test]
    fn test_boss_triggers_on_25th_kill() {
        let mut d = started();
        for n in 0..25 {
            let id = d.spawn_enemy(EnemyKind::Normal).unwrap();
            kill(&mut d, id);
            assert_eq!(d.boss_pending(), n == 24);
        }
        assert!(d.drain_events().contains(&DirectorEvent::BossWarning));

        for _ in 0..(3 * 60 + 1) {
            d.tick(1.0 / 60.0, &[]);
        }
        assert!(d.registry().living_boss().is_some());
        assert!(d.room().boss_alive);
        assert_eq!(d.registry().living_boss().unwrap().max_health, 3000.0);
        assert!(d
            .drain_events()
            .iter()
            .any(|e| matches!(e, DirectorEvent::BossSpawned(info) if info.max_health == 3000.0)));
    }

    #[test]
    fn test_boss_death_levels_survivors() {
        let mut d = started();
        let survivor = d.spawn_enemy(EnemyKind::Normal).unwrap();
        let boss = d.spawn_enemy(EnemyKind::Boss).unwrap();
        assert!(d.room().boss_alive);

        kill(&mut d, boss);
        assert_eq!(d.room().zombie_level, 2);
        assert_eq!(d.room().boss_kill_count, 1);
        assert_eq!(d.room().wave, 2);
        assert!(!d.room().boss_alive);

        let enemy = d.registry().get(survivor).unwrap();
        assert_eq!(enemy.level, 2);
        assert_eq!(enemy.max_health, 55.0);
        assert_eq!(enemy.health, 55.0);
    }

    #[test]
    fn test_dead_boss_never_respawns() {
        let mut d = started();
        let boss = d.spawn_enemy(EnemyKind::Boss).unwrap();
        kill(&mut d, boss);
        for _ in 0..(30 * 60) {
            d.tick(1.0 / 60.0, &[]);
        }
        assert!(!d.registry().get(boss).unwrap().alive);
    }

    #[test]
    fn test_boss_flag_tracks_registry() {
        let mut d = started();
        for step in 0..60 {
            if step % 7 == 0 {
                d.spawn_enemy(EnemyKind::Boss);
            }
            if let Some(boss) = d.registry().living_boss().map(|b| b.id) {
                d.apply_damage(boss, 900.0);
            }
            d.tick(0.1, &[]);
            let count = d.registry().living_boss_count();
            assert!(count <= 1);
            assert_eq!(d.room().boss_alive, count == 1);
        }
    }

    #[test]
    fn test_second_boss_refused_while_one_lives() {
        let mut d = started();
        let first = d.spawn_enemy(EnemyKind::Boss).unwrap();
        assert_eq!(d.spawn_enemy(EnemyKind::Boss), None);
        assert_eq!(d.registry().living_boss_count(), 1);
        assert!(d.room().boss_alive);

        kill(&mut d, first);
        // The dead boss slot is reused for the next one
        assert_eq!(d.spawn_enemy(EnemyKind::Boss), Some(first));
        assert_eq!(d.registry().living_boss_count(), 1);
    }

    #[test]
    fn test_stop_cancels_host_tasks() {
        let mut d = started();
        kill(&mut d, 0);
        assert!(d.pending_tasks() >= 3);
        d.stop();
        assert!(!d.is_active());
        assert_eq!(d.pending_tasks(), 0);
        assert!(d.registry().is_empty());
    }

    #[test]
    fn test_adopt_mirror_keeps_ids_and_health() {
        let mut host = started();
        host.apply_damage(2, 20.0);
        kill(&mut host, 5);
        let snapshot = host.registry().snapshot();

        let (mut heir, _rx) = director();
        heir.start(host.room(), &snapshot);
        assert_eq!(heir.registry().len(), 8);
        let e2 = heir.registry().get(2).unwrap();
        assert_eq!(e2.health, host.registry().get(2).unwrap().health);
        assert!(!heir.registry().get(5).unwrap().alive);
        assert_eq!(heir.room().kill_count, 1);
        // Respawn for 5 re-armed on the new host
        assert!(heir.pending_tasks() >= 3);
    }

    #[test]
    fn test_restore_boss_from_room() {
        let room = RoomState {
            boss_alive: true,
            boss_health: 1200,
            boss_max_health: 3000,
            ..RoomState::default()
        };
        let (mut d, _rx) = director();
        d.start(&room, &[]);
        let boss = d.registry().living_boss().unwrap();
        assert_eq!(boss.health, 1200.0);
        assert_eq!(boss.max_health, 3000.0);
        assert_eq!(d.registry().living_boss_count(), 1);
    }

    #[test]
    fn test_merge_room_relevels_on_higher_level() {
        let mut d = started();
        let incoming = RoomState {
            zombie_level: 3,
            kill_count: 40,
            ..RoomState::default()
        };
        d.merge_room(&incoming);
        assert_eq!(d.room().kill_count, 40);
        assert!(d.registry().alive().all(|e| e.level == 3));

        d.merge_room(&RoomState::default());
        assert_eq!(d.room().kill_count, 40);
        assert_eq!(d.room().zombie_level, 3);
    }

    #[test]
    fn test_attacks_reach_sink() {
        let (mut d, mut rx) = director();
        d.start(&RoomState::default(), &[]);
        let pos = d.registry().get(0).unwrap().position;
        let targets = [TargetView {
            target: Target::Local,
            position: pos + Vec2::new(1.0, 0.0),
        }];
        d.tick(0.1, &targets);
        let attack = rx.try_recv().unwrap();
        assert_eq!(attack.enemy_id, 0);
        assert_eq!(attack.target, Target::Local);
    }

    #[test]
    fn test_snapshots_at_ten_hz() {
        let mut d = started();
        for _ in 0..60 {
            d.tick(1.0 / 60.0, &[]);
        }
        let snapshots = d
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, DirectorEvent::Snapshot(_)))
            .count();
        assert_eq!(snapshots, 10);
    }
}
