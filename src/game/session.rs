//! Client session
//!
//! Everything one peer runs: role tracking, the horde director while it
//! holds authority, the mirrored projection while it doesn't, the local
//! player's vitals, loadout and ledger. Driven by [`Session::update`] once
//! per frame plus [`Session::handle`] for every relay message; outbound
//! messages collect in an outbox the transport drains.

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

use super::ai::TargetView;
use super::constants::{airdrop, net, player, spawn};
use super::director::{DirectorEvent, HordeDirector};
use super::enemy::{EnemyId, EnemyKind};
use super::mirror::EnemyMirror;
use super::ports::{
    EntityId, EntityKind, Hit, HudSink, Intent, NpcAttack, RenderSink, Target,
};
use super::progression::{Ledger, Purchase, ShopError, ShopItem};
use super::role::{HostElection, Role, Transition};
use super::scheduler::{Scheduler, TaskToken};
use super::weapons::{FireResult, Loadout};
use crate::net::client::ClientEvent;
use crate::net::protocol::{
    Airdrop, ClientMessage, DamageRequest, Movement, PeerId, PeerSnapshot, RoomState,
    ServerMessage, Transform,
};
use crate::util::vec2::Vec2;

/// Timers owned by this client regardless of role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTask {
    SoloFallback,
    Reload,
    Respawn,
    SendMove,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vitals {
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub deaths: u32,
}

#[derive(Debug, Clone, Copy)]
struct RemotePlayer {
    transform: Transform,
    alive: bool,
}

pub struct Session {
    election: HostElection,
    tasks: Scheduler<LocalTask>,
    director: HordeDirector,
    mirror: EnemyMirror,
    room: RoomState,
    ledger: Ledger,
    loadout: Loadout,
    vitals: Vitals,
    players: HashMap<PeerId, RemotePlayer>,
    position: Vec2,
    yaw: f32,
    move_intent: Vec2,
    airdrops: Vec<Airdrop>,
    connected: bool,
    last_move: Option<Movement>,
    outbox: Vec<ClientMessage>,
    render: Box<dyn RenderSink>,
    hud: Box<dyn HudSink>,
    attacks: mpsc::UnboundedReceiver<NpcAttack>,
    rng: StdRng,
}

impl Session {
    pub fn new(render: Box<dyn RenderSink>, hud: Box<dyn HudSink>, seed: u64) -> Self {
        let (attack_tx, attacks) = mpsc::unbounded_channel();
        let director = HordeDirector::new(
            Box::new(attack_tx),
            StdRng::seed_from_u64(seed.wrapping_add(1)),
        );
        let base_health = player::BASE_HEALTH as f32;
        Self {
            election: HostElection::new(),
            tasks: Scheduler::new(),
            director,
            mirror: EnemyMirror::new(),
            room: RoomState::default(),
            ledger: Ledger::new(),
            loadout: Loadout::new(),
            vitals: Vitals {
                health: base_health,
                max_health: base_health,
                alive: true,
                deaths: 0,
            },
            players: HashMap::new(),
            position: Vec2::ZERO,
            yaw: 0.0,
            move_intent: Vec2::ZERO,
            airdrops: Vec::new(),
            connected: false,
            last_move: None,
            outbox: Vec::new(),
            render,
            hud,
            attacks,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Scene loaded: arm the solo fallback and the movement publisher
    pub fn start(&mut self) {
        self.arm_fallback();
        self.tasks.schedule_in(move_interval(), LocalTask::SendMove);
    }

    pub fn role(&self) -> Role {
        self.election.role()
    }

    pub fn self_id(&self) -> Option<PeerId> {
        self.election.self_id()
    }

    /// Last host the relay named; `None` while pending or solo
    pub fn host_id(&self) -> Option<PeerId> {
        self.election.host_id()
    }

    pub fn room(&self) -> &RoomState {
        &self.room
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn loadout(&self) -> &Loadout {
        &self.loadout
    }

    pub fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    pub fn director(&self) -> &HordeDirector {
        &self.director
    }

    pub fn mirror(&self) -> &EnemyMirror {
        &self.mirror
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn airdrops(&self) -> &[Airdrop] {
        &self.airdrops
    }

    pub fn remote_players(&self) -> usize {
        self.players.len()
    }

    /// Messages queued since the last call
    pub fn take_outbox(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Test and tooling hook: spawn an enemy while simulating
    pub fn spawn_enemy(&mut self, kind: EnemyKind) -> Option<EnemyId> {
        if !self.director.is_active() {
            return None;
        }
        self.director.spawn_enemy(kind)
    }

    pub fn on_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Connected => {
                self.connected = true;
                tracing::info!("Connected, awaiting host assignment");
            }
            ClientEvent::Disconnected => {
                self.connected = false;
                self.outbox.clear();
                self.last_move = None;
                for (id, _) in self.players.drain() {
                    self.render.remove_entity(EntityId::Player(id));
                }
                let transition = self.election.on_disconnected();
                tracing::info!("Disconnected, role now {:?}", self.election.role());
                self.apply_transition(transition);
            }
            ClientEvent::Message(msg) => self.handle(msg),
        }
    }

    pub fn handle(&mut self, msg: ServerMessage) {
        tracing::debug!("Received {}", msg.name());
        match msg {
            ServerMessage::Welcome { peer_id } => {
                self.election.set_self(peer_id);
            }
            ServerMessage::StateUpdate {
                players,
                room_state,
            } => {
                self.merge_room(&room_state);
                for snapshot in players.into_values() {
                    self.add_player(snapshot);
                }
            }
            ServerMessage::HostAssign {
                is_host,
                room_state,
            } => {
                self.cancel_fallback();
                if let Some(room) = room_state {
                    self.merge_room(&room);
                }
                let transition = self.election.on_host_assign(is_host);
                self.apply_transition(transition);
            }
            ServerMessage::HostChanged { host_id } => {
                self.cancel_fallback();
                let transition = self.election.on_host_changed(host_id);
                self.apply_transition(transition);
            }
            ServerMessage::GameStateSync(room) => self.merge_room(&room),
            ServerMessage::PlayerJoin(snapshot) => self.add_player(snapshot),
            ServerMessage::PlayerLeave { id } => {
                if self.players.remove(&id).is_some() {
                    self.render.remove_entity(EntityId::Player(id));
                }
            }
            ServerMessage::PlayerMove { id, movement } => {
                if let Some(remote) = self.players.get_mut(&id) {
                    remote.transform = movement.transform;
                    remote.alive = true;
                    self.render
                        .update_transform(EntityId::Player(id), movement.transform);
                }
            }
            ServerMessage::PlayerHit { headshot, .. } => self.hud.on_hit_marker(headshot),
            ServerMessage::PlayerDeath { killer, victim } => {
                if Some(victim) == self.self_id() {
                    tracing::info!("Killed by {}", killer);
                    self.die();
                } else if let Some(remote) = self.players.get_mut(&victim) {
                    remote.alive = false;
                }
            }
            ServerMessage::PlayerRespawn { transform } => {
                self.position = Vec2::new(transform.x, transform.z);
                self.revive();
            }
            ServerMessage::NpcKill { from, enemy_id, .. } => {
                tracing::debug!("Enemy {} killed by {}", enemy_id, from);
            }
            ServerMessage::NpcDamageRequest { from, request } => {
                self.on_damage_request(from, request);
            }
            ServerMessage::NpcStateSync(snapshot) => {
                if self.director.is_active() {
                    return;
                }
                if let Some(boss) = snapshot.iter().find(|p| p.alive && p.kind.is_boss()) {
                    self.room.observe_boss_health(boss.health);
                }
                self.mirror.apply(snapshot, self.render.as_mut());
            }
            ServerMessage::BossSpawn(info) => {
                if !self.director.is_active() {
                    self.room.boss_spawned(info.health, info.max_health);
                    self.hud.on_boss_alert("Boss spawned");
                }
            }
            ServerMessage::BossDeath { .. } => {
                if !self.director.is_active() {
                    self.room.boss_died();
                    self.boss_reward();
                }
            }
            ServerMessage::AirdropSpawn(drop) => {
                if !self.director.is_active() {
                    self.add_airdrop(drop);
                }
            }
            ServerMessage::NpcKillConfirm { enemy_id, kind } => {
                tracing::debug!("Kill of enemy {} confirmed", enemy_id);
                self.credit_kill(kind);
            }
            ServerMessage::NpcAttack { damage, .. } => self.take_damage(damage),
            ServerMessage::Pong {
                client_timestamp,
                server_timestamp,
            } => {
                tracing::debug!("Pong: sent {} relay {}", client_timestamp, server_timestamp);
            }
        }
    }

    pub fn intent(&mut self, intent: Intent) {
        match intent {
            Intent::Move { dx, dz } => self.move_intent = Vec2::new(dx, dz).clamp_length(1.0),
            Intent::Aim { yaw } => self.yaw = yaw,
            Intent::Fire { hit } => self.fire(hit),
            Intent::SwitchSlot(slot) => {
                if let Some(reload) = self.loadout.switch(slot) {
                    self.tasks.cancel(reload);
                }
            }
            Intent::Reload => self.start_reload(),
        }
    }

    pub fn buy(&mut self, item: ShopItem) -> Result<(), ShopError> {
        match self.ledger.buy(item, &mut self.loadout)? {
            Purchase::Heal(fraction) => {
                if self.vitals.alive {
                    let max = self.vitals.max_health;
                    self.vitals.health = (self.vitals.health + max * fraction).min(max);
                }
            }
            Purchase::MaxHealth(extra) => {
                self.vitals.max_health = self.ledger.max_health();
                if self.vitals.alive {
                    self.vitals.health += extra as f32;
                }
            }
            Purchase::Weapon(_) | Purchase::Upgrade => {}
        }
        self.hud.on_coins_changed(self.ledger.coins);
        self.hud
            .on_health_changed(self.vitals.health, self.vitals.max_health);
        Ok(())
    }

    /// One frame
    pub fn update(&mut self, dt: f32) {
        self.integrate_movement(dt);

        for (token, task) in self.tasks.advance(dt) {
            self.run_task(token, task);
        }

        if self.director.is_active() {
            let targets = self.targets();
            self.director.tick(dt, &targets);
            self.flush_director();
            let snapshot = self.director.registry().snapshot();
            self.mirror.apply(snapshot, self.render.as_mut());
        }

        while let Ok(attack) = self.attacks.try_recv() {
            match attack.target {
                Target::Local => self.take_damage(attack.damage),
                Target::Remote(to) => self.send_as_host(ClientMessage::NpcAttack {
                    to,
                    enemy_id: attack.enemy_id,
                    damage: attack.damage,
                }),
            }
        }

        self.collect_airdrops();
    }

    fn run_task(&mut self, token: TaskToken, task: LocalTask) {
        match task {
            LocalTask::SoloFallback => {
                let transition = self.election.on_fallback_fired();
                if transition == Transition::GoSolo {
                    tracing::info!("No host assignment in time, simulating locally");
                }
                self.apply_transition(transition);
            }
            LocalTask::Reload => {
                self.loadout
                    .finish_reload(token, self.ledger.upgrades.magazine);
            }
            LocalTask::Respawn => {
                self.position = Vec2::ZERO;
                self.revive();
            }
            LocalTask::SendMove => {
                self.publish_move();
                self.tasks.schedule_in(move_interval(), LocalTask::SendMove);
            }
        }
    }

    fn apply_transition(&mut self, transition: Transition) {
        match transition {
            Transition::Unchanged => {}
            Transition::Promote | Transition::GoSolo => {
                self.cancel_fallback();
                if transition == Transition::Promote {
                    tracing::info!(
                        "Promoted to host at kill count {}",
                        self.room.kill_count
                    );
                }
                self.director.start(&self.room, self.mirror.projections());
                self.flush_director();
                self.hud.on_kill_count_changed(self.room.kill_count);
            }
            Transition::Demote => {
                tracing::info!("Demoted to guest");
                self.director.stop();
            }
            Transition::Rearm => self.arm_fallback(),
        }
    }

    fn arm_fallback(&mut self) {
        self.cancel_fallback();
        let token = self
            .tasks
            .schedule_in(net::SOLO_FALLBACK_SECS, LocalTask::SoloFallback);
        self.election.arm_fallback(token);
    }

    /// Idempotent; a fallback that already fired cancels to a no-op
    fn cancel_fallback(&mut self) {
        if let Some(token) = self.election.take_fallback() {
            self.tasks.cancel(token);
        }
    }

    fn merge_room(&mut self, incoming: &RoomState) {
        let before = self.room.kill_count;
        self.room.merge_max(incoming);
        if self.director.is_active() {
            self.director.merge_room(incoming);
            self.flush_director();
        }
        if self.room.kill_count != before {
            self.hud.on_kill_count_changed(self.room.kill_count);
        }
    }

    /// Publish what the director decided and fold its room into ours
    fn flush_director(&mut self) {
        for event in self.director.drain_events() {
            match event {
                DirectorEvent::Killed { enemy_id, kind } => {
                    self.send_as_host(ClientMessage::NpcKill {
                        enemy_id,
                        is_boss: kind.is_boss(),
                    });
                    if kind.is_boss() {
                        self.send_as_host(ClientMessage::BossDeath { enemy_id });
                        self.boss_reward();
                    }
                }
                DirectorEvent::BossWarning => self.hud.on_boss_alert("Boss incoming"),
                DirectorEvent::BossSpawned(info) => {
                    self.send_as_host(ClientMessage::BossSpawn(info));
                    self.hud.on_boss_alert("Boss spawned");
                }
                DirectorEvent::Airdrop(drop) => {
                    self.add_airdrop(drop);
                    self.send_as_host(ClientMessage::AirdropSpawn(drop));
                }
                DirectorEvent::Snapshot(snapshot) => {
                    self.send_as_host(ClientMessage::NpcStateSync(snapshot));
                }
                DirectorEvent::Respawned(_) => {}
            }
        }
        let before = self.room.kill_count;
        self.room.merge_max(self.director.room());
        if self.room.kill_count != before {
            self.hud.on_kill_count_changed(self.room.kill_count);
        }
    }

    fn fire(&mut self, hit: Option<Hit>) {
        if !self.vitals.alive {
            return;
        }
        let now = self.tasks.now_secs();
        match self.loadout.try_fire(now, self.ledger.upgrades.fire_rate) {
            FireResult::Fired => {}
            FireResult::FiredEmpty => self.start_reload(),
            FireResult::Empty => {
                self.start_reload();
                return;
            }
            FireResult::Cooling | FireResult::Reloading | FireResult::NoWeapon => return,
        }
        let (Some(hit), Some(weapon)) = (hit, self.loadout.active_weapon()) else {
            return;
        };
        match hit {
            Hit::Enemy { id, headshot } => {
                let base = weapon.hit_damage(headshot) * self.ledger.damage_multiplier();
                let (amount, _crit) = self.ledger.roll_crit(base, &mut self.rng);
                self.damage_enemy(id, amount, headshot);
            }
            Hit::Player { id, headshot } => self.send(ClientMessage::Shoot {
                target: id,
                weapon,
                headshot,
            }),
        }
    }

    /// Local fatal hits credit this client; guests route through the host
    fn damage_enemy(&mut self, enemy_id: EnemyId, amount: f32, headshot: bool) {
        if self.director.is_active() {
            let Some(outcome) = self.director.apply_damage(enemy_id, amount) else {
                return;
            };
            self.hud.on_hit_marker(headshot);
            if outcome.died {
                self.credit_kill(outcome.kind);
            }
            self.flush_director();
        } else if self.election.role() == Role::Guest {
            let target_alive = self.mirror.get(enemy_id).is_some_and(|p| p.alive);
            if !target_alive {
                return;
            }
            self.hud.on_hit_marker(headshot);
            self.send(ClientMessage::NpcDamageRequest(DamageRequest {
                enemy_id,
                amount,
                headshot,
            }));
        }
    }

    fn on_damage_request(&mut self, from: PeerId, request: DamageRequest) {
        if self.election.role() != Role::Host {
            return;
        }
        let Some(outcome) = self.director.apply_damage(request.enemy_id, request.amount) else {
            tracing::debug!("Stale damage request for enemy {} from {}", request.enemy_id, from);
            return;
        };
        if outcome.died {
            self.send_as_host(ClientMessage::NpcKillConfirm {
                to: from,
                enemy_id: outcome.enemy_id,
                kind: outcome.kind,
            });
        }
        self.flush_director();
    }

    fn credit_kill(&mut self, kind: EnemyKind) {
        let now = self.tasks.now_secs();
        let reward = self
            .ledger
            .award_kill(kind, now, self.loadout.owned(), &mut self.rng);
        self.hud.on_coins_changed(self.ledger.coins);

        if reward.levels_gained > 0 {
            let max = self.ledger.max_health();
            let gain = max - self.vitals.max_health;
            self.vitals.max_health = max;
            if self.vitals.alive {
                self.vitals.health += gain;
            }
            self.hud.on_level_up(self.ledger.level);
            self.hud
                .on_health_changed(self.vitals.health, self.vitals.max_health);
        }
        if let Some(weapon) = reward.drop {
            tracing::info!("Unique drop: {:?}", weapon);
            self.loadout.equip(weapon, self.ledger.upgrades.magazine);
            self.hud.on_weapon_drop(weapon);
        }
    }

    fn boss_reward(&mut self) {
        if self.vitals.alive {
            self.vitals.health = self.vitals.max_health;
            self.hud
                .on_health_changed(self.vitals.health, self.vitals.max_health);
        }
        self.hud.on_store_opened();
    }

    fn take_damage(&mut self, damage: f32) {
        if !self.vitals.alive {
            return;
        }
        self.vitals.health = (self.vitals.health - damage).max(0.0);
        self.hud
            .on_health_changed(self.vitals.health, self.vitals.max_health);
        if self.vitals.health <= 0.0 {
            self.die();
            self.tasks
                .schedule_in(player::RESPAWN_SECS, LocalTask::Respawn);
        }
    }

    fn die(&mut self) {
        if !self.vitals.alive {
            return;
        }
        self.vitals.alive = false;
        self.vitals.health = 0.0;
        self.vitals.deaths += 1;
        self.move_intent = Vec2::ZERO;
        tracing::info!("Player died ({} deaths)", self.vitals.deaths);
    }

    fn revive(&mut self) {
        self.vitals.alive = true;
        self.vitals.health = self.vitals.max_health;
        self.hud
            .on_health_changed(self.vitals.health, self.vitals.max_health);
    }

    fn start_reload(&mut self) {
        if let Some(secs) = self.loadout.reload_needed(self.ledger.upgrades.magazine) {
            let token = self.tasks.schedule_in(secs, LocalTask::Reload);
            self.loadout.begin_reload(token);
        }
    }

    fn integrate_movement(&mut self, dt: f32) {
        if !self.vitals.alive || self.move_intent == Vec2::ZERO {
            return;
        }
        let speed = player::SPEED * self.ledger.upgrades.speed;
        self.position =
            (self.position + self.move_intent * (speed * dt)).clamp_square(spawn::WORLD_HALF_EXTENT);
    }

    fn publish_move(&mut self) {
        if !self.connected || self.self_id().is_none() || !self.vitals.alive {
            return;
        }
        let Some(weapon) = self.loadout.active_weapon() else {
            return;
        };
        let movement = Movement {
            transform: Transform {
                x: self.position.x,
                y: 0.0,
                z: self.position.z,
                ry: self.yaw,
            },
            weapon,
        };
        if self.last_move != Some(movement) {
            self.last_move = Some(movement);
            self.send(ClientMessage::Move(movement));
        }
    }

    fn collect_airdrops(&mut self) {
        if !self.vitals.alive || self.airdrops.is_empty() {
            return;
        }
        let position = self.position;
        let (picked, kept): (Vec<Airdrop>, Vec<Airdrop>) = self
            .airdrops
            .drain(..)
            .partition(|a| position.distance_to(Vec2::new(a.x, a.z)) <= airdrop::PICKUP_RADIUS);
        self.airdrops = kept;

        let now = self.tasks.now_secs();
        for drop in picked {
            self.render.remove_entity(EntityId::Airdrop(drop.id));
            self.ledger.add_coins(airdrop::COINS);
            self.ledger.start_coin_event(now);
            self.loadout.refill_all(self.ledger.upgrades.magazine);
            self.hud.on_coins_changed(self.ledger.coins);
            tracing::debug!("Picked up airdrop {}", drop.id);
        }
    }

    fn add_airdrop(&mut self, drop: Airdrop) {
        let transform = Transform {
            x: drop.x,
            y: 0.0,
            z: drop.z,
            ry: 0.0,
        };
        self.render
            .add_entity(EntityId::Airdrop(drop.id), EntityKind::Airdrop, transform);
        self.airdrops.push(drop);
    }

    fn add_player(&mut self, snapshot: PeerSnapshot) {
        if Some(snapshot.id) == self.self_id() {
            return;
        }
        self.render.add_entity(
            EntityId::Player(snapshot.id),
            EntityKind::Player {
                color: snapshot.color,
            },
            snapshot.transform,
        );
        self.players.insert(
            snapshot.id,
            RemotePlayer {
                transform: snapshot.transform,
                alive: snapshot.health > 0.0,
            },
        );
    }

    fn targets(&self) -> Vec<TargetView> {
        let mut targets = Vec::with_capacity(self.players.len() + 1);
        if self.vitals.alive {
            targets.push(TargetView {
                target: Target::Local,
                position: self.position,
            });
        }
        for (id, remote) in &self.players {
            if remote.alive {
                targets.push(TargetView {
                    target: Target::Remote(*id),
                    position: Vec2::new(remote.transform.x, remote.transform.z),
                });
            }
        }
        targets
    }

    fn send(&mut self, msg: ClientMessage) {
        if self.connected {
            self.outbox.push(msg);
        }
    }

    /// Host-only types leave only while this peer actually holds the role
    fn send_as_host(&mut self, msg: ClientMessage) {
        if self.election.role() == Role::Host {
            self.send(msg);
        }
    }
}

fn move_interval() -> f32 {
    1.0 / net::MOVE_RATE_HZ as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ports::{NullHud, NullRender};
    use crate::game::weapons::WeaponKind;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[derive(Default)]
    struct HudLog {
        kill_counts: Vec<u32>,
        alerts: Vec<String>,
        stores: u32,
    }

    #[derive(Clone, Default)]
    struct SharedHud(Arc<Mutex<HudLog>>);

    impl HudSink for SharedHud {
        fn on_kill_count_changed(&mut self, kill_count: u32) {
            self.0.lock().unwrap().kill_counts.push(kill_count);
        }
        fn on_boss_alert(&mut self, text: &str) {
            self.0.lock().unwrap().alerts.push(text.to_string());
        }
        fn on_hit_marker(&mut self, _headshot: bool) {}
        fn on_store_opened(&mut self) {
            self.0.lock().unwrap().stores += 1;
        }
    }

    fn session() -> Session {
        let mut s = Session::new(Box::new(NullRender), Box::new(NullHud), 42);
        s.start();
        s
    }

    fn run(s: &mut Session, secs: f32) {
        let frames = (secs * 60.0).round() as usize;
        for _ in 0..frames {
            s.update(1.0 / 60.0);
        }
    }

    fn connect_as(s: &mut Session, is_host: bool) -> PeerId {
        let id = Uuid::new_v4();
        s.on_client_event(ClientEvent::Connected);
        s.handle(ServerMessage::Welcome { peer_id: id });
        s.handle(ServerMessage::HostAssign {
            is_host,
            room_state: None,
        });
        id
    }

    fn first_alive(s: &Session) -> EnemyId {
        s.mirror()
            .projections()
            .iter()
            .find(|p| p.alive)
            .map(|p| p.id)
            .unwrap()
    }

    #[test]
    fn test_solo_fallback_after_two_seconds() {
        let mut s = session();
        run(&mut s, 1.9);
        assert_eq!(s.role(), Role::Pending);
        assert!(!s.director().is_active());
        run(&mut s, 0.2);
        assert_eq!(s.role(), Role::Solo);
        assert_eq!(s.director().registry().len(), 8);
    }

    #[test]
    fn test_assignment_cancels_fallback() {
        let mut s = session();
        connect_as(&mut s, false);
        run(&mut s, 5.0);
        assert_eq!(s.role(), Role::Guest);
        assert!(!s.director().is_active());
    }

    #[test]
    fn test_solo_sends_nothing_host_only() {
        let mut s = session();
        run(&mut s, 3.0);
        let id = first_alive(&s);
        s.intent(Intent::Fire {
            hit: Some(Hit::Enemy { id, headshot: false }),
        });
        assert!(s.take_outbox().is_empty());
    }

    #[test]
    fn test_host_publishes_snapshots() {
        let mut s = session();
        connect_as(&mut s, true);
        assert_eq!(s.role(), Role::Host);
        run(&mut s, 1.0);
        let out = s.take_outbox();
        let syncs = out
            .iter()
            .filter(|m| matches!(m, ClientMessage::NpcStateSync(_)))
            .count();
        assert!((9..=10).contains(&syncs));
    }

    #[test]
    fn test_guest_requests_instead_of_mutating() {
        let mut host = session();
        connect_as(&mut host, true);
        run(&mut host, 0.2);

        let mut guest = session();
        connect_as(&mut guest, false);
        guest.handle(ServerMessage::NpcStateSync(host.director().registry().snapshot()));
        let id = first_alive(&guest);
        let before = guest.mirror().get(id).unwrap().health;

        guest.intent(Intent::Fire {
            hit: Some(Hit::Enemy { id, headshot: true }),
        });
        let out = guest.take_outbox();
        assert!(out.iter().any(|m| matches!(
            m,
            ClientMessage::NpcDamageRequest(DamageRequest { enemy_id, amount, headshot: true })
                if *enemy_id == id && *amount == 20.0
        )));
        assert_eq!(guest.mirror().get(id).unwrap().health, before);
        assert!(!guest.director().is_active());
    }

    #[test]
    fn test_host_confirms_guest_kill() {
        let mut host = session();
        connect_as(&mut host, true);
        let id = host.spawn_enemy(EnemyKind::Normal).unwrap();
        host.take_outbox();
        let guest = Uuid::new_v4();

        host.handle(ServerMessage::NpcDamageRequest {
            from: guest,
            request: DamageRequest {
                enemy_id: id,
                amount: 999.0,
                headshot: false,
            },
        });
        let out = host.take_outbox();
        assert!(out.contains(&ClientMessage::NpcKillConfirm {
            to: guest,
            enemy_id: id,
            kind: EnemyKind::Normal,
        }));
        assert!(out.contains(&ClientMessage::NpcKill {
            enemy_id: id,
            is_boss: false,
        }));
        // Reward went to the guest, not the host
        assert_eq!(host.ledger().coins, 0);
        assert_eq!(host.room().kill_count, 1);
    }

    #[test]
    fn test_stale_damage_request_is_noop() {
        let mut host = session();
        connect_as(&mut host, true);
        let request = DamageRequest {
            enemy_id: 7,
            amount: 999.0,
            headshot: false,
        };
        host.handle(ServerMessage::NpcDamageRequest {
            from: Uuid::new_v4(),
            request,
        });
        host.take_outbox();
        host.handle(ServerMessage::NpcDamageRequest {
            from: Uuid::new_v4(),
            request,
        });
        assert!(!host
            .take_outbox()
            .iter()
            .any(|m| matches!(m, ClientMessage::NpcKillConfirm { .. })));
        assert_eq!(host.room().kill_count, 1);
    }

    #[test]
    fn test_kill_confirm_credits_guest() {
        let mut guest = session();
        connect_as(&mut guest, false);
        guest.handle(ServerMessage::NpcKillConfirm {
            enemy_id: 1,
            kind: EnemyKind::Tank,
        });
        assert_eq!(guest.ledger().coins, 25);
    }

    #[test]
    fn test_room_never_moves_backwards() {
        let hud = SharedHud::default();
        let mut s = Session::new(Box::new(NullRender), Box::new(hud.clone()), 1);
        s.start();
        connect_as(&mut s, false);
        for kills in [5, 9, 3, 12, 0, 11] {
            s.handle(ServerMessage::GameStateSync(RoomState {
                kill_count: kills,
                ..RoomState::default()
            }));
            assert!(s.room().kill_count >= kills);
        }
        assert_eq!(s.room().kill_count, 12);
        assert_eq!(hud.0.lock().unwrap().kill_counts, vec![5, 9, 12]);
    }

    #[test]
    fn test_host_changed_demotes_and_cancels() {
        let mut s = session();
        connect_as(&mut s, true);
        run(&mut s, 0.5);
        assert!(s.director().pending_tasks() > 0);

        let other = Uuid::new_v4();
        s.handle(ServerMessage::HostChanged { host_id: other });
        assert_eq!(s.role(), Role::Guest);
        assert_eq!(s.host_id(), Some(other));
        assert!(!s.director().is_active());
        assert_eq!(s.director().pending_tasks(), 0);
        s.take_outbox();
        run(&mut s, 1.0);
        assert!(!s
            .take_outbox()
            .iter()
            .any(|m| matches!(m, ClientMessage::NpcStateSync(_))));
    }

    #[test]
    fn test_guest_disconnect_rearms_fallback() {
        let mut s = session();
        connect_as(&mut s, false);
        s.on_client_event(ClientEvent::Disconnected);
        assert_eq!(s.role(), Role::Pending);
        run(&mut s, 2.1);
        assert_eq!(s.role(), Role::Solo);
        assert!(s.director().is_active());
    }

    #[test]
    fn test_switch_slot_cancels_reload() {
        let mut s = session();
        for _ in 0..3 {
            s.intent(Intent::Fire { hit: None });
            run(&mut s, 0.2);
        }
        s.intent(Intent::Reload);
        assert!(s.loadout().is_reloading());
        s.intent(Intent::SwitchSlot(2));
        assert!(!s.loadout().is_reloading());
        s.intent(Intent::SwitchSlot(0));
        run(&mut s, 3.0);
        assert_eq!(s.loadout().ammo(), Some(37));
    }

    #[test]
    fn test_reload_completes() {
        let mut s = session();
        s.intent(Intent::Fire { hit: None });
        s.intent(Intent::Reload);
        run(&mut s, 2.1);
        assert!(!s.loadout().is_reloading());
        assert_eq!(s.loadout().ammo(), Some(40));
    }

    #[test]
    fn test_npc_attack_kills_and_respawns() {
        let mut s = session();
        connect_as(&mut s, false);
        for _ in 0..10 {
            s.handle(ServerMessage::NpcAttack {
                enemy_id: 0,
                damage: 10.0,
            });
        }
        assert!(!s.vitals().alive);
        assert_eq!(s.vitals().deaths, 1);
        s.handle(ServerMessage::NpcAttack {
            enemy_id: 0,
            damage: 10.0,
        });
        assert_eq!(s.vitals().deaths, 1);

        run(&mut s, 3.1);
        assert!(s.vitals().alive);
        assert_eq!(s.vitals().health, 100.0);
    }

    #[test]
    fn test_boss_death_opens_store_on_guest() {
        let hud = SharedHud::default();
        let mut s = Session::new(Box::new(NullRender), Box::new(hud.clone()), 1);
        s.start();
        connect_as(&mut s, false);
        s.handle(ServerMessage::NpcAttack {
            enemy_id: 0,
            damage: 40.0,
        });
        s.handle(ServerMessage::BossDeath { enemy_id: 9 });
        assert_eq!(s.vitals().health, 100.0);
        assert_eq!(hud.0.lock().unwrap().stores, 1);
    }

    #[test]
    fn test_airdrop_pickup() {
        let mut s = session();
        connect_as(&mut s, false);
        s.handle(ServerMessage::AirdropSpawn(Airdrop {
            id: 0,
            x: 0.0,
            z: 2.0,
        }));
        s.update(1.0 / 60.0);
        assert!(s.airdrops().is_empty());
        assert_eq!(s.ledger().coins, 50);

        s.handle(ServerMessage::NpcKillConfirm {
            enemy_id: 0,
            kind: EnemyKind::Normal,
        });
        assert_eq!(s.ledger().coins, 70);
    }

    #[test]
    fn test_buy_without_coins_fails() {
        let mut s = session();
        let err = s.buy(ShopItem::Weapon(WeaponKind::Axe)).unwrap_err();
        assert!(matches!(err, ShopError::InsufficientCoins { .. }));
        assert!(!s.loadout().owns(WeaponKind::Axe));
    }

    #[test]
    fn test_movement_is_rate_limited() {
        let mut s = session();
        connect_as(&mut s, false);
        s.intent(Intent::Move { dx: 1.0, dz: 0.0 });
        run(&mut s, 1.0);
        let moves = s
            .take_outbox()
            .iter()
            .filter(|m| matches!(m, ClientMessage::Move(_)))
            .count();
        assert!(moves <= net::MOVE_RATE_HZ as usize);
        assert!(moves >= 19);
        assert!((s.position().x - player::SPEED).abs() < 0.5);
    }
}
