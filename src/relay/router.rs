//! Relay message routing
//!
//! [`Relay`] is synchronous and owns no sockets: each entry point returns the
//! [`Effects`] the transport must carry out. This keeps election and
//! forwarding rules testable without a network.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use smallvec::SmallVec;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::join_order::JoinOrder;
use super::peer::Peer;
use super::room::RoomState;
use crate::game::constants::player::TEAM_COLORS;
use crate::metrics::Metrics;
use crate::net::protocol::{ClientMessage, PeerId, ServerMessage};

/// Outbound work produced by one relay event
#[derive(Debug, Default)]
pub struct Effects {
    /// Messages in send order; per-recipient order must be preserved
    pub sends: Vec<(PeerId, ServerMessage)>,
    /// Peers killed in PvP whose respawn must be scheduled
    pub respawns: SmallVec<[PeerId; 1]>,
}

impl Effects {
    fn send(&mut self, to: PeerId, msg: ServerMessage) {
        self.sends.push((to, msg));
    }

    /// Messages addressed to `peer`, in order
    pub fn to(&self, peer: PeerId) -> impl Iterator<Item = &ServerMessage> {
        self.sends
            .iter()
            .filter(move |(to, _)| *to == peer)
            .map(|(_, msg)| msg)
    }

    pub fn is_empty(&self) -> bool {
        self.sends.is_empty() && self.respawns.is_empty()
    }
}

/// Peer table, join order and the cached room state for one room
pub struct Relay {
    peers: HashMap<PeerId, Peer>,
    join_order: JoinOrder,
    room: RoomState,
    next_color: u8,
    rng: StdRng,
    metrics: Arc<Metrics>,
}

impl Relay {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self::with_rng(metrics, StdRng::from_entropy())
    }

    pub fn with_rng(metrics: Arc<Metrics>, rng: StdRng) -> Self {
        Self {
            peers: HashMap::new(),
            join_order: JoinOrder::new(),
            room: RoomState::default(),
            next_color: 0,
            rng,
            metrics,
        }
    }

    pub fn host_id(&self) -> Option<PeerId> {
        self.join_order.host()
    }

    pub fn room_state(&self) -> &RoomState {
        &self.room
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    /// Register a new connection with a fresh id
    pub fn connect(&mut self) -> (PeerId, Effects) {
        let id = Uuid::new_v4();
        let effects = self.connect_with_id(id);
        (id, effects)
    }

    /// Register a connection under a caller-chosen id
    pub fn connect_with_id(&mut self, id: PeerId) -> Effects {
        let mut fx = Effects::default();

        let color = self.next_color;
        self.next_color = (self.next_color + 1) % TEAM_COLORS;
        let peer = Peer::new(id, color, &mut self.rng);
        let snapshot = peer.snapshot();
        self.peers.insert(id, peer);
        self.join_order.push(id);

        let is_host = self.join_order.is_host(id);
        self.metrics.set_host(self.host_id());
        self.metrics
            .peers_connected
            .store(self.peers.len() as u64, Ordering::Relaxed);

        let players = self
            .peers
            .iter()
            .map(|(pid, p)| (*pid, p.snapshot()))
            .collect();

        fx.send(id, ServerMessage::Welcome { peer_id: id });
        fx.send(
            id,
            ServerMessage::StateUpdate {
                players,
                room_state: self.room,
            },
        );
        fx.send(
            id,
            ServerMessage::HostAssign {
                is_host,
                room_state: is_host.then_some(self.room),
            },
        );
        for other in self.peers.keys().filter(|p| **p != id) {
            fx.send(*other, ServerMessage::PlayerJoin(snapshot.clone()));
        }

        info!(
            "Peer connected: {} | online: {} | host: {:?} | is_host: {}",
            id,
            self.peers.len(),
            self.host_id(),
            is_host
        );
        fx
    }

    pub fn on_disconnect(&mut self, id: PeerId) -> Effects {
        let mut fx = Effects::default();
        if self.peers.remove(&id).is_none() {
            return fx;
        }
        let promoted = self.join_order.remove(id);

        for other in self.peers.keys() {
            fx.send(*other, ServerMessage::PlayerLeave { id });
        }
        info!("Peer disconnected: {} | online: {}", id, self.peers.len());

        if self.peers.is_empty() {
            self.room.reset();
            self.next_color = 0;
            self.metrics.room_resets.fetch_add(1, Ordering::Relaxed);
            info!("All peers left - room state reset");
        } else if let Some(new_host) = promoted {
            info!("Host migrated: {} -> {}", id, new_host);
            self.metrics.host_migrations.fetch_add(1, Ordering::Relaxed);
            fx.send(
                new_host,
                ServerMessage::HostAssign {
                    is_host: true,
                    room_state: Some(self.room),
                },
            );
            for other in self.peers.keys() {
                fx.send(*other, ServerMessage::HostChanged { host_id: new_host });
            }
        }

        self.metrics.set_host(self.host_id());
        self.metrics
            .peers_connected
            .store(self.peers.len() as u64, Ordering::Relaxed);
        fx
    }

    pub fn on_message(&mut self, from: PeerId, msg: ClientMessage) -> Effects {
        let mut fx = Effects::default();
        if !self.peers.contains_key(&from) {
            return fx;
        }

        let is_host = self.join_order.is_host(from);
        if msg.is_host_only() && !is_host {
            self.metrics.unauthorized_drops.fetch_add(1, Ordering::Relaxed);
            warn!("Dropped {} from non-host {}", msg.name(), from);
            return fx;
        }
        debug!("{} from {}", msg.name(), from);

        match msg {
            ClientMessage::Move(movement) => {
                if let Some(peer) = self.peers.get_mut(&from) {
                    peer.apply_move(&movement);
                }
                self.broadcast_except(&mut fx, from, ServerMessage::PlayerMove { id: from, movement });
            }
            ClientMessage::Shoot {
                target,
                weapon,
                headshot,
            } => self.resolve_shot(&mut fx, from, target, weapon, headshot),
            ClientMessage::NpcKill { enemy_id, is_boss } => {
                self.room.record_kill(is_boss);
                self.broadcast_except(
                    &mut fx,
                    from,
                    ServerMessage::NpcKill {
                        from,
                        enemy_id,
                        is_boss,
                    },
                );
                self.broadcast(&mut fx, ServerMessage::GameStateSync(self.room));
            }
            ClientMessage::NpcDamageRequest(request) => {
                // The host applies its own damage locally
                match self.host_id() {
                    Some(host) if host != from => {
                        self.metrics
                            .damage_requests_forwarded
                            .fetch_add(1, Ordering::Relaxed);
                        fx.send(host, ServerMessage::NpcDamageRequest { from, request });
                    }
                    _ => debug!("Ignoring damage request from host {}", from),
                }
            }
            ClientMessage::NpcStateSync(projections) => {
                if let Some(boss) = projections.iter().find(|p| p.alive && p.kind.is_boss()) {
                    self.room.observe_boss_health(boss.health);
                }
                self.broadcast_except(&mut fx, from, ServerMessage::NpcStateSync(projections));
            }
            ClientMessage::BossSpawn(info) => {
                self.room.boss_spawned(info.health, info.max_health);
                info!("Boss spawned: enemy {} with {} hp", info.enemy_id, info.health);
                self.broadcast_except(&mut fx, from, ServerMessage::BossSpawn(info));
            }
            ClientMessage::BossDeath { enemy_id } => {
                self.room.boss_died();
                info!("Boss died: enemy {}", enemy_id);
                self.broadcast_except(&mut fx, from, ServerMessage::BossDeath { enemy_id });
            }
            ClientMessage::AirdropSpawn(drop) => {
                self.broadcast_except(&mut fx, from, ServerMessage::AirdropSpawn(drop));
            }
            ClientMessage::NpcKillConfirm { to, enemy_id, kind } => {
                if self.peers.contains_key(&to) {
                    fx.send(to, ServerMessage::NpcKillConfirm { enemy_id, kind });
                }
            }
            ClientMessage::NpcAttack {
                to,
                enemy_id,
                damage,
            } => {
                if self.peers.contains_key(&to) {
                    fx.send(to, ServerMessage::NpcAttack { enemy_id, damage });
                }
            }
            ClientMessage::Ping { timestamp } => {
                fx.send(
                    from,
                    ServerMessage::Pong {
                        client_timestamp: timestamp,
                        server_timestamp: self.metrics.uptime_seconds() * 1000,
                    },
                );
            }
        }
        fx
    }

    /// Bring a PvP-killed peer back; no-op if it left in the meantime
    pub fn respawn_peer(&mut self, id: PeerId) -> Effects {
        let mut fx = Effects::default();
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.respawn(&mut self.rng);
            fx.send(
                id,
                ServerMessage::PlayerRespawn {
                    transform: peer.transform,
                },
            );
        }
        fx
    }

    fn resolve_shot(
        &mut self,
        fx: &mut Effects,
        from: PeerId,
        target: PeerId,
        weapon: crate::game::weapons::WeaponKind,
        headshot: bool,
    ) {
        if target == from {
            return;
        }
        let damage = weapon.hit_damage(headshot);
        let killed = match self.peers.get_mut(&target) {
            Some(victim) if victim.is_alive() => victim.take_hit(damage),
            _ => return,
        };

        fx.send(
            from,
            ServerMessage::PlayerHit {
                target,
                damage,
                headshot,
                killed,
            },
        );

        if killed {
            if let Some(shooter) = self.peers.get_mut(&from) {
                shooter.kills += 1;
            }
            self.broadcast(
                fx,
                ServerMessage::PlayerDeath {
                    killer: from,
                    victim: target,
                },
            );
            fx.respawns.push(target);
        }
    }

    fn broadcast(&self, fx: &mut Effects, msg: ServerMessage) {
        for id in self.join_order.iter() {
            fx.send(*id, msg.clone());
        }
    }

    fn broadcast_except(&self, fx: &mut Effects, except: PeerId, msg: ServerMessage) {
        for id in self.join_order.iter().filter(|id| **id != except) {
            fx.send(*id, msg.clone());
        }
    }
}
