use serde::{Deserialize, Serialize};

/// Shared progression of the whole session
///
/// The relay owns the canonical copy; every client keeps a max-merged local
/// view so counters never move backwards on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    pub wave: u32,
    pub kill_count: u32,
    pub boss_kill_count: u32,
    pub zombie_level: u32,
    pub boss_alive: bool,
    pub boss_health: u32,
    pub boss_max_health: u32,
}

impl Default for RoomState {
    fn default() -> Self {
        Self {
            wave: 1,
            kill_count: 0,
            boss_kill_count: 0,
            zombie_level: 1,
            boss_alive: false,
            boss_health: 0,
            boss_max_health: 0,
        }
    }
}

impl RoomState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply an `npc:kill` notice
    pub fn record_kill(&mut self, is_boss: bool) {
        self.kill_count += 1;
        if is_boss {
            self.boss_kill_count += 1;
            self.wave = self.boss_kill_count + 1;
            self.zombie_level += 1;
            self.boss_alive = false;
            self.boss_health = 0;
        }
    }

    pub fn boss_spawned(&mut self, health: f32, max_health: f32) {
        self.boss_alive = true;
        self.boss_health = health.max(0.0) as u32;
        self.boss_max_health = if max_health > 0.0 {
            max_health as u32
        } else {
            self.boss_health
        };
    }

    pub fn boss_died(&mut self) {
        self.boss_alive = false;
        self.boss_health = 0;
    }

    /// Track the living boss' health from a snapshot so a promoted host can restore it
    pub fn observe_boss_health(&mut self, health: f32) {
        if self.boss_alive {
            self.boss_health = health.max(0.0) as u32;
        }
    }

    /// Take-max reconciliation; returns true if any counter moved
    ///
    /// Counters and tiers never decrease. Boss fields follow the incoming
    /// record only when it is at least as fresh (same or higher boss kill count).
    pub fn merge_max(&mut self, incoming: &RoomState) -> bool {
        let before = *self;
        self.kill_count = self.kill_count.max(incoming.kill_count);
        self.boss_kill_count = self.boss_kill_count.max(incoming.boss_kill_count);
        self.zombie_level = self.zombie_level.max(incoming.zombie_level);
        self.wave = self.wave.max(incoming.wave);
        if incoming.boss_kill_count >= before.boss_kill_count {
            self.boss_alive = incoming.boss_alive;
            self.boss_health = incoming.boss_health;
            self.boss_max_health = incoming.boss_max_health;
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let room = RoomState::default();
        assert_eq!(room.wave, 1);
        assert_eq!(room.kill_count, 0);
        assert_eq!(room.boss_kill_count, 0);
        assert_eq!(room.zombie_level, 1);
        assert!(!room.boss_alive);
    }

    #[test]
    fn test_boss_kill_advances_tiers() {
        let mut room = RoomState::default();
        room.boss_spawned(3000.0, 3000.0);
        assert!(room.boss_alive);
        room.record_kill(true);
        assert_eq!(room.kill_count, 1);
        assert_eq!(room.boss_kill_count, 1);
        assert_eq!(room.wave, 2);
        assert_eq!(room.zombie_level, 2);
        assert!(!room.boss_alive);
        assert_eq!(room.boss_health, 0);
    }

    #[test]
    fn test_merge_never_decreases() {
        let mut local = RoomState {
            kill_count: 50,
            ..RoomState::default()
        };
        let stale = RoomState {
            kill_count: 40,
            ..RoomState::default()
        };
        assert!(!local.merge_max(&stale));
        assert_eq!(local.kill_count, 50);

        let fresh = RoomState {
            kill_count: 51,
            boss_kill_count: 1,
            zombie_level: 2,
            wave: 2,
            ..RoomState::default()
        };
        assert!(local.merge_max(&fresh));
        assert_eq!(local.kill_count, 51);
        assert_eq!(local.zombie_level, 2);
    }

    #[test]
    fn test_stale_boss_flag_ignored() {
        let mut local = RoomState {
            boss_kill_count: 2,
            ..RoomState::default()
        };
        let stale = RoomState {
            boss_kill_count: 1,
            boss_alive: true,
            boss_health: 100,
            ..RoomState::default()
        };
        local.merge_max(&stale);
        assert!(!local.boss_alive);
    }
}
