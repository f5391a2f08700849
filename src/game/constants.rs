/// Network and framing constants
pub mod net {
    /// Maximum framed message size (bytes)
    pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;
    /// Enemy snapshot broadcast rate in Hz (host only)
    pub const SNAPSHOT_RATE_HZ: u32 = 10;
    /// Outbound `player:move` rate limit in Hz
    pub const MOVE_RATE_HZ: u32 = 20;
    /// Window after scene start before a peer with no host assignment goes solo
    pub const SOLO_FALLBACK_SECS: f32 = 2.0;
    /// Simulation ticks per second driving the scheduler
    pub const SCHEDULER_TICK_RATE: u32 = 60;
    /// Seconds per scheduler tick
    pub const SCHEDULER_DT: f32 = 1.0 / SCHEDULER_TICK_RATE as f32;
}

/// Per-enemy state machine constants
pub mod npc {
    pub const DETECT_RANGE: f32 = 30.0;
    pub const ATTACK_RANGE: f32 = 3.0;
    /// Patrol wander radius around the spawn point
    pub const PATROL_RADIUS: f32 = 15.0;
    pub const PATROL_REPICK_MIN_SECS: f32 = 3.0;
    pub const PATROL_REPICK_MAX_SECS: f32 = 7.0;
    /// Fraction of full speed used while patrolling
    pub const PATROL_SPEED_FACTOR: f32 = 0.5;
    pub const ATTACK_COOLDOWN_SECS: f32 = 1.5;
    pub const BOSS_ATTACK_COOLDOWN_SECS: f32 = 0.8;
    /// Delay before a dead non-boss enemy respawns
    pub const RESPAWN_SECS: f32 = 10.0;
    /// Distance at which a patrol waypoint counts as reached
    pub const WAYPOINT_EPSILON: f32 = 0.5;
}

/// Pack-alerting constants
pub mod aggro {
    /// Aggro applied to the damaged enemy
    pub const SELF_SECS: f32 = 8.0;
    /// Aggro applied to nearby allies that aren't already aggroed
    pub const ALLY_SECS: f32 = 5.0;
    pub const ALLY_RADIUS: f32 = 15.0;
}

/// Boss lifecycle constants
pub mod boss {
    /// A boss is queued on every Nth room kill while none is alive
    pub const KILL_INTERVAL: u32 = 25;
    /// Warning countdown between the trigger and the spawn
    pub const WARNING_SECS: f32 = 3.0;
    /// Boss level offset over the room zombie level
    pub const LEVEL_OFFSET: u32 = 2;
    /// Exponential max-health growth per boss already killed
    pub const HEALTH_GROWTH: f64 = 1.4;
    pub const SPAWN_X: f32 = 0.0;
    pub const SPAWN_Z: f32 = -60.0;
}

/// Per-level multiplicative stat scaling
pub mod scaling {
    pub const HEALTH_PER_LEVEL: f64 = 0.10;
    pub const DAMAGE_PER_LEVEL: f64 = 0.08;
    pub const SPEED_PER_LEVEL: f64 = 0.03;
    /// Guards `floor` against representation error (50 * 1.1 = 55.000000000000007 or 54.99...)
    pub const FLOOR_EPSILON: f64 = 1e-9;
}

/// World layout
pub mod spawn {
    /// Fixed enemy spawn points; the initial horde is one enemy per point
    pub const POINTS: [(f32, f32); 8] = [
        (30.0, 30.0),
        (-30.0, 30.0),
        (30.0, -30.0),
        (-30.0, -30.0),
        (0.0, 40.0),
        (0.0, -40.0),
        (40.0, 0.0),
        (-40.0, 0.0),
    ];
    /// No-entry circle around the origin that enemies never cross
    pub const SAFE_ZONE_RADIUS: f32 = 8.0;
    /// Half extent of the square play area
    pub const WORLD_HALF_EXTENT: f32 = 100.0;
    /// Kill totals at which the type-roll table shifts
    pub const RARE_UNLOCK_KILLS: u32 = 100;
    pub const UNIQUE_UNLOCK_KILLS: u32 = 200;
    /// Upper bound on enemy ids accepted from a mirrored snapshot
    pub const MAX_ENEMIES: usize = 1024;
}

/// Per-player progression and economy
pub mod progression {
    pub const XP_BASE: f64 = 100.0;
    pub const XP_GROWTH: f64 = 1.6;
    pub const DAMAGE_PER_LEVEL: f32 = 0.1;
    pub const HEALTH_PER_LEVEL: u32 = 10;
    /// Seconds after a kill in which the next kill extends the combo
    pub const COMBO_WINDOW_SECS: f32 = 3.0;
    pub const COMBO_XP_STEP: f64 = 0.1;
    pub const COMBO_MAX_STEPS: u32 = 10;
    pub const CRIT_MULTIPLIER: f32 = 2.0;
    pub const CRIT_CAP: f32 = 0.5;
    /// Unique weapon drop chance per enemy tier
    pub const DROP_CHANCE_RARE: f64 = 0.01;
    pub const DROP_CHANCE_UNIQUE: f64 = 0.05;
    pub const DROP_CHANCE_BOSS: f64 = 0.30;
}

/// Local player vitals
pub mod player {
    pub const BASE_HEALTH: u32 = 100;
    /// Ground speed before the speed upgrade (units/s)
    pub const SPEED: f32 = 14.0;
    pub const RESPAWN_SECS: f32 = 3.0;
    /// PvP respawn scatter (units from origin on each axis)
    pub const RESPAWN_SCATTER: f32 = 30.0;
    /// Number of cosmetic team colors assigned round-robin
    pub const TEAM_COLORS: u8 = 8;
}

/// Airdrop crates
pub mod airdrop {
    pub const INTERVAL_SECS: f32 = 90.0;
    /// Drops land within this half extent around the origin
    pub const SCATTER: f32 = 60.0;
    pub const PICKUP_RADIUS: f32 = 3.0;
    pub const COINS: u32 = 50;
    /// A pickup starts a timed coin event on kill rewards
    pub const COIN_EVENT_MULTIPLIER: u32 = 2;
    pub const COIN_EVENT_SECS: f32 = 30.0;
}
