//! Weapon table and the local player's loadout
//!
//! Reload timing lives in the session scheduler; the loadout only tracks
//! whether a reload is in flight and which token completes it.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::scheduler::TaskToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    BasicGun,
    Minigun,
    Shotgun,
    Revolver,
    Glock,
    Knife,
    Axe,
    Railgun,
    PlasmaGun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponClass {
    Gun,
    Melee,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponSpec {
    pub damage: f32,
    pub headshot_mul: f32,
    /// Minimum time between shots
    pub fire_interval_ms: u32,
    /// `None` for melee (never runs dry)
    pub magazine: Option<u32>,
    pub reload_ms: u32,
    pub range: f32,
    pub slot: usize,
    pub price: u32,
    pub class: WeaponClass,
    pub unique: bool,
}

pub const SLOT_COUNT: usize = 4;

/// Boss-tier drops, always placed in the last slot
pub const UNIQUE_DROPS: [WeaponKind; 2] = [WeaponKind::Railgun, WeaponKind::PlasmaGun];

impl WeaponKind {
    pub fn spec(self) -> WeaponSpec {
        use WeaponClass::{Gun, Melee};
        // damage, headshot, interval, magazine, reload, range, slot, price, class, unique
        let (damage, headshot_mul, fire_interval_ms, magazine, reload_ms, range, slot, price, class, unique) =
            match self {
                WeaponKind::BasicGun => (10.0, 2.0, 167, Some(40), 2000, 200.0, 0, 0, Gun, false),
                WeaponKind::Minigun => (8.0, 1.5, 125, Some(60), 3500, 150.0, 0, 300, Gun, false),
                WeaponKind::Shotgun => (50.0, 1.5, 833, Some(10), 2500, 50.0, 0, 250, Gun, false),
                WeaponKind::Revolver => (35.0, 3.0, 500, Some(8), 2000, 180.0, 1, 200, Gun, false),
                WeaponKind::Glock => (15.0, 2.0, 250, Some(15), 1500, 120.0, 1, 150, Gun, false),
                WeaponKind::Knife => (30.0, 1.5, 400, None, 0, 4.0, 2, 0, Melee, false),
                WeaponKind::Axe => (90.0, 1.5, 1250, None, 0, 4.5, 2, 400, Melee, false),
                WeaponKind::Railgun => (25.0, 2.5, 333, Some(60), 0, 500.0, 3, 0, Gun, true),
                WeaponKind::PlasmaGun => (18.0, 2.0, 167, Some(80), 0, 250.0, 3, 0, Gun, true),
            };
        WeaponSpec {
            damage,
            headshot_mul,
            fire_interval_ms,
            magazine,
            reload_ms,
            range,
            slot,
            price,
            class,
            unique,
        }
    }

    /// Damage of one hit before the shooter's own multipliers
    pub fn hit_damage(self, headshot: bool) -> f32 {
        let spec = self.spec();
        if headshot {
            spec.damage * spec.headshot_mul
        } else {
            spec.damage
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireResult {
    Fired,
    /// Still inside the fire interval
    Cooling,
    Reloading,
    /// Magazine ran dry with this shot; caller must start a reload
    FiredEmpty,
    Empty,
    NoWeapon,
}

#[derive(Debug, Clone)]
struct SlotState {
    kind: WeaponKind,
    ammo: Option<u32>,
}

/// The local player's four weapon slots
#[derive(Debug, Clone)]
pub struct Loadout {
    slots: [Option<SlotState>; SLOT_COUNT],
    active: usize,
    last_shot_at: Option<f64>,
    reload: Option<TaskToken>,
    owned: SmallVec<[WeaponKind; 8]>,
}

impl Default for Loadout {
    fn default() -> Self {
        Self::new()
    }
}

impl Loadout {
    pub fn new() -> Self {
        let mut loadout = Self {
            slots: [None, None, None, None],
            active: 0,
            last_shot_at: None,
            reload: None,
            owned: SmallVec::new(),
        };
        loadout.equip(WeaponKind::BasicGun, 1.0);
        loadout.equip(WeaponKind::Knife, 1.0);
        loadout
    }

    pub fn active_slot(&self) -> usize {
        self.active
    }

    pub fn active_weapon(&self) -> Option<WeaponKind> {
        self.slots[self.active].as_ref().map(|s| s.kind)
    }

    pub fn weapon_in(&self, slot: usize) -> Option<WeaponKind> {
        self.slots.get(slot)?.as_ref().map(|s| s.kind)
    }

    pub fn ammo(&self) -> Option<u32> {
        self.slots[self.active].as_ref().and_then(|s| s.ammo)
    }

    pub fn owns(&self, kind: WeaponKind) -> bool {
        self.owned.contains(&kind)
    }

    pub fn owned(&self) -> &[WeaponKind] {
        &self.owned
    }

    pub fn is_reloading(&self) -> bool {
        self.reload.is_some()
    }

    /// Put `kind` in its slot with a full magazine (scaled by the magazine upgrade)
    pub fn equip(&mut self, kind: WeaponKind, magazine_mult: f32) {
        let spec = kind.spec();
        self.slots[spec.slot] = Some(SlotState {
            kind,
            ammo: spec.magazine.map(|m| scaled_magazine(m, magazine_mult)),
        });
        if !self.owned.contains(&kind) {
            self.owned.push(kind);
        }
    }

    /// Switch the active slot; returns the reload token to cancel, if any
    pub fn switch(&mut self, slot: usize) -> Option<TaskToken> {
        if slot >= SLOT_COUNT || slot == self.active || self.slots[slot].is_none() {
            return None;
        }
        self.active = slot;
        self.reload.take()
    }

    pub fn try_fire(&mut self, now: f64, fire_rate_mult: f32) -> FireResult {
        if self.reload.is_some() {
            return FireResult::Reloading;
        }
        let Some(slot) = self.slots[self.active].as_mut() else {
            return FireResult::NoWeapon;
        };
        let spec = slot.kind.spec();
        let interval = spec.fire_interval_ms as f64 / 1000.0 / fire_rate_mult.max(0.1) as f64;
        if let Some(last) = self.last_shot_at {
            if now - last < interval {
                return FireResult::Cooling;
            }
        }
        match slot.ammo.as_mut() {
            None => {
                self.last_shot_at = Some(now);
                FireResult::Fired
            }
            Some(0) => FireResult::Empty,
            Some(ammo) => {
                *ammo -= 1;
                self.last_shot_at = Some(now);
                if *ammo == 0 {
                    FireResult::FiredEmpty
                } else {
                    FireResult::Fired
                }
            }
        }
    }

    /// Reload duration for the active weapon, or `None` when nothing to do
    pub fn reload_needed(&self, magazine_mult: f32) -> Option<f32> {
        if self.reload.is_some() {
            return None;
        }
        let slot = self.slots[self.active].as_ref()?;
        let spec = slot.kind.spec();
        let full = scaled_magazine(spec.magazine?, magazine_mult);
        match slot.ammo {
            Some(ammo) if ammo < full => Some(spec.reload_ms as f32 / 1000.0),
            _ => None,
        }
    }

    pub fn begin_reload(&mut self, token: TaskToken) {
        self.reload = Some(token);
    }

    /// Complete a reload; stale tokens (from a cancelled reload) are ignored
    pub fn finish_reload(&mut self, token: TaskToken, magazine_mult: f32) -> bool {
        if self.reload != Some(token) {
            return false;
        }
        self.reload = None;
        if let Some(slot) = self.slots[self.active].as_mut() {
            if let Some(mag) = slot.kind.spec().magazine {
                slot.ammo = Some(scaled_magazine(mag, magazine_mult));
            }
        }
        true
    }

    /// Fill every magazine (airdrop pickup)
    pub fn refill_all(&mut self, magazine_mult: f32) {
        for slot in self.slots.iter_mut().flatten() {
            if let Some(mag) = slot.kind.spec().magazine {
                slot.ammo = Some(scaled_magazine(mag, magazine_mult));
            }
        }
    }
}

fn scaled_magazine(base: u32, mult: f32) -> u32 {
    ((base as f32 * mult).floor() as u32).max(1)
}
