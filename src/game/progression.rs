//! Per-player progression and economy
//!
//! Every client keeps its own [`Ledger`]. Nothing here is sent to other
//! peers; it only scales the owning player's damage and survivability.

use std::str::FromStr;

use rand::Rng;
use smallvec::SmallVec;
use thiserror::Error;

use super::constants::{airdrop, player, progression as tune};
use super::enemy::{EnemyKind, EnemyTier};
use super::weapons::{Loadout, WeaponKind, UNIQUE_DROPS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShopError {
    #[error("not enough coins: need {needed}, have {have}")]
    InsufficientCoins { needed: u32, have: u32 },
    #[error("{0:?} already owned")]
    AlreadyOwned(WeaponKind),
    #[error("crit chance already at cap")]
    CritCapped,
    #[error("unknown shop item: {0}")]
    UnknownItem(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShopItem {
    Weapon(WeaponKind),
    /// Heals 30% of max health
    HealthPack,
    /// +20 max health
    MaxHpUp,
    MagUp,
    SpeedUp,
    CritUp,
    DamageUp,
    FireRateUp,
}

impl ShopItem {
    pub fn price(self) -> u32 {
        match self {
            ShopItem::Weapon(kind) => kind.spec().price,
            ShopItem::HealthPack => 30,
            ShopItem::MaxHpUp => 100,
            ShopItem::MagUp => 150,
            ShopItem::SpeedUp => 200,
            ShopItem::CritUp => 250,
            ShopItem::DamageUp => 200,
            ShopItem::FireRateUp => 200,
        }
    }
}

impl FromStr for ShopItem {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let item = match s.trim().to_ascii_lowercase().as_str() {
            "minigun" => ShopItem::Weapon(WeaponKind::Minigun),
            "shotgun" => ShopItem::Weapon(WeaponKind::Shotgun),
            "revolver" => ShopItem::Weapon(WeaponKind::Revolver),
            "glock" => ShopItem::Weapon(WeaponKind::Glock),
            "axe" => ShopItem::Weapon(WeaponKind::Axe),
            "healthpack" => ShopItem::HealthPack,
            "maxhpup" => ShopItem::MaxHpUp,
            "magup" => ShopItem::MagUp,
            "speedup" => ShopItem::SpeedUp,
            "critup" => ShopItem::CritUp,
            "damageup" => ShopItem::DamageUp,
            "firerateup" => ShopItem::FireRateUp,
            other => return Err(ShopError::UnknownItem(other.to_string())),
        };
        Ok(item)
    }
}

/// What a successful purchase changed outside the ledger
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Purchase {
    Weapon(WeaponKind),
    /// Fraction of max health to restore
    Heal(f32),
    MaxHealth(u32),
    Upgrade,
}

/// Purchased multipliers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Upgrades {
    pub damage: f32,
    pub fire_rate: f32,
    pub magazine: f32,
    pub speed: f32,
    pub crit_chance: f32,
}

impl Default for Upgrades {
    fn default() -> Self {
        Self {
            damage: 1.0,
            fire_rate: 1.0,
            magazine: 1.0,
            speed: 1.0,
            crit_chance: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KillReward {
    pub coins: u32,
    pub xp: u32,
    pub levels_gained: u32,
    pub drop: Option<WeaponKind>,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    pub coins: u32,
    pub level: u32,
    /// XP into the current level
    pub xp: u32,
    pub upgrades: Upgrades,
    purchased_hp: u32,
    streak: u32,
    last_kill_at: Option<f64>,
    coin_event_until: Option<f64>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// XP needed to go from `level` to `level + 1`
pub fn xp_to_next(level: u32) -> u32 {
    let raw = tune::XP_BASE * tune::XP_GROWTH.powi(level.max(1) as i32 - 1);
    (raw + 1e-9).floor() as u32
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            coins: 0,
            level: 1,
            xp: 0,
            upgrades: Upgrades::default(),
            purchased_hp: 0,
            streak: 0,
            last_kill_at: None,
            coin_event_until: None,
        }
    }

    pub fn damage_multiplier(&self) -> f32 {
        (1.0 + tune::DAMAGE_PER_LEVEL * (self.level - 1) as f32) * self.upgrades.damage
    }

    pub fn max_health(&self) -> f32 {
        (player::BASE_HEALTH + tune::HEALTH_PER_LEVEL * (self.level - 1) + self.purchased_hp) as f32
    }

    pub fn combo_streak(&self) -> u32 {
        self.streak
    }

    pub fn coin_multiplier(&self, now: f64) -> u32 {
        match self.coin_event_until {
            Some(until) if now < until => airdrop::COIN_EVENT_MULTIPLIER,
            _ => 1,
        }
    }

    pub fn start_coin_event(&mut self, now: f64) {
        self.coin_event_until = Some(now + airdrop::COIN_EVENT_SECS as f64);
    }

    pub fn add_coins(&mut self, amount: u32) {
        self.coins = self.coins.saturating_add(amount);
    }

    /// Add XP, carrying surplus across as many level-ups as it covers
    pub fn add_xp(&mut self, amount: u32) -> u32 {
        self.xp += amount;
        let mut gained = 0;
        while self.xp >= xp_to_next(self.level) {
            self.xp -= xp_to_next(self.level);
            self.level += 1;
            gained += 1;
        }
        gained
    }

    /// Credit a kill this client initiated
    pub fn award_kill<R: Rng + ?Sized>(
        &mut self,
        kind: EnemyKind,
        now: f64,
        owned: &[WeaponKind],
        rng: &mut R,
    ) -> KillReward {
        let within_window = self
            .last_kill_at
            .is_some_and(|last| now - last <= tune::COMBO_WINDOW_SECS as f64);
        self.streak = if within_window { self.streak + 1 } else { 1 };
        self.last_kill_at = Some(now);

        let base = kind.base();
        let coins = base.coins * self.coin_multiplier(now);
        let bonus_steps = (self.streak - 1).min(tune::COMBO_MAX_STEPS);
        let xp = (base.xp as f64 * (1.0 + tune::COMBO_XP_STEP * bonus_steps as f64) + 1e-9).floor() as u32;

        self.add_coins(coins);
        let levels_gained = self.add_xp(xp);
        let drop = roll_drop(kind.tier(), owned, rng);

        KillReward {
            coins,
            xp,
            levels_gained,
            drop,
        }
    }

    /// Roll a crit on an outgoing hit
    pub fn roll_crit<R: Rng + ?Sized>(&self, damage: f32, rng: &mut R) -> (f32, bool) {
        if self.upgrades.crit_chance > 0.0 && rng.gen::<f32>() < self.upgrades.crit_chance {
            (damage * tune::CRIT_MULTIPLIER, true)
        } else {
            (damage, false)
        }
    }

    /// Spend coins; on error nothing changes
    pub fn buy(&mut self, item: ShopItem, loadout: &mut Loadout) -> Result<Purchase, ShopError> {
        let price = item.price();
        if self.coins < price {
            return Err(ShopError::InsufficientCoins {
                needed: price,
                have: self.coins,
            });
        }
        let purchase = match item {
            ShopItem::Weapon(kind) => {
                if loadout.owns(kind) {
                    return Err(ShopError::AlreadyOwned(kind));
                }
                loadout.equip(kind, self.upgrades.magazine);
                Purchase::Weapon(kind)
            }
            ShopItem::HealthPack => Purchase::Heal(0.3),
            ShopItem::MaxHpUp => {
                self.purchased_hp += 20;
                Purchase::MaxHealth(20)
            }
            ShopItem::MagUp => {
                self.upgrades.magazine += 0.2;
                Purchase::Upgrade
            }
            ShopItem::SpeedUp => {
                self.upgrades.speed += 0.05;
                Purchase::Upgrade
            }
            ShopItem::CritUp => {
                if self.upgrades.crit_chance >= tune::CRIT_CAP - 1e-6 {
                    return Err(ShopError::CritCapped);
                }
                self.upgrades.crit_chance = (self.upgrades.crit_chance + 0.05).min(tune::CRIT_CAP);
                Purchase::Upgrade
            }
            ShopItem::DamageUp => {
                self.upgrades.damage += 0.1;
                Purchase::Upgrade
            }
            ShopItem::FireRateUp => {
                self.upgrades.fire_rate += 0.1;
                Purchase::Upgrade
            }
        };
        self.coins -= price;
        Ok(purchase)
    }
}

fn roll_drop<R: Rng + ?Sized>(tier: EnemyTier, owned: &[WeaponKind], rng: &mut R) -> Option<WeaponKind> {
    let chance = match tier {
        EnemyTier::Normal => return None,
        EnemyTier::Rare => tune::DROP_CHANCE_RARE,
        EnemyTier::Unique => tune::DROP_CHANCE_UNIQUE,
        EnemyTier::Boss => tune::DROP_CHANCE_BOSS,
    };
    if !rng.gen_bool(chance) {
        return None;
    }
    let candidates: SmallVec<[WeaponKind; 2]> = UNIQUE_DROPS
        .iter()
        .copied()
        .filter(|w| !owned.contains(w))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.gen_range(0..candidates.len())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_xp_curve() {
        assert_eq!(xp_to_next(1), 100);
        assert_eq!(xp_to_next(2), 160);
        assert_eq!(xp_to_next(3), 256);
        assert_eq!(xp_to_next(4), 409);
    }

    #[test]
    fn test_multi_level_with_carry() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.add_xp(270), 2);
        assert_eq!(ledger.level, 3);
        assert_eq!(ledger.xp, 10);
    }

    #[test]
    fn test_derived_stats_follow_level() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.max_health(), 100.0);
        ledger.add_xp(100);
        assert!((ledger.damage_multiplier() - 1.1).abs() < 1e-6);
        assert_eq!(ledger.max_health(), 110.0);
    }

    #[test]
    fn test_combo_boosts_xp() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ledger = Ledger::new();
        // Colossus: 12 xp
        let first = ledger.award_kill(EnemyKind::Normal, 0.0, &[], &mut rng);
        assert_eq!(first.xp, 1);
        let r = ledger.award_kill(EnemyKind::Colossus, 1.0, &[], &mut rng);
        assert_eq!(ledger.combo_streak(), 2);
        assert_eq!(r.xp, 13);

        // Window lapsed
        let r = ledger.award_kill(EnemyKind::Colossus, 10.0, &[], &mut rng);
        assert_eq!(ledger.combo_streak(), 1);
        assert_eq!(r.xp, 12);
    }

    #[test]
    fn test_coin_event_doubles_kill_coins() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ledger = Ledger::new();
        ledger.start_coin_event(0.0);
        let r = ledger.award_kill(EnemyKind::Normal, 5.0, &[], &mut rng);
        assert_eq!(r.coins, 20);
        let r = ledger.award_kill(EnemyKind::Normal, 100.0, &[], &mut rng);
        assert_eq!(r.coins, 10);
        assert_eq!(ledger.coins, 30);
    }

    #[test]
    fn test_normal_tier_never_drops() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            assert!(roll_drop(EnemyTier::Normal, &[], &mut rng).is_none());
        }
        let drops = (0..1000)
            .filter_map(|_| roll_drop(EnemyTier::Boss, &[], &mut rng))
            .count();
        assert!(drops > 200 && drops < 400);
    }

    #[test]
    fn test_drop_skips_owned_uniques() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            assert!(roll_drop(EnemyTier::Boss, &UNIQUE_DROPS, &mut rng).is_none());
            if let Some(w) = roll_drop(EnemyTier::Boss, &[WeaponKind::Railgun], &mut rng) {
                assert_eq!(w, WeaponKind::PlasmaGun);
            }
        }
    }

    #[test]
    fn test_buy_requires_coins() {
        let mut ledger = Ledger::new();
        let mut loadout = Loadout::new();
        ledger.coins = 100;
        let err = ledger
            .buy(ShopItem::Weapon(WeaponKind::Minigun), &mut loadout)
            .unwrap_err();
        assert_eq!(err, ShopError::InsufficientCoins { needed: 300, have: 100 });
        assert_eq!(ledger.coins, 100);
        assert!(!loadout.owns(WeaponKind::Minigun));
    }

    #[test]
    fn test_buy_weapon_equips_and_rejects_duplicate() {
        let mut ledger = Ledger::new();
        let mut loadout = Loadout::new();
        ledger.coins = 500;
        assert_eq!(
            ledger.buy(ShopItem::Weapon(WeaponKind::Glock), &mut loadout),
            Ok(Purchase::Weapon(WeaponKind::Glock))
        );
        assert_eq!(loadout.weapon_in(1), Some(WeaponKind::Glock));
        assert_eq!(ledger.coins, 350);
        assert_eq!(
            ledger.buy(ShopItem::Weapon(WeaponKind::Glock), &mut loadout),
            Err(ShopError::AlreadyOwned(WeaponKind::Glock))
        );
        assert_eq!(ledger.coins, 350);
    }

    #[test]
    fn test_crit_caps_at_half() {
        let mut ledger = Ledger::new();
        let mut loadout = Loadout::new();
        ledger.coins = 10_000;
        for _ in 0..10 {
            ledger.buy(ShopItem::CritUp, &mut loadout).unwrap();
        }
        assert!((ledger.upgrades.crit_chance - 0.5).abs() < 1e-5);
        assert_eq!(ledger.buy(ShopItem::CritUp, &mut loadout), Err(ShopError::CritCapped));
    }

    #[test]
    fn test_max_hp_purchase() {
        let mut ledger = Ledger::new();
        let mut loadout = Loadout::new();
        ledger.coins = 100;
        assert_eq!(ledger.buy(ShopItem::MaxHpUp, &mut loadout), Ok(Purchase::MaxHealth(20)));
        assert_eq!(ledger.max_health(), 120.0);
        assert_eq!(ledger.coins, 0);
    }

    #[test]
    fn test_parse_items() {
        assert_eq!("Shotgun".parse::<ShopItem>(), Ok(ShopItem::Weapon(WeaponKind::Shotgun)));
        assert_eq!(" healthpack ".parse::<ShopItem>(), Ok(ShopItem::HealthPack));
        assert!(matches!("railgun".parse::<ShopItem>(), Err(ShopError::UnknownItem(_))));
    }
}
