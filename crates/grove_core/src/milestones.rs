//! Milestone and prestige ledger.
//!
//! A milestone ("harvest") completes when the resource balance reaches the
//! in-season requirement. Milestones award prestige points, which are
//! credited when the player prestiges into the next season. Prestige points
//! buy milestone upgrades, which survive every reset.
//!
//! `total_milestones_completed` and `total_prestige_points` never decrease.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::data::{MilestoneData, UpgradeData, UpgradeOwner};
use crate::ids::UpgradeId;
use crate::math::{decimal_ceil_u64, decimal_floor_u64, decimal_powi, BigNum};
use crate::views::{ModifierView, ProducerView};

/// Per-season increments of the season-completion requirement, by bracket.
///
/// Each entry is `(last season of the bracket, increment)`.
const SEASON_BRACKETS: [(u32, Decimal); 6] = [
    (100, Decimal::from_parts(95, 0, 0, false, 2)),
    (150, Decimal::from_parts(135, 0, 0, false, 2)),
    (200, Decimal::from_parts(195, 0, 0, false, 2)),
    (250, Decimal::from_parts(255, 0, 0, false, 2)),
    (300, Decimal::from_parts(325, 0, 0, false, 2)),
    (u32::MAX, Decimal::from_parts(405, 0, 0, false, 2)),
];

/// Milestones needed to finish season 1.
const SEASON_BASE_REQUIREMENT: u32 = 3;

/// Milestones a season needs before prestige is allowed.
///
/// A running base of 3, plus the bracket increment of every season after the
/// first, rounded up.
#[must_use]
pub fn season_requirement(season: u32) -> u64 {
    let mut total = Decimal::from(SEASON_BASE_REQUIREMENT);
    let mut lower = 1_u32;
    for (upper, increment) in SEASON_BRACKETS {
        if season <= lower {
            break;
        }
        let seasons = season.min(upper) - lower;
        total += increment * Decimal::from(seasons);
        lower = upper;
    }
    decimal_ceil_u64(total)
}

/// One completed milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    /// Requirement that was met.
    pub requirement: BigNum,
    /// Prestige points awarded on the next prestige.
    pub points: u64,
    /// Season the milestone was completed in.
    pub season: u32,
    /// Step of the season at completion.
    pub step: u64,
}

/// Long-run meta-progression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneLedger {
    /// Current season, starting at 1.
    pub season: u32,
    /// Spendable prestige points.
    pub prestige_points: u64,
    /// Every prestige point ever earned.
    pub total_prestige_points: u64,
    /// Every milestone ever completed.
    pub total_milestones_completed: u64,
    /// Milestones completed this season.
    pub milestones_this_season: u64,
    /// Drives the in-season requirement curve.
    pub season_milestone_counter: u64,
    /// Milestones completed this season, oldest first.
    pub history: Vec<MilestoneRecord>,
    /// Milestone upgrade levels. Absent means zero.
    pub upgrades: BTreeMap<UpgradeId, u32>,
    requirement_multiplier: Decimal,
    points_multiplier: Decimal,
    starting_resource_level: u32,
}

impl Default for MilestoneLedger {
    fn default() -> Self {
        Self {
            season: 1,
            prestige_points: 0,
            total_prestige_points: 0,
            total_milestones_completed: 0,
            milestones_this_season: 0,
            season_milestone_counter: 0,
            history: Vec::new(),
            upgrades: BTreeMap::new(),
            requirement_multiplier: Decimal::ONE,
            points_multiplier: Decimal::ONE,
            starting_resource_level: 0,
        }
    }
}

impl MilestoneLedger {
    /// Season 1 with nothing earned.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requirement of the next milestone this season.
    ///
    /// `base × season_growth^(season − 1) × growth^counter × multiplier`, with
    /// the multiplier floored at the catalog minimum.
    #[must_use]
    pub fn requirement(&self, data: &MilestoneData) -> BigNum {
        let season_base = data.base_requirement
            * BigNum::from_decimal(data.season_growth).powi(u64::from(self.season.saturating_sub(1)));
        let curve = BigNum::from_decimal(data.growth).powi(self.season_milestone_counter);
        let multiplier = self.requirement_multiplier.max(data.requirement_floor);
        (season_base * curve).scale(multiplier)
    }

    /// Points one milestone awards at the current multipliers.
    #[must_use]
    pub fn points_per_milestone(&self, data: &MilestoneData) -> u64 {
        let points = Decimal::from(data.base_points)
            .checked_mul(self.points_multiplier)
            .unwrap_or(Decimal::MAX);
        decimal_floor_u64(points)
    }

    /// Complete at most one milestone if the balance meets the requirement.
    ///
    /// The balance is compared, not spent.
    pub fn settle(
        &mut self,
        data: &MilestoneData,
        producers: &impl ProducerView,
        step: u64,
    ) -> Option<MilestoneRecord> {
        let requirement = self.requirement(data);
        if producers.resource() < requirement {
            return None;
        }
        let record = MilestoneRecord {
            requirement,
            points: self.points_per_milestone(data),
            season: self.season,
            step,
        };
        self.history.push(record);
        self.total_milestones_completed = self.total_milestones_completed.saturating_add(1);
        self.milestones_this_season = self.milestones_this_season.saturating_add(1);
        self.season_milestone_counter = self.season_milestone_counter.saturating_add(1);
        tracing::debug!(
            season = self.season,
            milestone = self.milestones_this_season,
            requirement = %requirement,
            points = record.points,
            "Milestone completed"
        );
        Some(record)
    }

    /// Milestones the current season needs before prestige.
    #[must_use]
    pub fn season_requirement(&self) -> u64 {
        season_requirement(self.season)
    }

    /// Check if the current season is complete.
    #[must_use]
    pub fn can_prestige(&self) -> bool {
        self.milestones_this_season >= self.season_requirement()
    }

    /// Credit the season's points and move to the next season.
    ///
    /// Returns the points gained, or `None` if the season is not complete.
    /// Only this ledger's counters change; the caller resets the run.
    pub fn prestige(&mut self) -> Option<u64> {
        if !self.can_prestige() {
            return None;
        }
        let gained = self
            .history
            .iter()
            .filter(|r| r.season == self.season)
            .fold(0_u64, |acc, r| acc.saturating_add(r.points));
        self.prestige_points = self.prestige_points.saturating_add(gained);
        self.total_prestige_points = self.total_prestige_points.saturating_add(gained);
        self.season = self.season.saturating_add(1);
        self.milestones_this_season = 0;
        self.season_milestone_counter = 0;
        self.history.clear();
        Some(gained)
    }

    /// Resource every new season starts with: `10^level`, or zero.
    #[must_use]
    pub fn starting_resource(&self) -> BigNum {
        if self.starting_resource_level == 0 {
            BigNum::ZERO
        } else {
            BigNum::from_parts(Decimal::ONE, i64::from(self.starting_resource_level))
        }
    }

    /// Level of a milestone upgrade.
    #[must_use]
    pub fn upgrade_level(&self, upgrade: UpgradeId) -> u32 {
        self.upgrades.get(&upgrade).copied().unwrap_or(0)
    }

    /// Prestige-point price of the next level of a milestone upgrade.
    #[must_use]
    pub fn upgrade_cost(&self, upgrade: &UpgradeData) -> u64 {
        let level = self.upgrade_level(upgrade.id);
        let growth = decimal_powi(upgrade.cost.growth, u64::from(level));
        let cost = Decimal::from(upgrade.cost.base)
            .checked_mul(growth)
            .unwrap_or(Decimal::MAX);
        decimal_ceil_u64(cost)
    }

    /// Spend prestige points on the next level of a milestone upgrade.
    pub fn buy_upgrade(&mut self, catalog: &Catalog, upgrade: UpgradeId) -> bool {
        let Some(data) = catalog.upgrade(upgrade) else {
            return false;
        };
        if data.owner != UpgradeOwner::Milestones {
            return false;
        }
        let level = self.upgrade_level(upgrade);
        if !data.below_max(level) {
            return false;
        }
        if let Some(condition) = data.unlock {
            if self.upgrade_level(condition.upgrade) < condition.level {
                return false;
            }
        }
        let cost = self.upgrade_cost(data);
        if self.prestige_points < cost {
            return false;
        }
        self.prestige_points -= cost;
        self.upgrades.insert(upgrade, level + 1);
        tracing::debug!(upgrade = %upgrade, level = level + 1, cost, "Milestone upgrade bought");
        true
    }

    /// Every milestone upgrade level.
    pub fn upgrade_levels(&self) -> impl Iterator<Item = (UpgradeId, u32)> + '_ {
        self.upgrades.iter().map(|(&id, &level)| (id, level))
    }

    /// Take the scalars published by the composer.
    pub fn apply_modifiers(&mut self, modifiers: &impl ModifierView) {
        self.requirement_multiplier = modifiers.milestone_requirement_multiplier();
        self.points_multiplier = modifiers.milestone_points_multiplier();
        self.starting_resource_level = modifiers.starting_resource_level();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support;
    use crate::effects::compose;
    use crate::ids::ProducerId;

    struct Balance(BigNum);

    impl ProducerView for Balance {
        fn resource(&self) -> BigNum {
            self.0
        }

        fn total_owned(&self, _producer: ProducerId) -> BigNum {
            BigNum::ZERO
        }

        fn manually_purchased(&self, _producer: ProducerId) -> u64 {
            0
        }
    }

    fn balance(n: u64) -> Balance {
        Balance(BigNum::from(n))
    }

    #[test]
    fn test_season_requirement_curve() {
        assert_eq!(season_requirement(1), 3);
        assert_eq!(season_requirement(2), 4);
        // 3 + 0.95 × 99 = 97.05
        assert_eq!(season_requirement(100), 98);
        // 97.05 + 1.35
        assert_eq!(season_requirement(101), 99);
        // 97.05 + 67.5 + 97.5 + 127.5 + 162.5 + 4.05
        assert_eq!(season_requirement(301), 557);
    }

    #[test]
    fn test_first_requirement_is_base() {
        let catalog = test_support::catalog();
        let ledger = MilestoneLedger::new();
        assert_eq!(ledger.requirement(catalog.milestones()), BigNum::from(1000_u64));
    }

    #[test]
    fn test_requirement_curve() {
        let catalog = test_support::catalog();
        let mut ledger = MilestoneLedger::new();
        ledger.season_milestone_counter = 2;
        assert_eq!(ledger.requirement(catalog.milestones()), BigNum::from(2250_u64));
        ledger.season = 3;
        assert_eq!(ledger.requirement(catalog.milestones()), BigNum::from(9000_u64));
    }

    #[test]
    fn test_requirement_multiplier_floor() {
        let catalog = test_support::catalog();
        let almanac = catalog.upgrade(UpgradeId(103)).unwrap();
        let mut ledger = MilestoneLedger::new();
        ledger.apply_modifiers(&compose([(almanac, 1)]));
        assert_eq!(ledger.requirement(catalog.milestones()), BigNum::from(500_u64));

        // 0.5^10 is below the 3.125% floor
        ledger.apply_modifiers(&compose([(almanac, 10)]));
        assert_eq!(ledger.requirement(catalog.milestones()), BigNum::from_decimal(Decimal::new(3125, 2)));
    }

    #[test]
    fn test_settle_one_milestone_at_a_time() {
        let catalog = test_support::catalog();
        let data = catalog.milestones();
        let mut ledger = MilestoneLedger::new();

        assert!(ledger.settle(data, &balance(999), 1).is_none());
        let record = ledger.settle(data, &balance(1_000_000), 2).unwrap();
        assert_eq!(record.requirement, BigNum::from(1000_u64));
        assert_eq!(record.points, 1);
        assert_eq!(ledger.total_milestones_completed, 1);
        assert_eq!(ledger.milestones_this_season, 1);
        assert_eq!(ledger.season_milestone_counter, 1);
        assert_eq!(ledger.history.len(), 1);
    }

    #[test]
    fn test_prestige_gate_and_credit() {
        let catalog = test_support::catalog();
        let data = catalog.milestones();
        let mut ledger = MilestoneLedger::new();
        for step in 0..2 {
            ledger.settle(data, &balance(1_000_000), step);
        }
        assert!(!ledger.can_prestige());
        assert_eq!(ledger.prestige(), None);

        ledger.settle(data, &balance(1_000_000), 3);
        assert_eq!(ledger.prestige(), Some(3));
        assert_eq!(ledger.season, 2);
        assert_eq!(ledger.prestige_points, 3);
        assert_eq!(ledger.total_prestige_points, 3);
        assert_eq!(ledger.total_milestones_completed, 3);
        assert_eq!(ledger.milestones_this_season, 0);
        assert!(ledger.history.is_empty());
        assert_eq!(ledger.season_requirement(), 4);
    }

    #[test]
    fn test_points_multiplier() {
        let catalog = test_support::catalog();
        let almanac = catalog.upgrade(UpgradeId(103)).unwrap();
        let mut ledger = MilestoneLedger::new();
        ledger.apply_modifiers(&compose([(almanac, 2)]));
        // (1 + 2) × 1
        assert_eq!(ledger.points_per_milestone(catalog.milestones()), 3);
    }

    #[test]
    fn test_upgrade_purchase_and_cost_growth() {
        let catalog = test_support::catalog();
        let vault = UpgradeId(100);
        let mut ledger = MilestoneLedger::new();
        ledger.prestige_points = 4;

        let data = catalog.upgrade(vault).unwrap();
        assert_eq!(ledger.upgrade_cost(data), 1);
        assert!(ledger.buy_upgrade(&catalog, vault));
        assert_eq!(ledger.upgrade_cost(data), 2);
        assert!(ledger.buy_upgrade(&catalog, vault));
        assert_eq!(ledger.prestige_points, 1);
        assert!(!ledger.buy_upgrade(&catalog, vault));

        // Unit upgrades cannot be bought here
        assert!(!ledger.buy_upgrade(&catalog, UpgradeId(1)));
        // Almanac requires Rich Soil
        assert!(!ledger.buy_upgrade(&catalog, UpgradeId(103)));
        assert!(ledger.buy_upgrade(&catalog, UpgradeId(101)));
        assert_eq!(ledger.total_prestige_points, 0);
    }

    #[test]
    fn test_starting_resource() {
        let catalog = test_support::catalog();
        let vault = catalog.upgrade(UpgradeId(100)).unwrap();
        let mut ledger = MilestoneLedger::new();
        assert_eq!(ledger.starting_resource(), BigNum::ZERO);
        ledger.apply_modifiers(&compose([(vault, 3)]));
        assert_eq!(ledger.starting_resource(), BigNum::from(1000_u64));
    }
}
