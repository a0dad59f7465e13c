//! Automation ledger: leveling state machines with a point economy.
//!
//! Each unit goes locked → unlocked (level 1) → leveling. By-step units
//! accrue one progress point per step; by-purchase-count units derive their
//! level from the global manual purchase counter, which is why unlocking one
//! late back-fills every level already earned.
//!
//! Every level gained awards one point. Points buy the unit's upgrades, one
//! point per level.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::data::{AutomationUnitData, LevelingMode, UpgradeOwner};
use crate::effects::AutoPurchase;
use crate::ids::{ProducerId, UnitId, UpgradeId};
use crate::math::{decimal_floor_u64, decimal_powi, ratio, BigNum, Fixed};
use crate::views::{CounterView, ModifierView};

/// A unit gained one or more levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUp {
    /// Unit that leveled.
    pub unit: UnitId,
    /// Level reached.
    pub level: u32,
    /// Points awarded.
    pub points: u64,
}

/// Run state of one automation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitState {
    /// Unit id.
    pub id: UnitId,
    /// Whether the unit has been unlocked this run.
    pub unlocked: bool,
    /// Current level, starting at 1.
    pub level: u32,
    /// Unspent points.
    pub points: u64,
    /// Steps toward the next level (by-step), or purchases past the last
    /// level boundary (by-purchase-count).
    pub progress: u64,
    /// Fractional auto-purchase credit carried between steps.
    pub purchase_credit: Decimal,
    /// Levels of this unit's upgrades. Absent means zero.
    pub upgrades: BTreeMap<UpgradeId, u32>,
    /// Auto-purchase register published by the composer.
    pub auto_purchase: Option<AutoPurchase>,
    /// Raw requirement multiplier published by the composer.
    pub requirement_reduction: Decimal,
}

impl UnitState {
    /// Locked state at the start of a run.
    #[must_use]
    pub fn new(id: UnitId) -> Self {
        Self {
            id,
            unlocked: false,
            level: 1,
            points: 0,
            progress: 0,
            purchase_credit: Decimal::ZERO,
            upgrades: BTreeMap::new(),
            auto_purchase: None,
            requirement_reduction: Decimal::ONE,
        }
    }

    /// Level of one of this unit's upgrades.
    #[must_use]
    pub fn upgrade_level(&self, upgrade: UpgradeId) -> u32 {
        self.upgrades.get(&upgrade).copied().unwrap_or(0)
    }
}

/// Requirement multiplier after applying the unit's floor.
fn effective_reduction(data: &AutomationUnitData, state: &UnitState) -> Decimal {
    state.requirement_reduction.max(data.requirement_floor)
}

/// Steps a by-step unit needs to leave its current level.
///
/// `floor(base × scaling^(level − 1))`, times the floored reduction, at
/// least 1.
#[must_use]
pub fn required_steps(data: &AutomationUnitData, state: &UnitState) -> u64 {
    let growth = decimal_powi(data.scaling, u64::from(state.level.saturating_sub(1)));
    let nominal = Decimal::from(data.base_requirement)
        .checked_mul(growth)
        .unwrap_or(Decimal::MAX)
        .floor();
    let reduced = nominal
        .checked_mul(effective_reduction(data, state))
        .unwrap_or(Decimal::MAX);
    decimal_floor_u64(reduced).max(1)
}

/// Purchases per level of a by-purchase-count unit, at least 1.
#[must_use]
pub fn purchases_per_level(data: &AutomationUnitData, state: &UnitState) -> u64 {
    let reduced = Decimal::from(data.base_requirement)
        .checked_mul(effective_reduction(data, state))
        .unwrap_or(Decimal::MAX);
    decimal_floor_u64(reduced).max(1)
}

/// Every automation unit, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationLedger {
    units: Vec<UnitState>,
}

impl AutomationLedger {
    /// All units locked.
    #[must_use]
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            units: catalog
                .automation_units()
                .iter()
                .map(|u| UnitState::new(u.id))
                .collect(),
        }
    }

    /// Rebuild from saved parts. Units must be in catalog order.
    pub(crate) fn from_parts(units: Vec<UnitState>) -> Self {
        Self { units }
    }

    /// Unit states in catalog order.
    #[must_use]
    pub fn units(&self) -> &[UnitState] {
        &self.units
    }

    /// State of one unit.
    #[must_use]
    pub fn unit(&self, catalog: &Catalog, id: UnitId) -> Option<&UnitState> {
        catalog.unit_index(id).and_then(|i| self.units.get(i))
    }

    fn unit_mut(&mut self, catalog: &Catalog, id: UnitId) -> Option<&mut UnitState> {
        catalog.unit_index(id).and_then(|i| self.units.get_mut(i))
    }

    /// Resource needed to unlock a unit, or `None` if it is unknown or
    /// already unlocked.
    #[must_use]
    pub fn unlock_cost(&self, catalog: &Catalog, id: UnitId) -> Option<BigNum> {
        let data = catalog.automation_unit(id)?;
        let state = self.unit(catalog, id)?;
        if state.unlocked {
            return None;
        }
        Some(data.unlock_cost.unwrap_or(BigNum::ZERO))
    }

    /// Unlock a unit at level 1. The caller pays the unlock cost.
    ///
    /// By-purchase-count units immediately back-fill from the global counter.
    pub fn unlock(
        &mut self,
        catalog: &Catalog,
        id: UnitId,
        counters: &impl CounterView,
    ) -> Option<LevelUp> {
        let data = catalog.automation_unit(id)?;
        let state = self.unit_mut(catalog, id)?;
        if state.unlocked {
            return None;
        }
        state.unlocked = true;
        state.level = 1;
        state.progress = 0;
        tracing::debug!(unit = %id, name = %data.name, "Automation unit unlocked");
        match data.mode {
            LevelingMode::ByStep => None,
            LevelingMode::ByPurchaseCount => follow_purchases(data, state, counters.global_purchases()),
        }
    }

    /// One step of progress for every unlocked by-step unit.
    pub fn settle_steps(&mut self, catalog: &Catalog) -> Vec<LevelUp> {
        let mut level_ups = Vec::new();
        for (data, state) in catalog.automation_units().iter().zip(&mut self.units) {
            if !state.unlocked || data.mode != LevelingMode::ByStep {
                continue;
            }
            state.progress = state.progress.saturating_add(1);
            if state.progress >= required_steps(data, state) {
                state.progress = 0;
                state.level = state.level.saturating_add(1);
                state.points = state.points.saturating_add(1);
                tracing::debug!(unit = %state.id, level = state.level, "Automation unit leveled");
                level_ups.push(LevelUp {
                    unit: state.id,
                    level: state.level,
                    points: 1,
                });
            }
        }
        level_ups
    }

    /// Bring every unlocked by-purchase-count unit up to the global counter.
    pub fn settle_purchases(&mut self, catalog: &Catalog, counters: &impl CounterView) -> Vec<LevelUp> {
        let global = counters.global_purchases();
        catalog
            .automation_units()
            .iter()
            .zip(&mut self.units)
            .filter(|(data, state)| state.unlocked && data.mode == LevelingMode::ByPurchaseCount)
            .filter_map(|(data, state)| follow_purchases(data, state, global))
            .collect()
    }

    /// Spend one point on the next level of a unit upgrade.
    ///
    /// Fails if the unit is locked, the upgrade belongs elsewhere, the unit
    /// has no point, the upgrade is maxed, or its unlock condition does not
    /// hold.
    pub fn buy_upgrade(&mut self, catalog: &Catalog, unit: UnitId, upgrade: UpgradeId) -> bool {
        let Some(data) = catalog.upgrade(upgrade) else {
            return false;
        };
        if data.owner != UpgradeOwner::Automation(unit) {
            return false;
        }
        let Some(state) = self.unit_mut(catalog, unit) else {
            return false;
        };
        let level = state.upgrade_level(upgrade);
        if !state.unlocked || state.points < 1 || !data.below_max(level) {
            return false;
        }
        if let Some(condition) = data.unlock {
            if state.upgrade_level(condition.upgrade) < condition.level {
                return false;
            }
        }
        state.points -= 1;
        state.upgrades.insert(upgrade, level + 1);
        tracing::debug!(unit = %unit, upgrade = %upgrade, level = level + 1, "Automation upgrade bought");
        true
    }

    /// Every unit upgrade level, unit by unit.
    pub fn upgrade_levels(&self) -> impl Iterator<Item = (UpgradeId, u32)> + '_ {
        self.units
            .iter()
            .flat_map(|u| u.upgrades.iter().map(|(&id, &level)| (id, level)))
    }

    /// Add this step's auto-purchase rate to every active unit's credit.
    ///
    /// Returns the units holding at least one whole purchase, with the
    /// producer each one buys.
    pub fn accrue_credit(&mut self) -> Vec<(UnitId, ProducerId)> {
        let mut ready = Vec::new();
        for state in &mut self.units {
            let Some(auto) = state.auto_purchase else {
                continue;
            };
            let Some(producer) = auto.producer else {
                continue;
            };
            if !state.unlocked || !auto.enabled {
                continue;
            }
            state.purchase_credit = state
                .purchase_credit
                .checked_add(auto.rate)
                .unwrap_or(Decimal::MAX);
            if state.purchase_credit >= Decimal::ONE {
                ready.push((state.id, producer));
            }
        }
        ready
    }

    /// Consume one whole purchase of credit.
    pub fn take_credit(&mut self, catalog: &Catalog, unit: UnitId) -> bool {
        match self.unit_mut(catalog, unit) {
            Some(state) if state.purchase_credit >= Decimal::ONE => {
                state.purchase_credit -= Decimal::ONE;
                true
            }
            _ => false,
        }
    }

    /// Give back one purchase of credit after a failed buy and cap the
    /// carry-over at one purchase.
    pub fn refund_credit(&mut self, catalog: &Catalog, unit: UnitId) {
        if let Some(state) = self.unit_mut(catalog, unit) {
            state.purchase_credit = (state.purchase_credit + Decimal::ONE).min(Decimal::ONE);
        }
    }

    /// Progress toward the next level as a fraction in `[0, 1]`.
    #[must_use]
    pub fn progress_fraction(&self, catalog: &Catalog, unit: UnitId) -> Option<Fixed> {
        let data = catalog.automation_unit(unit)?;
        let state = self.unit(catalog, unit)?;
        if !state.unlocked {
            return Some(Fixed::ZERO);
        }
        let needed = match data.mode {
            LevelingMode::ByStep => required_steps(data, state),
            LevelingMode::ByPurchaseCount => purchases_per_level(data, state),
        };
        Some(ratio(state.progress, needed))
    }

    /// Lock every unit and drop its levels, points and upgrades.
    pub fn reset(&mut self, catalog: &Catalog) {
        *self = Self::new(catalog);
    }

    /// Take the auto-purchase registers and requirement reductions published
    /// by the composer.
    pub fn apply_modifiers(&mut self, modifiers: &impl ModifierView) {
        for state in &mut self.units {
            state.auto_purchase = modifiers.auto_purchase(state.id);
            state.requirement_reduction = modifiers.requirement_reduction(state.id);
        }
    }
}

/// Adopt the level implied by the global purchase counter.
fn follow_purchases(data: &AutomationUnitData, state: &mut UnitState, global: u64) -> Option<LevelUp> {
    let per_level = purchases_per_level(data, state);
    state.progress = global % per_level;
    let earned = u32::try_from(global / per_level)
        .unwrap_or(u32::MAX)
        .saturating_add(1);
    if earned <= state.level {
        return None;
    }
    let gained = earned - state.level;
    state.level = earned;
    state.points = state.points.saturating_add(u64::from(gained));
    tracing::debug!(unit = %state.id, level = earned, gained, "Automation unit leveled");
    Some(LevelUp {
        unit: state.id,
        level: earned,
        points: u64::from(gained),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support;
    use crate::effects::compose;

    struct Counters(u64);

    impl CounterView for Counters {
        fn global_purchases(&self) -> u64 {
            self.0
        }

        fn step(&self) -> u64 {
            0
        }
    }

    const SPRINKLER: UnitId = UnitId(1);
    const DRILL: UnitId = UnitId(2);

    #[test]
    fn test_purchase_backfill() {
        let catalog = test_support::catalog();
        let mut ledger = AutomationLedger::new(&catalog);
        let level_up = ledger.unlock(&catalog, DRILL, &Counters(47)).unwrap();

        assert_eq!(level_up.level, 5);
        assert_eq!(level_up.points, 4);
        let drill = ledger.unit(&catalog, DRILL).unwrap();
        assert_eq!(drill.level, 5);
        assert_eq!(drill.points, 4);
        assert_eq!(drill.progress, 7);
    }

    #[test]
    fn test_purchase_mode_follows_counter() {
        let catalog = test_support::catalog();
        let mut ledger = AutomationLedger::new(&catalog);
        assert!(ledger.unlock(&catalog, DRILL, &Counters(3)).is_none());

        assert!(ledger.settle_purchases(&catalog, &Counters(9)).is_empty());
        let ups = ledger.settle_purchases(&catalog, &Counters(25));
        assert_eq!(
            ups,
            vec![LevelUp {
                unit: DRILL,
                level: 3,
                points: 2
            }]
        );
    }

    #[test]
    fn test_locked_units_do_not_level() {
        let catalog = test_support::catalog();
        let mut ledger = AutomationLedger::new(&catalog);
        for _ in 0..10 {
            assert!(ledger.settle_steps(&catalog).is_empty());
        }
        assert!(ledger.settle_purchases(&catalog, &Counters(100)).is_empty());
        assert_eq!(ledger.unit(&catalog, SPRINKLER).unwrap().progress, 0);
    }

    #[test]
    fn test_step_leveling_scales() {
        let catalog = test_support::catalog();
        let mut ledger = AutomationLedger::new(&catalog);
        ledger.unlock(&catalog, SPRINKLER, &Counters(0));

        // Level 1 needs 3 steps, level 2 needs 6
        let mut level_steps = Vec::new();
        for step in 1..=9 {
            if !ledger.settle_steps(&catalog).is_empty() {
                level_steps.push(step);
            }
        }
        assert_eq!(level_steps, vec![3, 9]);
        let sprinkler = ledger.unit(&catalog, SPRINKLER).unwrap();
        assert_eq!(sprinkler.level, 3);
        assert_eq!(sprinkler.points, 2);
    }

    #[test]
    fn test_requirement_reduction_floor() {
        let catalog = test_support::catalog();
        let data = catalog.automation_unit(SPRINKLER).unwrap();
        let mut state = UnitState::new(SPRINKLER);
        state.level = 5; // nominal 3 × 2^4 = 48
        assert_eq!(required_steps(data, &state), 48);

        state.requirement_reduction = Decimal::new(5, 1);
        assert_eq!(required_steps(data, &state), 24);

        // Never below 10% of nominal
        state.requirement_reduction = Decimal::new(1, 3);
        assert_eq!(required_steps(data, &state), 4);

        // Never below one
        state.level = 1;
        assert_eq!(required_steps(data, &state), 1);
    }

    #[test]
    fn test_reduction_lowers_purchase_requirement() {
        let catalog = test_support::catalog();
        let mut ledger = AutomationLedger::new(&catalog);
        ledger.unlock(&catalog, DRILL, &Counters(0));

        let bits = catalog.upgrade(UpgradeId(102)).unwrap();
        ledger.apply_modifiers(&compose([(bits, 1)]));
        // 10 × 0.5 = 5 purchases per level
        let ups = ledger.settle_purchases(&catalog, &Counters(10));
        assert_eq!(ups[0].level, 3);
    }

    #[test]
    fn test_upgrade_purchase_rules() {
        let catalog = test_support::catalog();
        let mut ledger = AutomationLedger::new(&catalog);
        let nozzles = UpgradeId(1);
        let timer = UpgradeId(2);

        // Locked unit
        assert!(!ledger.buy_upgrade(&catalog, SPRINKLER, nozzles));
        ledger.unlock(&catalog, SPRINKLER, &Counters(0));
        // No points yet
        assert!(!ledger.buy_upgrade(&catalog, SPRINKLER, nozzles));

        for _ in 0..9 {
            ledger.settle_steps(&catalog);
        }
        assert_eq!(ledger.unit(&catalog, SPRINKLER).unwrap().points, 2);

        // Timer requires Nozzles at level 1
        assert!(!ledger.buy_upgrade(&catalog, SPRINKLER, timer));
        // Wrong owner
        assert!(!ledger.buy_upgrade(&catalog, SPRINKLER, UpgradeId(3)));
        assert!(ledger.buy_upgrade(&catalog, SPRINKLER, nozzles));
        assert!(ledger.buy_upgrade(&catalog, SPRINKLER, timer));
        assert!(!ledger.buy_upgrade(&catalog, SPRINKLER, nozzles));

        let levels: Vec<_> = ledger.upgrade_levels().collect();
        assert_eq!(levels, vec![(nozzles, 1), (timer, 1)]);
    }

    #[test]
    fn test_auto_purchase_credit() {
        let catalog = test_support::catalog();
        let mut ledger = AutomationLedger::new(&catalog);
        ledger.unlock(&catalog, SPRINKLER, &Counters(0));
        let timer = catalog.upgrade(UpgradeId(2)).unwrap();
        ledger.apply_modifiers(&compose([(timer, 1)]));

        // 0.5 per step: ready every second step
        assert!(ledger.accrue_credit().is_empty());
        assert_eq!(ledger.accrue_credit(), vec![(SPRINKLER, ProducerId(0))]);
        assert!(ledger.take_credit(&catalog, SPRINKLER));
        assert!(!ledger.take_credit(&catalog, SPRINKLER));

        // A failed buy keeps at most one purchase of credit
        ledger.accrue_credit();
        ledger.accrue_credit();
        assert!(ledger.take_credit(&catalog, SPRINKLER));
        ledger.refund_credit(&catalog, SPRINKLER);
        assert_eq!(ledger.unit(&catalog, SPRINKLER).unwrap().purchase_credit, Decimal::ONE);
    }

    #[test]
    fn test_progress_fraction() {
        let catalog = test_support::catalog();
        let mut ledger = AutomationLedger::new(&catalog);
        assert_eq!(ledger.progress_fraction(&catalog, SPRINKLER), Some(Fixed::ZERO));
        ledger.unlock(&catalog, SPRINKLER, &Counters(0));
        ledger.settle_steps(&catalog);
        let fraction = ledger.progress_fraction(&catalog, SPRINKLER).unwrap();
        assert!(fraction > Fixed::from_num(0.33) && fraction < Fixed::from_num(0.34));
        assert_eq!(ledger.progress_fraction(&catalog, UnitId(99)), None);
    }

    #[test]
    fn test_reset_locks_everything() {
        let catalog = test_support::catalog();
        let mut ledger = AutomationLedger::new(&catalog);
        ledger.unlock(&catalog, DRILL, &Counters(47));
        ledger.reset(&catalog);
        assert_eq!(ledger, AutomationLedger::new(&catalog));
    }
}
