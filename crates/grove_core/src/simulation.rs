//! Core simulation loop.
//!
//! [`Simulation`] exclusively owns every ledger and is the only entry point
//! that mutates game state. All outcomes are a pure function of the catalog
//! and the sequence of operations applied.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::automation::{AutomationLedger, LevelUp};
use crate::catalog::Catalog;
use crate::checkpoint::Checkpoint;
use crate::effects::compose;
use crate::error::Result;
use crate::ids::{ProducerId, UnitId, UpgradeId};
use crate::math::{BigNum, Fixed};
use crate::milestones::{MilestoneLedger, MilestoneRecord};
use crate::producers::ProducerLedger;
use crate::views::{CounterView, ModifierView, ProducerView};

/// Upper bound on automatic purchases one unit makes in one step.
///
/// Unused credit carries over to the next step.
pub const MAX_AUTO_PURCHASES_PER_STEP: u32 = 1_000;

/// Monotonic run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    /// Steps advanced this season. Cleared on prestige.
    pub step: u64,
    /// Manual producer purchases over the whole game. Never cleared.
    pub global_purchases: u64,
}

impl CounterView for Counters {
    fn global_purchases(&self) -> u64 {
        self.global_purchases
    }

    fn step(&self) -> u64 {
        self.step
    }
}

/// Automatic purchases made by one unit during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoPurchaseEvent {
    /// Unit whose credit paid for the purchases.
    pub unit: UnitId,
    /// Producer bought.
    pub producer: ProducerId,
    /// Units bought.
    pub count: u32,
}

/// Events generated during a single step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepEvents {
    /// Step number after advancing.
    pub step: u64,
    /// Resource credited by terminal producers.
    pub produced: BigNum,
    /// Automation level-ups.
    pub level_ups: Vec<LevelUp>,
    /// Automatic producer purchases.
    pub auto_purchases: Vec<AutoPurchaseEvent>,
    /// Milestone completed at the end of the step, if any.
    pub milestone: Option<MilestoneRecord>,
}

/// The deterministic idle-game simulation.
///
/// # Step Order
///
/// Each step runs, in this order:
/// 1. **Counter** - the step counter is incremented
/// 2. **Automation** - by-step units progress, auto-purchases spend credit,
///    and modifiers are recomputed if anything leveled
/// 3. **Producers** - production settles down the chain
/// 4. **Milestones** - at most one milestone completes
///
/// Automation runs first so production already sees multipliers from a
/// level-up earned in the same step.
#[derive(Debug, Clone)]
pub struct Simulation {
    catalog: Arc<Catalog>,
    counters: Counters,
    producers: ProducerLedger,
    automation: AutomationLedger,
    milestones: MilestoneLedger,
    step_seconds: Decimal,
    replaying: bool,
}

impl Simulation {
    /// Start a fresh game.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use grove_core::prelude::*;
    ///
    /// let text = r#"CatalogData(
    ///     name: "Doc",
    ///     producers: [ProducerData(
    ///         id: 0, name: "Sprout", base_production: "100", base_cost: "3",
    ///         cost_multiplier: "3", cost_base: "1.065", cost_divisor: "100",
    ///         output: Terminal, starting_owned: 1,
    ///     )],
    ///     milestones: MilestoneData(base_requirement: "1000", base_points: 1),
    /// )"#;
    /// let catalog = Arc::new(Catalog::from_ron(text, "catalog.ron").unwrap());
    /// let mut sim = Simulation::new(catalog);
    /// sim.advance();
    /// assert_eq!(sim.step(), 1);
    /// assert_eq!(sim.resource(), BigNum::from(100_u64));
    /// ```
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let producers = ProducerLedger::new(&catalog);
        let automation = AutomationLedger::new(&catalog);
        Self::from_parts(
            catalog,
            Counters::default(),
            producers,
            automation,
            MilestoneLedger::new(),
        )
    }

    /// Assemble a simulation from restored ledgers and publish modifiers.
    pub(crate) fn from_parts(
        catalog: Arc<Catalog>,
        counters: Counters,
        producers: ProducerLedger,
        automation: AutomationLedger,
        milestones: MilestoneLedger,
    ) -> Self {
        let step_seconds = catalog.step_seconds();
        let mut sim = Self {
            catalog,
            counters,
            producers,
            automation,
            milestones,
            step_seconds,
            replaying: false,
        };
        sim.recompute();
        sim
    }

    /// Catalog this game runs on.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Steps advanced this season.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.counters.step
    }

    /// Run counters.
    #[must_use]
    pub const fn counters(&self) -> Counters {
        self.counters
    }

    /// Terminal resource balance.
    #[must_use]
    pub fn resource(&self) -> BigNum {
        self.producers.resource()
    }

    /// Producer ledger.
    #[must_use]
    pub fn producers(&self) -> &ProducerLedger {
        &self.producers
    }

    /// Automation ledger.
    #[must_use]
    pub fn automation(&self) -> &AutomationLedger {
        &self.automation
    }

    /// Milestone and prestige ledger.
    #[must_use]
    pub fn milestones(&self) -> &MilestoneLedger {
        &self.milestones
    }

    /// Real seconds covered by one step under current effects.
    #[must_use]
    pub const fn step_seconds(&self) -> Decimal {
        self.step_seconds
    }

    /// Check if a catch-up replay owns the step loop.
    #[must_use]
    pub const fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub(crate) fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    /// Advance by one step.
    ///
    /// Returns `None` without stepping while a catch-up replay is running.
    pub fn advance(&mut self) -> Option<StepEvents> {
        if self.replaying {
            return None;
        }
        Some(self.step_once())
    }

    /// Manual step control. Rejected while a catch-up replay is running.
    pub fn force_step(&mut self) -> bool {
        self.advance().is_some()
    }

    /// One step, regardless of the replay flag.
    pub(crate) fn step_once(&mut self) -> StepEvents {
        self.counters.step += 1;
        let mut events = StepEvents {
            step: self.counters.step,
            ..StepEvents::default()
        };

        // 1. Automation
        events.level_ups = self.automation.settle_steps(&self.catalog);
        events.auto_purchases = self.run_auto_purchases();
        if !events.level_ups.is_empty() {
            let mut backfill = self.refresh_modifiers();
            events.level_ups.append(&mut backfill);
        }

        // 2. Producers
        events.produced = self.producers.settle(&self.catalog);

        // 3. Milestones
        events.milestone =
            self.milestones
                .settle(self.catalog.milestones(), &self.producers, self.counters.step);

        #[cfg(feature = "debug-validation")]
        self.check_invariants();

        #[cfg(debug_assertions)]
        if tracing::enabled!(tracing::Level::TRACE) {
            let hash = self.state_hash();
            tracing::trace!(step = self.counters.step, state_hash = hash, "Simulation state hash");
        }

        events
    }

    fn run_auto_purchases(&mut self) -> Vec<AutoPurchaseEvent> {
        let mut purchases = Vec::new();
        for (unit, producer) in self.automation.accrue_credit() {
            let mut count = 0;
            while count < MAX_AUTO_PURCHASES_PER_STEP && self.automation.take_credit(&self.catalog, unit) {
                if self.producers.buy(&self.catalog, producer) {
                    count += 1;
                } else {
                    self.automation.refund_credit(&self.catalog, unit);
                    break;
                }
            }
            if count > 0 {
                purchases.push(AutoPurchaseEvent {
                    unit,
                    producer,
                    count,
                });
            }
        }
        purchases
    }

    /// Buy one unit of a producer with the resource balance.
    ///
    /// Counts toward the global purchase counter and may level
    /// by-purchase-count units.
    pub fn buy_producer(&mut self, id: ProducerId) -> bool {
        if !self.producers.buy(&self.catalog, id) {
            return false;
        }
        self.counters.global_purchases = self.counters.global_purchases.saturating_add(1);
        let level_ups = self.automation.settle_purchases(&self.catalog, &self.counters);
        if !level_ups.is_empty() {
            self.recompute();
        }
        true
    }

    /// Pay a unit's unlock cost and unlock it.
    pub fn unlock_automation_unit(&mut self, id: UnitId) -> bool {
        let Some(cost) = self.automation.unlock_cost(&self.catalog, id) else {
            return false;
        };
        if !self.producers.spend(cost) {
            return false;
        }
        self.automation.unlock(&self.catalog, id, &self.counters);
        self.recompute();
        true
    }

    /// Spend one of a unit's points on one of its upgrades.
    pub fn buy_automation_upgrade(&mut self, unit: UnitId, upgrade: UpgradeId) -> bool {
        if !self.automation.buy_upgrade(&self.catalog, unit, upgrade) {
            return false;
        }
        self.recompute();
        true
    }

    /// Spend prestige points on a milestone upgrade.
    pub fn buy_milestone_upgrade(&mut self, upgrade: UpgradeId) -> bool {
        if !self.milestones.buy_upgrade(&self.catalog, upgrade) {
            return false;
        }
        self.recompute();
        true
    }

    /// Finish the season and reset the run.
    ///
    /// Permitted once the season's milestone requirement is met. Lifetime
    /// counters and milestone upgrades survive; producers, automation units
    /// and the step counter are reset.
    pub fn prestige(&mut self) -> bool {
        let Some(gained) = self.milestones.prestige() else {
            return false;
        };
        let starting = self.milestones.starting_resource();
        self.counters.step = 0;
        self.producers.reset(&self.catalog, starting);
        self.automation.reset(&self.catalog);
        self.recompute();
        tracing::info!(
            season = self.milestones.season,
            gained,
            prestige_points = self.milestones.prestige_points,
            starting_resource = %starting,
            "Prestige"
        );
        true
    }

    /// Rebuild every modifier from purchased upgrade levels.
    pub fn recompute(&mut self) {
        self.refresh_modifiers();
    }

    fn refresh_modifiers(&mut self) -> Vec<LevelUp> {
        let levels: BTreeMap<UpgradeId, u32> = self
            .automation
            .upgrade_levels()
            .chain(self.milestones.upgrade_levels())
            .collect();
        let ctx = compose(self.catalog.upgrades().iter().filter_map(|upgrade| {
            levels.get(&upgrade.id).map(|&level| (upgrade, level))
        }));

        self.producers.apply_modifiers(&ctx);
        self.automation.apply_modifiers(&ctx);
        self.milestones.apply_modifiers(&ctx);
        let scaled = self
            .catalog
            .step_seconds()
            .checked_mul(ctx.step_duration_multiplier())
            .unwrap_or(Decimal::MAX);
        self.step_seconds = scaled.max(self.catalog.min_step_seconds());

        // A smaller per-level requirement can earn levels immediately
        self.automation.settle_purchases(&self.catalog, &self.counters)
    }

    /// Price of the next unit of a producer.
    #[must_use]
    pub fn producer_cost(&self, id: ProducerId) -> Option<BigNum> {
        self.producers.cost(&self.catalog, id)
    }

    /// Prestige-point price of the next level of a milestone upgrade.
    #[must_use]
    pub fn milestone_upgrade_cost(&self, upgrade: UpgradeId) -> Option<u64> {
        self.catalog
            .milestone_upgrades()
            .find(|u| u.id == upgrade)
            .map(|u| self.milestones.upgrade_cost(u))
    }

    /// Current level of any upgrade.
    #[must_use]
    pub fn upgrade_level(&self, upgrade: UpgradeId) -> u32 {
        self.automation
            .upgrade_levels()
            .chain(self.milestones.upgrade_levels())
            .find(|(id, _)| *id == upgrade)
            .map_or(0, |(_, level)| level)
    }

    /// Check if the season is complete.
    #[must_use]
    pub fn can_prestige(&self) -> bool {
        self.milestones.can_prestige()
    }

    /// Milestones the current season needs before prestige.
    #[must_use]
    pub fn season_requirement(&self) -> u64 {
        self.milestones.season_requirement()
    }

    /// Resource needed for the next milestone.
    #[must_use]
    pub fn milestone_requirement(&self) -> BigNum {
        self.milestones.requirement(self.catalog.milestones())
    }

    /// Progress of an automation unit toward its next level.
    #[must_use]
    pub fn progress_fraction(&self, unit: UnitId) -> Option<Fixed> {
        self.automation.progress_fraction(&self.catalog, unit)
    }

    /// Capture the persistent state.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::capture(self)
    }

    /// Rebuild a game from a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::CorruptCheckpoint`](crate::error::GameError::CorruptCheckpoint)
    /// if the checkpoint holds values that cannot be restored.
    pub fn restore(catalog: Arc<Catalog>, checkpoint: &Checkpoint) -> Result<Self> {
        checkpoint.restore(catalog)
    }

    /// Serialize the persistent state to compact bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.checkpoint().to_bytes()
    }

    /// Rebuild a game from [`serialize`](Self::serialize) output.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid checkpoint.
    pub fn deserialize(catalog: Arc<Catalog>, data: &[u8]) -> Result<Self> {
        Checkpoint::from_bytes(data)?.restore(catalog)
    }

    /// Hash of the persistent state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self.serialize() {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(_) => self.counters.step.hash(&mut hasher),
        }
        hasher.finish()
    }

    #[cfg(feature = "debug-validation")]
    fn check_invariants(&self) {
        for tier in self.producers.tiers() {
            debug_assert!(
                tier.total_owned >= BigNum::from(tier.manually_purchased),
                "producer {} owns fewer units than it bought",
                tier.id
            );
        }
        debug_assert!(self.milestones.total_prestige_points >= self.milestones.prestige_points);
        debug_assert!(self.milestones.season >= 1);
    }
}

impl ProducerView for Simulation {
    fn resource(&self) -> BigNum {
        self.producers.resource()
    }

    fn total_owned(&self, producer: ProducerId) -> BigNum {
        self.producers.total_owned(producer)
    }

    fn manually_purchased(&self, producer: ProducerId) -> u64 {
        self.producers.manually_purchased(producer)
    }
}
