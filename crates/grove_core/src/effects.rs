//! Upgrade effects and the multiplier composer.
//!
//! Every purchased upgrade level is folded into a fresh [`EffectContext`] by
//! [`compose`]. The context is an owned value: it is built from scratch,
//! published to the ledgers through [`ModifierView`], and dropped. Nothing is
//! updated incrementally, so re-running the composer never compounds a
//! modifier twice.
//!
//! Effects only ever compose onto the context (multiply or add). Several
//! upgrades may target the same producer.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::UpgradeData;
use crate::ids::{ProducerId, UnitId};
use crate::math::{decimal_powi, BigNum};
use crate::views::ModifierView;

/// Multiplier layer an upgrade writes to.
///
/// The final producer multiplier is the product of both layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    /// Automation-unit upgrades. Reset on prestige.
    Machine,
    /// Milestone upgrades. Carried across prestige.
    Prestige,
}

/// A single effect carried by an upgrade.
///
/// Factors are per level: an upgrade at level `n` applies `factor^n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Multiply one producer's output.
    ProducerMultiplier {
        /// Target producer.
        producer: ProducerId,
        /// Per-level factor.
        factor: Decimal,
    },

    /// Linear output bonus: `1 + bonus × level`.
    ProducerBonus {
        /// Target producer.
        producer: ProducerId,
        /// Bonus per level (0.25 for +25%).
        bonus: Decimal,
    },

    /// Multiply the output of every producer.
    GlobalMultiplier {
        /// Per-level factor.
        factor: Decimal,
    },

    /// Divide purchase prices.
    CostReduction {
        /// Target producer, or every producer when absent.
        #[serde(default)]
        producer: Option<ProducerId>,
        /// Per-level divisor.
        factor: Decimal,
    },

    /// Let an automation unit buy a producer on its own.
    AutoPurchase {
        /// Unit whose credit funds the purchases.
        unit: UnitId,
        /// Producer to buy.
        producer: ProducerId,
        /// Purchases per step per level.
        rate: Decimal,
    },

    /// Shrink automation level requirements.
    RequirementReduction {
        /// Target unit, or every unit when absent.
        #[serde(default)]
        unit: Option<UnitId>,
        /// Per-level factor, below one.
        factor: Decimal,
    },

    /// Shrink the in-season milestone requirement.
    MilestoneRequirement {
        /// Per-level factor, below one.
        factor: Decimal,
    },

    /// Additive milestone point bonus.
    MilestonePointsBonus {
        /// Bonus per level.
        bonus: Decimal,
    },

    /// Multiplicative milestone point bonus.
    MilestonePointsMultiplier {
        /// Per-level factor.
        factor: Decimal,
    },

    /// Scale the real-time duration of one step.
    StepDuration {
        /// Per-level factor, below one to speed the game up.
        factor: Decimal,
    },

    /// Start every season with `10^level` resource.
    StartingResource,
}

impl Effect {
    /// Compose this effect at `level` onto the context.
    ///
    /// Level zero is a no-op.
    pub fn apply(&self, level: u32, layer: Layer, ctx: &mut EffectContext) {
        if level == 0 {
            return;
        }
        let n = u64::from(level);
        match *self {
            Self::ProducerMultiplier { producer, factor } => {
                let scale = BigNum::from_decimal(factor).powi(n);
                *ctx.layer_entry(layer, producer) *= scale;
            }
            Self::ProducerBonus { producer, bonus } => {
                let scale = linear_bonus(bonus, level);
                *ctx.layer_entry(layer, producer) *= scale;
            }
            Self::GlobalMultiplier { factor } => {
                let scale = BigNum::from_decimal(factor).powi(n);
                match layer {
                    Layer::Machine => ctx.machine_global *= scale,
                    Layer::Prestige => ctx.prestige_global *= scale,
                }
            }
            Self::CostReduction { producer, factor } => {
                let scale = BigNum::from_decimal(factor).powi(n);
                match producer {
                    Some(id) => {
                        *ctx.cost_reduction.entry(id).or_insert(BigNum::ONE) *= scale;
                    }
                    None => ctx.global_cost_reduction *= scale,
                }
            }
            Self::AutoPurchase {
                unit,
                producer,
                rate,
            } => {
                let entry = ctx.auto_purchase.entry(unit).or_default();
                let added = rate.checked_mul(Decimal::from(level)).unwrap_or(Decimal::MAX);
                entry.rate = entry.rate.checked_add(added).unwrap_or(Decimal::MAX);
                entry.producer = Some(producer);
                entry.enabled = true;
            }
            Self::RequirementReduction { unit, factor } => {
                let scale = decimal_powi(factor, n);
                match unit {
                    Some(id) => {
                        let entry = ctx.requirement_reduction.entry(id).or_insert(Decimal::ONE);
                        *entry = entry.checked_mul(scale).unwrap_or(Decimal::ZERO);
                    }
                    None => {
                        ctx.global_requirement_reduction = ctx
                            .global_requirement_reduction
                            .checked_mul(scale)
                            .unwrap_or(Decimal::ZERO);
                    }
                }
            }
            Self::MilestoneRequirement { factor } => {
                ctx.milestone_requirement = ctx
                    .milestone_requirement
                    .checked_mul(decimal_powi(factor, n))
                    .unwrap_or(Decimal::ZERO);
            }
            Self::MilestonePointsBonus { bonus } => {
                let added = bonus.checked_mul(Decimal::from(level)).unwrap_or(Decimal::MAX);
                ctx.points_additive = ctx.points_additive.checked_add(added).unwrap_or(Decimal::MAX);
            }
            Self::MilestonePointsMultiplier { factor } => {
                ctx.points_multiplicative = ctx
                    .points_multiplicative
                    .checked_mul(decimal_powi(factor, n))
                    .unwrap_or(Decimal::MAX);
            }
            Self::StepDuration { factor } => {
                ctx.step_duration = ctx
                    .step_duration
                    .checked_mul(decimal_powi(factor, n))
                    .unwrap_or(Decimal::ZERO);
            }
            Self::StartingResource => {
                ctx.starting_resource_level = ctx.starting_resource_level.saturating_add(level);
            }
        }
    }

    /// Short human-readable summary at a level.
    #[must_use]
    pub fn describe(&self, level: u32) -> String {
        let n = u64::from(level);
        match *self {
            Self::ProducerMultiplier { producer, factor } => {
                format!("Producer {producer} output x{}", BigNum::from_decimal(factor).powi(n))
            }
            Self::ProducerBonus { producer, bonus } => {
                format!("Producer {producer} output x{}", linear_bonus(bonus, level))
            }
            Self::GlobalMultiplier { factor } => {
                format!("All output x{}", BigNum::from_decimal(factor).powi(n))
            }
            Self::CostReduction {
                producer: Some(id),
                factor,
            } => format!("Producer {id} cost /{}", BigNum::from_decimal(factor).powi(n)),
            Self::CostReduction {
                producer: None,
                factor,
            } => format!("All costs /{}", BigNum::from_decimal(factor).powi(n)),
            Self::AutoPurchase {
                unit,
                producer,
                rate,
            } => format!(
                "Unit {unit} buys producer {producer} {} times per step",
                (rate * Decimal::from(level)).normalize()
            ),
            Self::RequirementReduction { unit: Some(id), factor } => {
                format!("Unit {id} requirement x{}", decimal_powi(factor, n).normalize())
            }
            Self::RequirementReduction { unit: None, factor } => {
                format!("All unit requirements x{}", decimal_powi(factor, n).normalize())
            }
            Self::MilestoneRequirement { factor } => {
                format!("Milestone requirement x{}", decimal_powi(factor, n).normalize())
            }
            Self::MilestonePointsBonus { bonus } => {
                format!("Milestone points +{}", (bonus * Decimal::from(level)).normalize())
            }
            Self::MilestonePointsMultiplier { factor } => {
                format!("Milestone points x{}", decimal_powi(factor, n).normalize())
            }
            Self::StepDuration { factor } => {
                format!("Step duration x{}", decimal_powi(factor, n).normalize())
            }
            Self::StartingResource => {
                format!("Start each season with {}", BigNum::from(10_u64).powi(n))
            }
        }
    }
}

/// `1 + bonus × level` as a big number.
fn linear_bonus(bonus: Decimal, level: u32) -> BigNum {
    BigNum::ONE + BigNum::from_decimal(bonus) * BigNum::from(level)
}

/// Auto-purchase register of one automation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoPurchase {
    /// Producer bought. The last effect in upgrade order wins.
    pub producer: Option<ProducerId>,
    /// Purchases per step.
    pub rate: Decimal,
    /// Set once any effect targets the unit.
    pub enabled: bool,
}

/// Transient aggregation of every active effect.
///
/// Missing map entries read as the neutral value (×1 or +0).
#[derive(Debug, Clone, PartialEq)]
pub struct EffectContext {
    machine: BTreeMap<ProducerId, BigNum>,
    prestige: BTreeMap<ProducerId, BigNum>,
    machine_global: BigNum,
    prestige_global: BigNum,
    cost_reduction: BTreeMap<ProducerId, BigNum>,
    global_cost_reduction: BigNum,
    auto_purchase: BTreeMap<UnitId, AutoPurchase>,
    requirement_reduction: BTreeMap<UnitId, Decimal>,
    global_requirement_reduction: Decimal,
    milestone_requirement: Decimal,
    points_additive: Decimal,
    points_multiplicative: Decimal,
    step_duration: Decimal,
    starting_resource_level: u32,
}

impl Default for EffectContext {
    fn default() -> Self {
        Self {
            machine: BTreeMap::new(),
            prestige: BTreeMap::new(),
            machine_global: BigNum::ONE,
            prestige_global: BigNum::ONE,
            cost_reduction: BTreeMap::new(),
            global_cost_reduction: BigNum::ONE,
            auto_purchase: BTreeMap::new(),
            requirement_reduction: BTreeMap::new(),
            global_requirement_reduction: Decimal::ONE,
            milestone_requirement: Decimal::ONE,
            points_additive: Decimal::ZERO,
            points_multiplicative: Decimal::ONE,
            step_duration: Decimal::ONE,
            starting_resource_level: 0,
        }
    }
}

impl EffectContext {
    /// Empty context: every modifier neutral.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn layer_entry(&mut self, layer: Layer, producer: ProducerId) -> &mut BigNum {
        let map = match layer {
            Layer::Machine => &mut self.machine,
            Layer::Prestige => &mut self.prestige,
        };
        map.entry(producer).or_insert(BigNum::ONE)
    }

    /// Contribution of one layer to a producer.
    #[must_use]
    pub fn layer_multiplier(&self, layer: Layer, producer: ProducerId) -> BigNum {
        let (map, global) = match layer {
            Layer::Machine => (&self.machine, self.machine_global),
            Layer::Prestige => (&self.prestige, self.prestige_global),
        };
        map.get(&producer).copied().unwrap_or(BigNum::ONE) * global
    }
}

impl ModifierView for EffectContext {
    fn producer_multiplier(&self, producer: ProducerId) -> BigNum {
        self.layer_multiplier(Layer::Machine, producer)
            * self.layer_multiplier(Layer::Prestige, producer)
    }

    fn cost_reduction(&self, producer: ProducerId) -> BigNum {
        self.cost_reduction
            .get(&producer)
            .copied()
            .unwrap_or(BigNum::ONE)
            * self.global_cost_reduction
    }

    fn auto_purchase(&self, unit: UnitId) -> Option<AutoPurchase> {
        self.auto_purchase.get(&unit).copied()
    }

    fn requirement_reduction(&self, unit: UnitId) -> Decimal {
        let specific = self
            .requirement_reduction
            .get(&unit)
            .copied()
            .unwrap_or(Decimal::ONE);
        specific
            .checked_mul(self.global_requirement_reduction)
            .unwrap_or(Decimal::ZERO)
    }

    fn milestone_requirement_multiplier(&self) -> Decimal {
        self.milestone_requirement
    }

    fn milestone_points_multiplier(&self) -> Decimal {
        (Decimal::ONE + self.points_additive)
            .checked_mul(self.points_multiplicative)
            .unwrap_or(Decimal::MAX)
    }

    fn step_duration_multiplier(&self) -> Decimal {
        self.step_duration
    }

    fn starting_resource_level(&self) -> u32 {
        self.starting_resource_level
    }
}

/// Fold every purchased upgrade level into a fresh context.
///
/// Upgrades are applied in ascending id order regardless of the order they
/// are supplied in; effects within an upgrade are applied in declaration
/// order.
#[must_use]
pub fn compose<'a, I>(levels: I) -> EffectContext
where
    I: IntoIterator<Item = (&'a UpgradeData, u32)>,
{
    let mut active: Vec<(&UpgradeData, u32)> =
        levels.into_iter().filter(|(_, level)| *level > 0).collect();
    active.sort_by_key(|(upgrade, _)| upgrade.id);

    active
        .into_iter()
        .fold(EffectContext::new(), |mut ctx, (upgrade, level)| {
            let layer = upgrade.owner.layer();
            for effect in &upgrade.effects {
                effect.apply(level, layer, &mut ctx);
            }
            ctx
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{UpgradeCost, UpgradeOwner};
    use crate::ids::UpgradeId;

    fn upgrade(id: u32, owner: UpgradeOwner, effects: Vec<Effect>) -> UpgradeData {
        UpgradeData {
            id: UpgradeId(id),
            name: format!("Upgrade {id}"),
            owner,
            max_level: None,
            effects,
            unlock: None,
            cost: UpgradeCost::default(),
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_context_is_neutral() {
        let ctx = compose(Vec::<(&UpgradeData, u32)>::new());
        assert_eq!(ctx.producer_multiplier(ProducerId(0)), BigNum::ONE);
        assert_eq!(ctx.cost_reduction(ProducerId(0)), BigNum::ONE);
        assert_eq!(ctx.auto_purchase(UnitId(1)), None);
        assert_eq!(ctx.requirement_reduction(UnitId(1)), Decimal::ONE);
        assert_eq!(ctx.milestone_points_multiplier(), Decimal::ONE);
        assert_eq!(ctx.step_duration_multiplier(), Decimal::ONE);
    }

    #[test]
    fn test_layers_multiply() {
        let machine = upgrade(
            1,
            UpgradeOwner::Automation(UnitId(1)),
            vec![Effect::ProducerMultiplier {
                producer: ProducerId(0),
                factor: Decimal::TWO,
            }],
        );
        let prestige = upgrade(
            100,
            UpgradeOwner::Milestones,
            vec![Effect::GlobalMultiplier {
                factor: Decimal::from(3),
            }],
        );
        let ctx = compose([(&machine, 2), (&prestige, 1)]);

        assert_eq!(ctx.layer_multiplier(Layer::Machine, ProducerId(0)), BigNum::from(4_u64));
        assert_eq!(ctx.layer_multiplier(Layer::Prestige, ProducerId(0)), BigNum::from(3_u64));
        assert_eq!(ctx.producer_multiplier(ProducerId(0)), BigNum::from(12_u64));
        // Global prestige applies to producers no specific effect mentions
        assert_eq!(ctx.producer_multiplier(ProducerId(7)), BigNum::from(3_u64));
    }

    #[test]
    fn test_effects_compose_onto_same_target() {
        let a = upgrade(
            1,
            UpgradeOwner::Automation(UnitId(1)),
            vec![Effect::ProducerBonus {
                producer: ProducerId(0),
                bonus: dec("0.5"),
            }],
        );
        let b = upgrade(
            2,
            UpgradeOwner::Automation(UnitId(1)),
            vec![Effect::ProducerMultiplier {
                producer: ProducerId(0),
                factor: Decimal::TWO,
            }],
        );
        let ctx = compose([(&a, 2), (&b, 1)]);
        // (1 + 0.5 × 2) × 2
        assert_eq!(ctx.producer_multiplier(ProducerId(0)), BigNum::from(4_u64));
    }

    #[test]
    fn test_cost_reduction_idempotent() {
        let cheap = upgrade(
            3,
            UpgradeOwner::Milestones,
            vec![Effect::CostReduction {
                producer: Some(ProducerId(1)),
                factor: dec("1.25"),
            }],
        );
        let once = compose([(&cheap, 2)]);
        let twice = compose([(&cheap, 2)]);
        assert_eq!(once, twice);
        assert_eq!(once.cost_reduction(ProducerId(1)), BigNum::from_decimal(dec("1.5625")));
        assert_eq!(once.cost_reduction(ProducerId(0)), BigNum::ONE);
    }

    #[test]
    fn test_compose_order_independent_of_input_order() {
        let a = upgrade(
            1,
            UpgradeOwner::Automation(UnitId(1)),
            vec![Effect::AutoPurchase {
                unit: UnitId(1),
                producer: ProducerId(0),
                rate: dec("0.5"),
            }],
        );
        let b = upgrade(
            2,
            UpgradeOwner::Automation(UnitId(1)),
            vec![Effect::AutoPurchase {
                unit: UnitId(1),
                producer: ProducerId(1),
                rate: dec("0.25"),
            }],
        );
        let forward = compose([(&a, 1), (&b, 2)]);
        let backward = compose([(&b, 2), (&a, 1)]);
        assert_eq!(forward, backward);

        let auto = forward.auto_purchase(UnitId(1)).unwrap();
        assert_eq!(auto.rate, Decimal::ONE);
        assert_eq!(auto.producer, Some(ProducerId(1)));
        assert!(auto.enabled);
    }

    #[test]
    fn test_level_zero_ignored() {
        let a = upgrade(1, UpgradeOwner::Milestones, vec![Effect::StartingResource]);
        let ctx = compose([(&a, 0)]);
        assert_eq!(ctx, EffectContext::new());
    }

    #[test]
    fn test_milestone_scalars() {
        let a = upgrade(
            100,
            UpgradeOwner::Milestones,
            vec![
                Effect::MilestonePointsBonus { bonus: dec("0.5") },
                Effect::MilestonePointsMultiplier { factor: Decimal::TWO },
                Effect::MilestoneRequirement { factor: dec("0.5") },
                Effect::StepDuration { factor: dec("0.9") },
                Effect::StartingResource,
            ],
        );
        let ctx = compose([(&a, 2)]);
        // (1 + 1.0) × 4
        assert_eq!(ctx.milestone_points_multiplier(), Decimal::from(8));
        assert_eq!(ctx.milestone_requirement_multiplier(), dec("0.25"));
        assert_eq!(ctx.step_duration_multiplier(), dec("0.81"));
        assert_eq!(ctx.starting_resource_level(), 2);
    }

    #[test]
    fn test_requirement_reduction_specific_and_global() {
        let a = upgrade(
            100,
            UpgradeOwner::Milestones,
            vec![
                Effect::RequirementReduction {
                    unit: Some(UnitId(2)),
                    factor: dec("0.5"),
                },
                Effect::RequirementReduction {
                    unit: None,
                    factor: dec("0.8"),
                },
            ],
        );
        let ctx = compose([(&a, 1)]);
        assert_eq!(ctx.requirement_reduction(UnitId(2)), dec("0.4"));
        assert_eq!(ctx.requirement_reduction(UnitId(1)), dec("0.8"));
    }

    #[test]
    fn test_describe() {
        let effect = Effect::ProducerMultiplier {
            producer: ProducerId(1),
            factor: dec("1.5"),
        };
        assert_eq!(effect.describe(2), "Producer 1 output x2.25");
        assert_eq!(Effect::StartingResource.describe(3), "Start each season with 1e3");
    }
}
