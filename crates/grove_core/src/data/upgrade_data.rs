//! Upgrade data structures for data-driven effect definitions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::effects::{Effect, Layer};
use crate::ids::{UnitId, UpgradeId};

/// Which ledger an upgrade belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeOwner {
    /// Bought with an automation unit's points. Reset on prestige.
    Automation(UnitId),
    /// Bought with prestige points. Survives prestige.
    Milestones,
}

impl UpgradeOwner {
    /// Multiplier layer written by upgrades of this owner.
    #[must_use]
    pub const fn layer(self) -> Layer {
        match self {
            Self::Automation(_) => Layer::Machine,
            Self::Milestones => Layer::Prestige,
        }
    }
}

/// Purchase gate: a sibling upgrade must have reached a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockCondition {
    /// Sibling upgrade (same owner).
    pub upgrade: UpgradeId,
    /// Minimum sibling level.
    pub level: u32,
}

/// Prestige-point price of a milestone upgrade: `base × growth^level`, rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeCost {
    /// Price of the first level.
    pub base: u64,
    /// Per-level growth.
    #[serde(default = "default_growth")]
    pub growth: Decimal,
}

impl Default for UpgradeCost {
    fn default() -> Self {
        Self {
            base: 1,
            growth: default_growth(),
        }
    }
}

/// Default cost growth (flat price).
fn default_growth() -> Decimal {
    Decimal::ONE
}

/// Data-driven upgrade definition.
///
/// # Example RON
///
/// ```ron
/// UpgradeData(
///     id: 2,
///     name: "Wide Nozzles",
///     owner: Automation(1),
///     max_level: Some(10),
///     effects: [ProducerMultiplier(producer: 1, factor: "1.5")],
///     unlock: Some(UnlockCondition(upgrade: 1, level: 5)),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeData {
    /// Catalog-wide unique identifier.
    pub id: UpgradeId,

    /// Display name.
    pub name: String,

    /// Owning ledger.
    pub owner: UpgradeOwner,

    /// Highest purchasable level. `None` is unbounded.
    #[serde(default)]
    pub max_level: Option<u32>,

    /// Effects applied in order for every level above zero.
    pub effects: Vec<Effect>,

    /// Optional purchase gate.
    #[serde(default)]
    pub unlock: Option<UnlockCondition>,

    /// Prestige-point price (milestone upgrades only).
    #[serde(default)]
    pub cost: UpgradeCost,
}

impl UpgradeData {
    /// Check if another level may be bought given the current one.
    #[must_use]
    pub fn below_max(&self, level: u32) -> bool {
        self.max_level.map_or(true, |max| level < max)
    }

    /// Human-readable summary of every effect at a level.
    #[must_use]
    pub fn describe(&self, level: u32) -> Vec<String> {
        self.effects.iter().map(|e| e.describe(level)).collect()
    }
}
