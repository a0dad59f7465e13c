//! Automation unit data structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::UnitId;
use crate::math::BigNum;

/// What drives an automation unit's level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelingMode {
    /// Progress accrues one point per simulation step.
    ByStep,
    /// Level follows the global manual purchase counter.
    ByPurchaseCount,
}

/// Data-driven definition of an automation unit.
///
/// # Example RON
///
/// ```ron
/// AutomationUnitData(
///     id: 1,
///     name: "Sprinkler",
///     mode: ByStep,
///     base_requirement: 60,
///     scaling: "1.15",
///     unlock_cost: Some("1e3"),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationUnitData {
    /// Stable identifier.
    pub id: UnitId,

    /// Display name.
    pub name: String,

    /// Leveling mode.
    pub mode: LevelingMode,

    /// Steps needed for level 2, or purchases needed per level.
    pub base_requirement: u64,

    /// Per-level growth of the step requirement.
    #[serde(default = "default_scaling")]
    pub scaling: Decimal,

    /// Resource consumed by unlocking. `None` unlocks for free.
    #[serde(default)]
    pub unlock_cost: Option<BigNum>,

    /// Lowest fraction of the nominal requirement that reductions may reach.
    #[serde(default = "default_requirement_floor")]
    pub requirement_floor: Decimal,
}

/// Default per-level scaling (no growth).
fn default_scaling() -> Decimal {
    Decimal::ONE
}

/// Default requirement floor (10% of nominal).
fn default_requirement_floor() -> Decimal {
    Decimal::new(1, 1)
}
