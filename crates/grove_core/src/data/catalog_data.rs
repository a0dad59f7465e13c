//! Top-level catalog data combining every static definition.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::automation_data::AutomationUnitData;
use super::producer_data::ProducerData;
use super::upgrade_data::UpgradeData;
use crate::math::BigNum;

/// Milestone curve parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneData {
    /// Requirement of the first milestone in season 1.
    pub base_requirement: BigNum,

    /// Points for one milestone before multipliers.
    pub base_points: u64,

    /// Per-milestone growth of the in-season requirement.
    #[serde(default = "default_milestone_growth")]
    pub growth: Decimal,

    /// Per-season growth of the season base requirement.
    #[serde(default = "default_season_growth")]
    pub season_growth: Decimal,

    /// Lowest fraction of the nominal requirement that reductions may reach.
    #[serde(default = "default_requirement_floor")]
    pub requirement_floor: Decimal,
}

/// Default in-season growth (1.5).
fn default_milestone_growth() -> Decimal {
    Decimal::new(15, 1)
}

/// Default per-season growth (2).
fn default_season_growth() -> Decimal {
    Decimal::TWO
}

/// Default milestone requirement floor (3.125%).
fn default_requirement_floor() -> Decimal {
    Decimal::new(3125, 5)
}

/// Complete catalog definition.
///
/// Loaded from a RON file. Validation happens in
/// [`Catalog::from_data`](crate::catalog::Catalog::from_data).
///
/// # Example RON
///
/// ```ron
/// CatalogData(
///     name: "Grove",
///     step_seconds: "1",
///     producers: [...],
///     automation_units: [...],
///     upgrades: [...],
///     milestones: MilestoneData(base_requirement: "1000", base_points: 1),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogData {
    /// Catalog name, for logs.
    pub name: String,

    /// Real seconds covered by one step before effects.
    #[serde(default = "default_step_seconds")]
    pub step_seconds: Decimal,

    /// Lower bound for the effective step duration.
    #[serde(default)]
    pub min_step_seconds: Option<Decimal>,

    /// Steps replayed per catch-up batch.
    #[serde(default = "default_batch_size")]
    pub catch_up_batch_size: u32,

    /// Cap on the number of steps a single catch-up may replay.
    #[serde(default)]
    pub max_catch_up_steps: Option<u64>,

    /// Producer tiers, lowest first.
    pub producers: Vec<ProducerData>,

    /// Automation units.
    #[serde(default)]
    pub automation_units: Vec<AutomationUnitData>,

    /// Upgrades of every owner.
    #[serde(default)]
    pub upgrades: Vec<UpgradeData>,

    /// Milestone curve.
    pub milestones: MilestoneData,
}

/// Default step duration (one second).
fn default_step_seconds() -> Decimal {
    Decimal::ONE
}

/// Default catch-up batch size.
const fn default_batch_size() -> u32 {
    100
}
