//! Persistent game state.
//!
//! A [`Checkpoint`] is plain data: integers, booleans and decimal strings.
//! Hosts store it as JSON; [`Checkpoint::to_bytes`] gives a compact `bincode`
//! encoding that is also what [`Simulation::state_hash`] hashes.
//!
//! Optional fields default when missing so older saves keep loading.
//! Entries for ids the catalog no longer has are skipped with a warning.
//! Anything else that cannot be restored is a
//! [`GameError::CorruptCheckpoint`], which hosts handle by starting fresh.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::automation::{AutomationLedger, UnitState};
use crate::catalog::Catalog;
use crate::data::UpgradeOwner;
use crate::error::{GameError, Result};
use crate::ids::{ProducerId, UnitId, UpgradeId};
use crate::math::BigNum;
use crate::milestones::{MilestoneLedger, MilestoneRecord};
use crate::producers::{ProducerLedger, ProducerState};
use crate::simulation::{Counters, Simulation};

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

fn default_version() -> u32 {
    CHECKPOINT_VERSION
}

const fn one() -> u32 {
    1
}

fn zero_string() -> String {
    "0".to_string()
}

/// Saved state of a producer tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerCheckpoint {
    /// Producer id.
    pub id: ProducerId,
    /// Units bought directly, including starting units.
    #[serde(default)]
    pub manually_purchased: u64,
    /// Units owned, as a decimal string.
    pub total_owned: String,
    /// Whether the tier produces.
    #[serde(default)]
    pub unlocked: bool,
}

/// Saved level of one upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeLevel {
    /// Upgrade id.
    pub id: UpgradeId,
    /// Purchased level.
    pub level: u32,
}

/// Saved state of an automation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCheckpoint {
    /// Unit id.
    pub id: UnitId,
    /// Whether the unit is unlocked.
    #[serde(default)]
    pub unlocked: bool,
    /// Current level.
    #[serde(default = "one")]
    pub level: u32,
    /// Unspent points.
    #[serde(default)]
    pub points: u64,
    /// Progress toward the next level.
    #[serde(default)]
    pub progress: u64,
    /// Fractional auto-purchase credit, as a decimal string.
    #[serde(default = "zero_string")]
    pub purchase_credit: String,
    /// Upgrade levels.
    #[serde(default)]
    pub upgrades: Vec<UpgradeLevel>,
}

/// Saved milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRecordCheckpoint {
    /// Requirement met, as a decimal string.
    pub requirement: String,
    /// Points awarded.
    #[serde(default)]
    pub points: u64,
    /// Season of completion.
    #[serde(default = "one")]
    pub season: u32,
    /// Step of completion.
    #[serde(default)]
    pub step: u64,
}

/// Saved milestone and prestige state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneCheckpoint {
    /// Current season.
    #[serde(default = "one")]
    pub season: u32,
    /// Spendable prestige points.
    #[serde(default)]
    pub prestige_points: u64,
    /// Lifetime prestige points.
    #[serde(default)]
    pub total_prestige_points: u64,
    /// Lifetime milestones.
    #[serde(default)]
    pub total_milestones_completed: u64,
    /// Milestones this season.
    #[serde(default)]
    pub milestones_this_season: u64,
    /// In-season curve counter.
    #[serde(default)]
    pub season_milestone_counter: u64,
    /// Milestones this season, oldest first.
    #[serde(default)]
    pub history: Vec<MilestoneRecordCheckpoint>,
    /// Milestone upgrade levels.
    #[serde(default)]
    pub upgrades: Vec<UpgradeLevel>,
}

impl Default for MilestoneCheckpoint {
    fn default() -> Self {
        Self {
            season: 1,
            prestige_points: 0,
            total_prestige_points: 0,
            total_milestones_completed: 0,
            milestones_this_season: 0,
            season_milestone_counter: 0,
            history: Vec::new(),
            upgrades: Vec::new(),
        }
    }
}

/// Complete persistent state of a [`Simulation`].
///
/// Derived values (multipliers, step duration) are not saved; they are
/// rebuilt on restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Terminal resource balance, as a decimal string.
    pub resource: String,
    /// Steps advanced this season.
    #[serde(default)]
    pub step: u64,
    /// Global manual purchase counter.
    #[serde(default)]
    pub global_purchases: u64,
    /// Producer tiers.
    #[serde(default)]
    pub producers: Vec<ProducerCheckpoint>,
    /// Automation units.
    #[serde(default)]
    pub automation: Vec<UnitCheckpoint>,
    /// Milestone ledger.
    #[serde(default)]
    pub milestones: MilestoneCheckpoint,
}

fn levels(map: &std::collections::BTreeMap<UpgradeId, u32>) -> Vec<UpgradeLevel> {
    map.iter()
        .map(|(&id, &level)| UpgradeLevel { id, level })
        .collect()
}

fn parse_number(field: &str, value: &str) -> Result<BigNum> {
    BigNum::from_str(value)
        .map_err(|_| GameError::CorruptCheckpoint(format!("{field} is not a number: '{value}'")))
}

impl Checkpoint {
    /// Capture the persistent state of a simulation.
    #[must_use]
    pub fn capture(sim: &Simulation) -> Self {
        let counters = sim.counters();
        let milestones = sim.milestones();
        Self {
            version: CHECKPOINT_VERSION,
            resource: sim.resource().to_string(),
            step: counters.step,
            global_purchases: counters.global_purchases,
            producers: sim
                .producers()
                .tiers()
                .iter()
                .map(|t| ProducerCheckpoint {
                    id: t.id,
                    manually_purchased: t.manually_purchased,
                    total_owned: t.total_owned.to_string(),
                    unlocked: t.unlocked,
                })
                .collect(),
            automation: sim
                .automation()
                .units()
                .iter()
                .map(|u| UnitCheckpoint {
                    id: u.id,
                    unlocked: u.unlocked,
                    level: u.level,
                    points: u.points,
                    progress: u.progress,
                    purchase_credit: u.purchase_credit.normalize().to_string(),
                    upgrades: levels(&u.upgrades),
                })
                .collect(),
            milestones: MilestoneCheckpoint {
                season: milestones.season,
                prestige_points: milestones.prestige_points,
                total_prestige_points: milestones.total_prestige_points,
                total_milestones_completed: milestones.total_milestones_completed,
                milestones_this_season: milestones.milestones_this_season,
                season_milestone_counter: milestones.season_milestone_counter,
                history: milestones
                    .history
                    .iter()
                    .map(|r| MilestoneRecordCheckpoint {
                        requirement: r.requirement.to_string(),
                        points: r.points,
                        season: r.season,
                        step: r.step,
                    })
                    .collect(),
                upgrades: levels(&milestones.upgrades),
            },
        }
    }

    /// Rebuild a simulation on a catalog.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::CorruptCheckpoint`] for unparseable numbers,
    /// impossible values or an unsupported version.
    pub fn restore(&self, catalog: Arc<Catalog>) -> Result<Simulation> {
        if self.version > CHECKPOINT_VERSION {
            return Err(GameError::CorruptCheckpoint(format!(
                "unsupported version {}",
                self.version
            )));
        }
        let resource = parse_number("resource", &self.resource)?;
        if resource.is_negative() {
            return Err(GameError::CorruptCheckpoint("negative resource".to_string()));
        }
        let producers = self.restore_producers(&catalog, resource)?;
        let automation = self.restore_automation(&catalog)?;
        let milestones = self.restore_milestones(&catalog)?;
        let counters = Counters {
            step: self.step,
            global_purchases: self.global_purchases,
        };
        tracing::debug!(
            step = self.step,
            season = milestones.season,
            "Checkpoint restored"
        );
        Ok(Simulation::from_parts(
            catalog,
            counters,
            producers,
            automation,
            milestones,
        ))
    }

    fn restore_producers(&self, catalog: &Catalog, resource: BigNum) -> Result<ProducerLedger> {
        let mut tiers: Vec<ProducerState> =
            catalog.producers().iter().map(ProducerState::new).collect();
        for saved in &self.producers {
            let Some(index) = catalog.producer_index(saved.id) else {
                tracing::warn!(producer = %saved.id, "Skipping unknown producer in checkpoint");
                continue;
            };
            let total_owned = parse_number("total_owned", &saved.total_owned)?;
            if total_owned < BigNum::from(saved.manually_purchased) {
                return Err(GameError::CorruptCheckpoint(format!(
                    "producer {} owns fewer units than it bought",
                    saved.id
                )));
            }
            let tier = &mut tiers[index];
            tier.manually_purchased = saved.manually_purchased;
            tier.total_owned = total_owned;
            tier.unlocked = saved.unlocked;
        }
        Ok(ProducerLedger::from_parts(resource, tiers))
    }

    fn restore_automation(&self, catalog: &Catalog) -> Result<AutomationLedger> {
        let mut units: Vec<UnitState> = catalog
            .automation_units()
            .iter()
            .map(|u| UnitState::new(u.id))
            .collect();
        for saved in &self.automation {
            let Some(index) = catalog.unit_index(saved.id) else {
                tracing::warn!(unit = %saved.id, "Skipping unknown automation unit in checkpoint");
                continue;
            };
            if saved.level == 0 {
                return Err(GameError::CorruptCheckpoint(format!(
                    "automation unit {} has level 0",
                    saved.id
                )));
            }
            let credit = Decimal::from_str(&saved.purchase_credit).map_err(|_| {
                GameError::CorruptCheckpoint(format!(
                    "purchase_credit is not a number: '{}'",
                    saved.purchase_credit
                ))
            })?;
            let unit = &mut units[index];
            unit.unlocked = saved.unlocked;
            unit.level = saved.level;
            unit.points = saved.points;
            unit.progress = saved.progress;
            unit.purchase_credit = credit;
            for level in &saved.upgrades {
                let owned = catalog
                    .upgrade(level.id)
                    .is_some_and(|u| u.owner == UpgradeOwner::Automation(saved.id));
                if owned {
                    unit.upgrades.insert(level.id, level.level);
                } else {
                    tracing::warn!(unit = %saved.id, upgrade = %level.id, "Skipping unknown upgrade in checkpoint");
                }
            }
        }
        Ok(AutomationLedger::from_parts(units))
    }

    fn restore_milestones(&self, catalog: &Catalog) -> Result<MilestoneLedger> {
        let saved = &self.milestones;
        if saved.season == 0 {
            return Err(GameError::CorruptCheckpoint("season 0".to_string()));
        }
        if saved.prestige_points > saved.total_prestige_points {
            return Err(GameError::CorruptCheckpoint(
                "more prestige points than ever earned".to_string(),
            ));
        }
        let history = saved
            .history
            .iter()
            .map(|r| {
                Ok(MilestoneRecord {
                    requirement: parse_number("milestone requirement", &r.requirement)?,
                    points: r.points,
                    season: r.season,
                    step: r.step,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut ledger = MilestoneLedger::new();
        ledger.season = saved.season;
        ledger.prestige_points = saved.prestige_points;
        ledger.total_prestige_points = saved.total_prestige_points;
        ledger.total_milestones_completed = saved.total_milestones_completed;
        ledger.milestones_this_season = saved.milestones_this_season;
        ledger.season_milestone_counter = saved.season_milestone_counter;
        ledger.history = history;
        for level in &saved.upgrades {
            let owned = catalog
                .upgrade(level.id)
                .is_some_and(|u| u.owner == UpgradeOwner::Milestones);
            if owned {
                ledger.upgrades.insert(level.id, level.level);
            } else {
                tracing::warn!(upgrade = %level.id, "Skipping unknown milestone upgrade in checkpoint");
            }
        }
        Ok(ledger)
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize checkpoint: {e}")))
    }

    /// Decode from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::CorruptCheckpoint`] if the text is not a
    /// checkpoint.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| GameError::CorruptCheckpoint(e.to_string()))
    }

    /// Encode as compact bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize checkpoint: {e}")))
    }

    /// Decode from [`to_bytes`](Self::to_bytes) output.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::CorruptCheckpoint`] if the bytes are not a
    /// checkpoint.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| GameError::CorruptCheckpoint(e.to_string()))
    }
}
