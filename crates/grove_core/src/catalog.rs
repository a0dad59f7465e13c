//! Validated, immutable game catalog.
//!
//! A [`Catalog`] is built once from [`CatalogData`] and shared by every
//! simulation that uses it. Validation fails fast: a catalog that loads is
//! guaranteed to have a well-formed production chain and resolvable
//! references.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::data::{
    AutomationUnitData, CatalogData, LevelingMode, MilestoneData, ProducerData, ProducerOutput,
    UpgradeData, UpgradeOwner,
};
use crate::effects::Effect;
use crate::error::{GameError, Result};
use crate::ids::{ProducerId, UnitId, UpgradeId};
use crate::math::BigNum;
use crate::producers::purchase_cost;

/// Immutable catalog of producers, automation units, upgrades and milestone
/// parameters.
#[derive(Debug, Clone)]
pub struct Catalog {
    name: String,
    step_seconds: Decimal,
    min_step_seconds: Decimal,
    catch_up_batch_size: u32,
    max_catch_up_steps: Option<u64>,
    producers: Vec<ProducerData>,
    units: Vec<AutomationUnitData>,
    upgrades: Vec<UpgradeData>,
    milestones: MilestoneData,
    producer_index: BTreeMap<ProducerId, usize>,
    unit_index: BTreeMap<UnitId, usize>,
    upgrade_index: BTreeMap<UpgradeId, usize>,
}

impl Catalog {
    /// Parse and validate a RON catalog.
    ///
    /// `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the text is not a valid
    /// catalog, or a configuration error if validation fails.
    pub fn from_ron(text: &str, path: &str) -> Result<Self> {
        let data: CatalogData = ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_data(data)
    }

    /// Validate catalog data.
    ///
    /// # Errors
    ///
    /// Returns the first configuration fault found.
    pub fn from_data(data: CatalogData) -> Result<Self> {
        let producer_index = index_by(&data.producers, |p| p.id, "producer", |id| id.0)?;
        let unit_index = index_by(&data.automation_units, |u| u.id, "automation unit", |id| id.0)?;

        let mut upgrades = data.upgrades;
        upgrades.sort_by_key(|u| u.id);
        let upgrade_index = index_by(&upgrades, |u| u.id, "upgrade", |id| id.0)?;

        if data.producers.is_empty() {
            return Err(GameError::InvalidConfig(
                "catalog must define at least one producer".to_string(),
            ));
        }
        if data.step_seconds <= Decimal::ZERO {
            return Err(GameError::InvalidConfig(format!(
                "step_seconds must be positive, got {}",
                data.step_seconds
            )));
        }
        let min_step_seconds = data
            .min_step_seconds
            .unwrap_or(data.step_seconds * Decimal::new(1, 1));
        if min_step_seconds <= Decimal::ZERO {
            return Err(GameError::InvalidConfig(format!(
                "min_step_seconds must be positive, got {min_step_seconds}"
            )));
        }
        if data.catch_up_batch_size == 0 {
            return Err(GameError::InvalidConfig(
                "catch_up_batch_size must be at least 1".to_string(),
            ));
        }

        for (index, producer) in data.producers.iter().enumerate() {
            validate_producer(producer, index, &producer_index)?;
        }
        for unit in &data.automation_units {
            validate_unit(unit)?;
        }
        validate_milestones(&data.milestones)?;

        let catalog = Self {
            name: data.name,
            step_seconds: data.step_seconds,
            min_step_seconds,
            catch_up_batch_size: data.catch_up_batch_size,
            max_catch_up_steps: data.max_catch_up_steps,
            producers: data.producers,
            units: data.automation_units,
            upgrades,
            milestones: data.milestones,
            producer_index,
            unit_index,
            upgrade_index,
        };
        for upgrade in &catalog.upgrades {
            catalog.validate_upgrade(upgrade)?;
        }

        tracing::debug!(
            catalog = %catalog.name,
            producers = catalog.producers.len(),
            units = catalog.units.len(),
            upgrades = catalog.upgrades.len(),
            "Catalog validated"
        );
        Ok(catalog)
    }

    fn validate_upgrade(&self, upgrade: &UpgradeData) -> Result<()> {
        let context = format!("upgrade {}", upgrade.id);
        if let UpgradeOwner::Automation(unit) = upgrade.owner {
            self.require_unit(unit, &context)?;
        }
        if let Some(condition) = upgrade.unlock {
            let sibling = self.upgrade(condition.upgrade).ok_or(GameError::UnknownUnlockSibling {
                upgrade: upgrade.id.0,
                sibling: condition.upgrade.0,
            })?;
            if sibling.owner != upgrade.owner {
                return Err(GameError::InvalidConfig(format!(
                    "upgrade {} unlock condition names upgrade {} of a different owner",
                    upgrade.id, sibling.id
                )));
            }
        }
        if upgrade.cost.growth < Decimal::ONE {
            return Err(GameError::InvalidConfig(format!(
                "upgrade {} cost growth must be at least 1",
                upgrade.id
            )));
        }

        for effect in &upgrade.effects {
            match *effect {
                Effect::ProducerMultiplier { producer, factor } => {
                    self.require_producer(producer, &context)?;
                    require_positive(factor, &context)?;
                }
                Effect::ProducerBonus { producer, bonus } => {
                    self.require_producer(producer, &context)?;
                    if bonus.is_sign_negative() {
                        return Err(GameError::InvalidConfig(format!(
                            "{context}: producer bonus must not be negative"
                        )));
                    }
                }
                Effect::CostReduction { producer, factor } => {
                    if let Some(producer) = producer {
                        self.require_producer(producer, &context)?;
                    }
                    require_positive(factor, &context)?;
                }
                Effect::AutoPurchase {
                    unit,
                    producer,
                    rate,
                } => {
                    self.require_unit(unit, &context)?;
                    self.require_producer(producer, &context)?;
                    require_positive(rate, &context)?;
                }
                Effect::RequirementReduction { unit, factor } => {
                    if let Some(unit) = unit {
                        self.require_unit(unit, &context)?;
                    }
                    require_positive(factor, &context)?;
                }
                Effect::GlobalMultiplier { factor }
                | Effect::MilestoneRequirement { factor }
                | Effect::MilestonePointsMultiplier { factor }
                | Effect::StepDuration { factor } => require_positive(factor, &context)?,
                Effect::MilestonePointsBonus { bonus } => {
                    if bonus.is_sign_negative() {
                        return Err(GameError::InvalidConfig(format!(
                            "{context}: milestone point bonus must not be negative"
                        )));
                    }
                }
                Effect::StartingResource => {}
            }
        }
        Ok(())
    }

    fn require_producer(&self, id: ProducerId, context: &str) -> Result<()> {
        if self.producer_index.contains_key(&id) {
            Ok(())
        } else {
            Err(GameError::UnknownReference {
                kind: "producer",
                id: id.0,
                context: context.to_string(),
            })
        }
    }

    fn require_unit(&self, id: UnitId, context: &str) -> Result<()> {
        if self.unit_index.contains_key(&id) {
            Ok(())
        } else {
            Err(GameError::UnknownReference {
                kind: "automation unit",
                id: id.0,
                context: context.to_string(),
            })
        }
    }

    /// Catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base real-time duration of one step, in seconds.
    #[must_use]
    pub const fn step_seconds(&self) -> Decimal {
        self.step_seconds
    }

    /// Lower bound of the effective step duration.
    #[must_use]
    pub const fn min_step_seconds(&self) -> Decimal {
        self.min_step_seconds
    }

    /// Default catch-up batch size.
    #[must_use]
    pub const fn catch_up_batch_size(&self) -> u32 {
        self.catch_up_batch_size
    }

    /// Cap on steps replayed by one catch-up.
    #[must_use]
    pub const fn max_catch_up_steps(&self) -> Option<u64> {
        self.max_catch_up_steps
    }

    /// Producer tiers, lowest first.
    #[must_use]
    pub fn producers(&self) -> &[ProducerData] {
        &self.producers
    }

    /// Automation units in declaration order.
    #[must_use]
    pub fn automation_units(&self) -> &[AutomationUnitData] {
        &self.units
    }

    /// Upgrades in ascending id order.
    #[must_use]
    pub fn upgrades(&self) -> &[UpgradeData] {
        &self.upgrades
    }

    /// Milestone curve parameters.
    #[must_use]
    pub const fn milestones(&self) -> &MilestoneData {
        &self.milestones
    }

    /// Tier index of a producer.
    #[must_use]
    pub fn producer_index(&self, id: ProducerId) -> Option<usize> {
        self.producer_index.get(&id).copied()
    }

    /// Get a producer definition by id.
    #[must_use]
    pub fn producer(&self, id: ProducerId) -> Option<&ProducerData> {
        self.producer_index(id).map(|i| &self.producers[i])
    }

    /// Position of an automation unit.
    #[must_use]
    pub fn unit_index(&self, id: UnitId) -> Option<usize> {
        self.unit_index.get(&id).copied()
    }

    /// Get an automation unit definition by id.
    #[must_use]
    pub fn automation_unit(&self, id: UnitId) -> Option<&AutomationUnitData> {
        self.unit_index(id).map(|i| &self.units[i])
    }

    /// Get an upgrade definition by id.
    #[must_use]
    pub fn upgrade(&self, id: UpgradeId) -> Option<&UpgradeData> {
        self.upgrade_index.get(&id).map(|&i| &self.upgrades[i])
    }

    /// Upgrades owned by an automation unit, ascending id.
    pub fn unit_upgrades(&self, unit: UnitId) -> impl Iterator<Item = &UpgradeData> {
        self.upgrades
            .iter()
            .filter(move |u| u.owner == UpgradeOwner::Automation(unit))
    }

    /// Upgrades bought with prestige points, ascending id.
    pub fn milestone_upgrades(&self) -> impl Iterator<Item = &UpgradeData> {
        self.upgrades
            .iter()
            .filter(|u| u.owner == UpgradeOwner::Milestones)
    }
}

/// Build an id → position map, rejecting duplicates.
fn index_by<T, K: Ord + Copy>(
    items: &[T],
    key: impl Fn(&T) -> K,
    kind: &'static str,
    raw: impl Fn(K) -> u32,
) -> Result<BTreeMap<K, usize>> {
    let mut index = BTreeMap::new();
    for (i, item) in items.iter().enumerate() {
        let id = key(item);
        if index.insert(id, i).is_some() {
            return Err(GameError::DuplicateId { kind, id: raw(id) });
        }
    }
    Ok(index)
}

fn require_positive(value: Decimal, context: &str) -> Result<()> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(GameError::InvalidConfig(format!(
            "{context}: factor must be positive, got {value}"
        )))
    }
}

fn validate_producer(
    producer: &ProducerData,
    index: usize,
    producer_index: &BTreeMap<ProducerId, usize>,
) -> Result<()> {
    if let ProducerOutput::Feeds(target) = producer.output {
        let target_index = producer_index
            .get(&target)
            .copied()
            .ok_or(GameError::UnknownFeedTarget {
                producer: producer.id.0,
                target: target.0,
            })?;
        if target_index >= index {
            return Err(GameError::FeedOrder {
                producer: producer.id.0,
                target: target.0,
            });
        }
    }

    let invalid = |what: &str| {
        Err(GameError::InvalidConfig(format!(
            "producer {}: {what}",
            producer.id
        )))
    };
    if producer.base_production.is_negative() {
        return invalid("base_production must not be negative");
    }
    if !producer.base_cost.is_positive() {
        return invalid("base_cost must be positive");
    }
    if producer.cost_multiplier <= Decimal::ZERO {
        return invalid("cost_multiplier must be positive");
    }
    if producer.cost_divisor <= Decimal::ZERO {
        return invalid("cost_divisor must be positive");
    }
    if producer.cost_linear.is_sign_negative() {
        return invalid("cost_linear must not be negative");
    }
    if producer.cost_base + producer.cost_linear <= Decimal::ONE {
        return invalid("cost_base + cost_linear must exceed 1");
    }
    // The curve must rise above the flat first price.
    let first = purchase_cost(producer, producer.starting_owned, BigNum::ONE);
    let second = purchase_cost(producer, producer.starting_owned.saturating_add(1), BigNum::ONE);
    if second <= first {
        return invalid("second purchase must cost more than the first");
    }
    Ok(())
}

fn validate_unit(unit: &AutomationUnitData) -> Result<()> {
    let invalid = |what: &str| {
        Err(GameError::InvalidConfig(format!(
            "automation unit {}: {what}",
            unit.id
        )))
    };
    if unit.base_requirement == 0 {
        return invalid("base_requirement must be at least 1");
    }
    if unit.mode == LevelingMode::ByStep && unit.scaling < Decimal::ONE {
        return invalid("scaling must be at least 1");
    }
    if unit.requirement_floor <= Decimal::ZERO || unit.requirement_floor > Decimal::ONE {
        return invalid("requirement_floor must be in (0, 1]");
    }
    if unit.unlock_cost.is_some_and(|cost| cost.is_negative()) {
        return invalid("unlock_cost must not be negative");
    }
    Ok(())
}

fn validate_milestones(milestones: &MilestoneData) -> Result<()> {
    let invalid = |what: &str| Err(GameError::InvalidConfig(format!("milestones: {what}")));
    if !milestones.base_requirement.is_positive() {
        return invalid("base_requirement must be positive");
    }
    if milestones.growth < Decimal::ONE || milestones.season_growth < Decimal::ONE {
        return invalid("growth factors must be at least 1");
    }
    if milestones.requirement_floor <= Decimal::ZERO || milestones.requirement_floor > Decimal::ONE
    {
        return invalid("requirement_floor must be in (0, 1]");
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = r#"CatalogData(
        name: "Test",
        producers: [
            ProducerData(
                id: 0, name: "Sprout", base_production: "100", base_cost: "3",
                cost_multiplier: "3", cost_base: "1.065", cost_divisor: "100",
                output: Terminal, starting_owned: 1,
            ),
            ProducerData(
                id: 1, name: "Seed Bed", base_production: "1", base_cost: "100",
                cost_multiplier: "100", cost_base: "1.12", cost_divisor: "200",
                output: Feeds(0),
            ),
        ],
        automation_units: [
            AutomationUnitData(id: 1, name: "Sprinkler", mode: ByStep, base_requirement: 60),
        ],
        upgrades: [
            UpgradeData(
                id: 2, name: "Nozzles", owner: Automation(1),
                effects: [ProducerMultiplier(producer: 0, factor: "2")],
                unlock: Some(UnlockCondition(upgrade: 1, level: 1)),
            ),
            UpgradeData(
                id: 1, name: "Pipes", owner: Automation(1),
                effects: [CostReduction(factor: "1.1")],
            ),
        ],
        milestones: MilestoneData(base_requirement: "1000", base_points: 1),
    )"#;

    #[test]
    fn test_load_valid_catalog() {
        let catalog = Catalog::from_ron(CHAIN, "test.ron").unwrap();
        assert_eq!(catalog.producers().len(), 2);
        assert_eq!(catalog.step_seconds(), Decimal::ONE);
        assert_eq!(catalog.catch_up_batch_size(), 100);
        // Upgrades are sorted by id
        let ids: Vec<_> = catalog.upgrades().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![UpgradeId(1), UpgradeId(2)]);
        assert_eq!(catalog.unit_upgrades(UnitId(1)).count(), 2);
        assert_eq!(catalog.milestone_upgrades().count(), 0);
        assert_eq!(catalog.producer_index(ProducerId(1)), Some(1));
    }

    #[test]
    fn test_unknown_feed_target() {
        let text = CHAIN.replace("Feeds(0)", "Feeds(9)");
        let err = Catalog::from_ron(&text, "test.ron").unwrap_err();
        assert_eq!(
            err,
            GameError::UnknownFeedTarget {
                producer: 1,
                target: 9
            }
        );
    }

    #[test]
    fn test_feed_must_point_down() {
        let text = CHAIN.replace("Feeds(0)", "Feeds(1)");
        let err = Catalog::from_ron(&text, "test.ron").unwrap_err();
        assert_eq!(
            err,
            GameError::FeedOrder {
                producer: 1,
                target: 1
            }
        );
    }

    #[test]
    fn test_unknown_unlock_sibling() {
        let text = CHAIN.replace("UnlockCondition(upgrade: 1", "UnlockCondition(upgrade: 5");
        let err = Catalog::from_ron(&text, "test.ron").unwrap_err();
        assert_eq!(
            err,
            GameError::UnknownUnlockSibling {
                upgrade: 2,
                sibling: 5
            }
        );
    }

    #[test]
    fn test_unknown_owner_unit() {
        let text = CHAIN.replace(
            "name: \"Pipes\", owner: Automation(1)",
            "name: \"Pipes\", owner: Automation(4)",
        );
        let err = Catalog::from_ron(&text, "test.ron").unwrap_err();
        assert!(matches!(
            err,
            GameError::UnknownReference {
                kind: "automation unit",
                id: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_producer_id() {
        let text = CHAIN.replace("id: 1, name: \"Seed Bed\"", "id: 0, name: \"Seed Bed\"");
        let err = Catalog::from_ron(&text, "test.ron").unwrap_err();
        assert_eq!(
            err,
            GameError::DuplicateId {
                kind: "producer",
                id: 0
            }
        );
    }

    #[test]
    fn test_flat_curve_rejected() {
        let text = CHAIN.replace("cost_base: \"1.12\"", "cost_base: \"1\"");
        let err = Catalog::from_ron(&text, "test.ron").unwrap_err();
        assert!(matches!(err, GameError::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let err = Catalog::from_ron("CatalogData(", "broken.ron").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { ref path, .. } if path == "broken.ron"));
    }

    #[test]
    fn test_shared_catalog_loads() {
        let catalog = test_support::catalog();
        assert_eq!(catalog.producers().len(), 3);
        assert_eq!(catalog.automation_units().len(), 2);
        assert_eq!(catalog.milestone_upgrades().count(), 4);
        assert_eq!(catalog.min_step_seconds(), Decimal::new(1, 1));
    }
}
