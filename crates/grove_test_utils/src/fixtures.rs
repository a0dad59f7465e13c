//! Test fixtures and helpers.
//!
//! Pre-built catalogs and game states for consistent testing.

use std::sync::Arc;

use grove_core::catalog::Catalog;
use grove_core::data::{CatalogData, MilestoneData, ProducerData, ProducerOutput};
use grove_core::ids::ProducerId;
use grove_core::math::BigNum;
use grove_core::simulation::Simulation;
use rust_decimal::Decimal;

/// The shipped standard catalog.
pub const STANDARD_CATALOG: &str = include_str!("../../../assets/data/catalog.ron");

/// Parse a big number (for tests only).
///
/// # Panics
///
/// Panics if `text` is not a number.
#[must_use]
pub fn big(text: &str) -> BigNum {
    text.parse()
        .unwrap_or_else(|e| panic!("bad test number '{text}': {e}"))
}

/// Parse a decimal (for tests only).
///
/// # Panics
///
/// Panics if `text` is not a decimal.
#[must_use]
pub fn dec(text: &str) -> Decimal {
    text.parse()
        .unwrap_or_else(|e| panic!("bad test decimal '{text}': {e}"))
}

/// Load the shipped standard catalog.
///
/// # Panics
///
/// Panics if the shipped catalog fails validation.
#[must_use]
pub fn standard_catalog() -> Arc<Catalog> {
    match Catalog::from_ron(STANDARD_CATALOG, "assets/data/catalog.ron") {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => panic!("standard catalog is invalid: {e}"),
    }
}

/// Fresh game on the standard catalog.
#[must_use]
pub fn standard_sim() -> Simulation {
    Simulation::new(standard_catalog())
}

/// Builder for minimal production-chain catalogs.
///
/// Tier 0 is terminal and starts with one owned unit; every later tier feeds
/// the one below it. Costs follow a gentle curve so the chain validates.
///
/// # Example
///
/// ```
/// use grove_test_utils::fixtures::ChainBuilder;
///
/// let catalog = ChainBuilder::new(&[100, 1, 5]).build();
/// assert_eq!(catalog.producers().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    rates: Vec<u64>,
    base_requirement: BigNum,
    starting_owned: u64,
}

impl ChainBuilder {
    /// Chain with one tier per rate, lowest first.
    #[must_use]
    pub fn new(rates: &[u64]) -> Self {
        Self {
            rates: rates.to_vec(),
            base_requirement: BigNum::from(1000_u64),
            starting_owned: 1,
        }
    }

    /// First milestone requirement.
    #[must_use]
    pub fn milestone(mut self, base_requirement: u64) -> Self {
        self.base_requirement = BigNum::from(base_requirement);
        self
    }

    /// Units of tier 0 owned at the start of each season.
    #[must_use]
    pub fn starting_owned(mut self, owned: u64) -> Self {
        self.starting_owned = owned;
        self
    }

    /// Catalog data before validation.
    #[must_use]
    pub fn data(&self) -> CatalogData {
        let producers = self
            .rates
            .iter()
            .enumerate()
            .map(|(index, &rate)| {
                let tier = index as u32;
                let cost = BigNum::from(10_u64).powi(u64::from(tier) * 2 + 1);
                ProducerData {
                    id: ProducerId(tier),
                    name: format!("Tier {tier}"),
                    base_production: BigNum::from(rate),
                    base_cost: cost,
                    cost_multiplier: cost.to_decimal().unwrap_or(Decimal::MAX),
                    cost_base: Decimal::new(11, 1),
                    cost_linear: Decimal::ZERO,
                    cost_threshold: 0,
                    cost_divisor: Decimal::new(100, 0),
                    output: match tier {
                        0 => ProducerOutput::Terminal,
                        _ => ProducerOutput::Feeds(ProducerId(tier - 1)),
                    },
                    starting_owned: if tier == 0 { self.starting_owned } else { 0 },
                }
            })
            .collect();
        CatalogData {
            name: "Chain".to_string(),
            step_seconds: Decimal::ONE,
            min_step_seconds: None,
            catch_up_batch_size: 100,
            max_catch_up_steps: None,
            producers,
            automation_units: Vec::new(),
            upgrades: Vec::new(),
            milestones: MilestoneData {
                base_requirement: self.base_requirement,
                base_points: 1,
                growth: Decimal::new(15, 1),
                season_growth: Decimal::TWO,
                requirement_floor: Decimal::new(3125, 5),
            },
        }
    }

    /// Validated catalog.
    ///
    /// # Panics
    ///
    /// Panics if the built chain fails validation.
    #[must_use]
    pub fn build(&self) -> Arc<Catalog> {
        match Catalog::from_data(self.data()) {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => panic!("chain catalog is invalid: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_loads() {
        let catalog = standard_catalog();
        assert_eq!(catalog.name(), "Grove");
        assert_eq!(catalog.producers().len(), 5);
        assert_eq!(catalog.automation_units().len(), 3);
        assert_eq!(catalog.milestone_upgrades().count(), 8);
    }

    #[test]
    fn test_chain_builder() {
        let catalog = ChainBuilder::new(&[100, 1, 5]).milestone(500).build();
        assert_eq!(catalog.producers()[2].feeds(), Some(ProducerId(1)));
        assert!(catalog.producers()[0].is_terminal());
        assert_eq!(catalog.milestones().base_requirement, big("500"));
    }

    #[test]
    fn test_helpers_parse() {
        assert_eq!(big("1.5e3"), BigNum::from(1500_u64));
        assert_eq!(dec("0.25"), Decimal::new(25, 2));
    }
}
