//! Producer ledger and cost curve.
//!
//! The ledger owns the terminal resource balance and the per-tier state of
//! the production chain. Production flows downward: every step, tiers are
//! settled from the highest index to the lowest. A feed is credited to its
//! target immediately, so the target produces from it later in the same pass,
//! while no tier ever sees its own output within a step.

use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::data::{ProducerData, ProducerOutput};
use crate::ids::ProducerId;
use crate::math::BigNum;
use crate::views::{ModifierView, ProducerView};

/// Price of the next purchase of a tier.
///
/// `manually_purchased` includes the free starting units, which are not
/// counted against the curve. The first counted purchase costs the flat base
/// cost; every later one follows
/// `cost_multiplier × (cost_base + cost_linear × n)^(n × scaling)` with
/// `scaling = 1 + max(n − threshold, 0) / divisor`.
///
/// A `cost_reduction` above one divides the price, including the flat first
/// price.
#[must_use]
pub fn purchase_cost(data: &ProducerData, manually_purchased: u64, cost_reduction: BigNum) -> BigNum {
    let n = manually_purchased.saturating_sub(data.starting_owned);
    let cost = if n == 0 {
        data.base_cost
    } else {
        curve_cost(data, n)
    };
    if cost_reduction > BigNum::ONE {
        cost / cost_reduction
    } else {
        cost
    }
}

fn curve_cost(data: &ProducerData, n: u64) -> BigNum {
    let count = Decimal::from(n);
    let excess = Decimal::from(n.saturating_sub(data.cost_threshold));
    let Some(exponent) = excess
        .checked_div(data.cost_divisor)
        .and_then(|e| (Decimal::ONE + e).checked_mul(count))
    else {
        return BigNum::saturated();
    };
    let base = data
        .cost_linear
        .checked_mul(count)
        .and_then(|l| l.checked_add(data.cost_base));
    let Some(base) = base else {
        return BigNum::saturated();
    };
    BigNum::from_decimal(base).pow(exponent).scale(data.cost_multiplier)
}

/// Run state of one producer tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerState {
    /// Producer id.
    pub id: ProducerId,
    /// Units bought directly, including the free starting units.
    pub manually_purchased: u64,
    /// Units owned, including amounts credited by higher tiers.
    pub total_owned: BigNum,
    /// Whether this tier produces.
    pub unlocked: bool,
    /// Output multiplier published by the composer. Never saved.
    pub multiplier: BigNum,
    /// Cost divisor published by the composer. Never saved.
    pub cost_reduction: BigNum,
}

impl ProducerState {
    /// Fresh state for the start of a run.
    #[must_use]
    pub fn new(data: &ProducerData) -> Self {
        Self {
            id: data.id,
            manually_purchased: data.starting_owned,
            total_owned: BigNum::from(data.starting_owned),
            unlocked: data.starting_owned > 0,
            multiplier: BigNum::ONE,
            cost_reduction: BigNum::ONE,
        }
    }
}

/// Terminal resource balance plus every tier of the chain, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerLedger {
    resource: BigNum,
    tiers: Vec<ProducerState>,
}

impl ProducerLedger {
    /// Fresh ledger with an empty balance.
    #[must_use]
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            resource: BigNum::ZERO,
            tiers: catalog.producers().iter().map(ProducerState::new).collect(),
        }
    }

    /// Rebuild from saved parts. Tiers must be in catalog order.
    pub(crate) fn from_parts(resource: BigNum, tiers: Vec<ProducerState>) -> Self {
        Self { resource, tiers }
    }

    /// Tier states, lowest first.
    #[must_use]
    pub fn tiers(&self) -> &[ProducerState] {
        &self.tiers
    }

    /// State of one tier.
    #[must_use]
    pub fn tier(&self, catalog: &Catalog, id: ProducerId) -> Option<&ProducerState> {
        catalog.producer_index(id).and_then(|i| self.tiers.get(i))
    }

    /// Distribute one step of production down the chain.
    ///
    /// Returns the amount credited to the terminal resource.
    pub fn settle(&mut self, catalog: &Catalog) -> BigNum {
        let mut produced = BigNum::ZERO;
        for index in (0..self.tiers.len()).rev() {
            let data = &catalog.producers()[index];
            let tier = &self.tiers[index];
            if !tier.unlocked || !tier.total_owned.is_positive() {
                continue;
            }
            let output = data.base_production * tier.total_owned * tier.multiplier;
            match data.output {
                ProducerOutput::Terminal => produced += output,
                ProducerOutput::Feeds(target) => {
                    // Validated at load: the target sits at a lower index
                    if let Some(t) = catalog.producer_index(target) {
                        self.tiers[t].total_owned += output;
                    }
                }
            }
        }
        self.resource += produced;
        produced
    }

    /// Price of the next purchase of a tier, after cost reduction.
    #[must_use]
    pub fn cost(&self, catalog: &Catalog, id: ProducerId) -> Option<BigNum> {
        let index = catalog.producer_index(id)?;
        let tier = &self.tiers[index];
        Some(purchase_cost(
            &catalog.producers()[index],
            tier.manually_purchased,
            tier.cost_reduction,
        ))
    }

    /// Buy one unit of a tier.
    ///
    /// Returns `false` without changing anything if the id is unknown or the
    /// balance cannot cover the price.
    pub fn buy(&mut self, catalog: &Catalog, id: ProducerId) -> bool {
        let Some(cost) = self.cost(catalog, id) else {
            return false;
        };
        if self.resource < cost {
            return false;
        }
        let Some(index) = catalog.producer_index(id) else {
            return false;
        };
        self.resource -= cost;
        let tier = &mut self.tiers[index];
        tier.manually_purchased = tier.manually_purchased.saturating_add(1);
        tier.total_owned += BigNum::ONE;
        tier.unlocked = true;
        tracing::debug!(producer = %id, cost = %cost, owned = %tier.total_owned, "Producer bought");
        true
    }

    /// Debit the resource balance if it covers `amount`.
    pub fn spend(&mut self, amount: BigNum) -> bool {
        if self.resource < amount {
            return false;
        }
        self.resource -= amount;
        true
    }

    /// Reset every tier to its starting state and set the balance.
    ///
    /// Published modifiers are cleared too; the caller recomputes them.
    pub fn reset(&mut self, catalog: &Catalog, resource: BigNum) {
        self.tiers = catalog.producers().iter().map(ProducerState::new).collect();
        self.resource = resource;
    }

    /// Take the multipliers and cost reductions published by the composer.
    pub fn apply_modifiers(&mut self, modifiers: &impl ModifierView) {
        for tier in &mut self.tiers {
            tier.multiplier = modifiers.producer_multiplier(tier.id);
            tier.cost_reduction = modifiers.cost_reduction(tier.id);
        }
    }
}

impl ProducerView for ProducerLedger {
    fn resource(&self) -> BigNum {
        self.resource
    }

    fn total_owned(&self, producer: ProducerId) -> BigNum {
        self.tiers
            .iter()
            .find(|t| t.id == producer)
            .map_or(BigNum::ZERO, |t| t.total_owned)
    }

    fn manually_purchased(&self, producer: ProducerId) -> u64 {
        self.tiers
            .iter()
            .find(|t| t.id == producer)
            .map_or(0, |t| t.manually_purchased)
    }
}
