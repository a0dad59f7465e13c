//! Narrow read-only views the ledgers use to observe each other.
//!
//! No ledger holds a reference to another. The [`Simulation`] owns all of
//! them and hands out these views for the duration of a single call.
//!
//! [`Simulation`]: crate::simulation::Simulation

use rust_decimal::Decimal;

use crate::effects::AutoPurchase;
use crate::ids::{ProducerId, UnitId};
use crate::math::BigNum;

/// Producer-side state: the resource balance and owned counts.
pub trait ProducerView {
    /// Terminal resource balance.
    fn resource(&self) -> BigNum;

    /// Owned count of a tier, including amounts credited by higher tiers.
    fn total_owned(&self, producer: ProducerId) -> BigNum;

    /// Count bought directly (manual and automatic purchases).
    fn manually_purchased(&self, producer: ProducerId) -> u64;
}

/// Monotonic run counters.
pub trait CounterView {
    /// Manual producer purchases over the whole game. Never decreases.
    fn global_purchases(&self) -> u64;

    /// Steps advanced in the current season.
    fn step(&self) -> u64;
}

/// Modifiers published by the effect composer.
pub trait ModifierView {
    /// Combined machine × prestige multiplier of a producer.
    fn producer_multiplier(&self, producer: ProducerId) -> BigNum;

    /// Cost divisor of a producer. Values at or below one have no effect.
    fn cost_reduction(&self, producer: ProducerId) -> BigNum;

    /// Auto-purchase register of a unit, if any effect targets it.
    fn auto_purchase(&self, unit: UnitId) -> Option<AutoPurchase>;

    /// Raw requirement multiplier of a unit, before the unit's floor.
    fn requirement_reduction(&self, unit: UnitId) -> Decimal;

    /// Raw milestone requirement multiplier, before the catalog floor.
    fn milestone_requirement_multiplier(&self) -> Decimal;

    /// `(1 + additive) × multiplicative` point multiplier.
    fn milestone_points_multiplier(&self) -> Decimal;

    /// Step duration multiplier.
    fn step_duration_multiplier(&self) -> Decimal;

    /// Summed level of starting-resource effects.
    fn starting_resource_level(&self) -> u32;
}
