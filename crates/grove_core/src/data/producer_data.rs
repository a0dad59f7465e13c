//! Producer tier data structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::ProducerId;
use crate::math::BigNum;

/// Where a tier's production goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProducerOutput {
    /// Production is added to the terminal resource balance.
    Terminal,
    /// Production is added to the owned count of a lower tier.
    Feeds(ProducerId),
}

/// Data-driven definition of one producer tier.
///
/// # Example RON
///
/// ```ron
/// ProducerData(
///     id: 1,
///     name: "Seed Bed",
///     base_production: "1",
///     base_cost: "100",
///     cost_multiplier: "100",
///     cost_base: "1.12",
///     cost_linear: "0.0004",
///     cost_threshold: 50,
///     cost_divisor: "200",
///     output: Feeds(0),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerData {
    /// Stable identifier.
    pub id: ProducerId,

    /// Display name.
    pub name: String,

    /// Output per owned unit per step, before multipliers.
    pub base_production: BigNum,

    /// Flat price of the first counted purchase.
    pub base_cost: BigNum,

    /// Leading factor of the escalating cost curve.
    pub cost_multiplier: Decimal,

    /// Constant part of the curve base.
    pub cost_base: Decimal,

    /// Per-purchase growth of the curve base.
    #[serde(default)]
    pub cost_linear: Decimal,

    /// Purchase count after which the exponent starts to escalate.
    #[serde(default)]
    pub cost_threshold: u64,

    /// Divisor controlling how fast the exponent escalates past the threshold.
    pub cost_divisor: Decimal,

    /// Output target.
    pub output: ProducerOutput,

    /// Owned (and purchased) count at the start of every run.
    ///
    /// Starting units are free and are not counted against the cost curve.
    #[serde(default)]
    pub starting_owned: u64,
}

impl ProducerData {
    /// Check if this tier credits the terminal resource.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.output, ProducerOutput::Terminal)
    }

    /// Target tier, if this tier feeds another one.
    #[must_use]
    pub fn feeds(&self) -> Option<ProducerId> {
        match self.output {
            ProducerOutput::Feeds(target) => Some(target),
            ProducerOutput::Terminal => None,
        }
    }
}
