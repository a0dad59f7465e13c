//! # Grove Core
//!
//! Deterministic simulation core for Grove Idle.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No clocks
//! - No hardware floats in game state (uses software decimals)
//!
//! This separation enables:
//! - Identical results on every platform
//! - Offline catch-up that matches live play step for step
//! - Headless tools and tests
//!
//! ## Crate Structure
//!
//! - [`catalog`] - Validated producer/automation/upgrade configuration
//! - [`producers`] - Production chain and cost curves
//! - [`effects`] - Upgrade effects and the composed modifier context
//! - [`automation`] - Leveling automation units
//! - [`milestones`] - Milestones, seasons and prestige
//! - [`simulation`] - Core step loop
//! - [`catch_up`] - Batched offline replay
//! - [`checkpoint`] - Persistent state
//! - [`math`] - Big-number and fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod automation;
pub mod catalog;
pub mod catch_up;
pub mod checkpoint;
pub mod data;
pub mod effects;
pub mod error;
pub mod ids;
pub mod math;
pub mod milestones;
pub mod producers;
pub mod simulation;
pub mod views;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::automation::{LevelUp, UnitState};
    pub use crate::catalog::Catalog;
    pub use crate::catch_up::{CatchUp, CatchUpReport, CatchUpStatus};
    pub use crate::checkpoint::Checkpoint;
    pub use crate::data::{
        AutomationUnitData, CatalogData, LevelingMode, MilestoneData, ProducerData,
        ProducerOutput, UpgradeData, UpgradeOwner,
    };
    pub use crate::effects::{Effect, EffectContext};
    pub use crate::error::{GameError, Result};
    pub use crate::ids::{ProducerId, UnitId, UpgradeId};
    pub use crate::math::{BigNum, Fixed};
    pub use crate::milestones::MilestoneRecord;
    pub use crate::producers::ProducerState;
    pub use crate::simulation::{AutoPurchaseEvent, Simulation, StepEvents};
    pub use crate::views::{CounterView, ModifierView, ProducerView};
}
