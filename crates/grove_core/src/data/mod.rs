//! Data structures for catalog configuration.
//!
//! This module contains pure data structures that define producer tiers,
//! automation units, upgrades and milestone curves. All structs are designed
//! to be deserialized from RON files.
//!
//! **Note:** This module contains no IO - it only defines data types.
//! File loading is handled by the host.

mod automation_data;
mod catalog_data;
mod producer_data;
mod upgrade_data;

pub use automation_data::{AutomationUnitData, LevelingMode};
pub use catalog_data::{CatalogData, MilestoneData};
pub use producer_data::{ProducerData, ProducerOutput};
pub use upgrade_data::{UnlockCondition, UpgradeCost, UpgradeData, UpgradeOwner};
