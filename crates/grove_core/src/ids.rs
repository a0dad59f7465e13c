//! Stable identifiers for catalog entries.
//!
//! Ids are plain integers in data files and checkpoints (`#[serde(transparent)]`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a producer tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProducerId(pub u32);

/// Unique identifier for an automation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

/// Unique identifier for an upgrade. Unique across the whole catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpgradeId(pub u32);

macro_rules! impl_id {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// Create a new id.
                #[must_use]
                pub const fn new(id: u32) -> Self {
                    Self(id)
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

impl_id!(ProducerId, UnitId, UpgradeId);
