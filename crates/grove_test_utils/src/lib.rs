//! # Grove Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Catalog fixtures
//! - Greedy pacing runs
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod pacing;

/// Re-export proptest for convenience.
pub use proptest;
