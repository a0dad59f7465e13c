//! # Grove Development Tools
//!
//! Command-line tools for development:
//! - Catalog validation
//! - Headless simulation runs
//! - Offline catch-up driver

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod catch_up;
pub mod error;
pub mod simulate;
pub mod validate;
