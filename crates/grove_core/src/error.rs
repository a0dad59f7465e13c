//! Error types for the game simulation.
//!
//! Only configuration faults and damaged save data are errors. Running out of
//! resource, points or prestige points is an ordinary outcome and is reported
//! as `false` by the purchase methods on [`Simulation`](crate::simulation::Simulation).

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    /// A producer feeds a producer id that does not exist.
    #[error("Producer {producer} feeds unknown producer {target}")]
    UnknownFeedTarget {
        /// Producer declaring the feed.
        producer: u32,
        /// Missing target id.
        target: u32,
    },

    /// A producer feeds a tier that is not strictly below it in the chain.
    #[error("Producer {producer} must feed a lower tier, but feeds {target}")]
    FeedOrder {
        /// Producer declaring the feed.
        producer: u32,
        /// Target that is at the same or a higher tier.
        target: u32,
    },

    /// An upgrade's unlock condition names a sibling that does not exist.
    #[error("Upgrade {upgrade} requires unknown sibling upgrade {sibling}")]
    UnknownUnlockSibling {
        /// Upgrade declaring the condition.
        upgrade: u32,
        /// Missing sibling id.
        sibling: u32,
    },

    /// A reference to an entity that is not part of the catalog.
    #[error("Unknown {kind} id {id} referenced by {context}")]
    UnknownReference {
        /// Kind of entity ("producer", "automation unit", "upgrade").
        kind: &'static str,
        /// Referenced id.
        id: u32,
        /// Where the reference was found.
        context: String,
    },

    /// Two catalog entries share an id.
    #[error("Duplicate {kind} id {id}")]
    DuplicateId {
        /// Kind of entity.
        kind: &'static str,
        /// Duplicated id.
        id: u32,
    },

    /// A numeric catalog parameter is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// A decimal string could not be parsed.
    #[error("Invalid number: '{0}'")]
    InvalidNumber(String),

    /// Save data is missing fields or holds values that cannot be restored.
    #[error("Corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
