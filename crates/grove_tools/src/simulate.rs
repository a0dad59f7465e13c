//! Headless simulation runs.

use std::path::Path;
use std::sync::Arc;

use grove_core::catalog::Catalog;
use grove_core::checkpoint::Checkpoint;
use grove_core::simulation::Simulation;
use serde::Serialize;

use crate::error::{read_file, write_file, Result};

/// State of one producer tier in a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProducerSummary {
    /// Producer name.
    pub name: String,
    /// Units owned.
    pub total_owned: String,
    /// Units bought.
    pub manually_purchased: u64,
    /// Price of the next unit.
    pub next_cost: String,
}

/// Snapshot of a game printed by the tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSummary {
    /// Catalog name.
    pub catalog: String,
    /// Steps advanced this season.
    pub step: u64,
    /// Resource balance.
    pub resource: String,
    /// Current season.
    pub season: u32,
    /// Milestones this season out of the season requirement.
    pub milestones_this_season: u64,
    /// Milestones the season needs.
    pub season_requirement: u64,
    /// Resource needed for the next milestone.
    pub next_milestone: String,
    /// Lifetime milestones.
    pub total_milestones: u64,
    /// Spendable prestige points.
    pub prestige_points: u64,
    /// Real seconds per step.
    pub step_seconds: String,
    /// Producer tiers.
    pub producers: Vec<ProducerSummary>,
    /// Persistent state hash.
    pub state_hash: u64,
}

impl GameSummary {
    /// Summarize a game.
    #[must_use]
    pub fn of(sim: &Simulation) -> Self {
        let catalog = sim.catalog();
        let milestones = sim.milestones();
        Self {
            catalog: catalog.name().to_string(),
            step: sim.step(),
            resource: sim.resource().to_string(),
            season: milestones.season,
            milestones_this_season: milestones.milestones_this_season,
            season_requirement: sim.season_requirement(),
            next_milestone: sim.milestone_requirement().to_string(),
            total_milestones: milestones.total_milestones_completed,
            prestige_points: milestones.prestige_points,
            step_seconds: sim.step_seconds().normalize().to_string(),
            producers: catalog
                .producers()
                .iter()
                .zip(sim.producers().tiers())
                .map(|(data, tier)| ProducerSummary {
                    name: data.name.clone(),
                    total_owned: tier.total_owned.to_string(),
                    manually_purchased: tier.manually_purchased,
                    next_cost: sim
                        .producer_cost(data.id)
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                })
                .collect(),
            state_hash: sim.state_hash(),
        }
    }
}

/// Load a checkpoint file, or start fresh when no path is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid checkpoint.
pub fn load_game(catalog: Arc<Catalog>, checkpoint: Option<&Path>) -> Result<Simulation> {
    let Some(path) = checkpoint else {
        return Ok(Simulation::new(catalog));
    };
    let text = read_file(path)?;
    let sim = Checkpoint::from_json(&text)?.restore(catalog)?;
    tracing::info!(path = %path.display(), step = sim.step(), "Checkpoint loaded");
    Ok(sim)
}

/// Write a game's checkpoint as JSON.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn save_game(sim: &Simulation, path: &Path) -> Result<()> {
    let json = sim.checkpoint().to_json()?;
    write_file(path, &json)?;
    tracing::info!(path = %path.display(), step = sim.step(), "Checkpoint saved");
    Ok(())
}

/// Advance a game by `steps` steps.
///
/// Returns the number of milestones completed on the way.
pub fn run_steps(sim: &mut Simulation, steps: u64) -> u64 {
    let mut milestones = 0;
    for _ in 0..steps {
        let Some(events) = sim.advance() else {
            tracing::warn!("Simulation is replaying; stopping early");
            break;
        };
        if let Some(record) = events.milestone {
            milestones += 1;
            tracing::info!(
                step = record.step,
                requirement = %record.requirement,
                points = record.points,
                "Milestone"
            );
        }
    }
    milestones
}
