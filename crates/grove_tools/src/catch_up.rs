//! Asynchronous catch-up driver.
//!
//! Runs [`CatchUp`] batches on a `tokio` runtime, yielding between batches so
//! other tasks (signal handling, I/O) stay responsive. Cancellation is
//! observed only between batches.

use grove_core::catch_up::{CatchUp, CatchUpReport, CatchUpStatus};
use grove_core::simulation::Simulation;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{Result, ToolError};

/// How a driven catch-up ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchUpOutcome {
    /// Every planned step was replayed.
    Finished(CatchUpReport),
    /// The replay was cancelled and the game restored.
    Cancelled {
        /// Steps replayed before cancelling, now discarded.
        discarded: u64,
    },
}

/// Printable catch-up result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatchUpSummary {
    /// Whether the replay was cancelled.
    pub cancelled: bool,
    /// Steps replayed and kept.
    pub steps: u64,
    /// Resource produced.
    pub produced: String,
    /// Milestones completed.
    pub milestones: u64,
    /// Automation level-ups.
    pub level_ups: u64,
    /// Producer units bought by automation.
    pub auto_purchases: u64,
}

impl From<&CatchUpOutcome> for CatchUpSummary {
    fn from(outcome: &CatchUpOutcome) -> Self {
        match outcome {
            CatchUpOutcome::Finished(report) => Self {
                cancelled: false,
                steps: report.steps,
                produced: report.produced.to_string(),
                milestones: report.milestones,
                level_ups: report.level_ups,
                auto_purchases: report.auto_purchases,
            },
            CatchUpOutcome::Cancelled { .. } => Self {
                cancelled: true,
                steps: 0,
                produced: "0".to_string(),
                milestones: 0,
                level_ups: 0,
                auto_purchases: 0,
            },
        }
    }
}

/// Replay `elapsed_seconds` of absence on `sim`.
///
/// Checks `cancel` before every batch; once it reads `true` the replay is
/// cancelled and `sim` is restored to its state before the call.
///
/// # Errors
///
/// Returns [`ToolError::CatchUpBusy`] if `sim` is already replaying, or an
/// engine error if cancelling fails to restore the game.
pub async fn drive(
    sim: &mut Simulation,
    elapsed_seconds: f64,
    batch_size: Option<u32>,
    cancel: watch::Receiver<bool>,
) -> Result<CatchUpOutcome> {
    let mut catch_up = CatchUp::begin(sim, elapsed_seconds).ok_or(ToolError::CatchUpBusy)?;
    if let Some(batch_size) = batch_size {
        catch_up = catch_up.with_batch_size(batch_size);
    }

    loop {
        if *cancel.borrow() {
            let discarded = catch_up.completed();
            catch_up.cancel(sim)?;
            return Ok(CatchUpOutcome::Cancelled { discarded });
        }
        match catch_up.run_batch(sim) {
            CatchUpStatus::Running { completed, total } => {
                tracing::debug!(completed, total, "Catch-up batch done");
                tokio::task::yield_now().await;
            }
            CatchUpStatus::Finished(report) => return Ok(CatchUpOutcome::Finished(report)),
        }
    }
}

/// Watch channel that flips to `true` on Ctrl-C.
#[must_use]
pub fn ctrl_c_cancel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, cancelling catch-up");
            let _ = tx.send(true);
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_test_utils::fixtures::standard_sim;

    #[tokio::test]
    async fn test_drive_to_completion() {
        let mut sim = standard_sim();
        let (_tx, rx) = watch::channel(false);
        let outcome = drive(&mut sim, 250.0, Some(7), rx).await.unwrap();

        let CatchUpOutcome::Finished(report) = &outcome else {
            panic!("expected a finished catch-up");
        };
        assert_eq!(report.steps, 250);
        assert_eq!(sim.step(), 250);
        assert!(!sim.is_replaying());
        assert!(!CatchUpSummary::from(&outcome).cancelled);
    }

    #[tokio::test]
    async fn test_cancel_restores_game() {
        let mut sim = standard_sim();
        sim.advance();
        let before = sim.serialize().unwrap();

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let outcome = drive(&mut sim, 1_000.0, Some(10), rx).await.unwrap();

        assert_eq!(outcome, CatchUpOutcome::Cancelled { discarded: 0 });
        assert_eq!(sim.serialize().unwrap(), before);
        assert!(sim.force_step());
    }
}
