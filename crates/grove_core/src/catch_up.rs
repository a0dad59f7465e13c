//! Offline catch-up.
//!
//! When a host returns after being inactive, the elapsed real time is turned
//! into a whole number of steps and replayed in bounded batches. The host
//! calls [`CatchUp::run_batch`] from its own loop and yields between calls;
//! nothing here suspends or reads a clock.
//!
//! While a catch-up is active the simulation's replay flag is set, so
//! [`Simulation::advance`] and [`Simulation::force_step`] are rejected.
//! Batch size only affects scheduling: the final state is identical for any
//! batch size.

use std::sync::Arc;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use crate::math::{decimal_floor_u64, ratio, BigNum, Fixed};
use crate::simulation::{Simulation, StepEvents};

/// Steps that fit in `elapsed_seconds` at `step_seconds` per step.
///
/// Non-finite, zero or negative elapsed time replays nothing. `cap` bounds
/// the result when set.
#[must_use]
pub fn plan_steps(elapsed_seconds: f64, step_seconds: Decimal, cap: Option<u64>) -> u64 {
    if elapsed_seconds.is_nan() || elapsed_seconds <= 0.0 || step_seconds <= Decimal::ZERO {
        return 0;
    }
    let steps = Decimal::from_f64(elapsed_seconds)
        .and_then(|elapsed| elapsed.checked_div(step_seconds))
        .map_or(u64::MAX, decimal_floor_u64);
    cap.map_or(steps, |cap| steps.min(cap))
}

/// Totals over every replayed step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    /// Steps replayed.
    pub steps: u64,
    /// Resource credited by terminal producers.
    pub produced: BigNum,
    /// Automation level-ups.
    pub level_ups: u64,
    /// Milestones completed.
    pub milestones: u64,
    /// Producer units bought by automation.
    pub auto_purchases: u64,
}

impl CatchUpReport {
    fn record(&mut self, events: &StepEvents) {
        self.steps += 1;
        self.produced += events.produced;
        self.level_ups += events.level_ups.len() as u64;
        self.milestones += u64::from(events.milestone.is_some());
        self.auto_purchases += events
            .auto_purchases
            .iter()
            .map(|p| u64::from(p.count))
            .sum::<u64>();
    }
}

/// Result of running one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchUpStatus {
    /// Steps remain.
    Running {
        /// Steps replayed so far.
        completed: u64,
        /// Steps planned.
        total: u64,
    },
    /// Every planned step has been replayed and the replay flag is cleared.
    Finished(CatchUpReport),
}

/// An in-progress catch-up replay.
///
/// Dropping a `CatchUp` before it finishes leaves the simulation in replay
/// mode; finish it with [`skip`](Self::skip) or undo it with
/// [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct CatchUp {
    snapshot: Checkpoint,
    total: u64,
    completed: u64,
    batch_size: u32,
    report: CatchUpReport,
    finished: bool,
}

impl CatchUp {
    /// Start replaying `elapsed_seconds` of absence.
    ///
    /// Takes a checkpoint for [`cancel`](Self::cancel) and sets the replay
    /// flag. Returns `None` if a catch-up is already running on `sim`.
    pub fn begin(sim: &mut Simulation, elapsed_seconds: f64) -> Option<Self> {
        if sim.is_replaying() {
            return None;
        }
        let catalog = sim.catalog();
        let total = plan_steps(
            elapsed_seconds,
            sim.step_seconds(),
            catalog.max_catch_up_steps(),
        );
        let batch_size = catalog.catch_up_batch_size();
        let snapshot = sim.checkpoint();
        sim.set_replaying(true);
        tracing::info!(
            elapsed_seconds,
            step_seconds = %sim.step_seconds(),
            steps = total,
            batch_size,
            "Catch-up started"
        );
        Some(Self {
            snapshot,
            total,
            completed: 0,
            batch_size,
            report: CatchUpReport::default(),
            finished: false,
        })
    }

    /// Override the catalog's batch size. Values below 1 become 1.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Steps planned.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Steps replayed so far.
    #[must_use]
    pub const fn completed(&self) -> u64 {
        self.completed
    }

    /// Steps still to replay.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.total - self.completed
    }

    /// Fraction of planned steps replayed, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> Fixed {
        ratio(self.completed, self.total)
    }

    /// Replay up to one batch of steps.
    ///
    /// Once finished, further calls leave `sim` alone and repeat the report.
    pub fn run_batch(&mut self, sim: &mut Simulation) -> CatchUpStatus {
        if self.finished {
            return CatchUpStatus::Finished(self.report.clone());
        }
        let batch = self.remaining().min(u64::from(self.batch_size));
        for _ in 0..batch {
            let events = sim.step_once();
            self.report.record(&events);
        }
        self.completed += batch;

        if self.remaining() > 0 {
            return CatchUpStatus::Running {
                completed: self.completed,
                total: self.total,
            };
        }
        self.finish(sim)
    }

    /// Replay every remaining step now.
    pub fn skip(&mut self, sim: &mut Simulation) -> CatchUpReport {
        tracing::debug!(remaining = self.remaining(), "Catch-up skipped to end");
        loop {
            if let CatchUpStatus::Finished(report) = self.run_batch(sim) {
                return report;
            }
        }
    }

    /// Discard all replayed steps and restore the state from before
    /// [`begin`](Self::begin).
    ///
    /// # Errors
    ///
    /// Returns an error if the saved checkpoint cannot be restored. The
    /// replay flag is cleared either way.
    ///
    /// A finished replay is kept: cancelling it does nothing.
    pub fn cancel(self, sim: &mut Simulation) -> Result<()> {
        if self.finished {
            tracing::debug!(steps = self.report.steps, "Cancel ignored, catch-up already finished");
            return Ok(());
        }
        sim.set_replaying(false);
        let restored = Simulation::restore(Arc::clone(sim.catalog()), &self.snapshot)?;
        *sim = restored;
        tracing::info!(
            discarded = self.completed,
            total = self.total,
            "Catch-up cancelled"
        );
        Ok(())
    }

    fn finish(&mut self, sim: &mut Simulation) -> CatchUpStatus {
        self.finished = true;
        sim.set_replaying(false);
        tracing::info!(
            steps = self.report.steps,
            produced = %self.report.produced,
            milestones = self.report.milestones,
            level_ups = self.report.level_ups,
            "Catch-up finished"
        );
        CatchUpStatus::Finished(self.report.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support;
    use crate::ids::{ProducerId, UnitId};

    fn sim() -> Simulation {
        Simulation::new(Arc::new(test_support::catalog()))
    }

    #[test]
    fn test_plan_steps() {
        let one = Decimal::ONE;
        assert_eq!(plan_steps(0.0, one, None), 0);
        assert_eq!(plan_steps(-5.0, one, None), 0);
        assert_eq!(plan_steps(f64::NAN, one, None), 0);
        assert_eq!(plan_steps(9.99, one, None), 9);
        assert_eq!(plan_steps(10.0, Decimal::new(25, 1), None), 4);
        assert_eq!(plan_steps(1e9, one, Some(500)), 500);
        assert_eq!(plan_steps(f64::INFINITY, one, None), u64::MAX);
    }

    #[test]
    fn test_batches_report_progress() {
        let mut sim = sim();
        let mut catch_up = CatchUp::begin(&mut sim, 25.0).unwrap().with_batch_size(10);
        assert_eq!(catch_up.total(), 25);
        assert!(sim.is_replaying());
        assert!(!sim.force_step());

        assert_eq!(
            catch_up.run_batch(&mut sim),
            CatchUpStatus::Running {
                completed: 10,
                total: 25
            }
        );
        assert_eq!(catch_up.progress(), Fixed::from_num(2) / Fixed::from_num(5));
        catch_up.run_batch(&mut sim);
        let CatchUpStatus::Finished(report) = catch_up.run_batch(&mut sim) else {
            panic!("expected catch-up to finish");
        };
        assert_eq!(report.steps, 25);
        assert_eq!(report.produced, BigNum::from(2500_u64));
        assert_eq!(report.milestones, 3);
        assert!(!sim.is_replaying());
        assert_eq!(sim.step(), 25);
    }

    #[test]
    fn test_second_begin_rejected() {
        let mut sim = sim();
        let _first = CatchUp::begin(&mut sim, 5.0).unwrap();
        assert!(CatchUp::begin(&mut sim, 5.0).is_none());
    }

    #[test]
    fn test_batch_size_does_not_change_state() {
        let run = |batch: u32| {
            let mut sim = sim();
            sim.advance();
            sim.unlock_automation_unit(UnitId(1));
            sim.buy_producer(ProducerId(0));
            let mut catch_up = CatchUp::begin(&mut sim, 60.0).unwrap().with_batch_size(batch);
            catch_up.skip(&mut sim);
            sim.serialize().unwrap()
        };
        let single = run(1);
        assert_eq!(run(7), single);
        assert_eq!(run(60), single);
    }

    #[test]
    fn test_cancel_restores_snapshot() {
        let mut sim = sim();
        sim.advance();
        let before = sim.serialize().unwrap();
        let mut catch_up = CatchUp::begin(&mut sim, 50.0).unwrap().with_batch_size(20);
        catch_up.run_batch(&mut sim);
        assert_eq!(sim.step(), 21);

        catch_up.cancel(&mut sim).unwrap();
        assert!(!sim.is_replaying());
        assert_eq!(sim.serialize().unwrap(), before);
        assert!(sim.force_step());
    }

    #[test]
    fn test_finished_replay_is_kept() {
        let mut sim = sim();
        let mut catch_up = CatchUp::begin(&mut sim, 30.0).unwrap().with_batch_size(100);
        let CatchUpStatus::Finished(report) = catch_up.run_batch(&mut sim) else {
            panic!("expected catch-up to finish in one batch");
        };

        // Play continues after the replay
        assert!(sim.force_step());
        let after = sim.serialize().unwrap();

        assert_eq!(catch_up.run_batch(&mut sim), CatchUpStatus::Finished(report));
        assert_eq!(sim.step(), 31);
        catch_up.cancel(&mut sim).unwrap();
        assert_eq!(sim.serialize().unwrap(), after);
        assert!(!sim.is_replaying());
    }

    #[test]
    fn test_zero_elapsed_finishes_immediately() {
        let mut sim = sim();
        let mut catch_up = CatchUp::begin(&mut sim, 0.0).unwrap();
        assert_eq!(catch_up.progress(), Fixed::from_num(1));
        assert!(matches!(catch_up.run_batch(&mut sim), CatchUpStatus::Finished(_)));
        assert_eq!(sim.step(), 0);
        assert!(!sim.is_replaying());
    }
}
