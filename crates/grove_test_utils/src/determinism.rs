//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Idle-game state must be a pure function of the catalog and the sequence
//! of operations, so offline catch-up lands on exactly the state live play
//! would have reached. Sources of non-determinism include:
//!
//! - **Floating-point math**: We use software decimals via
//!   [`grove_core::math::BigNum`] for every game quantity.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Ledgers iterate tiers in catalog order and upgrades in id order.
//!
//! - **Wall-clock time**: Elapsed time only decides how many steps are
//!   replayed, never what a step does.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual ledger determinism
//! 2. **Property tests**: Random operation sequences replay identically
//! 3. **Integration tests**: Catch-up batch sizes produce identical bytes

use grove_core::catch_up::CatchUp;
use grove_core::checkpoint::Checkpoint;
use grove_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated.
    pub steps: u64,
}

impl DeterminismResult {
    /// Index of the first run whose final hash differs from run 0.
    #[must_use]
    pub fn diverging_run(&self) -> Option<usize> {
        let first = self.hashes.first()?;
        self.hashes.iter().position(|h| h != first)
    }

    /// Panic with the diverging run if the runs disagreed.
    ///
    /// # Panics
    ///
    /// Panics if any run ended in a different state than the first.
    pub fn assert_deterministic(&self) {
        if let Some(run) = self.diverging_run() {
            panic!(
                "run {run} of {} ended in a different state after {} steps (hashes {:?})",
                self.hashes.len(),
                self.steps,
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `steps` - Number of steps to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one step
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..steps {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// Advance `runs` games from identical setup and compare their state hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, runs: usize, num_steps: u64) -> DeterminismResult
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        runs,
        num_steps,
        &setup_fn,
        |sim| {
            sim.advance();
        },
        Simulation::state_hash,
    )
}

/// Compare two simulation runs step-by-step, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(step)` if they diverge
/// at that step.
pub fn find_first_divergence<F>(setup_fn: F, num_steps: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for step in 1..=num_steps {
        sim1.advance();
        sim2.advance();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(step);
        }
    }

    None
}

/// Verify that both checkpoint encodings preserve simulation state exactly.
pub fn verify_checkpoint_roundtrip<F>(setup_fn: F, num_steps: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();

    for _ in 0..num_steps {
        sim.advance();
    }

    let hash_before = sim.state_hash();
    let catalog = sim.catalog().clone();

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(from_bytes) = Simulation::deserialize(catalog.clone(), &bytes) else {
        return false;
    };

    let Ok(json) = sim.checkpoint().to_json() else {
        return false;
    };
    let Ok(from_json) = Checkpoint::from_json(&json).and_then(|c| c.restore(catalog)) else {
        return false;
    };

    from_bytes.state_hash() == hash_before && from_json.state_hash() == hash_before
}

/// Replay `elapsed_seconds` of catch-up with a fixed batch size and return
/// the serialized final state.
///
/// # Panics
///
/// Panics if a catch-up is already running on the simulation built by
/// `setup_fn`, or if the final state cannot be serialized.
pub fn catch_up_bytes<F>(setup_fn: F, elapsed_seconds: f64, batch_size: u32) -> Vec<u8>
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    let Some(catch_up) = CatchUp::begin(&mut sim, elapsed_seconds) else {
        panic!("catch-up already running");
    };
    let mut catch_up = catch_up.with_batch_size(batch_size);
    catch_up.skip(&mut sim);
    match sim.serialize() {
        Ok(bytes) => bytes,
        Err(e) => panic!("failed to serialize after catch-up: {e}"),
    }
}

/// Serialized state after stepping live, one `advance()` per step.
///
/// # Panics
///
/// Panics if the final state cannot be serialized.
pub fn live_bytes<F>(setup_fn: F, num_steps: u64) -> Vec<u8>
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for _ in 0..num_steps {
        sim.advance();
    }
    match sim.serialize() {
        Ok(bytes) => bytes,
        Err(e) => panic!("failed to serialize after stepping: {e}"),
    }
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible operation sequences
/// for the standard catalog.
pub mod strategies {
    use grove_core::ids::{ProducerId, UnitId, UpgradeId};
    use grove_core::simulation::Simulation;
    use proptest::prelude::*;

    /// One externally triggered operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Action {
        /// Advance one step.
        Step,
        /// Advance several steps.
        Steps(u16),
        /// Buy one producer unit.
        BuyProducer(ProducerId),
        /// Unlock an automation unit.
        Unlock(UnitId),
        /// Spend a unit point on one of its upgrades.
        BuyAutomationUpgrade(UnitId, UpgradeId),
        /// Spend prestige points on a milestone upgrade.
        BuyMilestoneUpgrade(UpgradeId),
        /// Prestige if allowed.
        Prestige,
    }

    impl Action {
        /// Apply to a simulation. Returns whether the operation succeeded.
        pub fn apply(self, sim: &mut Simulation) -> bool {
            match self {
                Self::Step => sim.force_step(),
                Self::Steps(n) => (0..n).all(|_| sim.force_step()),
                Self::BuyProducer(id) => sim.buy_producer(id),
                Self::Unlock(id) => sim.unlock_automation_unit(id),
                Self::BuyAutomationUpgrade(unit, upgrade) => {
                    sim.buy_automation_upgrade(unit, upgrade)
                }
                Self::BuyMilestoneUpgrade(id) => sim.buy_milestone_upgrade(id),
                Self::Prestige => sim.prestige(),
            }
        }
    }

    /// Generate a producer id of the standard catalog (0-4).
    pub fn arb_producer() -> impl Strategy<Value = ProducerId> {
        (0u32..5u32).prop_map(ProducerId)
    }

    /// Generate an automation unit id of the standard catalog (1-3).
    pub fn arb_unit() -> impl Strategy<Value = UnitId> {
        (1u32..4u32).prop_map(UnitId)
    }

    /// Generate an automation upgrade id with its owning unit.
    pub fn arb_automation_upgrade() -> impl Strategy<Value = (UnitId, UpgradeId)> {
        (1u32..9u32).prop_map(|id| {
            let unit = match id {
                1 | 2 => 1,
                3..=5 => 2,
                _ => 3,
            };
            (UnitId(unit), UpgradeId(id))
        })
    }

    /// Generate a milestone upgrade id of the standard catalog (100-107).
    pub fn arb_milestone_upgrade() -> impl Strategy<Value = UpgradeId> {
        (100u32..108u32).prop_map(UpgradeId)
    }

    /// Generate any operation, weighted toward stepping.
    pub fn arb_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            6 => Just(Action::Step),
            3 => (1u16..200u16).prop_map(Action::Steps),
            4 => arb_producer().prop_map(Action::BuyProducer),
            1 => arb_unit().prop_map(Action::Unlock),
            2 => arb_automation_upgrade().prop_map(|(u, id)| Action::BuyAutomationUpgrade(u, id)),
            1 => arb_milestone_upgrade().prop_map(Action::BuyMilestoneUpgrade),
            1 => Just(Action::Prestige),
        ]
    }

    /// Generate a sequence of operations.
    pub fn arb_action_sequence(max_len: usize) -> impl Strategy<Value = Vec<Action>> {
        proptest::collection::vec(arb_action(), 0..max_len)
    }

    /// Generate an elapsed absence in whole seconds.
    pub fn arb_elapsed_seconds() -> impl Strategy<Value = u32> {
        0u32..2_000u32
    }
}

#[cfg(test)]
mod tests {
    use super::strategies::*;
    use super::*;
    use crate::fixtures::{standard_sim, ChainBuilder};
    use grove_core::ids::ProducerId;
    use proptest::prelude::*;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_fresh_simulation_determinism() {
        let result = verify_simulation_determinism(standard_sim, 3, 500);
        assert_eq!(result.hashes.len(), 3);
        result.assert_deterministic();
    }

    #[test]
    fn test_diverging_run_is_reported() {
        let result = DeterminismResult {
            is_deterministic: false,
            hashes: vec![7, 7, 9, 7],
            steps: 10,
        };
        assert_eq!(result.diverging_run(), Some(2));
    }

    #[test]
    #[should_panic(expected = "run 1 of 2")]
    fn test_assert_deterministic_names_run() {
        let result = verify_determinism(2, 3, || 0u64, |n| *n += 1, |n| *n + 1);
        let result = DeterminismResult {
            is_deterministic: false,
            hashes: vec![result.hashes[0], 0],
            ..result
        };
        result.assert_deterministic();
    }

    #[test]
    fn test_find_divergence_on_deterministic_sim() {
        let divergence = find_first_divergence(
            || {
                let mut sim = Simulation::new(ChainBuilder::new(&[100, 1, 5]).build());
                sim.advance();
                sim.buy_producer(ProducerId(0));
                sim
            },
            100,
        );
        assert!(divergence.is_none(), "Expected no divergence");
    }

    // =========================================================================
    // Serialization round-trip tests
    // =========================================================================

    #[test]
    fn test_checkpoint_roundtrip_fresh() {
        assert!(verify_checkpoint_roundtrip(standard_sim, 0));
    }

    #[test]
    fn test_checkpoint_roundtrip_after_play() {
        assert!(verify_checkpoint_roundtrip(
            || {
                let mut sim = standard_sim();
                for _ in 0..50 {
                    sim.advance();
                    while sim.buy_producer(ProducerId(0)) {}
                }
                sim
            },
            200,
        ));
    }

    // =========================================================================
    // Catch-up equivalence
    // =========================================================================

    #[test]
    fn test_catch_up_matches_live_play() {
        let live = live_bytes(standard_sim, 250);
        assert_eq!(catch_up_bytes(standard_sim, 250.0, 1), live);
        assert_eq!(catch_up_bytes(standard_sim, 250.0, 7), live);
        assert_eq!(catch_up_bytes(standard_sim, 250.0, 250), live);
    }

    // =========================================================================
    // Property tests
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_action_sequences_replay_identically(actions in arb_action_sequence(40)) {
            let run = || {
                let mut sim = standard_sim();
                for action in &actions {
                    action.apply(&mut sim);
                }
                sim.state_hash()
            };
            prop_assert_eq!(run(), run());
        }
    }
}
