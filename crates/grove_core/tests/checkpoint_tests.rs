//! Checkpoint I/O tests.
//!
//! Hosts store checkpoints as JSON. Loading must tolerate missing optional
//! fields and fail cleanly on corrupt data so the host can start fresh.

use grove_core::prelude::*;
use grove_test_utils::determinism::verify_checkpoint_roundtrip;
use grove_test_utils::fixtures::{big, standard_catalog, standard_sim};
use grove_test_utils::pacing::GreedyPolicy;

fn played() -> Simulation {
    let mut sim = standard_sim();
    GreedyPolicy::default().run(&mut sim, 2_000);
    sim
}

#[test]
fn test_json_roundtrip_after_greedy_play() {
    assert!(verify_checkpoint_roundtrip(played, 100));
}

#[test]
fn test_restored_game_continues_identically() {
    let mut original = played();
    let json = original.checkpoint().to_json().unwrap();
    let mut restored = Checkpoint::from_json(&json)
        .unwrap()
        .restore(standard_catalog())
        .unwrap();

    for _ in 0..300 {
        let a = original.advance();
        let b = restored.advance();
        assert_eq!(a, b);
    }
    assert_eq!(original.state_hash(), restored.state_hash());
}

#[test]
fn test_minimal_checkpoint_loads() {
    let json = r#"{
        "resource": "12.5e3",
        "step": 40,
        "producers": [
            { "id": 0, "manually_purchased": 3, "total_owned": "3", "unlocked": true }
        ]
    }"#;
    let sim = Checkpoint::from_json(json)
        .unwrap()
        .restore(standard_catalog())
        .unwrap();
    assert_eq!(sim.resource(), big("12500"));
    assert_eq!(sim.step(), 40);
    assert_eq!(sim.counters().global_purchases, 0);
    assert_eq!(sim.producers().tiers()[0].manually_purchased, 3);
    assert_eq!(sim.producers().tiers()[1].total_owned, BigNum::ZERO);
    assert_eq!(sim.milestones().season, 1);
    assert!(sim.automation().units().iter().all(|u| !u.unlocked && u.level == 1));
}

#[test]
fn test_corrupt_checkpoints_fail_cleanly() {
    let catalog = standard_catalog();
    let cases = [
        // Not JSON
        "{ resource: ",
        // Missing the resource
        r#"{ "step": 1 }"#,
        // Non-numeric decimal
        r#"{ "resource": "plenty" }"#,
        // Negative balance
        r#"{ "resource": "-5" }"#,
        // Fewer owned than bought
        r#"{ "resource": "0", "producers": [
            { "id": 0, "manually_purchased": 5, "total_owned": "2" }
        ] }"#,
        // Level zero unit
        r#"{ "resource": "0", "automation": [ { "id": 1, "level": 0 } ] }"#,
        // Unparseable credit
        r#"{ "resource": "0", "automation": [ { "id": 1, "purchase_credit": "x" } ] }"#,
        // Spendable points above the lifetime total
        r#"{ "resource": "0", "milestones": { "prestige_points": 4 } }"#,
    ];
    for json in cases {
        let result = Checkpoint::from_json(json).and_then(|c| c.restore(catalog.clone()));
        assert!(
            matches!(result, Err(GameError::CorruptCheckpoint(_))),
            "accepted corrupt checkpoint: {json}"
        );
    }
}

#[test]
fn test_fallback_to_fresh_game() {
    let catalog = standard_catalog();
    let sim = Checkpoint::from_json("garbage")
        .and_then(|c| c.restore(catalog.clone()))
        .unwrap_or_else(|_| Simulation::new(catalog));
    assert_eq!(sim.step(), 0);
    assert_eq!(sim.resource(), BigNum::ZERO);
}

#[test]
fn test_bytes_reject_truncation() {
    let bytes = played().serialize().unwrap();
    assert!(Simulation::deserialize(standard_catalog(), &bytes[..bytes.len() - 3]).is_err());
}
