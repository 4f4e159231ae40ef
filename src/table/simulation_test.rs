// ABOUTME: Tests for the simulation orchestrator running the full ring.
// ABOUTME: Covers liveness, per-frame invariants, the priority cap, reporting, and failure handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::simulation::Simulation;
use crate::agent::AgentState;
use crate::config::SimulationConfig;
use crate::error::DineError;
use crate::monitor::priority_cap;
use crate::resource::{AgentId, ResourceId};
use crate::table::Snapshot;

fn config() -> SimulationConfig {
    SimulationConfig::default().with_seed(Some(11))
}

#[test]
fn test_new_rejects_invalid_config() {
    let err = Simulation::new(config().with_num_agents(1)).err().unwrap();
    assert!(matches!(err, DineError::Config(_)));
}

#[tokio::test(start_paused = true)]
async fn test_two_agent_ring_runs() {
    let config = config().with_num_agents(2);
    config.validate().unwrap();

    let summary = Simulation::new(config)
        .unwrap()
        .run_for(Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(summary.agents.len(), 2);
    assert!(summary.starved().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_every_agent_eats() {
    let sim = Simulation::new(config()).unwrap();
    assert_eq!(sim.config().seed, Some(11));
    assert_eq!(sim.snapshot().total_meals(), 0);
    let table = sim.table();

    let summary = sim.run_for(Duration::from_secs(3)).await.unwrap();

    assert_eq!(summary.agents.len(), 5);
    for (i, report) in summary.agents.iter().enumerate() {
        assert_eq!(report.id, AgentId(i));
    }
    assert!(summary.starved().is_empty(), "starved: {:?}", summary.starved());
    assert!(summary.total_meals() >= 20);

    // The table agrees with the reports once everyone has left
    let after = table.snapshot();
    assert_eq!(after.total_meals(), summary.total_meals());
    assert!(after.holders.iter().all(Option::is_none));
}

#[tokio::test(start_paused = true)]
async fn test_frames_stay_consistent_and_capped() {
    let sim = Simulation::new(config().with_num_agents(6)).unwrap();
    let table = sim.table();
    let cancel = CancellationToken::new();
    let run = tokio::spawn(sim.run(cancel.clone()));

    let cap = priority_cap(6);
    let mut saw_eating = false;
    for _ in 0..2_000 {
        let snapshot = table.snapshot();
        assert!(snapshot.violations().is_empty(), "{:?}", snapshot.violations());
        assert!(snapshot.prioritized_count() <= cap);
        saw_eating |= snapshot.agents.iter().any(|a| a.state == AgentState::Eating);
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    cancel.cancel();
    let summary = run.await.unwrap().unwrap();
    assert!(saw_eating);
    assert!(summary.total_meals() > 0);

    // Everything is put back on the way out
    assert!(table.resources().iter().all(|r| r.is_free()));
    let snapshot = table.snapshot();
    assert!(snapshot.agents.iter().all(|a| !a.holds_left && !a.holds_right));
}

#[tokio::test(start_paused = true)]
async fn test_reporter_receives_frames() {
    let frames = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&frames);

    let sim = Simulation::new(config().with_report_interval(Some(Duration::from_millis(50))))
        .unwrap()
        .with_reporter(move |snapshot: &Snapshot| {
            assert!(snapshot.violations().is_empty());
            counter.fetch_add(1, Ordering::SeqCst);
        });

    sim.run_for(Duration::from_millis(500)).await.unwrap();

    // Nine or ten ticks plus the final frame
    assert!(frames.load(Ordering::SeqCst) >= 10);
}

#[tokio::test(start_paused = true)]
async fn test_reporter_idle_without_interval() {
    let frames = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&frames);

    let sim = Simulation::new(config())
        .unwrap()
        .with_reporter(move |_: &Snapshot| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    sim.run_for(Duration::from_millis(300)).await.unwrap();
    assert_eq!(frames.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_agent_failure_stops_the_run() {
    let long_meals = config().with_max_eat(Duration::from_secs(3600));
    let sim = Simulation::new(long_meals).unwrap();
    let table = sim.table();
    let cancel = CancellationToken::new();
    let run = tokio::spawn(sim.run(cancel.clone()));

    // Wait for someone to sit down to a meal, then pull a resource from under them
    let eater = loop {
        let snapshot = table.snapshot();
        if let Some(a) = snapshot.agents.iter().find(|a| a.state == AgentState::Eating) {
            break a.id;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    };
    table
        .resource(ResourceId(eater.index()))
        .release(eater)
        .unwrap();

    // Shutting down makes the eater release, which exposes the broken invariant
    cancel.cancel();
    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, DineError::Resource(_)));
}
