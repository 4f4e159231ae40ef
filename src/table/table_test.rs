// ABOUTME: Tests for the ring topology and snapshot invariants.
// ABOUTME: Covers neighbor wiring, fresh-table snapshots, and violation detection.

use std::sync::Arc;
use std::time::Duration;

use super::table::{AgentView, Snapshot, Table};
use crate::agent::AgentState;
use crate::resource::{AgentId, ResourceId};

fn view(id: usize, state: AgentState, holds_left: bool, holds_right: bool) -> AgentView {
    AgentView {
        id: AgentId(id),
        state,
        prioritized: false,
        holds_left,
        holds_right,
        meals: 0,
        backoffs: 0,
        grants: 0,
        since_meal: Duration::ZERO,
    }
}

#[test]
fn test_ring_wiring() {
    let table = Table::new(5);
    assert_eq!(table.len(), 5);

    for id in table.agent_ids() {
        let next = AgentId((id.index() + 1) % 5);
        assert_eq!(table.left_of(id), ResourceId(id.index()));
        assert_eq!(table.right_of(id), table.left_of(next));
    }

    // Last agent wraps around to the first resource
    assert_eq!(table.right_of(AgentId(4)), ResourceId(0));
}

#[test]
fn test_neighbors_share_the_same_resource() {
    let table = Table::new(3);
    let right_of_0 = table.resource(table.right_of(AgentId(0)));
    let left_of_1 = table.resource(table.left_of(AgentId(1)));
    assert!(Arc::ptr_eq(right_of_0, left_of_1));

    assert!(right_of_0.try_acquire(AgentId(0)));
    assert!(!left_of_1.try_acquire(AgentId(1)));
}

#[tokio::test]
async fn test_fresh_table_snapshot() {
    let table = Table::new(4);
    let snapshot = table.snapshot();

    assert_eq!(snapshot.len(), 4);
    assert!(snapshot.holders.iter().all(Option::is_none));
    assert!(snapshot.agents.iter().all(|a| a.state == AgentState::Thinking));
    assert_eq!(snapshot.prioritized_count(), 0);
    assert_eq!(snapshot.total_meals(), 0);
    assert!(snapshot.violations().is_empty());
}

#[tokio::test]
async fn test_snapshot_reflects_holders() {
    let table = Table::new(3);
    table.resource(ResourceId(2)).try_acquire(AgentId(1));

    let snapshot = table.snapshot();
    assert_eq!(snapshot.holders, vec![None, None, Some(AgentId(1))]);
}

#[tokio::test]
async fn test_violation_eating_without_both() {
    let snapshot = Snapshot {
        taken_at: tokio::time::Instant::now(),
        agents: vec![
            view(0, AgentState::Eating, true, false),
            view(1, AgentState::Thinking, false, false),
            view(2, AgentState::Thinking, false, false),
        ],
        holders: vec![Some(AgentId(0)), None, None],
    };

    let found = snapshot.violations();
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("eating without both"));
}

#[tokio::test]
async fn test_violation_flag_disagrees_with_holder() {
    let snapshot = Snapshot {
        taken_at: tokio::time::Instant::now(),
        agents: vec![
            view(0, AgentState::Hungry, false, true),
            view(1, AgentState::Hungry, false, false),
            view(2, AgentState::Thinking, false, false),
        ],
        // Agent 0 claims its right resource, but agent 1 holds it
        holders: vec![None, Some(AgentId(1)), None],
    };

    let found = snapshot.violations();
    assert!(found.iter().any(|v| v.contains("#0 holds_right=true")));
    assert!(found.iter().any(|v| v.contains("#1 holds_left=false")));
}

#[tokio::test]
async fn test_violation_neighbors_eating() {
    let snapshot = Snapshot {
        taken_at: tokio::time::Instant::now(),
        agents: vec![
            view(0, AgentState::Eating, true, true),
            view(1, AgentState::Eating, true, true),
            view(2, AgentState::Thinking, false, false),
        ],
        holders: vec![Some(AgentId(0)), Some(AgentId(0)), Some(AgentId(1))],
    };

    let found = snapshot.violations();
    assert!(found.iter().any(|v| v.contains("neighbors #0 and #1")));
}
