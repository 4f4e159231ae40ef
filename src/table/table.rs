// ABOUTME: The table - the ring of resources plus each agent's published status.
// ABOUTME: Provides ring topology and self-consistent snapshots for monitor and reporter.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::Serialize;
use tokio::time::Instant;

use crate::agent::{AgentState, AgentStatus};
use crate::resource::{AgentId, Resource, ResourceId};

/// Shared simulation state: N resources and N agent status slots in a ring.
///
/// Agent `i` sits between resource `i` (its left) and resource `(i + 1) % N`
/// (its right), so every agent's right resource is its right neighbor's left.
///
/// # Frame Discipline
///
/// Agents apply every mutation that must look atomic (acquire and mark held,
/// finish a meal and release, publish a state) while holding the shared side
/// of the frame lock. `snapshot()` takes the exclusive side, so a snapshot
/// never observes a half-applied mutation. The lock is never held across an
/// `.await`.
pub struct Table {
    frame: RwLock<()>,
    resources: Vec<Arc<Resource>>,
    slots: Vec<Mutex<AgentStatus>>,
}

impl Table {
    /// Create a ring of `num_agents` free resources and idle agents.
    ///
    /// Every agent's last meal is set to now.
    pub fn new(num_agents: usize) -> Self {
        let started = Instant::now();
        let resources = (0..num_agents)
            .map(|i| Arc::new(Resource::new(ResourceId(i))))
            .collect();
        let slots = (0..num_agents)
            .map(|i| Mutex::new(AgentStatus::new(AgentId(i), started)))
            .collect();

        Self {
            frame: RwLock::new(()),
            resources,
            slots,
        }
    }

    /// Number of agents (and resources) in the ring.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        (0..self.len()).map(AgentId)
    }

    pub fn left_of(&self, agent: AgentId) -> ResourceId {
        ResourceId(agent.index())
    }

    pub fn right_of(&self, agent: AgentId) -> ResourceId {
        ResourceId((agent.index() + 1) % self.len())
    }

    pub fn resource(&self, id: ResourceId) -> &Arc<Resource> {
        &self.resources[id.index()]
    }

    pub fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    /// Copy of one agent's published status.
    pub fn status(&self, agent: AgentId) -> AgentStatus {
        self.slots[agent.index()].lock().clone()
    }

    /// Enter the shared side of the frame lock.
    pub(crate) fn frame(&self) -> RwLockReadGuard<'_, ()> {
        self.frame.read()
    }

    /// Overwrite an agent's published status. Call with the frame held.
    pub(crate) fn publish(&self, status: &AgentStatus) {
        self.slots[status.id.index()].lock().clone_from(status);
    }

    /// Capture every agent's status and every resource's holder as one frame.
    pub fn snapshot(&self) -> Snapshot {
        let _frame = self.frame.write();
        let taken_at = Instant::now();

        let agents = self
            .slots
            .iter()
            .map(|slot| AgentView::from_status(&slot.lock(), taken_at))
            .collect();
        let holders = self.resources.iter().map(|r| r.holder()).collect();

        Snapshot {
            taken_at,
            agents,
            holders,
        }
    }
}

/// One agent as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentView {
    pub id: AgentId,
    pub state: AgentState,
    pub prioritized: bool,
    pub holds_left: bool,
    pub holds_right: bool,
    pub meals: u64,
    pub backoffs: u64,
    pub grants: u64,
    /// Time since the last completed meal (or run start).
    pub since_meal: Duration,
}

impl AgentView {
    fn from_status(status: &AgentStatus, now: Instant) -> Self {
        Self {
            id: status.id,
            state: status.state,
            prioritized: status.prioritized,
            holds_left: status.holds_left,
            holds_right: status.holds_right,
            meals: status.meals,
            backoffs: status.backoffs,
            grants: status.grants,
            since_meal: now.saturating_duration_since(status.last_meal),
        }
    }
}

/// A self-consistent frame of the whole table.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    #[serde(skip)]
    pub taken_at: Instant,
    pub agents: Vec<AgentView>,
    /// Holder of resource `i`, indexed by resource.
    pub holders: Vec<Option<AgentId>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn prioritized_count(&self) -> usize {
        self.agents.iter().filter(|a| a.prioritized).count()
    }

    pub fn total_meals(&self) -> u64 {
        self.agents.iter().map(|a| a.meals).sum()
    }

    /// Every invariant the frame breaks, described. Empty for a sound frame.
    ///
    /// Checks that held flags agree with resource holders, that eating
    /// agents hold both sides, and that no two neighbors eat at once.
    pub fn violations(&self) -> Vec<String> {
        let n = self.agents.len();
        let mut found = Vec::new();

        for (i, agent) in self.agents.iter().enumerate() {
            let left = self.holders[i];
            let right = self.holders[(i + 1) % n];

            if agent.holds_left != (left == Some(agent.id)) {
                found.push(format!(
                    "agent {} holds_left={} but left holder is {:?}",
                    agent.id, agent.holds_left, left
                ));
            }
            if agent.holds_right != (right == Some(agent.id)) {
                found.push(format!(
                    "agent {} holds_right={} but right holder is {:?}",
                    agent.id, agent.holds_right, right
                ));
            }
            if agent.state == AgentState::Eating && !(agent.holds_left && agent.holds_right) {
                found.push(format!("agent {} is eating without both resources", agent.id));
            }

            let neighbor = &self.agents[(i + 1) % n];
            if n > 1
                && agent.state == AgentState::Eating
                && neighbor.state == AgentState::Eating
            {
                found.push(format!(
                    "neighbors {} and {} are eating at once",
                    agent.id, neighbor.id
                ));
            }
        }

        found
    }
}
