// ABOUTME: Fairness monitor - grants priority to agents that have gone too long without a meal.
// ABOUTME: Runs on a fixed tick and never lets all agents be prioritized at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::{AgentState, Grant};
use crate::resource::AgentId;
use crate::table::{Snapshot, Table};

/// Most agents that may be prioritized at once in a ring of `num_agents`.
///
/// Prioritizing everyone would make priority meaningless, so one agent is
/// always left subject to the hunger timeout.
pub fn priority_cap(num_agents: usize) -> usize {
    num_agents.saturating_sub(1)
}

/// Background task that bounds starvation.
///
/// Each tick it counts prioritized agents, and if the count is below the
/// cap, sends a [`Grant`] to every idle, non-eating, non-prioritized agent in
/// ring order until the cap is reached.
///
/// A grant is counted from the moment it is sent. It stays "in flight" until
/// the agent shows up as prioritized (then its status counts it), shows up
/// eating (a grant reaching an eater is discarded), or its meal count moves.
pub struct FairnessMonitor {
    table: Arc<Table>,
    grants: Vec<mpsc::Sender<Grant>>,
    max_idle: Duration,
    period: Duration,
    /// Agents with an unconsumed grant, with their meal count when granted.
    in_flight: HashMap<AgentId, u64>,
}

impl FairnessMonitor {
    /// Create a monitor over `table`, with one grant sender per agent in
    /// ring order.
    ///
    /// # Panics
    ///
    /// Panics if the number of senders differs from the number of agents.
    pub fn new(
        table: Arc<Table>,
        grants: Vec<mpsc::Sender<Grant>>,
        max_idle: Duration,
        period: Duration,
    ) -> Self {
        assert_eq!(
            grants.len(),
            table.len(),
            "one grant channel per agent is required"
        );

        Self {
            table,
            grants,
            max_idle,
            period,
            in_flight: HashMap::new(),
        }
    }

    /// Number of grants sent but not yet reflected in agent status.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Decide which agents to grant priority this tick.
    ///
    /// Chosen agents are recorded as in flight.
    pub fn select(&mut self, snapshot: &Snapshot) -> Vec<AgentId> {
        self.in_flight.retain(|id, meals_when_granted| {
            let view = &snapshot.agents[id.index()];
            // An eating agent throws grants away, so this one is spent
            !view.prioritized
                && view.state != AgentState::Eating
                && view.meals == *meals_when_granted
        });

        let cap = priority_cap(snapshot.len());
        let mut count = snapshot
            .agents
            .iter()
            .filter(|a| a.prioritized || self.in_flight.contains_key(&a.id))
            .count();

        let mut chosen = Vec::new();
        if count >= cap {
            return chosen;
        }

        for agent in &snapshot.agents {
            if agent.prioritized
                || agent.state == AgentState::Eating
                || self.in_flight.contains_key(&agent.id)
            {
                continue;
            }
            if agent.since_meal <= self.max_idle {
                continue;
            }

            self.in_flight.insert(agent.id, agent.meals);
            chosen.push(agent.id);
            count += 1;

            if count >= cap {
                break;
            }
        }

        chosen
    }

    /// Run one tick: snapshot, select, and send grants.
    ///
    /// Returns the agents whose grant was delivered to their inbox.
    pub fn tick(&mut self) -> Vec<AgentId> {
        let snapshot = self.table.snapshot();
        let chosen = self.select(&snapshot);
        let mut delivered = Vec::with_capacity(chosen.len());

        for id in chosen {
            match self.grants[id.index()].try_send(Grant) {
                Ok(()) => {
                    info!(
                        agent = %id,
                        idle_ms = u64::try_from(snapshot.agents[id.index()].since_meal.as_millis())
                            .unwrap_or(u64::MAX),
                        "granting priority"
                    );
                    delivered.push(id);
                }
                Err(TrySendError::Full(_)) => {
                    warn!(agent = %id, "grant inbox full, will retry next tick");
                    self.in_flight.remove(&id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(agent = %id, "agent gone, grant dropped");
                    self.in_flight.remove(&id);
                }
            }
        }

        delivered
    }

    /// Tick every period until `cancel` fires. The first tick is one full
    /// period after start.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "Starting fairness monitor (tick: {:?}, max idle: {:?}, cap: {})",
            self.period,
            self.max_idle,
            priority_cap(self.table.len())
        );

        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        debug!("fairness monitor stopped");
    }
}
