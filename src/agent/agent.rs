// ABOUTME: Agent runner - drives the think, hunger, eat cycle for one seat at the table.
// ABOUTME: Handles greedy two-sided acquisition, timeout back-off, and priority grants.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::state::{AgentState, AgentStatus};
use crate::config::SimulationConfig;
use crate::error::{DineError, ResourceError};
use crate::resource::{AgentId, Resource};
use crate::table::Table;

/// Priority grant sent by the fairness monitor.
///
/// Consumed by the agent at its next wait point: it exempts the agent from
/// the hunger timeout until its next meal, and ends a think pause early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant;

/// Timing bounds for an agent's cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub max_think: Duration,
    pub max_eat: Duration,
    /// Hunger timeout for non-prioritized agents.
    pub max_wait: Duration,
    /// Fallback retry interval while hungry.
    pub retry: Duration,
}

impl Timing {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            max_think: config.max_think_time(),
            max_eat: config.max_eat_time(),
            max_wait: config.max_wait_time(),
            retry: config.retry_interval(),
        }
    }
}

/// Final counters of an agent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentReport {
    pub id: AgentId,
    pub meals: u64,
    pub backoffs: u64,
    pub grants: u64,
}

/// Why a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Elapsed,
    Granted,
    Cancelled,
}

/// Outcome of one hunger attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Fed,
    BackedOff,
    Cancelled,
}

/// How the agent leaves a phase that may hold resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StandDown {
    MealDone,
    BackOff,
    Shutdown,
}

/// One agent at the table.
pub struct Agent {
    /// Local copy of the published status. Only this task writes it.
    status: AgentStatus,
    table: Arc<Table>,
    left: Arc<Resource>,
    right: Arc<Resource>,
    grants: mpsc::Receiver<Grant>,
    grants_open: bool,
    timing: Timing,
    rng: StdRng,
}

impl Agent {
    /// Seat agent `id` at the table, between its left and right resources.
    pub fn new(
        id: AgentId,
        table: Arc<Table>,
        grants: mpsc::Receiver<Grant>,
        timing: Timing,
        rng: StdRng,
    ) -> Self {
        let left = Arc::clone(table.resource(table.left_of(id)));
        let right = Arc::clone(table.resource(table.right_of(id)));
        let status = table.status(id);

        Self {
            status,
            table,
            left,
            right,
            grants,
            grants_open: true,
            timing,
            rng,
        }
    }

    pub fn id(&self) -> AgentId {
        self.status.id
    }

    /// Run the cycle until `cancel` fires.
    ///
    /// On exit the agent releases whatever it holds; an interrupted meal is
    /// not counted. Returns `Err` only on a broken resource invariant.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<AgentReport, DineError> {
        debug!(agent = %self.id(), "agent seated");

        let outcome = self.cycle(&cancel).await;
        let released = self.stand_down(StandDown::Shutdown);
        outcome?;
        released?;

        debug!(agent = %self.id(), meals = self.status.meals, "agent left the table");
        Ok(self.report())
    }

    pub fn report(&self) -> AgentReport {
        AgentReport {
            id: self.status.id,
            meals: self.status.meals,
            backoffs: self.status.backoffs,
            grants: self.status.grants,
        }
    }

    async fn cycle(&mut self, cancel: &CancellationToken) -> Result<(), DineError> {
        loop {
            if self.think(cancel).await == Wake::Cancelled {
                return Ok(());
            }

            match self.hunger(cancel).await? {
                Attempt::Fed => {}
                // The think pause of the next cycle is the back-off
                Attempt::BackedOff => continue,
                Attempt::Cancelled => return Ok(()),
            }

            if self.eat(cancel).await? == Wake::Cancelled {
                return Ok(());
            }
        }
    }

    async fn think(&mut self, cancel: &CancellationToken) -> Wake {
        self.transition(AgentState::Thinking);

        let pause = self.random_pause(self.timing.max_think);
        self.pause_until(Instant::now() + pause, cancel).await
    }

    /// Race for both resources until fed, timed out, or cancelled.
    async fn hunger(&mut self, cancel: &CancellationToken) -> Result<Attempt, DineError> {
        self.transition(AgentState::Hungry);

        let timeout_at = Instant::now() + self.timing.max_wait;
        let left = Arc::clone(&self.left);
        let right = Arc::clone(&self.right);

        loop {
            // Registered before the attempt so a release in between is not missed
            let left_freed = left.released();
            let right_freed = right.released();
            tokio::pin!(left_freed, right_freed);

            if self.try_take_both() {
                return Ok(Attempt::Fed);
            }

            let now = Instant::now();
            if !self.status.prioritized && now >= timeout_at {
                self.stand_down(StandDown::BackOff)?;
                return Ok(Attempt::BackedOff);
            }

            let mut deadline = now + self.timing.retry;
            if !self.status.prioritized {
                deadline = deadline.min(timeout_at);
            }
            let wants_left = !self.status.holds_left;
            let wants_right = !self.status.holds_right;

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(Attempt::Cancelled),
                grant = self.grants.recv(), if self.grants_open => {
                    self.on_grant(grant);
                }
                () = &mut left_freed, if wants_left => {}
                () = &mut right_freed, if wants_right => {}
                () = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    async fn eat(&mut self, cancel: &CancellationToken) -> Result<Wake, DineError> {
        debug_assert!(self.status.holds_both(), "agent {} eating without both resources", self.id());
        self.transition(AgentState::Eating);

        let meal = self.random_pause(self.timing.max_eat);
        // Grants are discarded while eating, so only cancellation cuts a meal short
        if self.pause_until(Instant::now() + meal, cancel).await == Wake::Cancelled {
            return Ok(Wake::Cancelled);
        }

        self.stand_down(StandDown::MealDone)?;
        debug!(agent = %self.id(), meals = self.status.meals, "meal finished");
        Ok(Wake::Elapsed)
    }

    /// Steps 1 and 2 of an attempt: take each missing side if it is free.
    fn try_take_both(&mut self) -> bool {
        let table = Arc::clone(&self.table);
        let _frame = table.frame();
        let id = self.status.id;

        if !self.status.holds_left && self.left.try_acquire(id) {
            self.status.holds_left = true;
            trace!(agent = %id, resource = %self.left.id(), "took left");
        }
        if !self.status.holds_right && self.right.try_acquire(id) {
            self.status.holds_right = true;
            trace!(agent = %id, resource = %self.right.id(), "took right");
        }

        table.publish(&self.status);
        self.status.holds_both()
    }

    /// Release everything held and return to Thinking, as one frame.
    fn stand_down(&mut self, reason: StandDown) -> Result<(), ResourceError> {
        let table = Arc::clone(&self.table);
        let _frame = table.frame();
        let id = self.status.id;

        match reason {
            StandDown::MealDone => {
                self.status.meals += 1;
                self.status.last_meal = Instant::now();
                self.status.prioritized = false;
            }
            StandDown::BackOff => {
                self.status.backoffs += 1;
                debug!(
                    agent = %id,
                    left = self.status.holds_left,
                    right = self.status.holds_right,
                    "hunger timed out, releasing"
                );
            }
            StandDown::Shutdown => {}
        }

        let mut result = Ok(());
        if self.status.holds_left {
            result = result.and(self.left.release(id));
            self.status.holds_left = false;
        }
        if self.status.holds_right {
            result = result.and(self.right.release(id));
            self.status.holds_right = false;
        }
        self.status.state = AgentState::Thinking;

        table.publish(&self.status);
        result
    }

    fn transition(&mut self, state: AgentState) {
        if self.status.state != state {
            trace!(agent = %self.id(), from = %self.status.state, to = %state, "transition");
        }

        let table = Arc::clone(&self.table);
        let _frame = table.frame();
        self.status.state = state;
        table.publish(&self.status);
    }

    /// Sleep until `deadline`, consuming grants on the way.
    async fn pause_until(&mut self, deadline: Instant, cancel: &CancellationToken) -> Wake {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Wake::Cancelled,
                grant = self.grants.recv(), if self.grants_open => {
                    if self.on_grant(grant) {
                        return Wake::Granted;
                    }
                }
                () = tokio::time::sleep_until(deadline) => return Wake::Elapsed,
            }
        }
    }

    fn on_grant(&mut self, grant: Option<Grant>) -> bool {
        match grant {
            Some(Grant) => self.accept_grant(),
            None => {
                // Monitor is gone; stop polling the closed channel
                self.grants_open = false;
                false
            }
        }
    }

    /// Apply a priority grant. Returns true if it changed anything.
    fn accept_grant(&mut self) -> bool {
        if self.status.state == AgentState::Eating {
            debug!(agent = %self.id(), "grant discarded while eating");
            return false;
        }
        if self.status.prioritized {
            return false;
        }

        let table = Arc::clone(&self.table);
        let _frame = table.frame();
        self.status.prioritized = true;
        self.status.grants += 1;
        // A grant forces a thinking agent straight to hunger
        self.status.state = AgentState::Hungry;
        table.publish(&self.status);

        debug!(agent = %self.status.id, "priority granted");
        true
    }

    fn random_pause(&mut self, max: Duration) -> Duration {
        let nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
        if nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.rng.random_range(0..nanos))
    }
}
