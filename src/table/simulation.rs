// ABOUTME: Simulation orchestrator - seats N agents around the ring and runs every task.
// ABOUTME: Launches agents, the fairness monitor, and an optional reporter until cancelled.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::table::{Snapshot, Table};
use crate::agent::{Agent, AgentReport, Timing};
use crate::config::SimulationConfig;
use crate::error::DineError;
use crate::monitor::FairnessMonitor;
use crate::report::{Reporter, run_reporter};
use crate::resource::AgentId;

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// One report per agent, in ring order.
    pub agents: Vec<AgentReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn total_meals(&self) -> u64 {
        self.agents.iter().map(|a| a.meals).sum()
    }

    /// Agents that never completed a meal.
    pub fn starved(&self) -> Vec<AgentId> {
        self.agents
            .iter()
            .filter(|a| a.meals == 0)
            .map(|a| a.id)
            .collect()
    }
}

/// The whole simulation: one table, its configuration, and an optional
/// reporter.
pub struct Simulation {
    config: SimulationConfig,
    table: Arc<Table>,
    reporter: Option<Arc<dyn Reporter>>,
}

impl Simulation {
    /// Build the ring described by `config`.
    pub fn new(config: SimulationConfig) -> Result<Self, DineError> {
        config.validate()?;
        if config.num_agents < 3 {
            warn!(
                "Ring of {} agents has little contention; 3 or more is recommended",
                config.num_agents
            );
        }
        let table = Arc::new(Table::new(config.num_agents));

        Ok(Self {
            config,
            table,
            reporter: None,
        })
    }

    /// Attach a reporter. It only runs if the config sets a report interval.
    pub fn with_reporter<R: Reporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn table(&self) -> Arc<Table> {
        Arc::clone(&self.table)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.table.snapshot()
    }

    /// Run every task until `cancel` fires or an agent fails.
    ///
    /// An agent failure cancels the remaining tasks and is returned once
    /// they have stopped. The caller's token is never cancelled by the
    /// simulation itself.
    pub async fn run(self, cancel: CancellationToken) -> Result<RunSummary, DineError> {
        let started = Instant::now();
        let stop = cancel.child_token();
        let n = self.table.len();
        let timing = Timing::from_config(&self.config);

        info!(
            "Starting simulation: {} agents, eat<{:?}, think<{:?}, wait {:?}, idle {:?}",
            n,
            timing.max_eat,
            timing.max_think,
            timing.max_wait,
            self.config.max_idle_time()
        );

        let mut senders = Vec::with_capacity(n);
        let mut agents = JoinSet::new();
        for id in self.table.agent_ids() {
            let (tx, rx) = mpsc::channel(1);
            senders.push(tx);
            let agent = Agent::new(
                id,
                Arc::clone(&self.table),
                rx,
                timing,
                seeded_rng(self.config.seed, id),
            );
            agents.spawn(agent.run(stop.clone()));
        }

        let monitor = FairnessMonitor::new(
            Arc::clone(&self.table),
            senders,
            self.config.max_idle_time(),
            self.config.monitor_tick(),
        );
        let monitor_task = tokio::spawn(monitor.run(stop.clone()));

        let reporter = match (self.reporter, self.config.report_interval()) {
            (Some(reporter), Some(every)) => {
                let task = tokio::spawn(run_reporter(
                    Arc::clone(&self.table),
                    Arc::clone(&reporter),
                    every,
                    stop.clone(),
                ));
                Some((reporter, task))
            }
            _ => None,
        };

        let mut reports = Vec::with_capacity(n);
        let mut failure: Option<DineError> = None;
        while let Some(joined) = agents.join_next().await {
            match joined {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => {
                    error!("Agent failed: {}", e);
                    stop.cancel();
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    error!("Agent task panicked or was aborted: {}", e);
                    stop.cancel();
                    failure.get_or_insert(e.into());
                }
            }
        }

        // Agents only return once stopped; make sure the helpers follow
        stop.cancel();
        monitor_task.await?;
        if let Some((reporter, task)) = reporter {
            task.await?;
            // Every agent has stood down, so this frame shows the table cleared
            reporter.report(&self.table.snapshot());
        }

        if let Some(e) = failure {
            return Err(e);
        }

        reports.sort_by_key(|r| r.id);
        let summary = RunSummary {
            agents: reports,
            elapsed: started.elapsed(),
        };
        info!(
            "Simulation stopped after {:?}: {} meals",
            summary.elapsed,
            summary.total_meals()
        );
        Ok(summary)
    }

    /// Run for a fixed duration, then stop every task.
    pub async fn run_for(self, duration: Duration) -> Result<RunSummary, DineError> {
        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                cancel.cancel();
            })
        };

        let summary = self.run(cancel).await;
        timer.abort();
        summary
    }
}

fn seeded_rng(seed: Option<u64>, id: AgentId) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id.index() as u64)),
        None => StdRng::from_os_rng(),
    }
}
