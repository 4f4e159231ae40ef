// ABOUTME: Table module - shared simulation state and the orchestrator that runs it.
// ABOUTME: Contains the ring, snapshots, and the Simulation that launches every task.

mod simulation;
mod table;

pub use simulation::{RunSummary, Simulation};
pub use table::{AgentView, Snapshot, Table};

#[cfg(test)]
mod simulation_test;
#[cfg(test)]
mod table_test;
