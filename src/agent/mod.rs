// ABOUTME: Agent module - the seats at the table and their cycle.
// ABOUTME: Provides the Agent runner, its published status, and the priority Grant message.

mod agent;
mod state;

pub use agent::{Agent, AgentReport, Grant, Timing};
pub use state::{AgentState, AgentStatus};
