// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use dine::prelude::*;` to get started quickly.

pub use crate::agent::{Agent, AgentReport, AgentState, AgentStatus, Grant, Timing};
pub use crate::config::SimulationConfig;
pub use crate::error::{ConfigError, DineError, ResourceError};
pub use crate::monitor::{FairnessMonitor, priority_cap};
pub use crate::report::{ConsoleReporter, JsonReporter, Reporter, render_frame};
pub use crate::resource::{AgentId, Resource, ResourceId};
pub use crate::table::{AgentView, RunSummary, Simulation, Snapshot, Table};
pub use tokio_util::sync::CancellationToken;
