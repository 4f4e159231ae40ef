// ABOUTME: Monitor module - starvation control for the table.
// ABOUTME: Contains the fairness monitor and the priority cap rule.

mod monitor;

pub use monitor::{FairnessMonitor, priority_cap};
