// ABOUTME: Agent phases and the status record each agent publishes.
// ABOUTME: The status is written only by the owning agent task.

use serde::Serialize;
use tokio::time::Instant;

use crate::resource::AgentId;

/// Phase of an agent's cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Resting between meals. Initial state.
    Thinking,
    /// Trying to acquire both neighboring resources.
    Hungry,
    /// Holding both resources.
    Eating,
}

impl AgentState {
    /// Single-letter form used in status frames.
    pub fn symbol(self) -> char {
        match self {
            AgentState::Thinking => 'T',
            AgentState::Hungry => 'H',
            AgentState::Eating => 'E',
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Thinking => write!(f, "thinking"),
            AgentState::Hungry => write!(f, "hungry"),
            AgentState::Eating => write!(f, "eating"),
        }
    }
}

/// Published status of one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    pub id: AgentId,
    pub state: AgentState,
    /// Completion time of the last meal, or the start of the run.
    pub last_meal: Instant,
    pub meals: u64,
    /// Exempt from the hunger timeout until the next meal completes.
    pub prioritized: bool,
    pub holds_left: bool,
    pub holds_right: bool,
    /// Hunger attempts abandoned under the timeout.
    pub backoffs: u64,
    /// Priority grants accepted from the monitor.
    pub grants: u64,
}

impl AgentStatus {
    pub fn new(id: AgentId, started: Instant) -> Self {
        Self {
            id,
            state: AgentState::Thinking,
            last_meal: started,
            meals: 0,
            prioritized: false,
            holds_left: false,
            holds_right: false,
            backoffs: 0,
            grants: 0,
        }
    }

    pub fn holds_both(&self) -> bool {
        self.holds_left && self.holds_right
    }

    pub fn holds_any(&self) -> bool {
        self.holds_left || self.holds_right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_and_symbol() {
        assert_eq!(AgentState::Thinking.to_string(), "thinking");
        assert_eq!(AgentState::Hungry.to_string(), "hungry");
        assert_eq!(AgentState::Eating.to_string(), "eating");
        assert_eq!(AgentState::Thinking.symbol(), 'T');
        assert_eq!(AgentState::Hungry.symbol(), 'H');
        assert_eq!(AgentState::Eating.symbol(), 'E');
    }

    #[test]
    fn test_new_status_is_idle() {
        let now = Instant::now();
        let status = AgentStatus::new(AgentId(2), now);
        assert_eq!(status.state, AgentState::Thinking);
        assert_eq!(status.last_meal, now);
        assert_eq!(status.meals, 0);
        assert!(!status.prioritized);
        assert!(!status.holds_any());
        assert!(!status.holds_both());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&AgentState::Hungry).unwrap();
        assert_eq!(json, "\"hungry\"");
    }
}
