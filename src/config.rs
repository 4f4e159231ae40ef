// ABOUTME: Simulation parameters - ring size, timers, monitor tick, reporting.
// ABOUTME: Loads defaults, an optional JSON file, then DINE_* environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Named, overridable parameters for one simulation run.
///
/// All timings are stored in milliseconds so the JSON form stays readable;
/// use the `Duration` accessors in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of agents (and resources) in the ring.
    pub num_agents: usize,
    /// Upper bound of a single meal.
    pub max_eat_ms: u64,
    /// Upper bound of a single think pause.
    pub max_think_ms: u64,
    /// How long a non-prioritized agent keeps a partial acquisition.
    pub max_wait_ms: u64,
    /// Time since the last meal after which the monitor grants priority.
    pub max_idle_ms: u64,
    /// Fairness monitor tick interval.
    pub monitor_tick_ms: u64,
    /// Fallback retry interval while hungry, in case no release is observed.
    pub retry_ms: u64,
    /// Reporter interval. `None` disables periodic reporting.
    pub report_ms: Option<u64>,
    /// Seed for the per-agent random pauses. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_agents: 5,
            max_eat_ms: 50,
            max_think_ms: 30,
            max_wait_ms: 20,
            max_idle_ms: 80,
            monitor_tick_ms: 100,
            retry_ms: 10,
            report_ms: None,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Create a configuration with the default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration.
    /// Priority: environment variables > config file > defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |var| std::env::var(var).ok())
    }

    /// Same as [`load`](Self::load), reading overrides from `lookup`
    /// instead of the process environment.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse a JSON configuration document. Missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply `DINE_*` environment overrides on top of the current values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "DINE_NUM_AGENTS")? {
            self.num_agents = v;
        }
        if let Some(v) = parse_var(&lookup, "DINE_MAX_EAT_MS")? {
            self.max_eat_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "DINE_MAX_THINK_MS")? {
            self.max_think_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "DINE_MAX_WAIT_MS")? {
            self.max_wait_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "DINE_MAX_IDLE_MS")? {
            self.max_idle_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "DINE_MONITOR_TICK_MS")? {
            self.monitor_tick_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "DINE_RETRY_MS")? {
            self.retry_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "DINE_REPORT_MS")? {
            self.report_ms = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "DINE_SEED")? {
            self.seed = Some(v);
        }
        Ok(())
    }

    /// Check that the parameters describe a runnable ring.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_agents < 2 {
            return Err(ConfigError::Invalid {
                field: "num_agents",
                reason: format!("a ring needs at least 2 agents, got {}", self.num_agents),
            });
        }
        if self.monitor_tick_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "monitor_tick_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.retry_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "retry_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.report_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "report_ms",
                reason: "must be positive when set".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_num_agents(mut self, num_agents: usize) -> Self {
        self.num_agents = num_agents;
        self
    }

    pub fn with_max_eat(mut self, max_eat: Duration) -> Self {
        self.max_eat_ms = millis(max_eat);
        self
    }

    pub fn with_max_think(mut self, max_think: Duration) -> Self {
        self.max_think_ms = millis(max_think);
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait_ms = millis(max_wait);
        self
    }

    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle_ms = millis(max_idle);
        self
    }

    pub fn with_monitor_tick(mut self, tick: Duration) -> Self {
        self.monitor_tick_ms = millis(tick);
        self
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry_ms = millis(retry);
        self
    }

    pub fn with_report_interval(mut self, interval: Option<Duration>) -> Self {
        self.report_ms = interval.map(millis);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn max_eat_time(&self) -> Duration {
        Duration::from_millis(self.max_eat_ms)
    }

    pub fn max_think_time(&self) -> Duration {
        Duration::from_millis(self.max_think_ms)
    }

    pub fn max_wait_time(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn max_idle_time(&self) -> Duration {
        Duration::from_millis(self.max_idle_ms)
    }

    pub fn monitor_tick(&self) -> Duration {
        Duration::from_millis(self.monitor_tick_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    pub fn report_interval(&self) -> Option<Duration> {
        self.report_ms.map(Duration::from_millis)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
        None => Ok(None),
    }
}
