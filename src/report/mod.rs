// ABOUTME: Status reporting - renders table snapshots as text or JSON frames.
// ABOUTME: Reporters only read snapshots; they never touch agents or resources.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::table::{Snapshot, Table};

/// Consumer of table snapshots.
pub trait Reporter: Send + Sync {
    fn report(&self, snapshot: &Snapshot);
}

impl<F> Reporter for F
where
    F: Fn(&Snapshot) + Send + Sync,
{
    fn report(&self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

/// Render a snapshot as a four-row text frame.
///
/// ```text
/// Agents:      T  | H  | E  | T  | H
/// Resources:   -  | #2 | #2 | -  | #4
/// Priority:    -  | !  | -  | -  | -
/// Meals:       3  | 1  | 4  | 2  | 12
/// ```
///
/// Column `i` shows agent `i` and its left resource `i`.
pub fn render_frame(snapshot: &Snapshot) -> String {
    let states: Vec<String> = snapshot
        .agents
        .iter()
        .map(|a| a.state.symbol().to_string())
        .collect();
    let holders: Vec<String> = snapshot
        .holders
        .iter()
        .map(|h| match h {
            Some(id) => id.to_string(),
            None => "-".to_string(),
        })
        .collect();
    let priorities: Vec<String> = snapshot
        .agents
        .iter()
        .map(|a| if a.prioritized { "!" } else { "-" }.to_string())
        .collect();
    let meals: Vec<String> = snapshot.agents.iter().map(|a| a.meals.to_string()).collect();

    let mut frame = String::new();
    frame.push_str(&row("Agents:", &states));
    frame.push_str(&row("Resources:", &holders));
    frame.push_str(&row("Priority:", &priorities));
    frame.push_str(&row("Meals:", &meals));
    frame
}

fn row(label: &str, cells: &[String]) -> String {
    let cells: Vec<String> = cells.iter().map(|c| format!("{:<2}", c)).collect();
    format!("{:<13}{}\n", label, cells.join(" | ").trim_end())
}

/// Prints text frames to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, snapshot: &Snapshot) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", render_frame(snapshot)) {
            warn!("failed to write status frame: {}", e);
        }
    }
}

/// Prints one JSON object per snapshot to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, snapshot: &Snapshot) {
        match serde_json::to_string(snapshot) {
            Ok(line) => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = writeln!(out, "{}", line) {
                    warn!("failed to write status frame: {}", e);
                }
            }
            Err(e) => warn!("failed to serialize snapshot: {}", e),
        }
    }
}

/// Report a snapshot every `every` until `cancel` fires.
pub async fn run_reporter(
    table: Arc<Table>,
    reporter: Arc<dyn Reporter>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => reporter.report(&table.snapshot()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentState;
    use crate::resource::AgentId;
    use crate::table::AgentView;
    use parking_lot::Mutex;

    fn view(id: usize, state: AgentState, prioritized: bool, meals: u64) -> AgentView {
        AgentView {
            id: AgentId(id),
            state,
            prioritized,
            holds_left: false,
            holds_right: false,
            meals,
            backoffs: 0,
            grants: 0,
            since_meal: Duration::ZERO,
        }
    }

    fn sample() -> Snapshot {
        Snapshot {
            taken_at: Instant::now(),
            agents: vec![
                view(0, AgentState::Thinking, false, 3),
                view(1, AgentState::Eating, false, 12),
                view(2, AgentState::Hungry, true, 0),
            ],
            holders: vec![None, Some(AgentId(1)), Some(AgentId(1))],
        }
    }

    #[test]
    fn test_render_frame_rows() {
        let frame = render_frame(&sample());
        let lines: Vec<&str> = frame.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Agents:      T  | E  | H");
        assert_eq!(lines[1], "Resources:   -  | #1 | #1");
        assert_eq!(lines[2], "Priority:    -  | -  | !");
        assert_eq!(lines[3], "Meals:       3  | 12 | 0");
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["agents"][1]["state"], "eating");
        assert_eq!(value["agents"][2]["prioritized"], true);
        assert_eq!(value["holders"][0], serde_json::Value::Null);
        assert_eq!(value["holders"][1], 1);
        assert!(value.get("taken_at").is_none());
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = |s: &Snapshot| seen.lock().push(s.total_meals());
        reporter.report(&sample());
        assert_eq!(*seen.lock(), vec![15]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reporter_ticks_until_cancelled() {
        let table = Arc::new(Table::new(3));
        let frames = Arc::new(Mutex::new(0usize));
        let reporter: Arc<dyn Reporter> = {
            let frames = frames.clone();
            Arc::new(move |_: &Snapshot| *frames.lock() += 1)
        };
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_reporter(
            table,
            reporter,
            Duration::from_millis(100),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(350)).await;
        cancel.cancel();
        task.await.unwrap();

        // Ticks at 100, 200 and 300
        assert_eq!(*frames.lock(), 3);
    }
}
