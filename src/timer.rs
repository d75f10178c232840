//! Hierarchical stopwatch for coarse engine phases.
//!
//! Purely diagnostic: resolution never reads timer state, and [`NoopTimer`] can stand in
//! wherever timings are not wanted.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

pub trait TaskTimer {
    fn start(&mut self, label: &str);
    fn end(&mut self, label: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTimer;

impl TaskTimer for NoopTimer {
    fn start(&mut self, _label: &str) {}
    fn end(&mut self, _label: &str) {}
}

#[derive(Debug, Clone)]
struct Task {
    name: String,
    depth: usize,
    started_at: DateTime<Utc>,
    started: Instant,
    elapsed: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct Timer {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    stack: Vec<usize>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    fn unique_name(&self, label: &str) -> String {
        if !self.index.contains_key(label) {
            return label.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{label}{n}");
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Most recent open task named `label` or a numbered repeat of it.
    fn open_task(&self, label: &str) -> Option<usize> {
        self.stack.iter().rev().copied().find(|&idx| {
            let name = &self.tasks[idx].name;
            name == label
                || name
                    .strip_prefix(label)
                    .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        })
    }

    pub fn report(&self) -> TimerReport {
        let now = Instant::now();
        let phases = self
            .tasks
            .iter()
            .map(|task| PhaseTiming {
                label: task.name.clone(),
                depth: task.depth,
                started_at: task.started_at.to_rfc3339(),
                status: match task.elapsed {
                    Some(elapsed) => PhaseStatus::Completed(elapsed),
                    None => PhaseStatus::Open(now.duration_since(task.started)),
                },
            })
            .collect();
        TimerReport { phases }
    }
}

impl TaskTimer for Timer {
    fn start(&mut self, label: &str) {
        let name = self.unique_name(label);
        let idx = self.tasks.len();
        self.tasks.push(Task {
            name: name.clone(),
            depth: self.stack.len(),
            started_at: Utc::now(),
            started: Instant::now(),
            elapsed: None,
        });
        self.index.insert(name, idx);
        self.stack.push(idx);
    }

    fn end(&mut self, label: &str) {
        let Some(idx) = self.open_task(label) else {
            debug!(label, "timer end without matching open task");
            return;
        };
        self.stack.retain(|&open| open != idx);
        let task = &mut self.tasks[idx];
        task.elapsed = Some(task.started.elapsed());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "elapsed_ms", rename_all = "lowercase")]
pub enum PhaseStatus {
    #[serde(serialize_with = "as_millis")]
    Completed(Duration),
    /// Never closed; carries how long it had been running when the report was taken.
    #[serde(serialize_with = "as_millis")]
    Open(Duration),
}

fn as_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(value.as_millis())
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseTiming {
    pub label: String,
    pub depth: usize,
    pub started_at: String,
    pub status: PhaseStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerReport {
    pub phases: Vec<PhaseTiming>,
}

impl TimerReport {
    pub fn completed(&self) -> impl Iterator<Item = &PhaseTiming> {
        self.phases
            .iter()
            .filter(|phase| matches!(phase.status, PhaseStatus::Completed(_)))
    }

    pub fn unclosed(&self) -> impl Iterator<Item = &PhaseTiming> {
        self.phases
            .iter()
            .filter(|phase| matches!(phase.status, PhaseStatus::Open(_)))
    }
}

impl fmt::Display for TimerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for phase in &self.phases {
            if phase.depth > 0 {
                write!(f, "|{}> ", "---".repeat(phase.depth))?;
            }
            match phase.status {
                PhaseStatus::Completed(elapsed) => {
                    writeln!(f, "{:.3}s {}", elapsed.as_secs_f64(), phase.label)?
                }
                PhaseStatus::Open(running) => writeln!(
                    f,
                    "{:.3}s {} (never closed)",
                    running.as_secs_f64(),
                    phase.label
                )?,
            }
        }
        Ok(())
    }
}
