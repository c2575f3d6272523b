//! JobRun record and its TaskRuns.
//!
//! A JobRun is the unit of persistence and resumption. Its TaskRuns are
//! created together with it (one per configured adapter) and are only ever
//! mutated through the methods below, which the executor calls while it
//! holds the run's execution registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{JobRunId, TaskRunId};
use super::run_result::RunResult;
use super::status::RunStatus;

/// One configured step: which adapter to run and with what parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Registered adapter type, e.g. `"sleep"` or `"ethbool"`.
    pub adapter: String,

    #[serde(default)]
    pub params: serde_json::Value,
}

impl TaskSpec {
    pub fn new(adapter: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            adapter: adapter.into(),
            params,
        }
    }

    /// A step without parameters.
    pub fn bare(adapter: impl Into<String>) -> Self {
        Self::new(adapter, serde_json::Value::Null)
    }
}

/// Ordered list of steps making up a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub tasks: Vec<TaskSpec>,
}

impl JobSpec {
    pub fn new(tasks: Vec<TaskSpec>) -> Self {
        Self { tasks }
    }
}

/// Record of one adapter invocation within a JobRun.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: TaskRunId,
    pub task: TaskSpec,

    /// `None` until the step has been attempted.
    #[serde(default)]
    pub status: Option<RunStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<RunResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<RunResult>,
}

impl TaskRun {
    pub fn new(id: TaskRunId, task: TaskSpec) -> Self {
        Self {
            id,
            task,
            status: None,
            input: None,
            output: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == Some(RunStatus::Completed)
    }
}

/// One execution of a configured job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    pub id: JobRunId,
    pub task_runs: Vec<TaskRun>,
    pub status: RunStatus,

    /// Input handed to the first step.
    pub initial_input: RunResult,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRun {
    /// Create a run in its not-yet-started shape: status InProgress and no
    /// step attempted.
    ///
    /// `task_ids` must yield at least one id per task in `spec`.
    pub fn new(
        id: JobRunId,
        spec: &JobSpec,
        task_ids: impl IntoIterator<Item = TaskRunId>,
        initial_input: RunResult,
        created_at: DateTime<Utc>,
    ) -> Self {
        let task_runs = spec
            .tasks
            .iter()
            .cloned()
            .zip(task_ids)
            .map(|(task, task_id)| TaskRun::new(task_id, task))
            .collect();
        Self {
            id,
            task_runs,
            status: RunStatus::InProgress,
            initial_input: RunResult {
                job_run_id: id,
                ..initial_input
            },
            created_at,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Index of the first step that has not completed, if any.
    pub fn next_task_index(&self) -> Option<usize> {
        self.task_runs.iter().position(|tr| !tr.is_completed())
    }

    /// Input for step `index`: the previous step's output, or the run's
    /// initial input for the first step.
    pub fn input_for(&self, index: usize) -> RunResult {
        index
            .checked_sub(1)
            .and_then(|prev| self.task_runs.get(prev))
            .and_then(|tr| tr.output.clone())
            .unwrap_or_else(|| self.initial_input.clone())
    }

    /// Mark step `index` as being executed with `input`.
    pub fn start_task(&mut self, index: usize, input: RunResult) {
        self.status = RunStatus::InProgress;
        if let Some(tr) = self.task_runs.get_mut(index) {
            tr.status = Some(RunStatus::InProgress);
            tr.input = Some(input);
        }
    }

    /// Record the output of step `index` and derive the run status from it.
    ///
    /// An output left `InProgress` is neither pending nor errored and is
    /// recorded as a completed step. Completing the last step completes the
    /// run; any other status is copied to the run as-is.
    pub fn record_output(&mut self, index: usize, output: RunResult, now: DateTime<Utc>) {
        let output = match output.status {
            RunStatus::InProgress => output.completed(),
            _ => output,
        };
        let status = output.status;
        if let Some(tr) = self.task_runs.get_mut(index) {
            tr.status = Some(status);
            tr.output = Some(output);
        }

        self.status = match status {
            RunStatus::Completed if self.next_task_index().is_some() => RunStatus::InProgress,
            other => other,
        };
        if self.status.is_terminal() {
            self.completed_at = Some(now);
        }
    }

    /// Mark a run with no steps left as completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(now);
    }

    /// Output of the last attempted step.
    pub fn last_output(&self) -> Option<&RunResult> {
        self.task_runs.iter().rev().find_map(|tr| tr.output.as_ref())
    }
}
