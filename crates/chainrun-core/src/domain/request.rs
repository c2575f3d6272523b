//! RunRequest: the message that (re)triggers execution of a JobRun.

use super::ids::JobRunId;
use super::run_result::RunResult;

/// Transient request to execute a JobRun from its next unfinished step.
///
/// Never persisted. Duplicate requests for the same run are expected and
/// harmless: execution always continues from the persisted state.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub job_run_id: JobRunId,

    /// Replaces the input of the step being resumed.
    pub input: Option<RunResult>,
}

impl RunRequest {
    /// A plain resume signal.
    pub fn resume(job_run_id: JobRunId) -> Self {
        Self {
            job_run_id,
            input: None,
        }
    }

    pub fn with_input(job_run_id: JobRunId, input: RunResult) -> Self {
        Self {
            job_run_id,
            input: Some(input),
        }
    }
}
