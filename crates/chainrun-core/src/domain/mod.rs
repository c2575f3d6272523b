//! Domain model (IDs, statuses, run results, job runs, requests).

pub mod ids;
pub mod job_run;
pub mod request;
pub mod run_result;
pub mod status;

pub use ids::{JobRunId, TaskRunId};
pub use job_run::{JobRun, JobSpec, TaskRun, TaskSpec};
pub use request::RunRequest;
pub use run_result::RunResult;
pub use status::RunStatus;
