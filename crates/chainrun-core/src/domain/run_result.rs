//! RunResult: the value passed between steps of a JobRun.
//!
//! Every step receives the previous step's `RunResult` and returns a new one.
//! The builders take `&self` and return a modified copy, so an adapter can
//! never mutate the input it was handed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::JobRunId;
use super::status::RunStatus;

/// Output of one step: JSON data plus a status and an optional error.
///
/// `data` is a JSON object; its `"value"` key holds the step's primary
/// result. A present `error` always comes with `status == Errored`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub job_run_id: JobRunId,

    #[serde(default = "empty_object")]
    pub data: Value,

    pub status: RunStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl RunResult {
    /// A fresh in-progress result with the given data.
    ///
    /// Non-object data is wrapped as `{"value": data}`.
    pub fn new(job_run_id: JobRunId, data: Value) -> Self {
        let data = match data {
            Value::Object(_) => data,
            Value::Null => empty_object(),
            other => serde_json::json!({ "value": other }),
        };
        Self {
            job_run_id,
            data,
            status: RunStatus::InProgress,
            error: None,
        }
    }

    /// Shorthand for a result whose only content is `{"value": value}`.
    pub fn with_value(job_run_id: JobRunId, value: Value) -> Self {
        Self::new(job_run_id, serde_json::json!({ "value": value }))
    }

    /// The primary result (`data.value`), `null` when absent.
    pub fn result(&self) -> &Value {
        self.data.get("value").unwrap_or(&Value::Null)
    }

    /// Look up an arbitrary key of `data`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Copy with `data.value` replaced.
    pub fn with_result(&self, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        match next.data.as_object_mut() {
            Some(obj) => {
                obj.insert("value".to_string(), value.into());
            }
            None => next.data = serde_json::json!({ "value": value.into() }),
        }
        next
    }

    /// Copy marked Completed.
    pub fn completed(&self) -> Self {
        self.with_status(RunStatus::Completed)
    }

    /// Copy marked Errored with a message.
    pub fn errored(&self, message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Errored,
            error: Some(message.into()),
            ..self.clone()
        }
    }

    /// Copy marked with a suspension status.
    ///
    /// Non-pending statuses are accepted too, so this doubles as a generic
    /// status setter; the error is always cleared unless the status is
    /// Errored. A step output left `InProgress` is recorded as Completed.
    pub fn with_status(&self, status: RunStatus) -> Self {
        let error = if status == RunStatus::Errored {
            self.error.clone()
        } else {
            None
        };
        Self {
            status,
            error,
            ..self.clone()
        }
    }

    pub fn has_error(&self) -> bool {
        self.status == RunStatus::Errored
    }
}
