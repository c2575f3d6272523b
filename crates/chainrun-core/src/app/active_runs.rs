//! ActiveRuns - JobRun ごとの実行登録
//!
//! 同じ JobRun を同時に実行できるワーカーは 1 つだけです。
//! 登録中の run に届いたリクエストは捨てずに「再配送」として記録し、
//! 保持しているワーカーが実行を終えた直後にもう一度実行します。
//! 重複リクエストは 1 回の再配送にまとめられます。
//!
//! エントリは release で消えるので、終了した run の分は残りません。

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;

use crate::domain::{JobRunId, RunRequest, RunResult};

/// Result of trying to register as a run's executor.
#[derive(Debug, PartialEq)]
pub enum Claim {
    /// The caller is now the only executor of the run.
    Acquired,

    /// Another worker holds the run; the request was recorded for redelivery.
    Deferred,
}

/// What the holder should do after an execution.
#[derive(Debug, PartialEq)]
pub enum Release {
    /// Registration dropped.
    Done,

    /// A request arrived meanwhile; the caller still holds the run and
    /// must execute it again with this input.
    Again(Option<RunResult>),
}

#[derive(Default)]
pub struct ActiveRuns {
    // None = held, nothing deferred; Some(input) = held with a deferred request
    entries: Mutex<HashMap<JobRunId, Option<Option<RunResult>>>>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for `request`'s run, or defer the request if it is held.
    ///
    /// A later deferred request replaces an earlier one's input only when it
    /// carries an input itself.
    pub fn claim(&self, request: &RunRequest) -> Claim {
        let mut entries = self.lock();
        match entries.entry(request.job_run_id) {
            Entry::Vacant(v) => {
                v.insert(None);
                Claim::Acquired
            }
            Entry::Occupied(mut o) => {
                let deferred = o.get_mut();
                match deferred {
                    Some(existing) => {
                        if let Some(input) = &request.input {
                            *existing = Some(input.clone());
                        }
                    }
                    None => *deferred = Some(request.input.clone()),
                }
                Claim::Deferred
            }
        }
    }

    /// Register only if nobody holds the run. Nothing is recorded otherwise.
    pub fn try_acquire(&self, id: JobRunId) -> bool {
        match self.lock().entry(id) {
            Entry::Vacant(v) => {
                v.insert(None);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Finish one execution of `id`.
    pub fn release(&self, id: JobRunId) -> Release {
        let mut entries = self.lock();
        match entries.get_mut(&id) {
            Some(deferred) => match deferred.take() {
                Some(input) => Release::Again(input),
                None => {
                    entries.remove(&id);
                    Release::Done
                }
            },
            None => Release::Done,
        }
    }

    /// Drop the registration of `id` together with any deferred request.
    pub fn remove(&self, id: JobRunId) {
        self.lock().remove(&id);
    }

    pub fn is_active(&self, id: JobRunId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobRunId, Option<Option<RunResult>>>> {
        // the map is left consistent by every critical section
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn second_claim_is_deferred_and_redelivered_once() {
        let active = ActiveRuns::new();
        let id = JobRunId::random();

        assert_eq!(active.claim(&RunRequest::resume(id)), Claim::Acquired);
        assert_eq!(active.claim(&RunRequest::resume(id)), Claim::Deferred);
        assert_eq!(active.claim(&RunRequest::resume(id)), Claim::Deferred);

        assert_eq!(active.release(id), Release::Again(None));
        assert!(active.is_active(id));
        assert_eq!(active.release(id), Release::Done);
        assert!(active.is_empty());
    }

    #[test]
    fn deferred_input_is_kept() {
        let active = ActiveRuns::new();
        let id = JobRunId::random();
        let input = RunResult::with_value(id, json!("override"));

        active.claim(&RunRequest::resume(id));
        active.claim(&RunRequest::with_input(id, input.clone()));
        active.claim(&RunRequest::resume(id));

        assert_eq!(active.release(id), Release::Again(Some(input)));
    }

    #[test]
    fn runs_are_independent() {
        let active = ActiveRuns::new();
        let a = JobRunId::random();
        let b = JobRunId::random();

        assert_eq!(active.claim(&RunRequest::resume(a)), Claim::Acquired);
        assert_eq!(active.claim(&RunRequest::resume(b)), Claim::Acquired);
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn try_acquire_does_not_record_redelivery() {
        let active = ActiveRuns::new();
        let id = JobRunId::random();

        assert!(active.try_acquire(id));
        assert!(!active.try_acquire(id));
        assert_eq!(active.release(id), Release::Done);
        assert!(!active.is_active(id));
    }

    #[test]
    fn remove_drops_deferred_requests() {
        let active = ActiveRuns::new();
        let id = JobRunId::random();

        assert!(active.try_acquire(id));
        assert_eq!(active.claim(&RunRequest::resume(id)), Claim::Deferred);

        active.remove(id);
        assert!(!active.is_active(id));
        assert!(active.is_empty());
        assert_eq!(active.claim(&RunRequest::resume(id)), Claim::Acquired);
    }
}
