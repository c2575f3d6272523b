use thiserror::Error;

use crate::domain::JobRunId;
use crate::ports::StoreError;

#[derive(Debug, Error)]
pub enum ChainrunError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("adapter not found for type={0}")]
    AdapterNotFound(String),

    #[error("run queue is closed")]
    QueueClosed,

    #[error("{0} is being executed")]
    RunBusy(JobRunId),
}

pub type Result<T> = std::result::Result<T, ChainrunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_convert() {
        let id = JobRunId::random();
        let err: ChainrunError = StoreError::NotFound(id).into();
        assert!(matches!(err, ChainrunError::Store(StoreError::NotFound(_))));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn messages_name_the_subject() {
        let err = ChainrunError::AdapterNotFound("httpget".to_string());
        assert_eq!(err.to_string(), "adapter not found for type=httpget");
    }
}
