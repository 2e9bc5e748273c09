use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Patient already in queue")]
    DuplicateActiveVisit,

    #[error("No patients in queue")]
    EmptyQueue,

    #[error("Patient not found or not in progress")]
    NotInProgress,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Queue store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Queue store error: {0}")]
    Store(String),
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => QueueError::StoreUnavailable(msg),
            other => QueueError::Store(other.to_string()),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::DuplicateActiveVisit => AppError::Conflict(err.to_string()),
            QueueError::EmptyQueue => AppError::NotFound(err.to_string()),
            QueueError::NotInProgress => AppError::NotFound(err.to_string()),
            QueueError::NotFound(_) => AppError::NotFound(err.to_string()),
            QueueError::StoreUnavailable(_) => AppError::ServiceUnavailable(err.to_string()),
            QueueError::Store(msg) => AppError::Internal(msg),
        }
    }
}
