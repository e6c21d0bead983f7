use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};

use super::task::{Action, TaskStatus};

#[derive(thiserror::Error, Debug)]
pub enum PortalError {
    #[error("{actor} is not permitted to {operation}")]
    Unauthorized { actor: String, operation: String },
    #[error("cannot {action} task {task_id} while it is {status}")]
    InvalidTransition {
        task_id: String,
        status: TaskStatus,
        action: Action,
    },
    #[error("{kind} {id} was not found")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("record encoding failure: {0}")]
    Codec(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PortalError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        PortalError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<minicbor::decode::Error> for PortalError {
    fn from(err: minicbor::decode::Error) -> Self {
        PortalError::Codec(err.to_string())
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for PortalError {
    fn from(err: minicbor::encode::Error<E>) -> Self {
        PortalError::Codec(err.to_string())
    }
}

impl From<TransactionError<PortalError>> for PortalError {
    fn from(err: TransactionError<PortalError>) -> Self {
        match err {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => PortalError::Storage(inner),
        }
    }
}

/// Lifts an ordinary failure into a sled transaction abort.
pub(crate) trait OrAbort<T> {
    fn or_abort(self) -> ConflictableTransactionResult<T, PortalError>;
}

impl<T, E: Into<PortalError>> OrAbort<T> for Result<T, E> {
    fn or_abort(self) -> ConflictableTransactionResult<T, PortalError> {
        self.map_err(|e| ConflictableTransactionError::Abort(e.into()))
    }
}
