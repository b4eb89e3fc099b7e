use thiserror::Error;
use uuid::Uuid;

use crate::models::{ReportStatus, Role};

/// Failures raised by the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("stored value is unreadable: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("a {0} cannot connect with another {0}")]
    RoleMismatch(Role),

    #[error("members cannot report their own profile")]
    SelfReport,

    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    #[error("report {id} is {status}: {reason}")]
    InvalidState {
        id: Uuid,
        status: ReportStatus,
        reason: &'static str,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),
}

impl Error {
    pub(crate) fn profile_not_found(id: Uuid) -> Self {
        Error::NotFound { kind: "profile", id }
    }

    pub(crate) fn report_not_found(id: Uuid) -> Self {
        Error::NotFound { kind: "report", id }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
