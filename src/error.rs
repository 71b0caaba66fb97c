use thiserror::Error;

/// Failure modes of the reconciler and its record store.
///
/// `NotFound` is deliberately not here: under strict mode it is a normal
/// outcome callers branch on, not a failure (see [`crate::reconcile::Outcome`]).
#[derive(Debug, Error)]
pub enum Error {
    /// The desired role is not one of the enumerated values.
    #[error("invalid role {0:?} (expected one of: student, admin)")]
    InvalidRole(String),

    /// The email is empty or not a plausible address.
    #[error("invalid identity {0:?}: not a valid email address")]
    InvalidIdentity(String),

    /// More than one record carries the same email. The store's uniqueness
    /// constraint was violated externally; surfaced rather than resolved.
    #[error("store holds multiple records for email {0:?}")]
    DuplicateEmail(String),

    /// The record store could not be reached or the call failed in transit.
    /// The only condition a caller should retry.
    #[error("record store unavailable")]
    StorageUnavailable(#[source] anyhow::Error),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::StorageUnavailable(e.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
