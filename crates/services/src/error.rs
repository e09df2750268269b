//! Shared error types for the services crate.

use thiserror::Error;

use gradtrack_core::model::{
    ApplicationError, ApplicationId, ImportantDateError, RecommenderError, RequirementError,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ApplicationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApplicationServiceError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error(transparent)]
    Requirement(#[from] RequirementError),
    #[error("only one Recommenders requirement is allowed per application")]
    DuplicateRecommenders,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `RequirementService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RequirementServiceError {
    #[error(transparent)]
    Requirement(#[from] RequirementError),
    #[error("application already has a Recommenders requirement")]
    DuplicateRecommenders,
    #[error("cannot lower recommender target to {target}: {persisted} recommenders are stored")]
    TargetBelowPersisted { target: u32, persisted: u32 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `RecommenderService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecommenderServiceError {
    #[error(transparent)]
    Recommender(#[from] RecommenderError),
    #[error("all {target} recommender slots are already filled")]
    TargetReached { target: u32 },
    #[error(transparent)]
    Requirement(#[from] RequirementServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DateService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DateServiceError {
    #[error(transparent)]
    Date(#[from] ImportantDateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the application detail controller.
///
/// `Redirect` means the application is missing or owned by someone else; the
/// caller leaves the view without rendering anything from it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DetailError {
    #[error("application is not available to this user")]
    Redirect,
    #[error("record belongs to application {found}, not {expected}")]
    ForeignRecord {
        expected: ApplicationId,
        found: ApplicationId,
    },
    #[error(transparent)]
    Application(#[from] ApplicationServiceError),
    #[error(transparent)]
    Requirement(#[from] RequirementServiceError),
    #[error(transparent)]
    Recommender(#[from] RecommenderServiceError),
    #[error(transparent)]
    Date(#[from] DateServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DetailError {
    /// Fold ownership failures into `Redirect`.
    pub(crate) fn classify(self) -> Self {
        let redirect = matches!(
            &self,
            Self::Storage(StorageError::NotFound | StorageError::Forbidden)
                | Self::Application(ApplicationServiceError::Storage(
                    StorageError::NotFound | StorageError::Forbidden
                ))
        );
        if redirect { Self::Redirect } else { self }
    }
}

/// Errors emitted by identity providers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error("not signed in")]
    NotSignedIn,
}

/// Errors emitted by dashboard and timeline queries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
