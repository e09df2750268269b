use thiserror::Error;

use crate::model::{
    ApplicationError, ImportantDateError, RecommenderError, RequirementError,
};

/// Any validation failure raised by the domain model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error(transparent)]
    Requirement(#[from] RequirementError),
    #[error(transparent)]
    Recommender(#[from] RecommenderError),
    #[error(transparent)]
    ImportantDate(#[from] ImportantDateError),
}
