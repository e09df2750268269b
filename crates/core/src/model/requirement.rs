use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ApplicationId, RequirementId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequirementError {
    #[error("requirement name cannot be empty")]
    EmptyName,

    #[error("num_recommenders is only valid on the Recommenders requirement")]
    RecommenderCountOnWrongRequirement,

    #[error("minimum score must be a finite, non-negative number")]
    InvalidMinScore,

    #[error("at most {max} recommenders can be requested, got {requested}")]
    TooManyRecommenders { requested: u32, max: u32 },
}

/// Upper bound on the recommender target of one application.
pub const MAX_RECOMMENDERS: u32 = 20;

/// # Errors
///
/// Returns `RequirementError::TooManyRecommenders` above `MAX_RECOMMENDERS`.
pub fn check_recommender_target(requested: u32) -> Result<u32, RequirementError> {
    if requested > MAX_RECOMMENDERS {
        return Err(RequirementError::TooManyRecommenders {
            requested,
            max: MAX_RECOMMENDERS,
        });
    }
    Ok(requested)
}

/// Name of an admission requirement.
///
/// The catalog is open: anything non-blank is accepted, the constants below
/// are the names offered by the creation form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementName(String);

impl RequirementName {
    pub const TRANSCRIPTS: &'static str = "Transcripts";
    pub const RECOMMENDERS: &'static str = "Recommenders";
    pub const APPLICATION_FEE: &'static str = "Application Fee";
    pub const STATEMENT_OF_PURPOSE: &'static str = "Statement of Purpose";
    pub const CV: &'static str = "CV";
    pub const ENGLISH_PROFICIENCY: &'static str = "English Proficiency";
    pub const GRE: &'static str = "GRE";
    pub const WRITING_SAMPLE: &'static str = "Writing Sample";
    pub const PORTFOLIO: &'static str = "Portfolio";
    pub const INTERVIEW: &'static str = "Interview";
    pub const MINIMUM_GPA: &'static str = "Minimum GPA";

    /// Names suggested by the creation form, in display order.
    pub const CATALOG: [&'static str; 11] = [
        Self::TRANSCRIPTS,
        Self::RECOMMENDERS,
        Self::APPLICATION_FEE,
        Self::STATEMENT_OF_PURPOSE,
        Self::CV,
        Self::ENGLISH_PROFICIENCY,
        Self::GRE,
        Self::WRITING_SAMPLE,
        Self::PORTFOLIO,
        Self::INTERVIEW,
        Self::MINIMUM_GPA,
    ];

    /// # Errors
    ///
    /// Returns `RequirementError::EmptyName` for blank input.
    pub fn new(name: impl Into<String>) -> Result<Self, RequirementError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RequirementError::EmptyName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn recommenders() -> Self {
        Self(Self::RECOMMENDERS.to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact match only; "recommenders" in another case is an ordinary requirement.
    #[must_use]
    pub fn is_recommenders(&self) -> bool {
        self.0 == Self::RECOMMENDERS
    }

    #[must_use]
    pub fn is_in_catalog(&self) -> bool {
        Self::CATALOG.contains(&self.0.as_str())
    }
}

impl fmt::Display for RequirementName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional attributes a requirement may carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementDetails {
    pub criteria_type: Option<String>,
    pub criteria_value: Option<String>,
    pub min_score: Option<f64>,
    pub waived: bool,
    pub conversion_notes: Option<String>,
    /// Target recommender count; only meaningful on the Recommenders requirement.
    pub num_recommenders: Option<u32>,
}

/// Input for a requirement that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementDraft {
    pub name: RequirementName,
    pub completed: bool,
    pub details: RequirementDetails,
}

impl RequirementDraft {
    #[must_use]
    pub fn new(name: RequirementName) -> Self {
        Self {
            name,
            completed: false,
            details: RequirementDetails::default(),
        }
    }

    /// The Recommenders pseudo-requirement carrying a target count.
    #[must_use]
    pub fn recommenders(count: u32) -> Self {
        Self {
            name: RequirementName::recommenders(),
            completed: false,
            details: RequirementDetails {
                num_recommenders: Some(count),
                ..RequirementDetails::default()
            },
        }
    }

    /// # Errors
    ///
    /// Returns `RequirementError` when details conflict with the name.
    pub fn validate(self) -> Result<Self, RequirementError> {
        validate_details(&self.name, &self.details)?;
        Ok(self)
    }

    #[must_use]
    pub fn assign_id(self, id: RequirementId, application_id: ApplicationId) -> Requirement {
        Requirement {
            id,
            application_id,
            name: self.name,
            completed: self.completed,
            details: self.details,
        }
    }
}

/// One admission requirement tracked against an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub application_id: ApplicationId,
    pub name: RequirementName,
    pub completed: bool,
    #[serde(flatten)]
    pub details: RequirementDetails,
}

impl Requirement {
    #[must_use]
    pub fn is_recommenders(&self) -> bool {
        self.name.is_recommenders()
    }

    /// Declared recommender target, `0` for ordinary requirements.
    ///
    /// Stored values above `MAX_RECOMMENDERS` are clamped.
    #[must_use]
    pub fn recommender_target(&self) -> u32 {
        if self.is_recommenders() {
            self.details
                .num_recommenders
                .unwrap_or(0)
                .min(MAX_RECOMMENDERS)
        } else {
            0
        }
    }

    /// # Errors
    ///
    /// Returns `RequirementError` when details conflict with the name.
    pub fn validate(&self) -> Result<(), RequirementError> {
        validate_details(&self.name, &self.details)
    }
}

fn validate_details(
    name: &RequirementName,
    details: &RequirementDetails,
) -> Result<(), RequirementError> {
    if let Some(count) = details.num_recommenders {
        if !name.is_recommenders() {
            return Err(RequirementError::RecommenderCountOnWrongRequirement);
        }
        check_recommender_target(count)?;
    }
    if let Some(score) = details.min_score {
        if !score.is_finite() || score < 0.0 {
            return Err(RequirementError::InvalidMinScore);
        }
    }
    Ok(())
}

/// Target recommender count declared by the first Recommenders requirement.
#[must_use]
pub fn declared_recommender_slots(requirements: &[Requirement]) -> u32 {
    requirements
        .iter()
        .find(|r| r.is_recommenders())
        .map_or(0, Requirement::recommender_target)
}
