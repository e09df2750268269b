use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ApplicationId, RecommenderId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecommenderError {
    #[error("recommender name cannot be empty")]
    EmptyName,

    #[error("invalid recommender email: {0}")]
    InvalidEmail(String),

    #[error("unknown {kind}: {raw}")]
    UnknownVariant { kind: &'static str, raw: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecommenderType {
    Academic,
    Professional,
}

impl RecommenderType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Academic => "Academic",
            Self::Professional => "Professional",
        }
    }
}

/// Letter progression, ordered from nothing to done.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum RecommenderStatus {
    #[default]
    Unidentified,
    Identified,
    Contacted,
    #[serde(rename = "In Progress")]
    InProgress,
    Submitted,
}

impl RecommenderStatus {
    pub const ALL: [RecommenderStatus; 5] = [
        Self::Unidentified,
        Self::Identified,
        Self::Contacted,
        Self::InProgress,
        Self::Submitted,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unidentified => "Unidentified",
            Self::Identified => "Identified",
            Self::Contacted => "Contacted",
            Self::InProgress => "In Progress",
            Self::Submitted => "Submitted",
        }
    }

    /// Progress weight in quarters: Unidentified 0 through Submitted 4.
    #[must_use]
    pub fn quarters(self) -> u32 {
        match self {
            Self::Unidentified => 0,
            Self::Identified => 1,
            Self::Contacted => 2,
            Self::InProgress => 3,
            Self::Submitted => 4,
        }
    }

    /// Progress weight in `[0, 1]`.
    #[must_use]
    pub fn weight(self) -> f64 {
        f64::from(self.quarters()) / 4.0
    }

    /// Next step in the progression; `Submitted` stays put.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Unidentified => Self::Identified,
            Self::Identified => Self::Contacted,
            Self::Contacted => Self::InProgress,
            Self::InProgress | Self::Submitted => Self::Submitted,
        }
    }
}

impl fmt::Display for RecommenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for RecommenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RecommenderStatus {
    type Err = RecommenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RecommenderError::UnknownVariant {
                kind: "recommender status",
                raw: s.to_owned(),
            })
    }
}

impl FromStr for RecommenderType {
    type Err = RecommenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Academic, Self::Professional]
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RecommenderError::UnknownVariant {
                kind: "recommender type",
                raw: s.to_owned(),
            })
    }
}

/// Identity and status of a recommender before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommenderDraft {
    pub name: String,
    pub email: Option<String>,
    pub kind: RecommenderType,
    pub status: RecommenderStatus,
}

impl RecommenderDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: RecommenderType) -> Self {
        Self {
            name: name.into(),
            email: None,
            kind,
            status: RecommenderStatus::Identified,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// # Errors
    ///
    /// Returns `RecommenderError` for a blank name or an obviously malformed email.
    pub fn validate(self) -> Result<Self, RecommenderError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(RecommenderError::EmptyName);
        }
        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let valid = raw
                    .split_once('@')
                    .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
                if !valid {
                    return Err(RecommenderError::InvalidEmail(raw.to_owned()));
                }
                Some(raw.to_owned())
            }
        };
        Ok(Self {
            name,
            email,
            kind: self.kind,
            status: self.status,
        })
    }

    #[must_use]
    pub fn assign_id(self, id: RecommenderId, application_id: ApplicationId) -> Recommender {
        Recommender {
            id,
            application_id,
            name: self.name,
            email: self.email,
            kind: self.kind,
            status: self.status,
        }
    }
}

/// A recommender that exists in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommender {
    pub id: RecommenderId,
    pub application_id: ApplicationId,
    pub name: String,
    pub email: Option<String>,
    pub kind: RecommenderType,
    pub status: RecommenderStatus,
}

/// An entry in the recommender list of an application.
///
/// Placeholders fill the gap between stored recommenders and the declared
/// target; they have no identity and are never written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecommenderSlot {
    Persisted(Recommender),
    Placeholder { index: usize },
}

impl RecommenderSlot {
    #[must_use]
    pub fn status(&self) -> RecommenderStatus {
        match self {
            Self::Persisted(r) => r.status,
            Self::Placeholder { .. } => RecommenderStatus::Unidentified,
        }
    }

    #[must_use]
    pub fn as_persisted(&self) -> Option<&Recommender> {
        match self {
            Self::Persisted(r) => Some(r),
            Self::Placeholder { .. } => None,
        }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

/// Build the effective recommender list for a declared `target`.
///
/// Stored recommenders come first in their given order, capped at `target`;
/// the remainder is filled with placeholders indexed by their slot position.
#[must_use]
pub fn pad_slots(recommenders: Vec<Recommender>, target: u32) -> Vec<RecommenderSlot> {
    let target = usize::try_from(target).unwrap_or(usize::MAX);
    let mut slots: Vec<RecommenderSlot> = recommenders
        .into_iter()
        .take(target)
        .map(RecommenderSlot::Persisted)
        .collect();
    let filled = slots.len();
    slots.extend((filled..target).map(|index| RecommenderSlot::Placeholder { index }));
    slots
}
