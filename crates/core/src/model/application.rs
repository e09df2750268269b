use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::{ApplicationId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApplicationError {
    #[error("program name cannot be empty")]
    EmptyProgram,

    #[error("university cannot be empty")]
    EmptyUniversity,

    #[error("country cannot be empty")]
    EmptyCountry,

    #[error("{field} must be an http(s) URL: {raw}")]
    InvalidLink { field: &'static str, raw: String },

    #[error("progress must be between 0 and 100, got {0}")]
    InvalidProgress(i64),

    #[error("unknown {kind}: {raw}")]
    UnknownVariant { kind: &'static str, raw: String },
}

//
// ─── ENUMS ─────────────────────────────────────────────────────────────────────
//

/// Degree level being applied for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DegreeLevel {
    Masters,
    #[serde(rename = "PhD")]
    Phd,
}

impl DegreeLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Masters => "Masters",
            Self::Phd => "PhD",
        }
    }
}

/// Lifecycle state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Planning,
    #[serde(rename = "In Progress")]
    InProgress,
    Submitted,
    Abandoned,
    Waitlisted,
    Awarded,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        Self::Planning,
        Self::InProgress,
        Self::Submitted,
        Self::Abandoned,
        Self::Waitlisted,
        Self::Awarded,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "Planning",
            Self::InProgress => "In Progress",
            Self::Submitted => "Submitted",
            Self::Abandoned => "Abandoned",
            Self::Waitlisted => "Waitlisted",
            Self::Awarded => "Awarded",
        }
    }

    /// Applications that still need work from the applicant.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Planning | Self::InProgress)
    }
}

/// Funding attached to an offer or expected for the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundingStatus {
    None,
    Partial,
    Full,
}

impl FundingStatus {
    pub const ALL: [FundingStatus; 3] = [Self::None, Self::Partial, Self::Full];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Partial => "Partial",
            Self::Full => "Full",
        }
    }
}

macro_rules! str_enum_parse {
    ($ty:ident, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = ApplicationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                [$($ty::$variant),+]
                    .into_iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(needle))
                    .ok_or_else(|| ApplicationError::UnknownVariant {
                        kind: $kind,
                        raw: s.to_owned(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }
    };
}

str_enum_parse!(DegreeLevel, "degree level", [Masters, Phd]);
str_enum_parse!(
    ApplicationStatus,
    "application status",
    [Planning, InProgress, Submitted, Abandoned, Waitlisted, Awarded]
);
str_enum_parse!(FundingStatus, "funding status", [None, Partial, Full]);

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Completion percentage, always within `0..=100`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct Progress(u8);

impl Progress {
    pub const ZERO: Progress = Progress(0);
    pub const COMPLETE: Progress = Progress(100);

    /// # Errors
    ///
    /// Returns `ApplicationError::InvalidProgress` when `value` is outside `0..=100`.
    pub fn new(value: i64) -> Result<Self, ApplicationError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(ApplicationError::InvalidProgress(value))
    }

    /// Saturates anything above 100.
    #[must_use]
    pub fn saturating(value: u64) -> Self {
        Self(u8::try_from(value.min(100)).unwrap_or(100))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Progress {
    type Error = ApplicationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Progress> for i64 {
    fn from(value: Progress) -> Self {
        i64::from(value.0)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

//
// ─── APPLICATION ───────────────────────────────────────────────────────────────
//

/// One graduate-program application owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    id: ApplicationId,
    user_id: UserId,
    university: String,
    program: String,
    country: String,
    degree: DegreeLevel,
    program_link: Option<String>,
    portal_link: Option<String>,
    status: ApplicationStatus,
    funding: FundingStatus,
    progress: Progress,
    created_at: DateTime<Utc>,
}

impl Application {
    /// Rehydrate an application from persisted storage without re-validating links.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        id: ApplicationId,
        user_id: UserId,
        university: String,
        program: String,
        country: String,
        degree: DegreeLevel,
        program_link: Option<String>,
        portal_link: Option<String>,
        status: ApplicationStatus,
        funding: FundingStatus,
        progress: Progress,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            university,
            program,
            country,
            degree,
            program_link,
            portal_link,
            status,
            funding,
            progress,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> ApplicationId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// True when `user` is allowed to read or write this application.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == user
    }

    #[must_use]
    pub fn university(&self) -> &str {
        &self.university
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }

    #[must_use]
    pub fn degree(&self) -> DegreeLevel {
        self.degree
    }

    #[must_use]
    pub fn program_link(&self) -> Option<&str> {
        self.program_link.as_deref()
    }

    #[must_use]
    pub fn portal_link(&self) -> Option<&str> {
        self.portal_link.as_deref()
    }

    #[must_use]
    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    #[must_use]
    pub fn funding(&self) -> FundingStatus {
        self.funding
    }

    /// Progress value as last persisted.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.progress
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Apply a validated patch in place.
    pub fn apply(&mut self, patch: &ApplicationPatch) {
        if let Some(university) = &patch.university {
            self.university.clone_from(university);
        }
        if let Some(program) = &patch.program {
            self.program.clone_from(program);
        }
        if let Some(country) = &patch.country {
            self.country.clone_from(country);
        }
        if let Some(degree) = patch.degree {
            self.degree = degree;
        }
        if let Some(link) = &patch.program_link {
            self.program_link.clone_from(link);
        }
        if let Some(link) = &patch.portal_link {
            self.portal_link.clone_from(link);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(funding) = patch.funding {
            self.funding = funding;
        }
        if let Some(progress) = patch.progress {
            self.progress = progress;
        }
    }
}

//
// ─── DRAFT & PATCH ─────────────────────────────────────────────────────────────
//

/// Unvalidated input collected by the creation form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDraft {
    pub university: String,
    pub program: String,
    pub country: String,
    pub degree: DegreeLevel,
    pub program_link: Option<String>,
    pub portal_link: Option<String>,
    pub status: ApplicationStatus,
    pub funding: FundingStatus,
}

impl ApplicationDraft {
    #[must_use]
    pub fn new(
        university: impl Into<String>,
        program: impl Into<String>,
        country: impl Into<String>,
        degree: DegreeLevel,
    ) -> Self {
        Self {
            university: university.into(),
            program: program.into(),
            country: country.into(),
            degree,
            program_link: None,
            portal_link: None,
            status: ApplicationStatus::Planning,
            funding: FundingStatus::None,
        }
    }

    /// Trim text fields and check links.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError` when a required field is blank or a link is not http(s).
    pub fn validate(self) -> Result<Self, ApplicationError> {
        let university = non_empty(self.university, ApplicationError::EmptyUniversity)?;
        let program = non_empty(self.program, ApplicationError::EmptyProgram)?;
        let country = non_empty(self.country, ApplicationError::EmptyCountry)?;
        Ok(Self {
            university,
            program,
            country,
            degree: self.degree,
            program_link: normalize_link("program link", self.program_link)?,
            portal_link: normalize_link("portal link", self.portal_link)?,
            status: self.status,
            funding: self.funding,
        })
    }
}

/// Partial update for an application. `None` leaves a field untouched; the
/// link fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationPatch {
    pub university: Option<String>,
    pub program: Option<String>,
    pub country: Option<String>,
    pub degree: Option<DegreeLevel>,
    pub program_link: Option<Option<String>>,
    pub portal_link: Option<Option<String>>,
    pub status: Option<ApplicationStatus>,
    pub funding: Option<FundingStatus>,
    pub progress: Option<Progress>,
}

impl ApplicationPatch {
    #[must_use]
    pub fn progress(progress: Progress) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// # Errors
    ///
    /// Returns `ApplicationError` for blank text or malformed links.
    pub fn validate(self) -> Result<Self, ApplicationError> {
        Ok(Self {
            university: self
                .university
                .map(|v| non_empty(v, ApplicationError::EmptyUniversity))
                .transpose()?,
            program: self
                .program
                .map(|v| non_empty(v, ApplicationError::EmptyProgram))
                .transpose()?,
            country: self
                .country
                .map(|v| non_empty(v, ApplicationError::EmptyCountry))
                .transpose()?,
            program_link: self
                .program_link
                .map(|v| normalize_link("program link", v))
                .transpose()?,
            portal_link: self
                .portal_link
                .map(|v| normalize_link("portal link", v))
                .transpose()?,
            ..self
        })
    }
}

fn non_empty(value: String, err: ApplicationError) -> Result<String, ApplicationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(err);
    }
    Ok(trimmed.to_owned())
}

fn normalize_link(
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<String>, ApplicationError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(url.to_string())),
        _ => Err(ApplicationError::InvalidLink {
            field,
            raw: trimmed.to_owned(),
        }),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rejects_out_of_range() {
        assert_eq!(Progress::new(100).unwrap(), Progress::COMPLETE);
        assert_eq!(
            Progress::new(101).unwrap_err(),
            ApplicationError::InvalidProgress(101)
        );
        assert!(Progress::new(-1).is_err());
        assert_eq!(Progress::saturating(250), Progress::COMPLETE);
    }

    #[test]
    fn status_parses_display_labels() {
        assert_eq!(
            "in progress".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::InProgress
        );
        assert_eq!("PhD".parse::<DegreeLevel>().unwrap(), DegreeLevel::Phd);
        assert!("Rejected".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn status_displays_label() {
        assert_eq!(ApplicationStatus::InProgress.to_string(), "In Progress");
        assert_eq!(FundingStatus::Partial.to_string(), "Partial");
    }

    #[test]
    fn draft_trims_and_checks_links() {
        let mut draft = ApplicationDraft::new(
            " ETH Zurich ",
            " MSc CS ",
            "Switzerland",
            DegreeLevel::Masters,
        );
        draft.program_link = Some("https://inf.ethz.ch/".into());
        draft.portal_link = Some("   ".into());
        let valid = draft.validate().unwrap();
        assert_eq!(valid.university, "ETH Zurich");
        assert_eq!(valid.program, "MSc CS");
        assert_eq!(valid.program_link.as_deref(), Some("https://inf.ethz.ch/"));
        assert_eq!(valid.portal_link, None);
    }

    #[test]
    fn draft_rejects_non_http_link() {
        let mut draft = ApplicationDraft::new("MIT", "EECS", "USA", DegreeLevel::Phd);
        draft.portal_link = Some("ftp://example.org".into());
        assert!(matches!(
            draft.validate(),
            Err(ApplicationError::InvalidLink { field: "portal link", .. })
        ));
    }

    #[test]
    fn draft_rejects_blank_program() {
        let draft = ApplicationDraft::new("MIT", "  ", "USA", DegreeLevel::Phd);
        assert_eq!(draft.validate().unwrap_err(), ApplicationError::EmptyProgram);
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut app = Application::from_persisted(
            ApplicationId::new(1),
            UserId::random(),
            "MIT".into(),
            "EECS".into(),
            "USA".into(),
            DegreeLevel::Phd,
            Some("https://mit.edu/".into()),
            None,
            ApplicationStatus::Planning,
            FundingStatus::None,
            Progress::ZERO,
            crate::time::fixed_now(),
        );
        let patch = ApplicationPatch {
            status: Some(ApplicationStatus::Submitted),
            program_link: Some(None),
            ..ApplicationPatch::default()
        };
        app.apply(&patch);
        assert_eq!(app.status(), ApplicationStatus::Submitted);
        assert_eq!(app.program_link(), None);
        assert_eq!(app.program(), "EECS");
        assert!(ApplicationPatch::default().is_empty());
    }
}
