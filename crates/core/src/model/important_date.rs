use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ApplicationId, ImportantDateId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImportantDateError {
    #[error("date name cannot be empty")]
    EmptyName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportantDateDraft {
    pub name: String,
    pub date: NaiveDate,
}

impl ImportantDateDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            date,
        }
    }

    /// # Errors
    ///
    /// Returns `ImportantDateError::EmptyName` for a blank name.
    pub fn validate(self) -> Result<Self, ImportantDateError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(ImportantDateError::EmptyName);
        }
        Ok(Self {
            name,
            date: self.date,
        })
    }

    #[must_use]
    pub fn assign_id(self, id: ImportantDateId, application_id: ApplicationId) -> ImportantDate {
        ImportantDate {
            id,
            application_id,
            name: self.name,
            date: self.date,
        }
    }
}

/// A named calendar date (deadline, interview, decision) for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportantDate {
    pub id: ImportantDateId,
    pub application_id: ApplicationId,
    pub name: String,
    pub date: NaiveDate,
}

impl ImportantDate {
    /// Whole days from `today` until this date; negative once passed.
    #[must_use]
    pub fn days_until(&self, today: NaiveDate) -> i64 {
        (self.date - today).num_days()
    }
}

/// Sort by date ascending, then name, which is the order every listing uses.
pub fn sort_dates(dates: &mut [ImportantDate]) {
    dates.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
}
