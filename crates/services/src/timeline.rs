use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use gradtrack_core::model::{Application, ApplicationId, ApplicationStatus, ImportantDate, UserId};
use gradtrack_core::{ApplicationFilter, ApplicationSort};
use storage::repository::{ApplicationRepository, ImportantDateRepository};

use crate::error::QueryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub application_id: ApplicationId,
    pub university: String,
    pub program: String,
    pub status: ApplicationStatus,
    pub date: ImportantDate,
}

/// Timeline entries sharing a calendar month, in date order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGroup {
    pub year: i32,
    pub month: u32,
    pub entries: Vec<TimelineEntry>,
}

impl MonthGroup {
    /// e.g. "March 2025".
    #[must_use]
    pub fn label(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map_or_else(|| format!("{}-{:02}", self.year, self.month), |d| {
                d.format("%B %Y").to_string()
            })
    }
}

/// Sort entries by date (then name) and bucket them by month.
#[must_use]
pub fn group_by_month(mut entries: Vec<TimelineEntry>) -> Vec<MonthGroup> {
    entries.sort_by(|a, b| {
        a.date
            .date
            .cmp(&b.date.date)
            .then_with(|| a.date.name.cmp(&b.date.name))
    });
    let mut groups: Vec<MonthGroup> = Vec::new();
    for entry in entries {
        let (year, month) = (entry.date.date.year(), entry.date.date.month());
        match groups.last_mut() {
            Some(group) if group.year == year && group.month == month => {
                group.entries.push(entry);
            }
            _ => groups.push(MonthGroup {
                year,
                month,
                entries: vec![entry],
            }),
        }
    }
    groups
}

/// Filtered application lists and the cross-application date timeline.
#[derive(Clone)]
pub struct TimelineService {
    applications: Arc<dyn ApplicationRepository>,
    dates: Arc<dyn ImportantDateRepository>,
}

impl TimelineService {
    #[must_use]
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        dates: Arc<dyn ImportantDateRepository>,
    ) -> Self {
        Self {
            applications,
            dates,
        }
    }

    /// The user's applications matching `filter`, in `sort` order.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Storage` if repository access fails.
    pub async fn applications(
        &self,
        user: UserId,
        filter: &ApplicationFilter,
        sort: ApplicationSort,
    ) -> Result<Vec<Application>, QueryError> {
        let all = self.applications.list_applications(user).await?;
        Ok(filter.apply(&all, sort).into_iter().cloned().collect())
    }

    /// Important dates of matching applications grouped by month.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Storage` if repository access fails.
    pub async fn timeline(
        &self,
        user: UserId,
        filter: &ApplicationFilter,
    ) -> Result<Vec<MonthGroup>, QueryError> {
        let apps = self
            .applications(user, filter, ApplicationSort::default())
            .await?;
        let mut entries = Vec::new();
        for app in &apps {
            for date in self.dates.list_important_dates(app.id()).await? {
                entries.push(TimelineEntry {
                    application_id: app.id(),
                    university: app.university().to_owned(),
                    program: app.program().to_owned(),
                    status: app.status(),
                    date,
                });
            }
        }
        Ok(group_by_month(entries))
    }
}
