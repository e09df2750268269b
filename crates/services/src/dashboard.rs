use std::sync::Arc;

use chrono::NaiveDate;
use gradtrack_core::model::{
    Application, ApplicationId, ApplicationStatus, FundingStatus, ImportantDate, UserId,
};
use storage::repository::{ApplicationRepository, ImportantDateRepository};

use crate::Clock;
use crate::error::QueryError;

pub const DEFAULT_HORIZON_DAYS: u32 = 30;

/// An important date falling inside the dashboard horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingDate {
    pub application_id: ApplicationId,
    pub university: String,
    pub program: String,
    pub name: String,
    pub date: NaiveDate,
    pub days_until: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub total: usize,
    /// One entry per status, in `ApplicationStatus::ALL` order.
    pub by_status: Vec<(ApplicationStatus, usize)>,
    pub by_funding: Vec<(FundingStatus, usize)>,
    /// Mean stored progress; `None` without applications.
    pub average_progress: Option<f64>,
    pub upcoming: Vec<UpcomingDate>,
}

impl DashboardSummary {
    #[must_use]
    pub fn count(&self, status: ApplicationStatus) -> usize {
        self.by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, n)| *n)
    }

    #[must_use]
    pub fn active(&self) -> usize {
        self.by_status
            .iter()
            .filter(|(s, _)| s.is_active())
            .map(|(_, n)| n)
            .sum()
    }
}

/// Aggregate already fetched applications and their dates.
///
/// Upcoming dates are those from `today` through `today + horizon_days`,
/// soonest first.
#[must_use]
pub fn summarize(
    applications: &[Application],
    dates: &[ImportantDate],
    today: NaiveDate,
    horizon_days: u32,
) -> DashboardSummary {
    let by_status = ApplicationStatus::ALL
        .into_iter()
        .map(|s| (s, applications.iter().filter(|a| a.status() == s).count()))
        .collect();
    let by_funding = FundingStatus::ALL
        .into_iter()
        .map(|f| (f, applications.iter().filter(|a| a.funding() == f).count()))
        .collect();

    let average_progress = if applications.is_empty() {
        None
    } else {
        let sum: u32 = applications
            .iter()
            .map(|a| u32::from(a.progress().value()))
            .sum();
        let count = u32::try_from(applications.len()).unwrap_or(u32::MAX);
        Some(f64::from(sum) / f64::from(count))
    };

    let horizon = i64::from(horizon_days);
    let mut upcoming: Vec<UpcomingDate> = dates
        .iter()
        .filter_map(|d| {
            let days_until = d.days_until(today);
            if !(0..=horizon).contains(&days_until) {
                return None;
            }
            let app = applications.iter().find(|a| a.id() == d.application_id)?;
            Some(UpcomingDate {
                application_id: app.id(),
                university: app.university().to_owned(),
                program: app.program().to_owned(),
                name: d.name.clone(),
                date: d.date,
                days_until,
            })
        })
        .collect();
    upcoming.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));

    DashboardSummary {
        total: applications.len(),
        by_status,
        by_funding,
        average_progress,
        upcoming,
    }
}

/// Loads the signed-in user's applications and summarizes them.
#[derive(Clone)]
pub struct DashboardService {
    clock: Clock,
    applications: Arc<dyn ApplicationRepository>,
    dates: Arc<dyn ImportantDateRepository>,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        clock: Clock,
        applications: Arc<dyn ApplicationRepository>,
        dates: Arc<dyn ImportantDateRepository>,
    ) -> Self {
        Self {
            clock,
            applications,
            dates,
        }
    }

    /// # Errors
    ///
    /// Returns `QueryError::Storage` if repository access fails.
    pub async fn summary(
        &self,
        user: UserId,
        horizon_days: u32,
    ) -> Result<DashboardSummary, QueryError> {
        let applications = self.applications.list_applications(user).await?;
        let mut dates = Vec::new();
        for app in &applications {
            dates.extend(self.dates.list_important_dates(app.id()).await?);
        }
        Ok(summarize(
            &applications,
            &dates,
            self.clock.today(),
            horizon_days,
        ))
    }
}
