use crate::model::{Application, ApplicationStatus, DegreeLevel, FundingStatus};

/// Sort order for application lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ApplicationSort {
    /// Newest first (`created_at` DESC).
    #[default]
    Recent,
    /// Alphabetical by university, then program.
    University,
    /// Highest stored progress first.
    Progress,
}

/// Client-side filter over an already fetched list of applications.
///
/// Every set criterion must match; an empty filter matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub statuses: Vec<ApplicationStatus>,
    pub degree: Option<DegreeLevel>,
    pub funding: Option<FundingStatus>,
    pub country: Option<String>,
    /// Case-insensitive substring over university and program.
    pub search: Option<String>,
}

impl ApplicationFilter {
    #[must_use]
    pub fn with_status(mut self, status: ApplicationStatus) -> Self {
        self.statuses.push(status);
        self
    }

    #[must_use]
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    #[must_use]
    pub fn matches(&self, app: &Application) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&app.status()) {
            return false;
        }
        if self.degree.is_some_and(|d| d != app.degree()) {
            return false;
        }
        if self.funding.is_some_and(|f| f != app.funding()) {
            return false;
        }
        if let Some(country) = self.country.as_deref().map(str::trim) {
            if !country.is_empty() && !app.country().eq_ignore_ascii_case(country) {
                return false;
            }
        }
        if let Some(needle) = self.search.as_deref().map(str::trim) {
            if !needle.is_empty() {
                let needle = needle.to_lowercase();
                let hit = app.university().to_lowercase().contains(&needle)
                    || app.program().to_lowercase().contains(&needle);
                if !hit {
                    return false;
                }
            }
        }
        true
    }

    /// Keep matching applications, then order them.
    #[must_use]
    pub fn apply<'a>(
        &self,
        apps: &'a [Application],
        sort: ApplicationSort,
    ) -> Vec<&'a Application> {
        let mut out: Vec<&Application> = apps.iter().filter(|a| self.matches(a)).collect();
        match sort {
            ApplicationSort::Recent => {
                out.sort_by(|a, b| {
                    b.created_at()
                        .cmp(&a.created_at())
                        .then(a.id().cmp(&b.id()))
                });
            }
            ApplicationSort::University => out.sort_by(|a, b| {
                a.university()
                    .to_lowercase()
                    .cmp(&b.university().to_lowercase())
                    .then_with(|| a.program().cmp(b.program()))
            }),
            ApplicationSort::Progress => {
                out.sort_by(|a, b| {
                    b.progress()
                        .cmp(&a.progress())
                        .then(a.id().cmp(&b.id()))
                });
            }
        }
        out
    }
}
