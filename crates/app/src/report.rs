//! Plain-text rendering of service results for the terminal.

use std::fmt;

use gradtrack_core::ProgressMode;
use gradtrack_core::model::{Application, RecommenderSlot};
use services::{ApplicationDetail, DashboardSummary, MonthGroup};

pub struct DashboardReport<'a>(pub &'a DashboardSummary);

impl fmt::Display for DashboardReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        writeln!(f, "Applications: {} ({} active)", s.total, s.active())?;
        for (status, count) in &s.by_status {
            writeln!(f, "  {status:<12} {count}")?;
        }
        writeln!(f, "Funding:")?;
        for (funding, count) in &s.by_funding {
            writeln!(f, "  {funding:<12} {count}")?;
        }
        match s.average_progress {
            Some(avg) => writeln!(f, "Average progress: {avg:.1}%")?,
            None => writeln!(f, "Average progress: n/a")?,
        }
        if s.upcoming.is_empty() {
            return writeln!(f, "No upcoming dates.");
        }
        writeln!(f, "Upcoming:")?;
        for d in &s.upcoming {
            let when = match d.days_until {
                0 => "today".to_owned(),
                1 => "tomorrow".to_owned(),
                n => format!("in {n} days"),
            };
            writeln!(
                f,
                "  {} {} - {} ({}, {when})",
                d.date, d.name, d.university, d.program
            )?;
        }
        Ok(())
    }
}

pub struct ApplicationList<'a>(pub &'a [Application]);

impl fmt::Display for ApplicationList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No applications.");
        }
        for app in self.0 {
            writeln!(
                f,
                "#{:<4} {:>4}  {:<12} {} - {} ({}, {})",
                app.id().to_string(),
                app.progress().to_string(),
                app.status(),
                app.university(),
                app.program(),
                app.degree(),
                app.country()
            )?;
        }
        Ok(())
    }
}

pub struct TimelineReport<'a>(pub &'a [MonthGroup]);

impl fmt::Display for TimelineReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No dates on the timeline.");
        }
        for group in self.0 {
            writeln!(f, "{}", group.label())?;
            for entry in &group.entries {
                writeln!(
                    f,
                    "  {} {} - {} ({})",
                    entry.date.date, entry.date.name, entry.university, entry.status
                )?;
            }
        }
        Ok(())
    }
}

pub struct DetailReport<'a> {
    pub detail: &'a ApplicationDetail,
    pub mode: ProgressMode,
}

impl fmt::Display for DetailReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let app = &self.detail.application;
        let breakdown = self.detail.breakdown(self.mode);
        writeln!(f, "{} - {}", app.university(), app.program())?;
        writeln!(
            f,
            "  {} | {} | {} | funding: {}",
            app.degree(),
            app.country(),
            app.status(),
            app.funding()
        )?;
        if let Some(link) = app.program_link() {
            writeln!(f, "  program: {link}")?;
        }
        if let Some(link) = app.portal_link() {
            writeln!(f, "  portal:  {link}")?;
        }
        writeln!(
            f,
            "Progress: {} ({}/{} requirements, {} recommender slots)",
            breakdown.percent,
            breakdown.completed_count,
            breakdown.total_count,
            breakdown.total_recommender_slots
        )?;

        writeln!(f, "Requirements:")?;
        for req in &self.detail.requirements {
            let mark = if req.completed { 'x' } else { ' ' };
            if req.is_recommenders() {
                writeln!(f, "  [{mark}] {} (target {})", req.name, req.recommender_target())?;
            } else {
                writeln!(f, "  [{mark}] {}", req.name)?;
            }
        }

        if !self.detail.recommenders.is_empty() {
            writeln!(f, "Recommenders:")?;
            for slot in &self.detail.recommenders {
                match slot {
                    RecommenderSlot::Persisted(r) => {
                        writeln!(f, "  {} ({}) - {}", r.name, r.kind, r.status)?;
                    }
                    RecommenderSlot::Placeholder { index } => {
                        writeln!(f, "  slot {} - {}", index + 1, slot.status())?;
                    }
                }
            }
        }

        if !self.detail.dates.is_empty() {
            writeln!(f, "Dates:")?;
            for d in &self.detail.dates {
                writeln!(f, "  {} {}", d.date, d.name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use gradtrack_core::model::{
        ApplicationDraft, ApplicationId, ApplicationStatus, DegreeLevel, FundingStatus,
        ImportantDateDraft, ImportantDateId, Progress, RecommenderDraft, RecommenderId,
        RecommenderStatus, RecommenderType, RequirementDraft, RequirementId, RequirementName,
        UserId, pad_slots,
    };
    use gradtrack_core::time::fixed_now;
    use services::UpcomingDate;

    use super::*;

    fn application() -> Application {
        let draft = ApplicationDraft::new("McGill", "Neuroscience", "Canada", DegreeLevel::Phd);
        Application::from_persisted(
            ApplicationId::new(3),
            UserId::random(),
            draft.university,
            draft.program,
            draft.country,
            draft.degree,
            Some("https://mcgill.ca/neuro".into()),
            None,
            ApplicationStatus::InProgress,
            FundingStatus::Full,
            Progress::new(40).unwrap(),
            fixed_now(),
        )
    }

    #[test]
    fn dashboard_lists_counts_and_upcoming_dates() {
        let summary = DashboardSummary {
            total: 2,
            by_status: vec![
                (ApplicationStatus::Planning, 1),
                (ApplicationStatus::Submitted, 1),
            ],
            by_funding: vec![(FundingStatus::None, 2)],
            average_progress: Some(37.5),
            upcoming: vec![UpcomingDate {
                application_id: ApplicationId::new(1),
                university: "McGill".into(),
                program: "Neuroscience".into(),
                name: "Deadline".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                days_until: 1,
            }],
        };
        let out = DashboardReport(&summary).to_string();
        assert!(out.starts_with("Applications: 2 (1 active)"));
        assert!(out.contains("Average progress: 37.5%"));
        assert!(out.contains("2024-01-02 Deadline - McGill (Neuroscience, tomorrow)"));
    }

    #[test]
    fn empty_lists_say_so() {
        assert_eq!(ApplicationList(&[]).to_string(), "No applications.\n");
        assert_eq!(TimelineReport(&[]).to_string(), "No dates on the timeline.\n");
    }

    #[test]
    fn application_row_shows_progress_and_status() {
        let out = ApplicationList(&[application()]).to_string();
        assert!(out.contains("#3"));
        assert!(out.contains("40%"));
        assert!(out.contains("In Progress"));
        assert!(out.contains("McGill - Neuroscience (PhD, Canada)"));
    }

    #[test]
    fn detail_shows_requirements_and_slots() {
        let app = application();
        let app_id = app.id();
        let mut transcripts = RequirementDraft::new(RequirementName::new("Transcripts").unwrap());
        transcripts.completed = true;
        let mut rec = RecommenderDraft::new("Dr. Lowe", RecommenderType::Academic);
        rec.status = RecommenderStatus::Submitted;
        let detail = ApplicationDetail {
            application: app,
            requirements: vec![
                transcripts.assign_id(RequirementId::new(1), app_id),
                RequirementDraft::recommenders(2).assign_id(RequirementId::new(2), app_id),
            ],
            recommenders: pad_slots(vec![rec.assign_id(RecommenderId::new(1), app_id)], 2),
            dates: vec![
                ImportantDateDraft::new("Deadline", NaiveDate::from_ymd_opt(2024, 12, 1).unwrap())
                    .assign_id(ImportantDateId::new(1), app_id),
            ],
        };

        let out = DetailReport {
            detail: &detail,
            mode: ProgressMode::View,
        }
        .to_string();
        // (1 + 1) / (1 + 2)
        assert!(out.contains("Progress: 67%"));
        assert!(out.contains("[x] Transcripts"));
        assert!(out.contains("[ ] Recommenders (target 2)"));
        assert!(out.contains("Dr. Lowe (Academic) - Submitted"));
        assert!(out.contains("slot 2 - Unidentified"));
        assert!(out.contains("2024-12-01 Deadline"));
        assert!(out.contains("program: https://mcgill.ca/neuro"));
    }
}
