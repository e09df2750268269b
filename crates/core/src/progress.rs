//! Completion percentage of an application.
//!
//! Requirements count one point each when complete; every declared
//! recommender slot adds one point to the denominator and between 0 and 1
//! point to the numerator depending on how far its letter has progressed.
//! Recommender weights are quarter steps, so the arithmetic is done in
//! quarters and stays exact.

use serde::{Deserialize, Serialize};

use crate::model::{Progress, RecommenderSlot, Requirement, declared_recommender_slots};

/// Which requirements take part in the tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProgressMode {
    /// The Recommenders requirement is left out; recommenders are shown on their own.
    #[default]
    View,
    /// Every requirement counts, the Recommenders requirement included.
    Edit,
}

/// Intermediate counts behind a progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBreakdown {
    pub completed_count: u32,
    pub total_count: u32,
    /// Sum of recommender weights, in quarters.
    pub recommender_quarters: u32,
    pub total_recommender_slots: u32,
    pub percent: Progress,
}

impl ProgressBreakdown {
    /// Sum of recommender weights as a real number.
    #[must_use]
    pub fn recommender_score(&self) -> f64 {
        f64::from(self.recommender_quarters) / 4.0
    }

    #[must_use]
    pub fn denominator(&self) -> u32 {
        self.total_count.saturating_add(self.total_recommender_slots)
    }
}

/// Compute the completion percentage together with its inputs.
#[must_use]
pub fn progress_breakdown(
    requirements: &[Requirement],
    recommenders: &[RecommenderSlot],
    mode: ProgressMode,
) -> ProgressBreakdown {
    let counted = requirements
        .iter()
        .filter(|r| mode == ProgressMode::Edit || !r.is_recommenders());

    let (completed_count, total_count) = counted.fold((0_u32, 0_u32), |(done, total), r| {
        (
            done.saturating_add(u32::from(r.completed)),
            total.saturating_add(1),
        )
    });

    let recommender_quarters = recommenders
        .iter()
        .map(|slot| slot.status().quarters())
        .fold(0_u32, u32::saturating_add);

    let total_recommender_slots = declared_recommender_slots(requirements);

    let percent = percent_half_up(
        completed_count,
        recommender_quarters,
        total_count.saturating_add(total_recommender_slots),
    );

    ProgressBreakdown {
        completed_count,
        total_count,
        recommender_quarters,
        total_recommender_slots,
        percent,
    }
}

/// Compute the completion percentage of an application.
#[must_use]
pub fn compute_progress(
    requirements: &[Requirement],
    recommenders: &[RecommenderSlot],
    mode: ProgressMode,
) -> Progress {
    progress_breakdown(requirements, recommenders, mode).percent
}

fn percent_half_up(completed: u32, recommender_quarters: u32, denominator: u32) -> Progress {
    if completed == 0 && recommender_quarters == 0 {
        return Progress::ZERO;
    }
    if denominator == 0 {
        return Progress::ZERO;
    }
    let numerator_q = u64::from(completed) * 4 + u64::from(recommender_quarters);
    let denominator_q = u64::from(denominator) * 4;
    // round(n * 100 / d) with ties going up, in integers.
    let rounded = (numerator_q * 200 + denominator_q) / (denominator_q * 2);
    Progress::saturating(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ApplicationId, Recommender, RecommenderDraft, RecommenderId, RecommenderStatus,
        RecommenderType, RequirementDraft, RequirementId, RequirementName, pad_slots,
    };

    fn app() -> ApplicationId {
        ApplicationId::new(1)
    }

    fn requirement(id: u64, name: &str, completed: bool) -> Requirement {
        let mut draft = RequirementDraft::new(RequirementName::new(name).unwrap());
        draft.completed = completed;
        draft.assign_id(RequirementId::new(id), app())
    }

    fn recommenders_requirement(id: u64, count: u32) -> Requirement {
        RequirementDraft::recommenders(count).assign_id(RequirementId::new(id), app())
    }

    fn recommender(id: u64, status: RecommenderStatus) -> Recommender {
        let mut draft = RecommenderDraft::new(format!("R{id}"), RecommenderType::Academic);
        draft.status = status;
        draft.assign_id(RecommenderId::new(id), app())
    }

    #[test]
    fn nothing_done_is_zero() {
        let reqs = vec![
            requirement(1, "Transcripts", false),
            requirement(2, "GRE", false),
            recommenders_requirement(3, 2),
        ];
        let slots = pad_slots(Vec::new(), 2);
        assert_eq!(
            compute_progress(&reqs, &slots, ProgressMode::View),
            Progress::ZERO
        );
        assert_eq!(
            compute_progress(&reqs, &slots, ProgressMode::Edit),
            Progress::ZERO
        );
    }

    #[test]
    fn empty_inputs_are_zero() {
        assert_eq!(compute_progress(&[], &[], ProgressMode::View), Progress::ZERO);
    }

    #[test]
    fn all_complete_without_slots_is_full() {
        let reqs = vec![
            requirement(1, "Transcripts", true),
            requirement(2, "Application Fee", true),
        ];
        assert_eq!(
            compute_progress(&reqs, &[], ProgressMode::View),
            Progress::COMPLETE
        );
    }

    #[test]
    fn half_point_rounds_up() {
        let reqs = vec![
            requirement(1, "Transcripts", true),
            requirement(2, "Application Fee", false),
            recommenders_requirement(3, 2),
        ];
        let slots = pad_slots(
            vec![
                recommender(1, RecommenderStatus::Submitted),
                recommender(2, RecommenderStatus::Contacted),
            ],
            2,
        );
        let breakdown = progress_breakdown(&reqs, &slots, ProgressMode::View);
        assert_eq!(breakdown.completed_count, 1);
        assert_eq!(breakdown.total_count, 2);
        assert!((breakdown.recommender_score() - 1.5).abs() < f64::EPSILON);
        assert_eq!(breakdown.denominator(), 4);
        assert_eq!(breakdown.percent.value(), 63);
    }

    #[test]
    fn edit_mode_counts_recommenders_requirement() {
        let reqs = vec![
            requirement(1, "Transcripts", true),
            requirement(2, "Application Fee", false),
            recommenders_requirement(3, 2),
        ];
        let slots = pad_slots(
            vec![
                recommender(1, RecommenderStatus::Submitted),
                recommender(2, RecommenderStatus::Contacted),
            ],
            2,
        );
        let view = progress_breakdown(&reqs, &slots, ProgressMode::View);
        let edit = progress_breakdown(&reqs, &slots, ProgressMode::Edit);
        assert_eq!(edit.total_count, view.total_count + 1);
        assert_eq!(edit.total_recommender_slots, view.total_recommender_slots);
        // (1 + 1.5) / 5 = 50%
        assert_eq!(edit.percent.value(), 50);
        assert_eq!(view.percent.value(), 63);
    }

    #[test]
    fn slots_use_declared_target_not_record_count() {
        let reqs = vec![
            requirement(1, "Transcripts", false),
            recommenders_requirement(2, 3),
        ];
        let slots = pad_slots(vec![recommender(1, RecommenderStatus::Submitted)], 3);
        // 1 / (1 + 3) = 25%
        assert_eq!(
            compute_progress(&reqs, &slots, ProgressMode::View).value(),
            25
        );
    }

    #[test]
    fn identified_quarter_counts() {
        let reqs = vec![recommenders_requirement(1, 1)];
        let slots = pad_slots(vec![recommender(1, RecommenderStatus::Identified)], 1);
        assert_eq!(
            compute_progress(&reqs, &slots, ProgressMode::View).value(),
            25
        );
    }

    #[test]
    fn result_stays_within_bounds() {
        let reqs = vec![requirement(1, "Transcripts", true)];
        // Recommenders without any declared slot still cannot push past 100.
        let slots: Vec<RecommenderSlot> = (1..=5)
            .map(|id| RecommenderSlot::Persisted(recommender(id, RecommenderStatus::Submitted)))
            .collect();
        for mode in [ProgressMode::View, ProgressMode::Edit] {
            let value = compute_progress(&reqs, &slots, mode).value();
            assert!(value <= 100, "got {value}");
        }
    }

    #[test]
    fn recommender_score_without_requirements_uses_slots() {
        let reqs = vec![recommenders_requirement(1, 2)];
        let slots = pad_slots(vec![recommender(1, RecommenderStatus::Contacted)], 2);
        // 0.5 / 2 = 25%
        assert_eq!(
            compute_progress(&reqs, &slots, ProgressMode::View).value(),
            25
        );
        // 0.5 / 3 = 16.67%
        assert_eq!(
            compute_progress(&reqs, &slots, ProgressMode::Edit).value(),
            17
        );
    }
}
