use std::sync::Arc;

use gradtrack_core::model::{
    Application, ApplicationDraft, ApplicationId, ApplicationPatch, RequirementDraft, UserId,
    declared_recommender_slots, pad_slots,
};
use gradtrack_core::{ProgressMode, compute_progress};
use storage::repository::{
    ApplicationRepository, NewApplicationRecord, RecommenderRepository, RequirementRepository,
    StorageError,
};
use tracing::{info, warn};

use crate::Clock;
use crate::error::ApplicationServiceError;

/// Everything the creation form collects, validated and stored in one call.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub draft: ApplicationDraft,
    pub requirements: Vec<RequirementDraft>,
    /// Recommender target; `Some` adds the Recommenders requirement.
    pub recommenders: Option<u32>,
}

impl NewApplication {
    #[must_use]
    pub fn new(draft: ApplicationDraft) -> Self {
        Self {
            draft,
            requirements: Vec::new(),
            recommenders: None,
        }
    }

    #[must_use]
    pub fn with_requirement(mut self, requirement: RequirementDraft) -> Self {
        self.requirements.push(requirement);
        self
    }

    #[must_use]
    pub fn with_recommenders(mut self, count: u32) -> Self {
        self.recommenders = Some(count);
        self
    }

    fn validate(self) -> Result<(ApplicationDraft, Vec<RequirementDraft>), ApplicationServiceError> {
        let draft = self.draft.validate()?;
        let mut requirements = self
            .requirements
            .into_iter()
            .map(RequirementDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;

        let declared = requirements.iter().filter(|r| r.name.is_recommenders()).count();
        match (declared, self.recommenders) {
            (0, Some(count)) => requirements.push(RequirementDraft::recommenders(count).validate()?),
            (0, None) | (1, None) => {}
            _ => return Err(ApplicationServiceError::DuplicateRecommenders),
        }
        Ok((draft, requirements))
    }
}

/// Fetch an application and check it belongs to `user`.
///
/// # Errors
///
/// `StorageError::NotFound` when it does not exist, `StorageError::Forbidden`
/// when another user owns it.
pub(crate) async fn owned_application(
    applications: &dyn ApplicationRepository,
    user: UserId,
    id: ApplicationId,
) -> Result<Application, StorageError> {
    let app = applications
        .get_application(id)
        .await?
        .ok_or(StorageError::NotFound)?;
    if !app.is_owned_by(user) {
        warn!(application_id = %id, "application requested by non-owner");
        return Err(StorageError::Forbidden);
    }
    Ok(app)
}

/// Creates, reads, updates and deletes applications on behalf of a user.
#[derive(Clone)]
pub struct ApplicationService {
    clock: Clock,
    applications: Arc<dyn ApplicationRepository>,
    requirements: Arc<dyn RequirementRepository>,
    recommenders: Arc<dyn RecommenderRepository>,
}

impl ApplicationService {
    #[must_use]
    pub fn new(
        clock: Clock,
        applications: Arc<dyn ApplicationRepository>,
        requirements: Arc<dyn RequirementRepository>,
        recommenders: Arc<dyn RecommenderRepository>,
    ) -> Self {
        Self {
            clock,
            applications,
            requirements,
            recommenders,
        }
    }

    /// Validate and store an application together with its requirements.
    ///
    /// If a requirement cannot be stored the half-created application is
    /// removed again.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationServiceError::Application` or `Requirement` for
    /// invalid input and `Storage` if persistence fails.
    pub async fn create_application(
        &self,
        user: UserId,
        input: NewApplication,
    ) -> Result<ApplicationId, ApplicationServiceError> {
        let (draft, requirements) = input.validate()?;
        let record = NewApplicationRecord::from_draft(user, draft, self.clock.now());
        let id = self.applications.insert_application(record).await?;

        for requirement in &requirements {
            if let Err(err) = self.requirements.insert_requirement(id, requirement).await {
                warn!(application_id = %id, error = %err, "requirement insert failed; rolling back");
                if let Err(cleanup) = self.applications.delete_application(id).await {
                    warn!(application_id = %id, error = %cleanup, "rollback failed");
                }
                return Err(err.into());
            }
        }

        let stored = self.requirements.list_requirements(id).await?;
        let slots = pad_slots(Vec::new(), declared_recommender_slots(&stored));
        let progress = compute_progress(&stored, &slots, ProgressMode::View);
        if progress.value() > 0 {
            self.applications
                .update_application(id, &ApplicationPatch::progress(progress))
                .await?;
        }

        info!(application_id = %id, requirements = stored.len(), "application created");
        Ok(id)
    }

    /// Fetch an application owned by `user`.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationServiceError::Storage` with `NotFound` or
    /// `Forbidden` when the user may not see it.
    pub async fn get_application(
        &self,
        user: UserId,
        id: ApplicationId,
    ) -> Result<Application, ApplicationServiceError> {
        Ok(owned_application(self.applications.as_ref(), user, id).await?)
    }

    /// List the user's applications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationServiceError::Storage` if repository access fails.
    pub async fn list_applications(
        &self,
        user: UserId,
    ) -> Result<Vec<Application>, ApplicationServiceError> {
        Ok(self.applications.list_applications(user).await?)
    }

    /// Validate and apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationServiceError` for invalid input, a foreign or
    /// missing application, or a storage failure.
    pub async fn update_application(
        &self,
        user: UserId,
        id: ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<Application, ApplicationServiceError> {
        let patch = patch.validate()?;
        let mut app = owned_application(self.applications.as_ref(), user, id).await?;
        self.applications.update_application(id, &patch).await?;
        app.apply(&patch);
        Ok(app)
    }

    /// Delete an application and everything attached to it.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationServiceError::Storage` for a foreign or missing
    /// application or a storage failure.
    pub async fn delete_application(
        &self,
        user: UserId,
        id: ApplicationId,
    ) -> Result<(), ApplicationServiceError> {
        owned_application(self.applications.as_ref(), user, id).await?;
        self.applications.delete_application(id).await?;
        info!(application_id = %id, "application deleted");
        Ok(())
    }

    /// Recompute the view-mode progress from stored records and persist it
    /// when it differs from the stored value. Returns the fresh value.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationServiceError::Storage` for a foreign or missing
    /// application or a storage failure.
    pub async fn recompute_progress(
        &self,
        user: UserId,
        id: ApplicationId,
    ) -> Result<Application, ApplicationServiceError> {
        let mut app = owned_application(self.applications.as_ref(), user, id).await?;
        let requirements = self.requirements.list_requirements(id).await?;
        let recommenders = self.recommenders.list_recommenders(id).await?;
        let slots = pad_slots(recommenders, declared_recommender_slots(&requirements));
        let progress = compute_progress(&requirements, &slots, ProgressMode::View);
        if progress != app.progress() {
            let patch = ApplicationPatch::progress(progress);
            self.applications.update_application(id, &patch).await?;
            app.apply(&patch);
            info!(application_id = %id, %progress, "progress recomputed");
        }
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gradtrack_core::model::{
        DegreeLevel, MAX_RECOMMENDERS, Progress, RequirementError, RequirementName,
    };
    use gradtrack_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn service(repo: &InMemoryRepository) -> ApplicationService {
        ApplicationService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    fn draft() -> ApplicationDraft {
        ApplicationDraft::new("Oxford", "Statistics", "UK", DegreeLevel::Masters)
    }

    fn requirement(name: &str, completed: bool) -> RequirementDraft {
        let mut req = RequirementDraft::new(RequirementName::new(name).unwrap());
        req.completed = completed;
        req
    }

    #[tokio::test]
    async fn create_stores_requirements_and_initial_progress() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::random();

        let id = svc
            .create_application(
                user,
                NewApplication::new(draft())
                    .with_requirement(requirement("Transcripts", true))
                    .with_requirement(requirement("CV", false))
                    .with_recommenders(2),
            )
            .await
            .unwrap();

        let reqs = repo.list_requirements(id).await.unwrap();
        assert_eq!(reqs.len(), 3);
        assert_eq!(declared_recommender_slots(&reqs), 2);

        // 1 of (2 requirements + 2 empty slots)
        let app = svc.get_application(user, id).await.unwrap();
        assert_eq!(app.progress(), Progress::new(25).unwrap());
        assert_eq!(app.created_at(), fixed_now());
    }

    #[tokio::test]
    async fn create_rejects_invalid_input_before_writing() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::random();

        let mut bad = draft();
        bad.program_link = Some("ftp://example.org".into());
        let err = svc
            .create_application(user, NewApplication::new(bad))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationServiceError::Application(_)));

        let dup = NewApplication::new(draft())
            .with_requirement(RequirementDraft::recommenders(1))
            .with_recommenders(2);
        let err = svc.create_application(user, dup).await.unwrap_err();
        assert!(matches!(err, ApplicationServiceError::DuplicateRecommenders));

        assert!(svc.list_applications(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_oversized_recommender_target() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::random();

        let err = svc
            .create_application(user, NewApplication::new(draft()).with_recommenders(u32::MAX))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationServiceError::Requirement(RequirementError::TooManyRecommenders { .. })
        ));

        let err = svc
            .create_application(
                user,
                NewApplication::new(draft()).with_requirement(RequirementDraft::recommenders(
                    MAX_RECOMMENDERS + 1,
                )),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationServiceError::Requirement(_)));
        assert!(svc.list_applications(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_application_is_forbidden() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let owner = UserId::random();
        let id = svc
            .create_application(owner, NewApplication::new(draft()))
            .await
            .unwrap();

        let err = svc
            .get_application(UserId::random(), id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationServiceError::Storage(StorageError::Forbidden)
        ));
        let err = svc
            .delete_application(UserId::random(), id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationServiceError::Storage(StorageError::Forbidden)
        ));
        let missing = svc
            .get_application(owner, ApplicationId::new(999))
            .await
            .unwrap_err();
        assert!(matches!(
            missing,
            ApplicationServiceError::Storage(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_validates_and_returns_patched() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::random();
        let id = svc
            .create_application(user, NewApplication::new(draft()))
            .await
            .unwrap();

        let mut patch = ApplicationPatch::default();
        patch.portal_link = Some(Some(" https://apply.ox.ac.uk ".into()));
        let app = svc.update_application(user, id, patch).await.unwrap();
        assert_eq!(app.portal_link(), Some("https://apply.ox.ac.uk"));

        let mut blank = ApplicationPatch::default();
        blank.program = Some("  ".into());
        assert!(svc.update_application(user, id, blank).await.is_err());
    }

    #[tokio::test]
    async fn recompute_persists_only_on_change() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::random();
        let id = svc
            .create_application(
                user,
                NewApplication::new(draft()).with_requirement(requirement("GRE", false)),
            )
            .await
            .unwrap();

        let mut req = repo.list_requirements(id).await.unwrap().remove(0);
        req.completed = true;
        repo.update_requirement(&req).await.unwrap();

        let app = svc.recompute_progress(user, id).await.unwrap();
        assert_eq!(app.progress(), Progress::COMPLETE);
        let stored = repo.get_application(id).await.unwrap().unwrap();
        assert_eq!(stored.progress(), Progress::COMPLETE);
    }
}
