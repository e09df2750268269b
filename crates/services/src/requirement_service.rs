use std::sync::Arc;

use gradtrack_core::model::{
    ApplicationId, Requirement, RequirementDraft, RequirementId, UserId, check_recommender_target,
};
use storage::repository::{
    ApplicationRepository, RecommenderRepository, RequirementRepository, StorageError,
};
use tracing::debug;

use crate::application_service::owned_application;
use crate::error::RequirementServiceError;

/// Requirement edits for an owned application.
///
/// Keeps the recommender target consistent with the stored recommenders:
/// the target can never drop below what is already persisted.
#[derive(Clone)]
pub struct RequirementService {
    applications: Arc<dyn ApplicationRepository>,
    requirements: Arc<dyn RequirementRepository>,
    recommenders: Arc<dyn RecommenderRepository>,
}

impl RequirementService {
    #[must_use]
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        requirements: Arc<dyn RequirementRepository>,
        recommenders: Arc<dyn RecommenderRepository>,
    ) -> Self {
        Self {
            applications,
            requirements,
            recommenders,
        }
    }

    async fn ensure_owned(
        &self,
        user: UserId,
        application_id: ApplicationId,
    ) -> Result<(), RequirementServiceError> {
        owned_application(self.applications.as_ref(), user, application_id).await?;
        Ok(())
    }

    async fn persisted_recommenders(
        &self,
        application_id: ApplicationId,
    ) -> Result<u32, StorageError> {
        let count = self.recommenders.list_recommenders(application_id).await?.len();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn check_target(
        &self,
        application_id: ApplicationId,
        target: u32,
    ) -> Result<(), RequirementServiceError> {
        let persisted = self.persisted_recommenders(application_id).await?;
        if target < persisted {
            return Err(RequirementServiceError::TargetBelowPersisted { target, persisted });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RequirementServiceError::Storage` for a foreign or missing
    /// application or a storage failure.
    pub async fn list_requirements(
        &self,
        user: UserId,
        application_id: ApplicationId,
    ) -> Result<Vec<Requirement>, RequirementServiceError> {
        self.ensure_owned(user, application_id).await?;
        Ok(self.requirements.list_requirements(application_id).await?)
    }

    /// Validate and store a new requirement.
    ///
    /// # Errors
    ///
    /// Returns `RequirementServiceError::DuplicateRecommenders` if a second
    /// Recommenders requirement is added.
    pub async fn add_requirement(
        &self,
        user: UserId,
        application_id: ApplicationId,
        draft: RequirementDraft,
    ) -> Result<Requirement, RequirementServiceError> {
        let draft = draft.validate()?;
        self.ensure_owned(user, application_id).await?;
        if draft.name.is_recommenders() {
            let existing = self.requirements.list_requirements(application_id).await?;
            if existing.iter().any(Requirement::is_recommenders) {
                return Err(RequirementServiceError::DuplicateRecommenders);
            }
            self.check_target(application_id, draft.details.num_recommenders.unwrap_or(0))
                .await?;
        }
        let id = self
            .requirements
            .insert_requirement(application_id, &draft)
            .await?;
        debug!(%application_id, requirement_id = %id, name = %draft.name, "requirement added");
        Ok(draft.assign_id(id, application_id))
    }

    /// Overwrite a requirement's name, completion and details.
    ///
    /// # Errors
    ///
    /// Returns `RequirementServiceError` for invalid details, a target below
    /// the stored recommenders, or a storage failure.
    pub async fn update_requirement(
        &self,
        user: UserId,
        requirement: Requirement,
    ) -> Result<Requirement, RequirementServiceError> {
        requirement.validate()?;
        let application_id = requirement.application_id;
        self.ensure_owned(user, application_id).await?;

        let existing = self.requirements.list_requirements(application_id).await?;
        let current = existing
            .iter()
            .find(|r| r.id == requirement.id)
            .ok_or(StorageError::NotFound)?;
        if requirement.is_recommenders() {
            let duplicate = existing
                .iter()
                .any(|r| r.id != requirement.id && r.is_recommenders());
            if duplicate {
                return Err(RequirementServiceError::DuplicateRecommenders);
            }
            self.check_target(application_id, requirement.recommender_target())
                .await?;
        } else if current.is_recommenders() {
            self.check_target(application_id, 0).await?;
        }

        self.requirements.update_requirement(&requirement).await?;
        Ok(requirement)
    }

    /// Flip the completion flag of one requirement.
    ///
    /// # Errors
    ///
    /// Returns `RequirementServiceError::Storage` if the requirement is
    /// missing or storage fails.
    pub async fn set_completed(
        &self,
        user: UserId,
        application_id: ApplicationId,
        id: RequirementId,
        completed: bool,
    ) -> Result<Requirement, RequirementServiceError> {
        self.ensure_owned(user, application_id).await?;
        let mut requirement = self
            .requirements
            .list_requirements(application_id)
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(StorageError::NotFound)?;
        requirement.completed = completed;
        self.requirements.update_requirement(&requirement).await?;
        Ok(requirement)
    }

    /// # Errors
    ///
    /// Returns `RequirementServiceError::TargetBelowPersisted` when removing
    /// the Recommenders requirement would orphan stored recommenders.
    pub async fn delete_requirement(
        &self,
        user: UserId,
        application_id: ApplicationId,
        id: RequirementId,
    ) -> Result<(), RequirementServiceError> {
        self.ensure_owned(user, application_id).await?;
        let existing = self.requirements.list_requirements(application_id).await?;
        if existing.iter().any(|r| r.id == id && r.is_recommenders()) {
            self.check_target(application_id, 0).await?;
        }
        self.requirements
            .delete_requirement(application_id, id)
            .await?;
        Ok(())
    }

    /// Set the recommender target, creating the Recommenders requirement
    /// when the application has none yet.
    ///
    /// # Errors
    ///
    /// Returns `RequirementServiceError::TargetBelowPersisted` when `target`
    /// is lower than the number of stored recommenders and
    /// `RequirementServiceError::Requirement` when it exceeds the cap.
    pub async fn set_recommender_target(
        &self,
        user: UserId,
        application_id: ApplicationId,
        target: u32,
    ) -> Result<Requirement, RequirementServiceError> {
        check_recommender_target(target)?;
        self.ensure_owned(user, application_id).await?;
        self.check_target(application_id, target).await?;

        let existing = self
            .requirements
            .list_requirements(application_id)
            .await?
            .into_iter()
            .find(Requirement::is_recommenders);
        match existing {
            Some(mut requirement) => {
                requirement.details.num_recommenders = Some(target);
                self.requirements.update_requirement(&requirement).await?;
                Ok(requirement)
            }
            None => {
                let draft = RequirementDraft::recommenders(target);
                let id = self
                    .requirements
                    .insert_requirement(application_id, &draft)
                    .await?;
                Ok(draft.assign_id(id, application_id))
            }
        }
    }
}
