use std::sync::Arc;

use gradtrack_core::model::{
    ApplicationId, Recommender, RecommenderDraft, RecommenderId, RecommenderSlot,
    RecommenderStatus, Requirement, UserId, declared_recommender_slots, pad_slots,
};
use storage::repository::{
    ApplicationRepository, RecommenderRepository, RequirementRepository, StorageError,
};
use tracing::debug;

use crate::application_service::owned_application;
use crate::error::RecommenderServiceError;
use crate::requirement_service::RequirementService;

/// Recommender bookkeeping for an owned application.
#[derive(Clone)]
pub struct RecommenderService {
    applications: Arc<dyn ApplicationRepository>,
    requirements: Arc<dyn RequirementRepository>,
    recommenders: Arc<dyn RecommenderRepository>,
    requirement_service: Arc<RequirementService>,
}

impl RecommenderService {
    #[must_use]
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        requirements: Arc<dyn RequirementRepository>,
        recommenders: Arc<dyn RecommenderRepository>,
        requirement_service: Arc<RequirementService>,
    ) -> Self {
        Self {
            applications,
            requirements,
            recommenders,
            requirement_service,
        }
    }

    async fn target(&self, application_id: ApplicationId) -> Result<u32, StorageError> {
        let requirements = self.requirements.list_requirements(application_id).await?;
        Ok(declared_recommender_slots(&requirements))
    }

    async fn find(
        &self,
        application_id: ApplicationId,
        id: RecommenderId,
    ) -> Result<Recommender, StorageError> {
        self.recommenders
            .list_recommenders(application_id)
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(StorageError::NotFound)
    }

    /// Stored recommenders followed by placeholders up to the declared target.
    ///
    /// # Errors
    ///
    /// Returns `RecommenderServiceError::Storage` for a foreign or missing
    /// application or a storage failure.
    pub async fn list_slots(
        &self,
        user: UserId,
        application_id: ApplicationId,
    ) -> Result<Vec<RecommenderSlot>, RecommenderServiceError> {
        owned_application(self.applications.as_ref(), user, application_id).await?;
        let target = self.target(application_id).await?;
        let stored = self.recommenders.list_recommenders(application_id).await?;
        Ok(pad_slots(stored, target))
    }

    /// Store a recommender in the first free slot.
    ///
    /// # Errors
    ///
    /// Returns `RecommenderServiceError::TargetReached` when every declared
    /// slot already holds a stored recommender.
    pub async fn identify(
        &self,
        user: UserId,
        application_id: ApplicationId,
        draft: RecommenderDraft,
    ) -> Result<Recommender, RecommenderServiceError> {
        let draft = draft.validate()?;
        owned_application(self.applications.as_ref(), user, application_id).await?;

        let target = self.target(application_id).await?;
        let stored = self.recommenders.list_recommenders(application_id).await?.len();
        if u32::try_from(stored).unwrap_or(u32::MAX) >= target {
            return Err(RecommenderServiceError::TargetReached { target });
        }

        let id = self
            .recommenders
            .insert_recommender(application_id, &draft)
            .await?;
        debug!(%application_id, recommender_id = %id, "recommender identified");
        Ok(draft.assign_id(id, application_id))
    }

    /// Overwrite name, email, kind and status of a stored recommender.
    ///
    /// # Errors
    ///
    /// Returns `RecommenderServiceError::Recommender` for invalid input.
    pub async fn update_recommender(
        &self,
        user: UserId,
        recommender: Recommender,
    ) -> Result<Recommender, RecommenderServiceError> {
        let Recommender {
            id,
            application_id,
            name,
            email,
            kind,
            status,
        } = recommender;
        let mut draft = RecommenderDraft::new(name, kind);
        draft.email = email;
        draft.status = status;
        let updated = draft.validate()?.assign_id(id, application_id);

        owned_application(self.applications.as_ref(), user, application_id).await?;
        self.recommenders.update_recommender(&updated).await?;
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `RecommenderServiceError::Storage` if the recommender is
    /// missing or storage fails.
    pub async fn set_status(
        &self,
        user: UserId,
        application_id: ApplicationId,
        id: RecommenderId,
        status: RecommenderStatus,
    ) -> Result<Recommender, RecommenderServiceError> {
        owned_application(self.applications.as_ref(), user, application_id).await?;
        let mut recommender = self.find(application_id, id).await?;
        recommender.status = status;
        self.recommenders.update_recommender(&recommender).await?;
        Ok(recommender)
    }

    /// Move a recommender one step along the letter progression.
    ///
    /// # Errors
    ///
    /// Returns `RecommenderServiceError::Storage` if the recommender is
    /// missing or storage fails.
    pub async fn advance_status(
        &self,
        user: UserId,
        application_id: ApplicationId,
        id: RecommenderId,
    ) -> Result<Recommender, RecommenderServiceError> {
        owned_application(self.applications.as_ref(), user, application_id).await?;
        let mut recommender = self.find(application_id, id).await?;
        let next = recommender.status.next();
        if next != recommender.status {
            recommender.status = next;
            self.recommenders.update_recommender(&recommender).await?;
        }
        Ok(recommender)
    }

    /// # Errors
    ///
    /// Returns `RecommenderServiceError::Storage` if the recommender is
    /// missing or storage fails.
    pub async fn delete_recommender(
        &self,
        user: UserId,
        application_id: ApplicationId,
        id: RecommenderId,
    ) -> Result<(), RecommenderServiceError> {
        owned_application(self.applications.as_ref(), user, application_id).await?;
        self.recommenders
            .delete_recommender(application_id, id)
            .await?;
        Ok(())
    }

    /// Change the declared recommender count.
    ///
    /// # Errors
    ///
    /// Returns `RecommenderServiceError::Requirement` when the target would
    /// fall below the stored recommenders.
    pub async fn set_target(
        &self,
        user: UserId,
        application_id: ApplicationId,
        target: u32,
    ) -> Result<Requirement, RecommenderServiceError> {
        Ok(self
            .requirement_service
            .set_recommender_target(user, application_id, target)
            .await?)
    }
}
