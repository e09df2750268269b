//! State behind the application detail view.
//!
//! Loading checks ownership and fails with `DetailError::Redirect` before
//! anything is exposed. Every mutation goes to the store first; the local
//! copy only changes once the write succeeded. After each change the progress
//! is recomputed and handed to the sync policy.

use std::sync::Arc;

use gradtrack_core::model::{
    Application, ApplicationId, ApplicationPatch, ImportantDate, ImportantDateDraft,
    ImportantDateId, Progress, Recommender, RecommenderDraft, RecommenderId, RecommenderSlot,
    RecommenderStatus, Requirement, RequirementDraft, RequirementId, UserId,
};
use gradtrack_core::{ProgressBreakdown, ProgressMode, progress_breakdown};
use tracing::{debug, instrument};

use crate::application_service::ApplicationService;
use crate::date_service::DateService;
use crate::error::DetailError;
use crate::notify::Notifier;
use crate::progress_sync::{ProgressStore, ProgressSync, SyncConfig, SyncDecision};
use crate::recommender_service::RecommenderService;
use crate::requirement_service::RequirementService;

/// Everything shown on the detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationDetail {
    pub application: Application,
    pub requirements: Vec<Requirement>,
    pub recommenders: Vec<RecommenderSlot>,
    pub dates: Vec<ImportantDate>,
}

impl ApplicationDetail {
    #[must_use]
    pub fn breakdown(&self, mode: ProgressMode) -> ProgressBreakdown {
        progress_breakdown(&self.requirements, &self.recommenders, mode)
    }
}

/// Collaborators the controller needs; cheap to clone.
#[derive(Clone)]
pub struct DetailContext {
    pub applications: Arc<ApplicationService>,
    pub requirements: Arc<RequirementService>,
    pub recommenders: Arc<RecommenderService>,
    pub dates: Arc<DateService>,
    pub progress_store: Arc<dyn ProgressStore>,
    pub notifier: Notifier,
    pub sync: SyncConfig,
}

pub struct DetailController {
    ctx: DetailContext,
    user: UserId,
    detail: ApplicationDetail,
    mode: ProgressMode,
    sync: ProgressSync,
}

impl DetailController {
    /// Load an application for `user` and bring its stored progress in line.
    ///
    /// Must be called from a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `DetailError::Redirect` when the application is missing or
    /// belongs to someone else, other `DetailError`s for storage failures.
    #[instrument(skip(ctx))]
    pub async fn load(
        ctx: DetailContext,
        user: UserId,
        application_id: ApplicationId,
    ) -> Result<Self, DetailError> {
        let detail = Self::fetch(&ctx, user, application_id)
            .await
            .map_err(DetailError::classify)?;
        let sync = ProgressSync::new(
            application_id,
            detail.application.progress(),
            Arc::clone(&ctx.progress_store),
            ctx.notifier.clone(),
            ctx.sync,
        );
        let controller = Self {
            ctx,
            user,
            detail,
            mode: ProgressMode::View,
            sync,
        };
        controller.recompute();
        Ok(controller)
    }

    async fn fetch(
        ctx: &DetailContext,
        user: UserId,
        id: ApplicationId,
    ) -> Result<ApplicationDetail, DetailError> {
        let application = ctx.applications.get_application(user, id).await?;
        let requirements = ctx.requirements.list_requirements(user, id).await?;
        let recommenders = ctx.recommenders.list_slots(user, id).await?;
        let dates = ctx.dates.list_dates(user, id).await?;
        Ok(ApplicationDetail {
            application,
            requirements,
            recommenders,
            dates,
        })
    }

    #[must_use]
    pub fn detail(&self) -> &ApplicationDetail {
        &self.detail
    }

    #[must_use]
    pub fn application_id(&self) -> ApplicationId {
        self.detail.application.id()
    }

    #[must_use]
    pub fn mode(&self) -> ProgressMode {
        self.mode
    }

    /// Progress for the current mode, computed from local state.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.detail.breakdown(self.mode).percent
    }

    #[must_use]
    pub fn sync(&self) -> &ProgressSync {
        &self.sync
    }

    /// Recompute and hand the value to the sync policy.
    pub fn recompute(&self) -> SyncDecision {
        let progress = self.progress();
        debug!(application_id = %self.application_id(), %progress, mode = ?self.mode, "progress recomputed");
        self.sync.on_inputs_changed(progress)
    }

    pub fn set_mode(&mut self, mode: ProgressMode) -> SyncDecision {
        self.mode = mode;
        self.recompute()
    }

    /// Report a failed edit to the user and pass the error on.
    fn reject<E: Into<DetailError>>(&self, action: &str, err: E) -> DetailError {
        let err = err.into();
        self.ctx.notifier.error(format!("Could not {action}: {err}"));
        err
    }

    /// Reject records that point at another application.
    fn check_scope(&self, action: &str, found: ApplicationId) -> Result<(), DetailError> {
        let expected = self.application_id();
        if found == expected {
            return Ok(());
        }
        Err(self.reject(action, DetailError::ForeignRecord { expected, found }))
    }

    /// Re-read the recommender slots after a successful write, then recompute.
    ///
    /// A failed read is reported like any other edit failure; progress is
    /// still recomputed from what is known locally.
    async fn refresh_recommenders(&mut self) -> Result<(), DetailError> {
        let id = self.application_id();
        let outcome = match self.ctx.recommenders.list_slots(self.user, id).await {
            Ok(slots) => {
                self.detail.recommenders = slots;
                Ok(())
            }
            Err(err) => Err(self.reject("refresh recommenders", err)),
        };
        self.recompute();
        outcome
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn update_application(&mut self, patch: ApplicationPatch) -> Result<(), DetailError> {
        let id = self.application_id();
        match self
            .ctx
            .applications
            .update_application(self.user, id, patch)
            .await
        {
            Ok(app) => {
                self.detail.application = app;
                Ok(())
            }
            Err(err) => Err(self.reject("update the application", err)),
        }
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn set_requirement_completed(
        &mut self,
        id: RequirementId,
        completed: bool,
    ) -> Result<(), DetailError> {
        let app = self.application_id();
        let updated = match self
            .ctx
            .requirements
            .set_completed(self.user, app, id, completed)
            .await
        {
            Ok(r) => r,
            Err(err) => return Err(self.reject("update the requirement", err)),
        };
        if let Some(slot) = self.detail.requirements.iter_mut().find(|r| r.id == id) {
            *slot = updated;
        }
        self.recompute();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn add_requirement(&mut self, draft: RequirementDraft) -> Result<(), DetailError> {
        let app = self.application_id();
        match self
            .ctx
            .requirements
            .add_requirement(self.user, app, draft)
            .await
        {
            Ok(req) => {
                let target_changed = req.is_recommenders();
                self.detail.requirements.push(req);
                if target_changed {
                    return self.refresh_recommenders().await;
                }
                self.recompute();
                Ok(())
            }
            Err(err) => Err(self.reject("add the requirement", err)),
        }
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn update_requirement(&mut self, requirement: Requirement) -> Result<(), DetailError> {
        self.check_scope("update the requirement", requirement.application_id)?;
        let saved = match self
            .ctx
            .requirements
            .update_requirement(self.user, requirement)
            .await
        {
            Ok(r) => r,
            Err(err) => return Err(self.reject("update the requirement", err)),
        };
        if let Some(slot) = self.detail.requirements.iter_mut().find(|r| r.id == saved.id) {
            *slot = saved;
        }
        self.refresh_recommenders().await
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn delete_requirement(&mut self, id: RequirementId) -> Result<(), DetailError> {
        let app = self.application_id();
        if let Err(err) = self
            .ctx
            .requirements
            .delete_requirement(self.user, app, id)
            .await
        {
            return Err(self.reject("delete the requirement", err));
        }
        self.detail.requirements.retain(|r| r.id != id);
        self.refresh_recommenders().await
    }

    /// Change the declared recommender count.
    ///
    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn set_recommender_target(&mut self, target: u32) -> Result<(), DetailError> {
        let app = self.application_id();
        let req = match self
            .ctx
            .recommenders
            .set_target(self.user, app, target)
            .await
        {
            Ok(r) => r,
            Err(err) => return Err(self.reject("change the recommender count", err)),
        };
        match self.detail.requirements.iter_mut().find(|r| r.id == req.id) {
            Some(slot) => *slot = req,
            None => self.detail.requirements.push(req),
        }
        self.refresh_recommenders().await
    }

    /// Fill the first placeholder with a real recommender.
    ///
    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn identify_recommender(
        &mut self,
        draft: RecommenderDraft,
    ) -> Result<Recommender, DetailError> {
        let app = self.application_id();
        let rec = match self.ctx.recommenders.identify(self.user, app, draft).await {
            Ok(r) => r,
            Err(err) => return Err(self.reject("add the recommender", err)),
        };
        self.refresh_recommenders().await?;
        Ok(rec)
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn update_recommender(&mut self, recommender: Recommender) -> Result<(), DetailError> {
        self.check_scope("update the recommender", recommender.application_id)?;
        if let Err(err) = self
            .ctx
            .recommenders
            .update_recommender(self.user, recommender)
            .await
        {
            return Err(self.reject("update the recommender", err));
        }
        self.refresh_recommenders().await
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn advance_recommender(&mut self, id: RecommenderId) -> Result<(), DetailError> {
        let app = self.application_id();
        if let Err(err) = self
            .ctx
            .recommenders
            .advance_status(self.user, app, id)
            .await
        {
            return Err(self.reject("update the recommender", err));
        }
        self.refresh_recommenders().await
    }

    /// Jump a recommender straight to `status`.
    ///
    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn set_recommender_status(
        &mut self,
        id: RecommenderId,
        status: RecommenderStatus,
    ) -> Result<(), DetailError> {
        let app = self.application_id();
        if let Err(err) = self
            .ctx
            .recommenders
            .set_status(self.user, app, id, status)
            .await
        {
            return Err(self.reject("update the recommender", err));
        }
        self.refresh_recommenders().await
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn delete_recommender(&mut self, id: RecommenderId) -> Result<(), DetailError> {
        let app = self.application_id();
        if let Err(err) = self
            .ctx
            .recommenders
            .delete_recommender(self.user, app, id)
            .await
        {
            return Err(self.reject("remove the recommender", err));
        }
        self.refresh_recommenders().await
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn add_date(&mut self, draft: ImportantDateDraft) -> Result<(), DetailError> {
        let app = self.application_id();
        match self.ctx.dates.add_date(self.user, app, draft).await {
            Ok(date) => {
                self.detail.dates.push(date);
                gradtrack_core::model::sort_dates(&mut self.detail.dates);
                Ok(())
            }
            Err(err) => Err(self.reject("add the date", err)),
        }
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn update_date(&mut self, date: ImportantDate) -> Result<(), DetailError> {
        self.check_scope("update the date", date.application_id)?;
        match self.ctx.dates.update_date(self.user, date).await {
            Ok(saved) => {
                if let Some(slot) = self.detail.dates.iter_mut().find(|d| d.id == saved.id) {
                    *slot = saved;
                }
                gradtrack_core::model::sort_dates(&mut self.detail.dates);
                Ok(())
            }
            Err(err) => Err(self.reject("update the date", err)),
        }
    }

    /// # Errors
    ///
    /// Returns the underlying service error; local state is left untouched.
    pub async fn delete_date(&mut self, id: ImportantDateId) -> Result<(), DetailError> {
        let app = self.application_id();
        if let Err(err) = self.ctx.dates.delete_date(self.user, app, id).await {
            return Err(self.reject("delete the date", err));
        }
        self.detail.dates.retain(|d| d.id != id);
        Ok(())
    }

    /// Leave the view: a pending progress write is dropped.
    pub fn close(self) {
        self.sync.cancel();
    }
}
