use std::sync::Arc;

use gradtrack_core::model::{ApplicationId, UserId};
use storage::repository::Storage;
use storage::rest::RestConfig;

use crate::Clock;
use crate::application_service::ApplicationService;
use crate::dashboard::DashboardService;
use crate::date_service::DateService;
use crate::detail::{DetailContext, DetailController};
use crate::error::{AppServicesError, DetailError};
use crate::identity::{IdentityProvider, InMemoryIdentityProvider};
use crate::notify::Notifier;
use crate::progress_sync::{RepositoryProgressStore, SyncConfig};
use crate::recommender_service::RecommenderService;
use crate::requirement_service::RequirementService;
use crate::timeline::TimelineService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    notifier: Notifier,
    identity: Arc<dyn IdentityProvider>,
    detail: DetailContext,
    dashboard: Arc<DashboardService>,
    timeline: Arc<TimelineService>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock, sync: SyncConfig) -> Self {
        let notifier = Notifier::default();
        let applications = Arc::new(ApplicationService::new(
            clock,
            Arc::clone(&storage.applications),
            Arc::clone(&storage.requirements),
            Arc::clone(&storage.recommenders),
        ));
        let requirements = Arc::new(RequirementService::new(
            Arc::clone(&storage.applications),
            Arc::clone(&storage.requirements),
            Arc::clone(&storage.recommenders),
        ));
        let recommenders = Arc::new(RecommenderService::new(
            Arc::clone(&storage.applications),
            Arc::clone(&storage.requirements),
            Arc::clone(&storage.recommenders),
            Arc::clone(&requirements),
        ));
        let dates = Arc::new(DateService::new(
            Arc::clone(&storage.applications),
            Arc::clone(&storage.dates),
        ));
        let detail = DetailContext {
            applications,
            requirements,
            recommenders,
            dates,
            progress_store: Arc::new(RepositoryProgressStore::new(Arc::clone(
                &storage.applications,
            ))),
            notifier: notifier.clone(),
            sync,
        };
        let dashboard = Arc::new(DashboardService::new(
            clock,
            Arc::clone(&storage.applications),
            Arc::clone(&storage.dates),
        ));
        let timeline = Arc::new(TimelineService::new(
            Arc::clone(&storage.applications),
            Arc::clone(&storage.dates),
        ));

        Self {
            notifier,
            identity: Arc::new(InMemoryIdentityProvider::new()),
            detail,
            dashboard,
            timeline,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        sync: SyncConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock, sync))
    }

    /// Build services that talk to a hosted PostgREST endpoint.
    ///
    /// Requests carry only the anon key; use `new_rest_for_session` to act
    /// as a signed-in user.
    #[must_use]
    pub fn new_rest(config: RestConfig, clock: Clock, sync: SyncConfig) -> Self {
        Self::new(&Storage::rest(config), clock, sync)
    }

    /// Like `new_rest`, with requests authorized by the current session of
    /// `identity` so row-level policies see the user.
    #[must_use]
    pub fn new_rest_for_session(
        config: RestConfig,
        identity: Arc<dyn IdentityProvider>,
        clock: Clock,
        sync: SyncConfig,
    ) -> Self {
        let config = authorize_rest(config, identity.as_ref());
        Self::new_rest(config, clock, sync).with_identity(identity)
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    #[must_use]
    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.identity)
    }

    #[must_use]
    pub fn applications(&self) -> Arc<ApplicationService> {
        Arc::clone(&self.detail.applications)
    }

    #[must_use]
    pub fn requirements(&self) -> Arc<RequirementService> {
        Arc::clone(&self.detail.requirements)
    }

    #[must_use]
    pub fn recommenders(&self) -> Arc<RecommenderService> {
        Arc::clone(&self.detail.recommenders)
    }

    #[must_use]
    pub fn dates(&self) -> Arc<DateService> {
        Arc::clone(&self.detail.dates)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn timeline(&self) -> Arc<TimelineService> {
        Arc::clone(&self.timeline)
    }

    /// Open the detail view of one application.
    ///
    /// # Errors
    ///
    /// Returns `DetailError::Redirect` when `user` may not see the application.
    pub async fn open_detail(
        &self,
        user: UserId,
        application_id: ApplicationId,
    ) -> Result<DetailController, DetailError> {
        DetailController::load(self.detail.clone(), user, application_id).await
    }
}

/// Attach the session's access token, if anyone is signed in.
#[must_use]
pub fn authorize_rest(config: RestConfig, identity: &dyn IdentityProvider) -> RestConfig {
    match identity.current_session() {
        Some(session) => config.with_access_token(session.access_token),
        None => config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rest_requests_use_the_session_token() {
        let identity = InMemoryIdentityProvider::new();
        let anon = authorize_rest(RestConfig::new("https://db.example.org", "anon"), &identity);
        assert_eq!(anon.access_token, None);

        let session = identity.sign_up("ada@example.org", "secret1").await.unwrap();
        let config = authorize_rest(RestConfig::new("https://db.example.org", "anon"), &identity);
        assert_eq!(config.access_token.as_deref(), Some(session.access_token.as_str()));
        assert_eq!(config.api_key, "anon");
    }

    #[tokio::test]
    async fn rest_services_keep_the_given_identity() {
        let identity = Arc::new(InMemoryIdentityProvider::new());
        identity.sign_up("lin@example.org", "secret1").await.unwrap();
        let services = AppServices::new_rest_for_session(
            RestConfig::new("https://db.example.org", "anon"),
            identity,
            Clock::default(),
            SyncConfig::default(),
        );
        let session = services.identity().current_session().unwrap();
        assert_eq!(session.email, "lin@example.org");
    }
}
