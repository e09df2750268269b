use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gradtrack_core::model::{
    Application, ApplicationDraft, ApplicationId, ApplicationPatch, ApplicationStatus,
    DegreeLevel, FundingStatus, ImportantDate, ImportantDateDraft, ImportantDateId, Progress,
    Recommender, RecommenderDraft, RecommenderId, Requirement, RequirementDraft, RequirementId,
    UserId, sort_dates,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("forbidden")]
    Forbidden,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for an application that has no id yet.
#[derive(Debug, Clone)]
pub struct NewApplicationRecord {
    pub user_id: UserId,
    pub university: String,
    pub program: String,
    pub country: String,
    pub degree: DegreeLevel,
    pub program_link: Option<String>,
    pub portal_link: Option<String>,
    pub status: ApplicationStatus,
    pub funding: FundingStatus,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
}

impl NewApplicationRecord {
    /// Build a record from an already validated draft.
    #[must_use]
    pub fn from_draft(user_id: UserId, draft: ApplicationDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            university: draft.university,
            program: draft.program,
            country: draft.country,
            degree: draft.degree,
            program_link: draft.program_link,
            portal_link: draft.portal_link,
            status: draft.status,
            funding: draft.funding,
            progress: Progress::ZERO,
            created_at,
        }
    }

    #[must_use]
    pub fn into_application(self, id: ApplicationId) -> Application {
        Application::from_persisted(
            id,
            self.user_id,
            self.university,
            self.program,
            self.country,
            self.degree,
            self.program_link,
            self.portal_link,
            self.status,
            self.funding,
            self.progress,
            self.created_at,
        )
    }
}

/// Repository contract for applications.
///
/// Reads are not filtered by owner here; callers compare
/// `Application::user_id` with the session to detect a mismatch.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Insert a new application and return its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the application cannot be stored.
    async fn insert_application(
        &self,
        record: NewApplicationRecord,
    ) -> Result<ApplicationId, StorageError>;

    /// Fetch an application by ID. Returns `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, StorageError>;

    /// List a user's applications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_applications(&self, user_id: UserId) -> Result<Vec<Application>, StorageError>;

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the application is missing.
    async fn update_application(
        &self,
        id: ApplicationId,
        patch: &ApplicationPatch,
    ) -> Result<(), StorageError>;

    /// Delete an application together with its requirements, recommenders and dates.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the application is missing.
    async fn delete_application(&self, id: ApplicationId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait RequirementRepository: Send + Sync {
    /// Requirements of an application in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_requirements(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Requirement>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the application is missing.
    async fn insert_requirement(
        &self,
        application_id: ApplicationId,
        draft: &RequirementDraft,
    ) -> Result<RequirementId, StorageError>;

    /// Overwrite a stored requirement, matched on `(application_id, id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such requirement exists.
    async fn update_requirement(&self, requirement: &Requirement) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such requirement exists.
    async fn delete_requirement(
        &self,
        application_id: ApplicationId,
        id: RequirementId,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait RecommenderRepository: Send + Sync {
    /// Recommenders of an application in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_recommenders(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Recommender>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the application is missing.
    async fn insert_recommender(
        &self,
        application_id: ApplicationId,
        draft: &RecommenderDraft,
    ) -> Result<RecommenderId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such recommender exists.
    async fn update_recommender(&self, recommender: &Recommender) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such recommender exists.
    async fn delete_recommender(
        &self,
        application_id: ApplicationId,
        id: RecommenderId,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ImportantDateRepository: Send + Sync {
    /// Dates of an application sorted by date ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_important_dates(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ImportantDate>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the application is missing.
    async fn insert_important_date(
        &self,
        application_id: ApplicationId,
        draft: &ImportantDateDraft,
    ) -> Result<ImportantDateId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such date exists.
    async fn update_important_date(&self, date: &ImportantDate) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such date exists.
    async fn delete_important_date(
        &self,
        application_id: ApplicationId,
        id: ImportantDateId,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    applications: BTreeMap<ApplicationId, Application>,
    requirements: BTreeMap<RequirementId, Requirement>,
    recommenders: BTreeMap<RecommenderId, Recommender>,
    dates: BTreeMap<ImportantDateId, ImportantDate>,
}

impl MemoryState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_application(&self, id: ApplicationId) -> Result<(), StorageError> {
        if self.applications.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::NotFound)
        }
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryRepository {
    async fn insert_application(
        &self,
        record: NewApplicationRecord,
    ) -> Result<ApplicationId, StorageError> {
        let mut guard = self.lock()?;
        let id = ApplicationId::new(guard.allocate());
        guard.applications.insert(id, record.into_application(id));
        Ok(id)
    }

    async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, StorageError> {
        Ok(self.lock()?.applications.get(&id).cloned())
    }

    async fn list_applications(&self, user_id: UserId) -> Result<Vec<Application>, StorageError> {
        let guard = self.lock()?;
        let mut apps: Vec<Application> = guard
            .applications
            .values()
            .filter(|a| a.user_id() == user_id)
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(b.id().cmp(&a.id())));
        Ok(apps)
    }

    async fn update_application(
        &self,
        id: ApplicationId,
        patch: &ApplicationPatch,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let app = guard
            .applications
            .get_mut(&id)
            .ok_or(StorageError::NotFound)?;
        app.apply(patch);
        Ok(())
    }

    async fn delete_application(&self, id: ApplicationId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard
            .applications
            .remove(&id)
            .ok_or(StorageError::NotFound)?;
        guard.requirements.retain(|_, r| r.application_id != id);
        guard.recommenders.retain(|_, r| r.application_id != id);
        guard.dates.retain(|_, d| d.application_id != id);
        Ok(())
    }
}

#[async_trait]
impl RequirementRepository for InMemoryRepository {
    async fn list_requirements(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Requirement>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .requirements
            .values()
            .filter(|r| r.application_id == application_id)
            .cloned()
            .collect())
    }

    async fn insert_requirement(
        &self,
        application_id: ApplicationId,
        draft: &RequirementDraft,
    ) -> Result<RequirementId, StorageError> {
        let mut guard = self.lock()?;
        guard.require_application(application_id)?;
        let id = RequirementId::new(guard.allocate());
        guard
            .requirements
            .insert(id, draft.clone().assign_id(id, application_id));
        Ok(id)
    }

    async fn update_requirement(&self, requirement: &Requirement) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        match guard.requirements.get_mut(&requirement.id) {
            Some(slot) if slot.application_id == requirement.application_id => {
                *slot = requirement.clone();
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn delete_requirement(
        &self,
        application_id: ApplicationId,
        id: RequirementId,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let scoped = guard
            .requirements
            .get(&id)
            .is_some_and(|r| r.application_id == application_id);
        if !scoped {
            return Err(StorageError::NotFound);
        }
        guard.requirements.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl RecommenderRepository for InMemoryRepository {
    async fn list_recommenders(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Recommender>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .recommenders
            .values()
            .filter(|r| r.application_id == application_id)
            .cloned()
            .collect())
    }

    async fn insert_recommender(
        &self,
        application_id: ApplicationId,
        draft: &RecommenderDraft,
    ) -> Result<RecommenderId, StorageError> {
        let mut guard = self.lock()?;
        guard.require_application(application_id)?;
        let id = RecommenderId::new(guard.allocate());
        guard
            .recommenders
            .insert(id, draft.clone().assign_id(id, application_id));
        Ok(id)
    }

    async fn update_recommender(&self, recommender: &Recommender) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        match guard.recommenders.get_mut(&recommender.id) {
            Some(slot) if slot.application_id == recommender.application_id => {
                *slot = recommender.clone();
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn delete_recommender(
        &self,
        application_id: ApplicationId,
        id: RecommenderId,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let scoped = guard
            .recommenders
            .get(&id)
            .is_some_and(|r| r.application_id == application_id);
        if !scoped {
            return Err(StorageError::NotFound);
        }
        guard.recommenders.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ImportantDateRepository for InMemoryRepository {
    async fn list_important_dates(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ImportantDate>, StorageError> {
        let guard = self.lock()?;
        let mut dates: Vec<ImportantDate> = guard
            .dates
            .values()
            .filter(|d| d.application_id == application_id)
            .cloned()
            .collect();
        sort_dates(&mut dates);
        Ok(dates)
    }

    async fn insert_important_date(
        &self,
        application_id: ApplicationId,
        draft: &ImportantDateDraft,
    ) -> Result<ImportantDateId, StorageError> {
        let mut guard = self.lock()?;
        guard.require_application(application_id)?;
        let id = ImportantDateId::new(guard.allocate());
        guard
            .dates
            .insert(id, draft.clone().assign_id(id, application_id));
        Ok(id)
    }

    async fn update_important_date(&self, date: &ImportantDate) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        match guard.dates.get_mut(&date.id) {
            Some(slot) if slot.application_id == date.application_id => {
                *slot = date.clone();
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn delete_important_date(
        &self,
        application_id: ApplicationId,
        id: ImportantDateId,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let scoped = guard
            .dates
            .get(&id)
            .is_some_and(|d| d.application_id == application_id);
        if !scoped {
            return Err(StorageError::NotFound);
        }
        guard.dates.remove(&id);
        Ok(())
    }
}

/// Aggregates the record collections behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub applications: Arc<dyn ApplicationRepository>,
    pub requirements: Arc<dyn RequirementRepository>,
    pub recommenders: Arc<dyn RecommenderRepository>,
    pub dates: Arc<dyn ImportantDateRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Use one repository value for every collection.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: ApplicationRepository
            + RequirementRepository
            + RecommenderRepository
            + ImportantDateRepository
            + Clone
            + 'static,
    {
        let applications: Arc<dyn ApplicationRepository> = Arc::new(repo.clone());
        let requirements: Arc<dyn RequirementRepository> = Arc::new(repo.clone());
        let recommenders: Arc<dyn RecommenderRepository> = Arc::new(repo.clone());
        let dates: Arc<dyn ImportantDateRepository> = Arc::new(repo);
        Self {
            applications,
            requirements,
            recommenders,
            dates,
        }
    }
}
