use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gradtrack_core::model::{
    ApplicationDraft, ApplicationId, DegreeLevel, Recommender, RecommenderDraft, RecommenderId,
    RecommenderStatus, RecommenderType, Requirement, RequirementDraft, RequirementId,
    RequirementName, UserId,
};
use gradtrack_core::time::fixed_now;
use services::{
    AppServices, Clock, DetailError, NewApplication, NotificationLevel, RecommenderServiceError,
    SyncConfig,
};
use storage::repository::{
    InMemoryRepository, RecommenderRepository, RequirementRepository, Storage, StorageError,
};

/// Recommender reads start failing once a requirement write lands.
#[derive(Clone, Default)]
struct FailReadsAfterWrite {
    inner: InMemoryRepository,
    armed: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
}

impl FailReadsAfterWrite {
    fn storage(&self) -> Storage {
        let mut storage = Storage::from_repository(self.inner.clone());
        storage.requirements = Arc::new(self.clone());
        storage.recommenders = Arc::new(self.clone());
        storage
    }
}

#[async_trait]
impl RequirementRepository for FailReadsAfterWrite {
    async fn list_requirements(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Requirement>, StorageError> {
        self.inner.list_requirements(application_id).await
    }

    async fn insert_requirement(
        &self,
        application_id: ApplicationId,
        draft: &RequirementDraft,
    ) -> Result<RequirementId, StorageError> {
        self.inner.insert_requirement(application_id, draft).await
    }

    async fn update_requirement(&self, requirement: &Requirement) -> Result<(), StorageError> {
        self.inner.update_requirement(requirement).await?;
        if self.armed.load(Ordering::SeqCst) {
            self.failing.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn delete_requirement(
        &self,
        application_id: ApplicationId,
        id: RequirementId,
    ) -> Result<(), StorageError> {
        self.inner.delete_requirement(application_id, id).await
    }
}

#[async_trait]
impl RecommenderRepository for FailReadsAfterWrite {
    async fn list_recommenders(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Recommender>, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("connection reset".into()));
        }
        self.inner.list_recommenders(application_id).await
    }

    async fn insert_recommender(
        &self,
        application_id: ApplicationId,
        draft: &RecommenderDraft,
    ) -> Result<RecommenderId, StorageError> {
        self.inner.insert_recommender(application_id, draft).await
    }

    async fn update_recommender(&self, recommender: &Recommender) -> Result<(), StorageError> {
        self.inner.update_recommender(recommender).await
    }

    async fn delete_recommender(
        &self,
        application_id: ApplicationId,
        id: RecommenderId,
    ) -> Result<(), StorageError> {
        self.inner.delete_recommender(application_id, id).await
    }
}

fn requirement(name: &str, completed: bool) -> RequirementDraft {
    let mut draft = RequirementDraft::new(RequirementName::new(name).unwrap());
    draft.completed = completed;
    draft
}

async fn create(services: &AppServices, user: UserId, university: &str) -> ApplicationId {
    services
        .applications()
        .create_application(
            user,
            NewApplication::new(ApplicationDraft::new(
                university,
                "Physics",
                "Germany",
                DegreeLevel::Masters,
            ))
            .with_requirement(requirement(RequirementName::TRANSCRIPTS, true))
            .with_requirement(requirement(RequirementName::APPLICATION_FEE, false))
            .with_recommenders(2),
        )
        .await
        .unwrap()
}

fn in_memory() -> AppServices {
    AppServices::new(
        &Storage::in_memory(),
        Clock::fixed(fixed_now()),
        SyncConfig::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn failed_slot_refresh_notifies_and_still_recomputes() {
    let repo = FailReadsAfterWrite::default();
    let services = AppServices::new(
        &repo.storage(),
        Clock::fixed(fixed_now()),
        SyncConfig::default(),
    );
    let user = UserId::random();
    let id = create(&services, user, "TU Munich").await;
    let mut detail = services.open_detail(user, id).await.unwrap();
    assert_eq!(detail.progress().value(), 25);
    let mut notifications = services.notifier().subscribe();

    repo.armed.store(true, Ordering::SeqCst);
    let err = detail.set_recommender_target(3).await.unwrap_err();
    assert!(matches!(
        err,
        DetailError::Recommender(RecommenderServiceError::Storage(StorageError::Connection(_)))
    ));

    let note = notifications.try_recv().unwrap();
    assert_eq!(note.level, NotificationLevel::Error);
    assert!(note.message.contains("refresh recommenders"));

    // The target write landed; the slots could not be re-read.
    let target = detail
        .detail()
        .requirements
        .iter()
        .find(|r| r.is_recommenders())
        .map(Requirement::recommender_target);
    assert_eq!(target, Some(3));
    assert_eq!(detail.detail().recommenders.len(), 2);

    // 1 of (2 requirements + 3 slots)
    assert_eq!(detail.progress().value(), 20);
    assert!(detail.sync().is_write_pending());

    repo.armed.store(false, Ordering::SeqCst);
    repo.failing.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    let stored = services.applications().get_application(user, id).await.unwrap();
    assert_eq!(stored.progress().value(), 20);

    detail.set_recommender_target(3).await.unwrap();
    assert_eq!(detail.detail().recommenders.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn status_can_jump_straight_to_submitted() {
    let services = in_memory();
    let user = UserId::random();
    let id = create(&services, user, "RWTH Aachen").await;
    let mut detail = services.open_detail(user, id).await.unwrap();

    let rec = detail
        .identify_recommender(RecommenderDraft::new("Prof. Vogel", RecommenderType::Academic))
        .await
        .unwrap();
    detail
        .set_recommender_status(rec.id, RecommenderStatus::Submitted)
        .await
        .unwrap();

    assert_eq!(detail.detail().recommenders[0].status(), RecommenderStatus::Submitted);
    // (1 requirement + 1 letter) / (2 requirements + 2 slots)
    assert_eq!(detail.progress().value(), 50);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let stored = services.applications().get_application(user, id).await.unwrap();
    assert_eq!(stored.progress().value(), 50);
}

#[tokio::test]
async fn records_of_another_application_are_rejected() {
    let services = in_memory();
    let user = UserId::random();
    let open = create(&services, user, "KTH").await;
    let other = create(&services, user, "Aalto").await;
    let mut detail = services.open_detail(user, open).await.unwrap();
    let before = detail.detail().clone();
    let mut notifications = services.notifier().subscribe();

    let mut foreign = services
        .requirements()
        .list_requirements(user, other)
        .await
        .unwrap()
        .into_iter()
        .find(|r| !r.completed)
        .unwrap();
    foreign.completed = true;

    let err = detail.update_requirement(foreign.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        DetailError::ForeignRecord { expected, found } if expected == open && found == other
    ));
    assert_eq!(detail.detail(), &before);
    assert_eq!(
        notifications.try_recv().unwrap().level,
        NotificationLevel::Error
    );

    let stored = services
        .requirements()
        .list_requirements(user, other)
        .await
        .unwrap();
    assert!(stored.iter().any(|r| r.id == foreign.id && !r.completed));
}
