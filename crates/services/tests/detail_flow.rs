use std::time::Duration;

use gradtrack_core::ProgressMode;
use gradtrack_core::model::{
    ApplicationDraft, ApplicationId, DegreeLevel, Progress, RecommenderDraft, RecommenderType,
    RequirementDraft, RequirementName, UserId,
};
use gradtrack_core::time::fixed_now;
use services::{
    AppServices, Clock, DetailError, NewApplication, NotificationLevel, RecommenderServiceError,
    SyncConfig, SyncDecision,
};
use storage::repository::Storage;

fn requirement(name: &str, completed: bool) -> RequirementDraft {
    let mut draft = RequirementDraft::new(RequirementName::new(name).unwrap());
    draft.completed = completed;
    draft
}

async fn create(services: &AppServices, user: UserId) -> ApplicationId {
    services
        .applications()
        .create_application(
            user,
            NewApplication::new(ApplicationDraft::new(
                "Imperial College",
                "Bioengineering",
                "UK",
                DegreeLevel::Phd,
            ))
            .with_requirement(requirement(RequirementName::TRANSCRIPTS, true))
            .with_requirement(requirement(RequirementName::APPLICATION_FEE, false))
            .with_recommenders(2),
        )
        .await
        .expect("create application")
}

async fn stored_progress(services: &AppServices, user: UserId, id: ApplicationId) -> Progress {
    services
        .applications()
        .get_application(user, id)
        .await
        .expect("fetch")
        .progress()
}

#[tokio::test(start_paused = true)]
async fn detail_edits_coalesce_into_one_progress_write() {
    let services = AppServices::new(
        &Storage::in_memory(),
        Clock::fixed(fixed_now()),
        SyncConfig::default(),
    );
    let user = UserId::random();
    let id = create(&services, user).await;
    assert_eq!(stored_progress(&services, user, id).await.value(), 25);

    let mut detail = services.open_detail(user, id).await.expect("open");
    assert_eq!(detail.detail().recommenders.len(), 2);
    assert!(detail.detail().recommenders.iter().all(|s| s.is_placeholder()));
    assert!(!detail.sync().is_write_pending());

    let first = detail
        .identify_recommender(RecommenderDraft::new("Dr. Reed", RecommenderType::Academic))
        .await
        .unwrap();
    for _ in 0..3 {
        detail.advance_recommender(first.id).await.unwrap();
    }
    let second = detail
        .identify_recommender(RecommenderDraft::new("Ms. Park", RecommenderType::Professional))
        .await
        .unwrap();
    detail.advance_recommender(second.id).await.unwrap();

    // (1 requirement + Submitted 1 + Contacted 0.5) / (2 requirements + 2 slots)
    assert_eq!(detail.progress().value(), 63);
    assert!(detail.sync().is_write_pending());
    assert_eq!(stored_progress(&services, user, id).await.value(), 25);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(stored_progress(&services, user, id).await.value(), 63);
    assert_eq!(detail.sync().last_persisted().value(), 63);

    // Edit mode counts the Recommenders requirement itself.
    assert_eq!(detail.set_mode(ProgressMode::Edit), SyncDecision::Scheduled);
    assert_eq!(detail.progress().value(), 50);
    assert_eq!(detail.set_mode(ProgressMode::View), SyncDecision::InSync);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(stored_progress(&services, user, id).await.value(), 63);

    detail.close();
}

#[tokio::test(start_paused = true)]
async fn rejected_edit_notifies_and_keeps_local_state() {
    let services = AppServices::new(
        &Storage::in_memory(),
        Clock::fixed(fixed_now()),
        SyncConfig::default(),
    );
    let user = UserId::random();
    let id = create(&services, user).await;
    let mut detail = services.open_detail(user, id).await.unwrap();
    let mut notifications = services.notifier().subscribe();

    for name in ["A", "B"] {
        detail
            .identify_recommender(RecommenderDraft::new(name, RecommenderType::Academic))
            .await
            .unwrap();
    }
    let before = detail.detail().clone();

    let err = detail
        .identify_recommender(RecommenderDraft::new("C", RecommenderType::Academic))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DetailError::Recommender(RecommenderServiceError::TargetReached { target: 2 })
    ));
    let err = detail.set_recommender_target(1).await.unwrap_err();
    assert!(matches!(err, DetailError::Recommender(_)));
    assert_eq!(detail.detail(), &before);

    let first = notifications.try_recv().unwrap();
    assert_eq!(first.level, NotificationLevel::Error);
    assert!(first.message.contains("recommender"));

    detail.set_recommender_target(3).await.unwrap();
    assert_eq!(detail.detail().recommenders.len(), 3);
    assert!(detail.detail().recommenders[2].is_placeholder());
}

#[tokio::test]
async fn foreign_or_missing_application_redirects() {
    let services = AppServices::new(
        &Storage::in_memory(),
        Clock::fixed(fixed_now()),
        SyncConfig::default(),
    );
    let owner = UserId::random();
    let id = create(&services, owner).await;

    let foreign = services.open_detail(UserId::random(), id).await;
    assert!(matches!(foreign, Err(DetailError::Redirect)));
    let missing = services.open_detail(owner, ApplicationId::new(4242)).await;
    assert!(matches!(missing, Err(DetailError::Redirect)));
}

#[tokio::test(start_paused = true)]
async fn closing_the_view_drops_the_pending_write() {
    let services = AppServices::new(
        &Storage::in_memory(),
        Clock::fixed(fixed_now()),
        SyncConfig::default(),
    );
    let user = UserId::random();
    let id = create(&services, user).await;
    let mut detail = services.open_detail(user, id).await.unwrap();

    let fee = detail
        .detail()
        .requirements
        .iter()
        .find(|r| r.name.as_str() == RequirementName::APPLICATION_FEE)
        .map(|r| r.id)
        .unwrap();
    detail.set_requirement_completed(fee, true).await.unwrap();
    assert_eq!(detail.progress().value(), 50);
    detail.close();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(stored_progress(&services, user, id).await.value(), 25);

    // The next visit notices the divergence and writes it back.
    let detail = services.open_detail(user, id).await.unwrap();
    assert!(detail.sync().is_write_pending());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(stored_progress(&services, user, id).await.value(), 50);
}
