use std::time::Duration;

use chrono::TimeDelta;
use gradtrack_core::model::{
    ApplicationDraft, ApplicationStatus, DegreeLevel, ImportantDateDraft, RequirementDraft,
    RequirementName, UserId,
};
use gradtrack_core::time::fixed_now;
use gradtrack_core::{ApplicationFilter, ApplicationSort};
use services::{AppServices, Clock, NewApplication, SyncConfig};

#[tokio::test]
async fn sqlite_backed_detail_and_dashboard() {
    let services = AppServices::new_sqlite(
        "sqlite:file:memdb_services_flow?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
        SyncConfig::with_quiet_window(Duration::from_millis(20)),
    )
    .await
    .expect("connect sqlite");
    let user = UserId::random();

    let mut draft = ApplicationDraft::new("Kyoto University", "Informatics", "Japan", DegreeLevel::Masters);
    draft.status = ApplicationStatus::InProgress;
    let id = services
        .applications()
        .create_application(
            user,
            NewApplication::new(draft)
                .with_requirement(RequirementDraft::new(
                    RequirementName::new(RequirementName::CV).unwrap(),
                ))
                .with_requirement(RequirementDraft::new(
                    RequirementName::new(RequirementName::GRE).unwrap(),
                )),
        )
        .await
        .unwrap();

    let mut detail = services.open_detail(user, id).await.unwrap();
    let cv = detail.detail().requirements[0].id;
    detail.set_requirement_completed(cv, true).await.unwrap();
    detail
        .add_date(ImportantDateDraft::new(
            "Deadline",
            fixed_now().date_naive() + TimeDelta::days(10),
        ))
        .await
        .unwrap();

    let mut saved = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let app = services.applications().get_application(user, id).await.unwrap();
        if app.progress().value() == 50 {
            saved = true;
            break;
        }
    }
    assert!(saved, "progress write did not land");
    detail.close();

    let summary = services.dashboard().summary(user, 30).await.unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.count(ApplicationStatus::InProgress), 1);
    assert_eq!(summary.average_progress, Some(50.0));
    assert_eq!(summary.upcoming.len(), 1);
    assert_eq!(summary.upcoming[0].days_until, 10);

    let found = services
        .timeline()
        .applications(
            user,
            &ApplicationFilter::default().with_search("kyoto"),
            ApplicationSort::Recent,
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}
