use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use gradtrack_core::model::{
    ApplicationDraft, ApplicationPatch, ApplicationStatus, DegreeLevel, FundingStatus,
    ImportantDateDraft, RecommenderDraft, RecommenderStatus, RecommenderType, RequirementDraft,
    RequirementName, UserId, declared_recommender_slots, pad_slots,
};
use gradtrack_core::{ProgressMode, compute_progress};
use storage::repository::{NewApplicationRecord, Storage};

/// Seed a database with demo graduate applications for one user.
#[derive(Debug, Parser)]
#[command(name = "seed")]
struct Args {
    /// SQLite URL
    #[arg(long = "db", env = "GRADTRACK_DB_URL", default_value = "sqlite:gradtrack.sqlite3")]
    db_url: String,

    /// Owner of the seeded applications
    #[arg(long = "user", env = "GRADTRACK_USER_ID")]
    user_id: UserId,

    /// Fixed current time for deterministic seeding (RFC3339)
    #[arg(long)]
    now: Option<DateTime<Utc>>,
}

struct Sample {
    university: &'static str,
    program: &'static str,
    country: &'static str,
    degree: DegreeLevel,
    status: ApplicationStatus,
    funding: FundingStatus,
    recommenders: u32,
    letters: &'static [RecommenderStatus],
    deadline_in_days: i64,
}

const SAMPLES: [Sample; 3] = [
    Sample {
        university: "ETH Zurich",
        program: "Computer Science",
        country: "Switzerland",
        degree: DegreeLevel::Phd,
        status: ApplicationStatus::InProgress,
        funding: FundingStatus::Full,
        recommenders: 3,
        letters: &[RecommenderStatus::Submitted, RecommenderStatus::Contacted],
        deadline_in_days: 21,
    },
    Sample {
        university: "University of Toronto",
        program: "Applied Mathematics",
        country: "Canada",
        degree: DegreeLevel::Masters,
        status: ApplicationStatus::Planning,
        funding: FundingStatus::Partial,
        recommenders: 2,
        letters: &[RecommenderStatus::Identified],
        deadline_in_days: 45,
    },
    Sample {
        university: "TU Delft",
        program: "Robotics",
        country: "Netherlands",
        degree: DegreeLevel::Masters,
        status: ApplicationStatus::Submitted,
        funding: FundingStatus::None,
        recommenders: 2,
        letters: &[RecommenderStatus::Submitted, RecommenderStatus::Submitted],
        deadline_in_days: -5,
    },
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    for (i, sample) in SAMPLES.iter().enumerate() {
        let mut draft = ApplicationDraft::new(
            sample.university,
            sample.program,
            sample.country,
            sample.degree,
        );
        draft.status = sample.status;
        draft.funding = sample.funding;
        let created_at = now - Duration::days(i64::try_from(i)? * 3);
        let record = NewApplicationRecord::from_draft(args.user_id, draft.validate()?, created_at);
        let app_id = storage.applications.insert_application(record).await?;

        let mut transcripts =
            RequirementDraft::new(RequirementName::new(RequirementName::TRANSCRIPTS)?);
        transcripts.completed = true;
        let fee = RequirementDraft::new(RequirementName::new(RequirementName::APPLICATION_FEE)?);
        for req in [
            transcripts,
            fee,
            RequirementDraft::recommenders(sample.recommenders),
        ] {
            storage.requirements.insert_requirement(app_id, &req).await?;
        }

        for (n, status) in sample.letters.iter().enumerate() {
            let mut rec =
                RecommenderDraft::new(format!("Referee {}", n + 1), RecommenderType::Academic);
            rec.status = *status;
            storage.recommenders.insert_recommender(app_id, &rec).await?;
        }

        let deadline = (now + Duration::days(sample.deadline_in_days)).date_naive();
        storage
            .dates
            .insert_important_date(app_id, &ImportantDateDraft::new("Deadline", deadline))
            .await?;

        let requirements = storage.requirements.list_requirements(app_id).await?;
        let recommenders = storage.recommenders.list_recommenders(app_id).await?;
        let slots = pad_slots(recommenders, declared_recommender_slots(&requirements));
        let progress = compute_progress(&requirements, &slots, ProgressMode::View);
        storage
            .applications
            .update_application(app_id, &ApplicationPatch::progress(progress))
            .await?;
    }

    println!(
        "Seeded {} applications for user {} into {}",
        SAMPLES.len(),
        args.user_id,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
