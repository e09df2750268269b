mod config;
mod report;
mod telemetry;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gradtrack_core::model::{
    ApplicationDraft, ApplicationId, ApplicationStatus, DegreeLevel, FundingStatus,
    RequirementDraft, RequirementName, UserId,
};
use gradtrack_core::{ApplicationFilter, ApplicationSort, Clock, ProgressMode};
use services::{AppServices, NewApplication, NotificationLevel};
use storage::rest::RestConfig;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::{AppConfig, Backend, normalize_sqlite_url, prepare_sqlite_file};
use crate::report::{ApplicationList, DashboardReport, DetailReport, TimelineReport};

#[derive(Parser, Debug)]
#[command(
    name = "gradtrack",
    about = "Track graduate school applications, requirements and recommenders",
    version
)]
struct Cli {
    /// Database URL for the sqlite backend
    #[arg(long, global = true)]
    db: Option<String>,
    /// Storage backend
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,
    /// Acting user id
    #[arg(long, global = true)]
    user: Option<UserId>,
    /// Log level or tracing filter
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Status counts, average progress and upcoming dates
    Dashboard {
        /// Days ahead to look for important dates
        #[arg(long, default_value_t = services::dashboard::DEFAULT_HORIZON_DAYS)]
        horizon: u32,
    },
    /// List applications
    List(ListArgs),
    /// Important dates grouped by month
    Timeline(FilterArgs),
    /// Show one application with its requirements, recommenders and dates
    Show {
        id: u64,
        /// Count the Recommenders requirement as its own item
        #[arg(long)]
        edit: bool,
    },
    /// Create an application
    Create(CreateArgs),
    /// Recompute and store the progress of one application
    Recompute { id: u64 },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Only these statuses (repeatable)
    #[arg(long = "status")]
    statuses: Vec<ApplicationStatus>,
    #[arg(long)]
    degree: Option<DegreeLevel>,
    #[arg(long)]
    funding: Option<FundingStatus>,
    #[arg(long)]
    country: Option<String>,
    /// Case-insensitive search over university and program
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> ApplicationFilter {
        ApplicationFilter {
            statuses: self.statuses,
            degree: self.degree,
            funding: self.funding,
            country: self.country,
            search: self.search,
        }
    }
}

#[derive(Args, Debug)]
struct ListArgs {
    #[command(flatten)]
    filter: FilterArgs,
    #[arg(long, value_enum, default_value_t = SortArg::Recent)]
    sort: SortArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortArg {
    Recent,
    University,
    Progress,
}

impl From<SortArg> for ApplicationSort {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Recent => Self::Recent,
            SortArg::University => Self::University,
            SortArg::Progress => Self::Progress,
        }
    }
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(long)]
    university: String,
    #[arg(long)]
    program: String,
    #[arg(long)]
    country: String,
    #[arg(long)]
    degree: DegreeLevel,
    #[arg(long, default_value = "Planning")]
    status: ApplicationStatus,
    #[arg(long, default_value = "None")]
    funding: FundingStatus,
    #[arg(long)]
    program_link: Option<String>,
    #[arg(long)]
    portal_link: Option<String>,
    /// Requirement name (repeatable)
    #[arg(long = "requirement")]
    requirements: Vec<String>,
    /// Number of recommendation letters required
    #[arg(long)]
    recommenders: Option<u32>,
}

impl CreateArgs {
    fn into_new_application(self) -> Result<NewApplication, Box<dyn std::error::Error>> {
        let mut draft =
            ApplicationDraft::new(self.university, self.program, self.country, self.degree);
        draft.status = self.status;
        draft.funding = self.funding;
        draft.program_link = self.program_link;
        draft.portal_link = self.portal_link;

        let mut input = NewApplication::new(draft);
        for name in self.requirements {
            input = input.with_requirement(RequirementDraft::new(RequirementName::new(name)?));
        }
        if let Some(count) = self.recommenders {
            input = input.with_recommenders(count);
        }
        Ok(input)
    }
}

impl Cli {
    /// Flags win over the environment.
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(db) = &self.db {
            config.db_url.clone_from(db);
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(user) = self.user {
            config.user_id = Some(user);
        }
        if let Some(level) = &self.log_level {
            config.telemetry.log_level.clone_from(level);
        }
    }
}

async fn connect(config: &AppConfig) -> Result<AppServices, Box<dyn std::error::Error>> {
    let clock = Clock::default();
    match config.backend {
        Backend::Sqlite => {
            let url = normalize_sqlite_url(&config.db_url);
            prepare_sqlite_file(&url)?;
            debug!(%url, "opening sqlite database");
            Ok(AppServices::new_sqlite(&url, clock, config.sync).await?)
        }
        Backend::Rest => {
            let rest = config.require_rest()?;
            debug!(url = %rest.url, "using hosted database");
            let mut rest_config = RestConfig::new(&rest.url, &rest.api_key);
            if let Some(token) = &rest.access_token {
                rest_config = rest_config.with_access_token(token);
            }
            Ok(AppServices::new_rest(rest_config, clock, config.sync))
        }
    }
}

fn print_notifications(rx: &mut broadcast::Receiver<services::Notification>) {
    while let Ok(note) = rx.try_recv() {
        let tag = match note.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "ok",
            NotificationLevel::Error => "error",
        };
        eprintln!("[{tag}] {}", note.message);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    cli.apply_overrides(&mut config);
    telemetry::init(&config.telemetry)?;

    let user = config.require_user()?;
    let services = connect(&config).await?;
    let mut notes = services.notifier().subscribe();
    info!(backend = %config.backend, %user, "gradtrack started");

    match cli.command {
        Command::Dashboard { horizon } => {
            let summary = services.dashboard().summary(user, horizon).await?;
            print!("{}", DashboardReport(&summary));
        }
        Command::List(args) => {
            let filter = args.filter.into_filter();
            let apps = services
                .timeline()
                .applications(user, &filter, args.sort.into())
                .await?;
            print!("{}", ApplicationList(&apps));
        }
        Command::Timeline(args) => {
            let groups = services.timeline().timeline(user, &args.into_filter()).await?;
            print!("{}", TimelineReport(&groups));
        }
        Command::Show { id, edit } => {
            let mut detail = services.open_detail(user, ApplicationId::new(id)).await?;
            if edit {
                detail.set_mode(ProgressMode::Edit);
            }
            print!(
                "{}",
                DetailReport {
                    detail: detail.detail(),
                    mode: detail.mode(),
                }
            );
            if detail.progress() != detail.sync().last_persisted() {
                println!(
                    "Stored progress is {}; run `gradtrack recompute {id}` to update it.",
                    detail.sync().last_persisted()
                );
            }
            detail.close();
        }
        Command::Create(args) => {
            let input = args.into_new_application()?;
            let id = services.applications().create_application(user, input).await?;
            println!("Created application #{id}");
        }
        Command::Recompute { id } => {
            let app = services
                .applications()
                .recompute_progress(user, ApplicationId::new(id))
                .await?;
            println!("#{} {} - {}: {}", app.id(), app.university(), app.program(), app.progress());
        }
    }

    print_notifications(&mut notes);
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
