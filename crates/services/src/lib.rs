#![forbid(unsafe_code)]

pub mod app_services;
pub mod application_service;
pub mod dashboard;
pub mod date_service;
pub mod detail;
pub mod error;
pub mod identity;
pub mod notify;
pub mod progress_sync;
pub mod recommender_service;
pub mod requirement_service;
pub mod timeline;

pub use gradtrack_core::Clock;

pub use app_services::{AppServices, authorize_rest};
pub use application_service::{ApplicationService, NewApplication};
pub use dashboard::{DashboardService, DashboardSummary, UpcomingDate};
pub use date_service::DateService;
pub use detail::{ApplicationDetail, DetailContext, DetailController};
pub use error::{
    AppServicesError, ApplicationServiceError, DateServiceError, DetailError, IdentityError,
    QueryError, RecommenderServiceError, RequirementServiceError,
};
pub use identity::{IdentityProvider, InMemoryIdentityProvider, ProfileUpdate, Session};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use progress_sync::{ProgressStore, ProgressSync, SyncConfig, SyncDecision};
pub use recommender_service::RecommenderService;
pub use requirement_service::RequirementService;
pub use timeline::{MonthGroup, TimelineEntry, TimelineService};
