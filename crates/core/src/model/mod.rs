mod application;
mod ids;
mod important_date;
mod recommender;
mod requirement;

pub use ids::{
    ApplicationId, ImportantDateId, ParseIdError, RecommenderId, RequirementId, UserId,
};

pub use application::{
    Application, ApplicationDraft, ApplicationError, ApplicationPatch, ApplicationStatus,
    DegreeLevel, FundingStatus, Progress,
};
pub use important_date::{ImportantDate, ImportantDateDraft, ImportantDateError, sort_dates};
pub use recommender::{
    Recommender, RecommenderDraft, RecommenderError, RecommenderSlot, RecommenderStatus,
    RecommenderType, pad_slots,
};
pub use requirement::{
    MAX_RECOMMENDERS, Requirement, RequirementDetails, RequirementDraft, RequirementError,
    RequirementName, check_recommender_target, declared_recommender_slots,
};
