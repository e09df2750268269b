use std::sync::Arc;

use gradtrack_core::model::{
    ApplicationId, ImportantDate, ImportantDateDraft, ImportantDateId, UserId,
};
use storage::repository::{ApplicationRepository, ImportantDateRepository};

use crate::application_service::owned_application;
use crate::error::DateServiceError;

/// Important dates (deadlines, interviews, decisions) of an owned application.
#[derive(Clone)]
pub struct DateService {
    applications: Arc<dyn ApplicationRepository>,
    dates: Arc<dyn ImportantDateRepository>,
}

impl DateService {
    #[must_use]
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        dates: Arc<dyn ImportantDateRepository>,
    ) -> Self {
        Self {
            applications,
            dates,
        }
    }

    /// Dates sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns `DateServiceError::Storage` for a foreign or missing
    /// application or a storage failure.
    pub async fn list_dates(
        &self,
        user: UserId,
        application_id: ApplicationId,
    ) -> Result<Vec<ImportantDate>, DateServiceError> {
        owned_application(self.applications.as_ref(), user, application_id).await?;
        Ok(self.dates.list_important_dates(application_id).await?)
    }

    /// # Errors
    ///
    /// Returns `DateServiceError::Date` for a blank name.
    pub async fn add_date(
        &self,
        user: UserId,
        application_id: ApplicationId,
        draft: ImportantDateDraft,
    ) -> Result<ImportantDate, DateServiceError> {
        let draft = draft.validate()?;
        owned_application(self.applications.as_ref(), user, application_id).await?;
        let id = self
            .dates
            .insert_important_date(application_id, &draft)
            .await?;
        Ok(draft.assign_id(id, application_id))
    }

    /// # Errors
    ///
    /// Returns `DateServiceError::Date` for a blank name.
    pub async fn update_date(
        &self,
        user: UserId,
        date: ImportantDate,
    ) -> Result<ImportantDate, DateServiceError> {
        let ImportantDate {
            id,
            application_id,
            name,
            date,
        } = date;
        let updated = ImportantDateDraft::new(name, date)
            .validate()?
            .assign_id(id, application_id);
        owned_application(self.applications.as_ref(), user, application_id).await?;
        self.dates.update_important_date(&updated).await?;
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `DateServiceError::Storage` if the date is missing.
    pub async fn delete_date(
        &self,
        user: UserId,
        application_id: ApplicationId,
        id: ImportantDateId,
    ) -> Result<(), DateServiceError> {
        owned_application(self.applications.as_ref(), user, application_id).await?;
        self.dates.delete_important_date(application_id, id).await?;
        Ok(())
    }
}
