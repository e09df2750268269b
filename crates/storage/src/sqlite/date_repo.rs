use gradtrack_core::model::{ApplicationId, ImportantDate, ImportantDateDraft, ImportantDateId};

use super::SqliteRepository;
use super::mapping::{child_insert_error, conn, id_to_i64, map_important_date_row};
use crate::repository::{ImportantDateRepository, StorageError};

#[async_trait::async_trait]
impl ImportantDateRepository for SqliteRepository {
    async fn list_important_dates(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ImportantDate>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, application_id, name, date
            FROM important_dates
            WHERE application_id = ?1
            ORDER BY date ASC, name ASC
            ",
        )
        .bind(id_to_i64("application_id", application_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_important_date_row).collect()
    }

    async fn insert_important_date(
        &self,
        application_id: ApplicationId,
        draft: &ImportantDateDraft,
    ) -> Result<ImportantDateId, StorageError> {
        let res = sqlx::query(
            "INSERT INTO important_dates (application_id, name, date) VALUES (?1, ?2, ?3)",
        )
        .bind(id_to_i64("application_id", application_id.value())?)
        .bind(draft.name.as_str())
        .bind(draft.date)
        .execute(&self.pool)
        .await
        .map_err(child_insert_error)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("important_date id sign overflow".into()))?;
        Ok(ImportantDateId::new(id))
    }

    async fn update_important_date(&self, date: &ImportantDate) -> Result<(), StorageError> {
        let res = sqlx::query(
            "UPDATE important_dates SET name = ?3, date = ?4 WHERE id = ?1 AND application_id = ?2",
        )
        .bind(id_to_i64("important_date_id", date.id.value())?)
        .bind(id_to_i64("application_id", date.application_id.value())?)
        .bind(date.name.as_str())
        .bind(date.date)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_important_date(
        &self,
        application_id: ApplicationId,
        id: ImportantDateId,
    ) -> Result<(), StorageError> {
        let res =
            sqlx::query("DELETE FROM important_dates WHERE id = ?1 AND application_id = ?2")
                .bind(id_to_i64("important_date_id", id.value())?)
                .bind(id_to_i64("application_id", application_id.value())?)
                .execute(&self.pool)
                .await
                .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
