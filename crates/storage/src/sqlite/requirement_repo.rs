use gradtrack_core::model::{ApplicationId, Requirement, RequirementDraft, RequirementId};

use super::SqliteRepository;
use super::mapping::{child_insert_error, conn, id_to_i64, map_requirement_row};
use crate::repository::{RequirementRepository, StorageError};

#[async_trait::async_trait]
impl RequirementRepository for SqliteRepository {
    async fn list_requirements(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Requirement>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, application_id, name, completed, criteria_type, criteria_value,
                   min_score, waived, conversion_notes, num_recommenders
            FROM requirements
            WHERE application_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("application_id", application_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_requirement_row).collect()
    }

    async fn insert_requirement(
        &self,
        application_id: ApplicationId,
        draft: &RequirementDraft,
    ) -> Result<RequirementId, StorageError> {
        let details = &draft.details;
        let res = sqlx::query(
            r"
            INSERT INTO requirements (
                application_id, name, completed, criteria_type, criteria_value,
                min_score, waived, conversion_notes, num_recommenders
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(id_to_i64("application_id", application_id.value())?)
        .bind(draft.name.as_str())
        .bind(i64::from(draft.completed))
        .bind(details.criteria_type.as_deref())
        .bind(details.criteria_value.as_deref())
        .bind(details.min_score)
        .bind(i64::from(details.waived))
        .bind(details.conversion_notes.as_deref())
        .bind(details.num_recommenders.map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(child_insert_error)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("requirement id sign overflow".into()))?;
        Ok(RequirementId::new(id))
    }

    async fn update_requirement(&self, requirement: &Requirement) -> Result<(), StorageError> {
        let details = &requirement.details;
        let res = sqlx::query(
            r"
            UPDATE requirements SET
                name = ?3,
                completed = ?4,
                criteria_type = ?5,
                criteria_value = ?6,
                min_score = ?7,
                waived = ?8,
                conversion_notes = ?9,
                num_recommenders = ?10
            WHERE id = ?1 AND application_id = ?2
            ",
        )
        .bind(id_to_i64("requirement_id", requirement.id.value())?)
        .bind(id_to_i64("application_id", requirement.application_id.value())?)
        .bind(requirement.name.as_str())
        .bind(i64::from(requirement.completed))
        .bind(details.criteria_type.as_deref())
        .bind(details.criteria_value.as_deref())
        .bind(details.min_score)
        .bind(i64::from(details.waived))
        .bind(details.conversion_notes.as_deref())
        .bind(details.num_recommenders.map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_requirement(
        &self,
        application_id: ApplicationId,
        id: RequirementId,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM requirements WHERE id = ?1 AND application_id = ?2")
            .bind(id_to_i64("requirement_id", id.value())?)
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
